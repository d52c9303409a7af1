//! sled-backed persistence for the engine state and its router.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use sled::Db;
use std::path::Path;
use tracing::{debug, info};

use crate::engine::FeeEngine;
use crate::state::EngineState;

pub const ENGINE_TREE: &str = "engine_state";
const SNAPSHOT_KEY: &[u8] = b"snapshot";
const ROUTER_KEY: &[u8] = b"router";

pub struct EngineStore {
    db: Db,
}

impl EngineStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let p = path.as_ref();
        let db = sled::open(p).with_context(|| format!("opening sled db at {}", p.display()))?;
        Ok(Self { db })
    }

    pub fn from_db(db: Db) -> Self {
        Self { db }
    }

    pub fn is_initialized(&self) -> Result<bool> {
        let tree = self.db.open_tree(ENGINE_TREE).context("opening engine_state tree")?;
        Ok(tree.contains_key(SNAPSHOT_KEY)?)
    }

    /// Write state and router together and flush.
    pub fn save<R: Serialize>(&self, engine: &FeeEngine<R>) -> Result<()> {
        let tree = self.db.open_tree(ENGINE_TREE).context("opening engine_state tree")?;
        let snapshot = serde_json::to_vec(engine.state()).context("serializing engine state")?;
        let router = serde_json::to_vec(engine.router()).context("serializing router")?;

        let mut batch = sled::Batch::default();
        batch.insert(SNAPSHOT_KEY, snapshot.as_slice());
        batch.insert(ROUTER_KEY, router.as_slice());
        tree.apply_batch(batch).context("writing engine snapshot")?;
        tree.flush().context("flushing engine snapshot")?;

        debug!(bytes = snapshot.len(), events = engine.events().len(), "engine snapshot saved");
        Ok(())
    }

    /// `None` when nothing has been saved yet.
    pub fn load<R: DeserializeOwned>(&self) -> Result<Option<FeeEngine<R>>> {
        let tree = self.db.open_tree(ENGINE_TREE).context("opening engine_state tree")?;
        let snapshot = match tree.get(SNAPSHOT_KEY)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let router = tree
            .get(ROUTER_KEY)?
            .context("engine snapshot present but router record missing")?;

        let state: EngineState =
            serde_json::from_slice(&snapshot).context("deserializing engine state")?;
        let router: R = serde_json::from_slice(&router).context("deserializing router")?;
        info!(token = %state.token(), events = state.events().len(), "engine snapshot loaded");
        Ok(Some(FeeEngine::from_parts(state, router)))
    }
}
