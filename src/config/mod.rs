pub mod deploy;
pub mod fees;

pub use deploy::{load_deployment, CollectorEntry, DeploymentConfig, EventsSection};
pub use fees::{EngineConfig, FeeConfiguration, ThresholdPolicy};
