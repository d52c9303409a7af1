//! Converts accrued tokens into the settlement asset through the router.

use tracing::{debug, error, warn};

use crate::error::{EngineResult, SwapFailure};
use crate::exchange::ExchangeRouter;
use crate::state::EngineState;
use crate::types::{Amount, SWAP_DEADLINE_SECS};

/// Swap exactly `amount` of the engine's tokens for at least `min_out`
/// settlement units, credited to the engine.
///
/// The tokens are moved into the pool before the router is called. A router
/// error moves them back, so a failed conversion leaves the accrued balance
/// where it was.
pub fn convert<R: ExchangeRouter + ?Sized>(
    state: &mut EngineState,
    router: &mut R,
    amount: Amount,
    min_out: Amount,
) -> EngineResult<Amount> {
    let reserves = router.get_reserves();
    if !reserves.is_funded() {
        return Err(SwapFailure::Unfunded.into());
    }

    let path = state.swap_path();
    match router.get_amounts_out(amount, &path) {
        Ok(quoted) => debug!(amount = %amount, quoted = %quoted, min_out = %min_out, "swap quote"),
        Err(e) => debug!(amount = %amount, error = %e, "swap quote unavailable"),
    }

    let engine = state.token.clone();
    let pool = state.pools.pool().clone();
    state.ledger.move_balance(&engine, &pool, amount)?;

    let deadline = state.block_time.saturating_add(SWAP_DEADLINE_SECS);
    let swapped = router.swap_exact_tokens_for_settlement(
        &mut *state,
        amount,
        min_out,
        &path,
        &engine,
        deadline,
    );
    match swapped {
        Ok(received) => {
            // the router settled; proceeds are the engine's even below the floor
            state.settlement.credit(&engine, received);
            if received < min_out {
                error!(
                    received = %received,
                    min_out = %min_out,
                    "router paid out below the requested floor"
                );
                return Err(SwapFailure::BelowMinimum { received, min_out }.into());
            }
            Ok(received)
        }
        Err(e) => {
            if let Err(refund) = state.ledger.move_balance(&pool, &engine, amount) {
                error!(
                    pool = %pool,
                    amount = %amount,
                    error = %refund,
                    "could not return tokens from pool"
                );
            }
            warn!(amount = %amount, error = %e, "router rejected swap");
            Err(SwapFailure::Router(e).into())
        }
    }
}
