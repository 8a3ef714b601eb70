//! Run summary: one status line per asset, folded into an exit code

use tracing::{error, info};

use super::SyncOutcome;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Log per-asset results and map them to the process exit code.
///
/// Returns `EXIT_SUCCESS` only when every asset synced.
pub fn report(outcomes: &[SyncOutcome]) -> i32 {
    for outcome in outcomes {
        if outcome.succeeded {
            info!("{}: SUCCESS", outcome.symbol);
        } else {
            error!("{}: FAILED", outcome.symbol);
        }
    }

    if outcomes.iter().all(|o| o.succeeded) {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}
