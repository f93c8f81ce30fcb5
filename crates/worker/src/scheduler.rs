//! Cron-driven scheduling of full reconciliation cycles.

use std::{str::FromStr, sync::Arc};

use chrono::Utc;
use cron::Schedule;
use db::lock::RunLock;
use tracing::{info, warn};

use crate::Worker;

/// Parse the configured cron expression and spawn the cycle loop.
///
/// The expression uses the six-field form with a leading seconds
/// component, e.g. `0 0 */12 * * *` for every twelve hours.
pub(crate) fn spawn(
    worker: Arc<Worker>,
    lock: RunLock,
    cron_expression: &str,
) -> Result<(), cron::error::Error> {
    let schedule = Schedule::from_str(cron_expression)?;

    info!(%schedule, "scheduling reconciliation cycles");

    tokio::spawn(async move {
        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                warn!("cron schedule has no upcoming fire times, stopping scheduler");
                return;
            };

            let delay = (next - Utc::now()).to_std().unwrap_or_default();

            tokio::time::sleep(delay).await;

            info!("starting scheduled reconciliation cycle");
            worker.run_cycle(&lock).await;
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;
    use cron::Schedule;

    #[test]
    fn default_expression_parses() {
        let schedule = Schedule::from_str("0 0 */12 * * *").unwrap();

        assert!(schedule.upcoming(Utc).next().is_some());
    }
}
