//! Timer-driven demo source

use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::session::SessionState;
use crate::demo::DemoGenerator;
use crate::monitoring::FeedMetrics;

const MIN_PERIOD: Duration = Duration::from_millis(1);

pub(crate) struct DemoSource {
    generator: DemoGenerator,
    session: SessionState,
    period: Duration,
    metrics: FeedMetrics,
}

impl DemoSource {
    pub(crate) fn new(
        generator: DemoGenerator,
        session: SessionState,
        period: Duration,
        metrics: FeedMetrics,
    ) -> Self {
        Self {
            generator,
            session,
            period: period.max(MIN_PERIOD),
            metrics,
        }
    }

    /// Emit one tick per period until cancelled
    pub(crate) async fn run(mut self, cancel: CancellationToken) {
        info!(
            symbol = %self.session.symbol(),
            period_ms = self.period.as_millis() as u64,
            "Starting demo source"
        );
        self.session.set_connected(true);

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let now = chrono::Utc::now().timestamp_millis() as u64;
                    let tick = self.generator.next_tick(now);
                    self.session.apply_demo_tick(tick);
                    self.metrics.demo_ticks.inc();
                    debug!(
                        last_update_id = self.session.book().last_update_id(),
                        mid = ?self.session.book().mid_price(),
                        "Demo tick"
                    );
                }
            }
        }

        self.session.set_connected(false);
        info!(symbol = %self.session.symbol(), "Demo source stopped");
    }
}
