use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use shared_config::SchedulingConfig;
use shared_models::{DispatchContext, DispatchError, DispatchStatus, ScheduledDispatch};
use shared_store::{CalendarStore, DispatchStore};
use shared_utils::Clock;

use crate::models::{RunStats, SendOutcome};
use crate::services::sender::DispatchSender;

/// Periodic worker that drains due scheduled dispatches.
///
/// Each run selects pending rows with `trigger_time` in `[now - W, now + W]`
/// where `W` is wider than half the run cadence, so consecutive windows
/// overlap and a message due between ticks is never missed. Double delivery
/// is prevented by the lease transition instead: `lease_due` hands each
/// pending row to exactly one run.
pub struct ScheduledDispatchWindower {
    dispatch_store: Arc<dyn DispatchStore>,
    calendar_store: Arc<dyn CalendarStore>,
    sender: Arc<dyn DispatchSender>,
    clock: Arc<dyn Clock>,
    config: SchedulingConfig,
}

/// Join handle plus shutdown signal for a running windower loop.
pub struct WindowerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WindowerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            error!(?err, "dispatch windower task panicked");
        }
    }
}

impl ScheduledDispatchWindower {
    pub fn new(
        dispatch_store: Arc<dyn DispatchStore>,
        calendar_store: Arc<dyn CalendarStore>,
        sender: Arc<dyn DispatchSender>,
        clock: Arc<dyn Clock>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            dispatch_store,
            calendar_store,
            sender,
            clock,
            config,
        }
    }

    /// Spawn the run loop on the given cadence until `stop` is called.
    pub fn start(self: Arc<Self>) -> WindowerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let interval = StdDuration::from_secs(self.config.dispatch_run_interval_minutes as u64 * 60);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.run_once().await {
                            Ok(stats) => {
                                info!(reclaimed = stats.reclaimed, leased = stats.leased,
                                      sent = stats.sent, skipped = stats.skipped,
                                      failed = stats.failed, "dispatch run complete");
                            }
                            Err(err) => error!(%err, "dispatch run failed"),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("dispatch windower stopping");
                        break;
                    }
                }
            }
        });

        WindowerHandle { shutdown, task }
    }

    /// One full pass: reclaim abandoned leases, lease what is due, send.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<RunStats, DispatchError> {
        let now = self.clock.now_utc();
        let mut stats = RunStats::default();

        let stale_before = now
            - Duration::minutes(
                self.config.dispatch_stale_after_runs * self.config.dispatch_run_interval_minutes,
            );
        let reclaimed = self
            .dispatch_store
            .reclaim_stale(stale_before, now)
            .await?;
        stats.reclaimed = reclaimed.len();
        for dispatch in &reclaimed {
            warn!(dispatch_id = %dispatch.id, retry_count = dispatch.retry_count,
                  "reclaimed stale dispatch lease");
        }

        let half_width = Duration::minutes(self.config.dispatch_window_half_width_minutes);
        let leased = self
            .dispatch_store
            .lease_due(now - half_width, now + half_width, now)
            .await?;
        stats.leased = leased.len();
        debug!(count = stats.leased, "leased due dispatches");

        for dispatch in leased {
            self.process(dispatch, &mut stats).await?;
        }

        Ok(stats)
    }

    async fn process(
        &self,
        dispatch: ScheduledDispatch,
        stats: &mut RunStats,
    ) -> Result<(), DispatchError> {
        match self.sender.send(&dispatch).await {
            Ok(SendOutcome::Delivered) => {
                let now = self.clock.now_utc();
                self.dispatch_store
                    .complete(dispatch.id, DispatchStatus::Sent, now)
                    .await?;
                self.record_reminder_sent(&dispatch).await;
                stats.sent += 1;
            }
            Ok(SendOutcome::Skipped) => {
                self.dispatch_store
                    .complete(dispatch.id, DispatchStatus::Skipped, self.clock.now_utc())
                    .await?;
                stats.skipped += 1;
            }
            Err(err) => {
                warn!(dispatch_id = %dispatch.id, %err, retry_count = dispatch.retry_count,
                      "dispatch send failed");
                self.dispatch_store
                    .release_for_retry(dispatch.id, self.clock.now_utc())
                    .await?;
                stats.failed += 1;
            }
        }
        Ok(())
    }

    /// Best effort: stamp the appointment once its reminder goes out. A
    /// concurrent reschedule losing us the version race is harmless, the
    /// dispatch row already records `sent`.
    async fn record_reminder_sent(&self, dispatch: &ScheduledDispatch) {
        let DispatchContext::AppointmentReminder { appointment_id, .. } = dispatch.context else {
            return;
        };
        let appointment = match self.calendar_store.load_appointment(appointment_id).await {
            Ok(Some(appointment)) => appointment,
            Ok(None) => return,
            Err(err) => {
                warn!(%appointment_id, %err, "could not load appointment for reminder stamp");
                return;
            }
        };

        let mut updated = appointment.clone();
        updated.reminder_sent_at = Some(self.clock.now_utc());
        if let Err(err) = self
            .calendar_store
            .update_appointment(updated, appointment.version)
            .await
        {
            debug!(%appointment_id, %err, "reminder stamp skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use shared_models::{DispatchContext, ScheduledDispatch};
    use shared_store::MemoryStore;
    use shared_utils::FixedClock;

    use crate::services::sender::MockDispatchSender;

    fn windower_with(
        store: Arc<MemoryStore>,
        sender: MockDispatchSender,
        clock: Arc<FixedClock>,
    ) -> ScheduledDispatchWindower {
        ScheduledDispatchWindower::new(
            Arc::clone(&store) as Arc<dyn DispatchStore>,
            store as Arc<dyn CalendarStore>,
            Arc::new(sender),
            clock,
            SchedulingConfig::default(),
        )
    }

    fn due_dispatch(trigger: chrono::DateTime<Utc>) -> ScheduledDispatch {
        ScheduledDispatch::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            trigger,
            DispatchContext::AppointmentFollowUp {
                appointment_id: Uuid::new_v4(),
            },
            3,
        )
    }

    #[tokio::test]
    async fn delivered_dispatch_is_marked_sent() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(now));
        let store = Arc::new(MemoryStore::new());
        let dispatch = due_dispatch(now);
        let dispatch_id = dispatch.id;
        store.enqueue(dispatch).await.unwrap();

        let mut sender = MockDispatchSender::new();
        sender
            .expect_send()
            .times(1)
            .returning(|_| Ok(SendOutcome::Delivered));

        let windower = windower_with(Arc::clone(&store), sender, clock);
        let stats = windower.run_once().await.unwrap();
        assert_eq!(stats.leased, 1);
        assert_eq!(stats.sent, 1);

        let stored = store.load_dispatch(dispatch_id).await.unwrap().unwrap();
        assert_eq!(stored.status, DispatchStatus::Sent);
        assert_eq!(stored.sent_at, Some(now));
    }

    #[tokio::test]
    async fn send_error_releases_for_retry() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(now));
        let store = Arc::new(MemoryStore::new());
        let dispatch = due_dispatch(now);
        let dispatch_id = dispatch.id;
        store.enqueue(dispatch).await.unwrap();

        let mut sender = MockDispatchSender::new();
        sender
            .expect_send()
            .times(1)
            .returning(|_| Err(DispatchError::SendFailure("gateway down".into())));

        let windower = windower_with(Arc::clone(&store), sender, clock);
        let stats = windower.run_once().await.unwrap();
        assert_eq!(stats.failed, 1);

        let stored = store.load_dispatch(dispatch_id).await.unwrap().unwrap();
        assert_eq!(stored.status, DispatchStatus::Pending);
        assert_eq!(stored.retry_count, 1);
    }

    #[tokio::test]
    async fn dispatch_outside_window_is_left_alone() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(now));
        let store = Arc::new(MemoryStore::new());
        let dispatch = due_dispatch(now + Duration::hours(3));
        let dispatch_id = dispatch.id;
        store.enqueue(dispatch).await.unwrap();

        let mut sender = MockDispatchSender::new();
        sender.expect_send().times(0);

        let windower = windower_with(Arc::clone(&store), sender, clock);
        let stats = windower.run_once().await.unwrap();
        assert_eq!(stats.leased, 0);

        let stored = store.load_dispatch(dispatch_id).await.unwrap().unwrap();
        assert_eq!(stored.status, DispatchStatus::Pending);
    }
}
