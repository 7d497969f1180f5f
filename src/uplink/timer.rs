use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Periodic producer of queue events.
///
/// The timer never runs work itself: each tick places one event on the
/// dispatcher's queue. When the queue is full the tick is skipped rather
/// than stacking up behind slow work.
pub struct PeriodicTimer;

impl PeriodicTimer {
    /// Starts a task that sends `event()` every `period`, first one period
    /// from now.
    ///
    /// `period` must be non-zero.
    pub fn spawn<T, F>(period: Duration, sender: mpsc::Sender<T>, event: F) -> TimerHandle
    where
        T: Send + 'static,
        F: Fn() -> T + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticks.tick() => {}
                }

                match sender.try_send(event()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!("Dispatcher busy, timer tick skipped");
                    }
                    Err(TrySendError::Closed(_)) => break,
                }
            }
            debug!("Periodic timer stopped");
        });

        TimerHandle {
            token,
            task: Some(task),
        }
    }
}

/// Handle to a running [`PeriodicTimer`]; dropping it cancels the timer
pub struct TimerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    /// Stops the timer. No event is sent after this returns.
    pub fn cancel(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
