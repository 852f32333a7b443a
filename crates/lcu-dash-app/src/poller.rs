// The connection-status poll timer.
//
// At most one timer task is live at a time. The first tick fires
// immediately so the bootstrap connection flag is replaced right away.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct Poller {
    task: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the timer. `tick` runs once per interval and returns `false` to
    /// stop (its receiver is gone). Calling `start` while a timer is live
    /// does nothing and returns `false`.
    pub fn start<F, Fut>(&mut self, interval: Duration, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        if self.is_running() {
            debug!("Poller already running, ignoring start");
            return false;
        }

        info!("Starting status poll every {interval:?}");
        self.task = Some(tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                if !tick().await {
                    debug!("Poll receiver closed, stopping timer");
                    break;
                }
            }
        }));
        true
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Status poll stopped");
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
