//! Cancellable timers feeding triggers back into a controller

use crate::controller::state::Trigger;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A scheduled [`Trigger`]. Aborted on [`TimerHandle::cancel`] or drop.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn schedule(after: Duration, trigger: Trigger, tx: mpsc::UnboundedSender<Trigger>) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(trigger);
        });
        Self { task }
    }

    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Short and long watchdogs armed together when a page-wide controller attaches
#[derive(Debug)]
pub struct WatchdogPair {
    short: TimerHandle,
    long: TimerHandle,
}

impl WatchdogPair {
    pub fn arm(short: Duration, long: Duration, tx: mpsc::UnboundedSender<Trigger>) -> Self {
        Self {
            short: TimerHandle::schedule(short, Trigger::ShortWatchdog, tx.clone()),
            long: TimerHandle::schedule(long, Trigger::LongWatchdog, tx),
        }
    }

    pub fn cancel(&self) {
        self.short.cancel();
        self.long.cancel();
    }
}
