use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::debug;

use crate::{elapsed_since, TimeSource};

/// Periodic refresh of the displayed elapsed time.
///
/// The task only holds the start anchor, so it never touches match state.
/// It must be stopped explicitly on pause; dropping the ticker also aborts it.
pub struct ClockTicker {
    handle: Option<JoinHandle<()>>,
    rx: watch::Receiver<u64>,
}

impl ClockTicker {
    pub fn spawn(time: Arc<dyn TimeSource>, anchor_ms: i64, period: Duration) -> Self {
        let (tx, rx) = watch::channel(elapsed_since(anchor_ms, time.now_ms()));
        let handle = tokio::spawn(async move {
            let mut ticks = interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                if tx.send(elapsed_since(anchor_ms, time.now_ms())).is_err() {
                    break;
                }
            }
        });
        debug!("Clock ticker started every {:?}", period);
        Self {
            handle: Some(handle),
            rx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.rx.clone()
    }

    pub fn latest(&self) -> u64 {
        *self.rx.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Clock ticker stopped");
        }
    }
}

impl Drop for ClockTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
