use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::warn;

use super::ExchangeEngine;

/// Run [ExchangeEngine::sweep_expired] every `period` on the current tokio runtime.
///
/// The task runs until the returned handle is aborted. Failed sweeps are logged and retried on
/// the next tick.
///
/// # Panics
/// Panics if `period` is zero.
pub fn spawn_expiry_sweep(engine: Arc<ExchangeEngine>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = engine.sweep_expired().await {
                warn!("expiry sweep failed: {e}");
            }
        }
    })
}
