//! Background expiry sweeper.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::OverseerError;
use crate::Result;

/// Handle to a running sweep loop.
///
/// The loop sleeps for `interval`, runs one sweep, and starts the timer
/// again. [`Sweeper::stop`] halts it without a final sweep and waits until the
/// task has exited. Dropping the handle also ends the loop, but without
/// waiting.
#[derive(Debug)]
pub struct Sweeper {
    name: &'static str,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn a sweep loop on the current tokio runtime.
    pub fn spawn<F, Fut>(name: &'static str, interval: Duration, mut sweep: F) -> Result<Self>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if interval.is_zero() {
            return Err(OverseerError::Config(
                "sweeper interval must be non-zero".into(),
            ));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| OverseerError::Config(format!("no tokio runtime for sweeper: {e}")))?;

        let (stop, mut stop_rx) = oneshot::channel::<()>();

        let handle = runtime.spawn(async move {
            info!("{} sweeper started, interval {:?}", name, interval);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = tokio::time::sleep(interval) => {
                        debug!("{} sweeper tick", name);
                        sweep().await;
                    }
                }
            }
            info!("{} sweeper stopped", name);
        });

        Ok(Self { name, stop, handle })
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn stop(self) {
        // the receiver is gone only if the loop already exited
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            error!("{} sweeper task failed: {}", self.name, e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
