//! Stop handling for `serve`: Ctrl+C or SIGTERM starts a bounded drain.

use std::{future::Future, time::Duration};

use tokio::sync::watch;

pub(crate) const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum StopReason {
    Interrupt,
    Terminate,
    /// A signal handler could not be installed.
    SignalUnavailable,
}

/// Publishes the first stop signal to the graceful-shutdown hook and the drain deadline.
pub(crate) struct ShutdownSignal {
    tx: watch::Sender<Option<StopReason>>,
    rx: watch::Receiver<Option<StopReason>>,
}

impl ShutdownSignal {
    pub(crate) fn new() -> Self {
        let (tx, rx) = watch::channel(None);
        Self { tx, rx }
    }

    pub(crate) fn reason(&self) -> Option<StopReason> {
        *self.rx.borrow()
    }

    /// Future for `with_graceful_shutdown`.
    pub(crate) fn triggered(&self) -> impl Future<Output = ()> + Send + 'static {
        let tx = self.tx.clone();
        async move {
            let reason = next_signal().await;
            tracing::info!(?reason, "stop signal received; draining connections");
            tx.send_replace(Some(reason));
        }
    }

    /// Completes `DRAIN_TIMEOUT` after a stop signal, never before one.
    pub(crate) fn drain_deadline(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.rx.clone();
        async move {
            let signalled = rx.wait_for(Option::is_some).await.is_ok();
            if !signalled {
                return std::future::pending::<()>().await;
            }
            tokio::time::sleep(DRAIN_TIMEOUT).await;
            tracing::warn!(
                seconds = DRAIN_TIMEOUT.as_secs(),
                "drain window elapsed; closing remaining connections"
            );
        }
    }
}

async fn next_signal() -> StopReason {
    let interrupt = async {
        tokio::signal::ctrl_c().await.map_or_else(
            |error| {
                tracing::warn!(%error, "cannot listen for Ctrl+C");
                StopReason::SignalUnavailable
            },
            |()| StopReason::Interrupt,
        )
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        let mut stream = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(error) => {
                tracing::warn!(%error, "cannot listen for SIGTERM");
                return StopReason::SignalUnavailable;
            }
        };
        stream
            .recv()
            .await
            .map_or(StopReason::SignalUnavailable, |()| StopReason::Terminate)
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<StopReason>();

    tokio::select! {
        reason = interrupt => reason,
        reason = terminate => reason,
    }
}
