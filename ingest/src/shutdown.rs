use tokio_util::sync::CancellationToken;

/// Cooperative stop signal. Long running loops look at it between batches.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trips on SIGINT or SIGTERM. Needs a running tokio runtime.
    pub fn listen() -> Self {
        let shutdown = Self::new();

        let handle = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            tracing::warn!("Shutdown requested, stopping after the current batch");
            handle.trigger();
        });

        shutdown
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn triggered(&self) {
        self.token.cancelled().await
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Registering SIGTERM handler: {:?}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Waiting for Ctrl+C: {:?}", e);
                std::future::pending::<()>().await;
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        res = tokio::signal::ctrl_c() => {
            match res {
                Ok(()) => tracing::info!("Received SIGINT"),
                Err(e) => {
                    tracing::error!("Waiting for Ctrl+C: {:?}", e);
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Waiting for Ctrl+C: {:?}", e);
        std::future::pending::<()>().await;
    }
}
