use std::future::Future;
use std::sync::Arc;

use tidewire_infrastructure::InMemoryEventBroker;
use tracing::{info, warn};

/// Resolves on ctrl-c or SIGTERM after stopping the event broker.
///
/// Stopping the broker closes every subscription, which ends open live
/// streams so graceful shutdown does not wait on them forever.
pub async fn shutdown_signal(event_broker: Arc<InMemoryEventBroker>) {
    stop_broker_after(wait_for_termination(), event_broker.as_ref()).await;
}

pub(crate) async fn stop_broker_after(
    signal: impl Future<Output = ()>,
    event_broker: &InMemoryEventBroker,
) {
    signal.await;
    info!("shutdown requested; closing live streams");
    event_broker.stop();
}

async fn wait_for_termination() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(error = %error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(error = %error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
