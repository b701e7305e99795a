use super::{StoreError, StoreResult};
use log::debug;
use tokio_util::sync::CancellationToken;

/// Runs one store operation unless `token` is cancelled first.
///
/// The cancellation branch is polled first, so an already-cancelled token
/// never yields a result.
pub(crate) async fn run_cancellable<R>(
    operation: &'static str,
    token: &CancellationToken,
    call: impl FnOnce() -> StoreResult<R>,
) -> StoreResult<R> {
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!("event={operation} module=store status=cancelled");
            Err(StoreError::Cancelled)
        }
        result = async move { call() } => result,
    }
}
