//! Runs the plaintext and TLS listeners side by side.
//!
//! Both listeners run on their own task from the start. Whichever stops first
//! decides the outcome: its error is returned to the caller, which treats it as
//! fatal for the whole process. The surviving listener is never stopped
//! explicitly and a failed one is never restarted.

use super::server::{Server, ServerError};

/// Start `plain` and `secure` and wait for the first terminal error.
pub async fn supervise(plain: Server, secure: Server) -> ServerError {
    let (tx, rx) = async_channel::bounded(1);

    let plain_tx = tx.clone();
    tokio::spawn(async move {
        let err = plain.listen_and_serve().await;
        tracing::debug!(error = %err, "HTTP listener stopped");
        let _ = plain_tx.send(err).await;
    });

    tokio::spawn(async move {
        let err = secure.listen_and_serve_tls().await;
        tracing::debug!(error = %err, "HTTPS listener stopped");
        let _ = tx.send(err).await;
    });

    // Both senders only disappear without sending if the tasks panicked.
    rx.recv().await.unwrap_or(ServerError::Closed)
}
