//! Shutdown signalling
//!
//! A single `watch::Sender<bool>` owned by the service; every component
//! holds a receiver clone. `true` means stop.

use tokio::sync::watch;

/// Resolves once shutdown has been signalled.
///
/// Never resolves if the sender is dropped without signalling.
pub async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Non-blocking check.
pub fn is_cancelled(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolves_after_signal() {
        let (tx, mut rx) = watch::channel(false);
        assert!(!is_cancelled(&rx));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), cancelled(&mut rx))
            .await
            .unwrap();
        assert!(is_cancelled(&rx));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_never_cancels() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let result = tokio::time::timeout(Duration::from_secs(5), cancelled(&mut rx)).await;
        assert!(result.is_err());
    }
}
