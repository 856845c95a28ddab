use crate::contracts::interface::{CallError, CallResult};
use serde::Serialize;
use tokio::sync::oneshot;

/// Confirmation of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub hash: String,
    pub block_number: u64,
}

/// A submitted transaction waiting for confirmation.
///
/// The binding that submitted it keeps the sender half and resolves it with the
/// receipt or the revert.
#[derive(Debug)]
pub struct PendingTx {
    hash: String,
    confirmation: oneshot::Receiver<CallResult<TxReceipt>>,
}

impl PendingTx {
    pub fn new(hash: impl Into<String>) -> (Self, oneshot::Sender<CallResult<TxReceipt>>) {
        let (tx, rx) = oneshot::channel();
        (Self { hash: hash.into(), confirmation: rx }, tx)
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Wait for the binding to report the outcome. Never times out on its own.
    pub async fn wait(self) -> CallResult<TxReceipt> {
        match self.confirmation.await {
            Ok(result) => result,
            Err(_) => Err(CallError::Transport(format!(
                "transaction {} dropped before confirmation",
                self.hash
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_with_receipt() {
        let (pending, sender) = PendingTx::new("0xabc");
        assert_eq!(pending.hash(), "0xabc");

        sender
            .send(Ok(TxReceipt { hash: "0xabc".into(), block_number: 7 }))
            .unwrap();

        assert_eq!(pending.wait().await.unwrap().block_number, 7);
    }

    #[tokio::test]
    async fn dropped_sender_is_a_transport_error() {
        let (pending, sender) = PendingTx::new("0xdef");
        drop(sender);

        assert!(matches!(pending.wait().await, Err(CallError::Transport(_))));
    }
}
