// Bridge module - human-in-the-loop suspension point
//
// The engine never calls UI code directly. It sends an Interaction across a
// channel and awaits the oneshot reply; the host resolves it however it likes
// (terminal prompt, GUI dialog, scripted answer).

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

/// Answer used for `ask_user` when nobody can answer
pub const NO_ANSWER: &str = "(no answer from user)";

/// A request for human input, resolved by the host through `reply`
#[derive(Debug)]
pub enum Interaction {
    /// Approve or reject a risky action
    Confirm {
        id: String,
        message: String,
        details: String,
        reply: oneshot::Sender<bool>,
    },
    /// Free-form question from the model
    Ask {
        id: String,
        question: String,
        reply: oneshot::Sender<String>,
    },
}

/// Sending half held by the engine and the tool handlers
#[derive(Debug, Clone, Default)]
pub struct Bridge {
    tx: Option<mpsc::Sender<Interaction>>,
}

impl Bridge {
    /// Bridge with no host: confirmations are rejected, questions get [`NO_ANSWER`]
    pub fn detached() -> Self {
        Self { tx: None }
    }

    /// Bridge plus the receiver the host must serve
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Interaction>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx: Some(tx) }, rx)
    }

    /// Ask the host to approve an action. Fails closed.
    pub async fn confirm(&self, message: impl Into<String>, details: impl Into<String>) -> bool {
        let Some(tx) = &self.tx else {
            debug!("no bridge attached, rejecting confirmation");
            return false;
        };

        let (reply, rx) = oneshot::channel();
        let interaction = Interaction::Confirm {
            id: Uuid::new_v4().to_string(),
            message: message.into(),
            details: details.into(),
            reply,
        };

        if tx.send(interaction).await.is_err() {
            warn!("bridge receiver closed, rejecting confirmation");
            return false;
        }

        match rx.await {
            Ok(approved) => approved,
            Err(_) => {
                warn!("confirmation dropped without an answer, rejecting");
                false
            }
        }
    }

    /// Ask the host a question. Never fails; falls back to [`NO_ANSWER`].
    pub async fn ask(&self, question: impl Into<String>) -> String {
        let Some(tx) = &self.tx else {
            debug!("no bridge attached, returning placeholder answer");
            return NO_ANSWER.to_string();
        };

        let (reply, rx) = oneshot::channel();
        let interaction = Interaction::Ask {
            id: Uuid::new_v4().to_string(),
            question: question.into(),
            reply,
        };

        if tx.send(interaction).await.is_err() {
            warn!("bridge receiver closed, returning placeholder answer");
            return NO_ANSWER.to_string();
        }

        rx.await.unwrap_or_else(|_| NO_ANSWER.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detached_fails_closed() {
        let bridge = Bridge::detached();
        assert!(!bridge.confirm("delete?", "a.txt").await);
        assert_eq!(bridge.ask("name?").await, NO_ANSWER);
    }

    #[tokio::test]
    async fn test_host_resolves_requests() {
        let (bridge, mut rx) = Bridge::channel(4);
        let host = tokio::spawn(async move {
            while let Some(interaction) = rx.recv().await {
                match interaction {
                    Interaction::Confirm { message, reply, .. } => {
                        let _ = reply.send(message.contains("yes"));
                    }
                    Interaction::Ask { question, reply, .. } => {
                        let _ = reply.send(format!("answer to {}", question));
                    }
                }
            }
        });

        assert!(bridge.confirm("say yes", "").await);
        assert!(!bridge.confirm("say no", "").await);
        assert_eq!(bridge.ask("q1").await, "answer to q1");

        drop(bridge);
        host.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_reply_rejects() {
        let (bridge, mut rx) = Bridge::channel(1);
        tokio::spawn(async move {
            // Drop every interaction without answering
            while let Some(interaction) = rx.recv().await {
                drop(interaction);
            }
        });

        assert!(!bridge.confirm("overwrite?", "").await);
        assert_eq!(bridge.ask("anyone?").await, NO_ANSWER);
    }

    #[tokio::test]
    async fn test_closed_receiver_rejects() {
        let (bridge, rx) = Bridge::channel(1);
        drop(rx);
        assert!(!bridge.confirm("overwrite?", "").await);
    }
}
