use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::models::Message;
use crate::providers::{messages_to_chat_messages, CompletionClient, CompletionError};
use crate::services::session::SessionHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyInput,
    Busy,
    NoActiveConversation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Rejected(RejectReason),
    Replied {
        conversation_id: String,
    },
    Failed {
        conversation_id: String,
        error: CompletionError,
    },
}

/// Text shown in the conversation when a completion fails.
pub fn render_failure(error: &CompletionError) -> String {
    format!("Error: {}. Please try again", error)
}

/// Runs one submission at a time against the active conversation.
pub struct Orchestrator {
    session: SessionHandle,
    client: Arc<dyn CompletionClient>,
    busy: AtomicBool,
}

/// Clears the busy flag however the submission ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Orchestrator {
    pub fn new(session: SessionHandle, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            session,
            client,
            busy: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        if text.trim().is_empty() {
            return SubmitOutcome::Rejected(RejectReason::EmptyInput);
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Submission rejected, a request is already in flight");
            return SubmitOutcome::Rejected(RejectReason::Busy);
        }
        let _busy = BusyGuard(&self.busy);

        // The reply goes to the conversation that asked, even if the user
        // switches away while the request is pending.
        let (conversation_id, history) = {
            let mut store = self.session.lock();
            let Some(conversation_id) = store.active_id().map(str::to_string) else {
                return SubmitOutcome::Rejected(RejectReason::NoActiveConversation);
            };
            store.append_message(&conversation_id, Message::user(text));
            let history = store
                .conversation(&conversation_id)
                .map(|c| messages_to_chat_messages(&c.messages))
                .unwrap_or_default();
            (conversation_id, history)
        };

        tracing::debug!(
            "Sending {} messages for conversation {}",
            history.len(),
            conversation_id
        );

        match self.client.complete(&history).await {
            Ok(reply) => {
                self.session
                    .lock()
                    .append_message(&conversation_id, Message::assistant(reply));
                SubmitOutcome::Replied { conversation_id }
            }
            Err(error) => {
                tracing::error!("Completion failed for {}: {}", conversation_id, error);
                self.session
                    .lock()
                    .append_message(&conversation_id, Message::assistant(render_failure(&error)));
                SubmitOutcome::Failed {
                    conversation_id,
                    error,
                }
            }
        }
    }
}
