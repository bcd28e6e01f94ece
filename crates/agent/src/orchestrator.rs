use std::sync::Arc;

use tracing::{info, warn};

use relay_core::orchestration::{parse_reply, OrchestrationResponse};

use crate::context::SnapshotLoader;
use crate::conversation::ChatMessage;
use crate::llm::LlmClient;

const FALLBACK_MESSAGE: &str =
    "Sorry, I ran into a problem answering that. Please try again in a moment.";

/// Drives one conversational turn: snapshot the CRM, build the prompt, call
/// the model, and recover a structured response from its free-form reply.
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    snapshots: SnapshotLoader,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, snapshots: SnapshotLoader) -> Self {
        Self { llm, snapshots }
    }

    /// Appends the user message to `history`, asks the model, and appends the
    /// assistant reply. A model failure degrades to a fallback message rather
    /// than surfacing an error to the chat.
    pub async fn process_request(
        &self,
        user_id: &str,
        message: &str,
        history: &mut Vec<ChatMessage>,
    ) -> OrchestrationResponse {
        history.push(ChatMessage::user(message));

        let snapshot = self.snapshots.load(user_id).await;
        let system_prompt = crate::prompt::build_system_prompt(&snapshot);

        let response = match self.llm.complete(&system_prompt, history).await {
            Ok(raw) => {
                let response = parse_reply(&raw);
                info!(
                    event_name = "agent.turn.completed",
                    %user_id,
                    requires_approval = response.requires_approval,
                    "assistant turn parsed"
                );
                response
            }
            Err(error) => {
                warn!(
                    event_name = "agent.turn.failed",
                    %user_id,
                    error = %error,
                    "model call failed, returning fallback"
                );
                OrchestrationResponse {
                    message: FALLBACK_MESSAGE.to_string(),
                    requires_approval: false,
                    approval_data: None,
                    suggested_actions: Vec::new(),
                    completed: false,
                }
            }
        };

        history.push(ChatMessage::assistant(&response.message));
        response
    }
}
