//! Conversational marketing assistant: context assembly, prompt construction,
//! LLM transport, reply parsing, and execution of human-approved actions.

pub mod context;
pub mod conversation;
pub mod executor;
pub mod llm;
pub mod orchestrator;
pub mod prompt;

pub use context::{CrmSnapshot, SnapshotLoader};
pub use conversation::{ChatMessage, ChatRole};
pub use executor::{ActionExecutor, ExecutionOutcome};
pub use llm::{build_llm_client, AnthropicClient, LlmClient, OpenAiCompatibleClient};
pub use orchestrator::Orchestrator;
