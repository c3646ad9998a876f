//! Dialogue agent contract, runtime snapshot, and HTTP-backed agent.
mod agent_runtime;
mod dialogue_agent;
mod remote_agent;

pub use agent_runtime::{AgentRuntime, AgentRuntimeSnapshot};
pub use dialogue_agent::{
    ActionHints, ActionScore, AgentError, DialogueAgent, Prediction, UserMessage,
    ACTION_LISTEN_NAME, ACTION_RESTART_NAME,
};
pub use remote_agent::{RemoteDialogueAgent, RemoteDialogueAgentConfig};
