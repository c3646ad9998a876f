//! Access-controlled HTTP gateway in front of a dialogue runtime.
//!
//! Every operation passes the authorization gate first. Single-conversation
//! operations then resolve an output channel and call the agent; bulk
//! operations run a [`conversation_sweep`] over every stored conversation.

pub mod conversation_sweep;
pub mod gateway_server;

pub use conversation_sweep::{
    is_stale, run_conversation_sweep, ConversationSweep, SweepOutcome, SweepStatus,
    STALE_CONVERSATION_SECONDS,
};
pub use gateway_server::{
    build_gateway_router, run_gateway_server, DialogueAgentLoader, GatewayApiError,
    GatewayServerConfig, GatewayServerState, ModelLoadRequest, RemoteDialogueAgentLoader,
    DEFAULT_REQUEST_TIMEOUT_MS, MINIMUM_COMPATIBLE_VERSION,
};
