//! Route paths and per-operation access metadata.

use parley_access::{
    AgentRequirement, OperationSpec, OwnershipKey, SweepOperationSpec, SweepPredicateKind,
};

pub(super) const ROOT_ENDPOINT: &str = "/";
pub(super) const VERSION_ENDPOINT: &str = "/version";
pub(super) const STATUS_ENDPOINT: &str = "/status";
pub(super) const MODEL_ENDPOINT: &str = "/model";
pub(super) const DOMAIN_ENDPOINT: &str = "/domain";
pub(super) const TRACKER_PREDICT_ENDPOINT: &str = "/predict";
pub(super) const CONVERSATIONS_ENDPOINT: &str = "/conversations";
pub(super) const CONVERSATION_ENDPOINT: &str = "/conversations/{sender_id}";
pub(super) const CONVERSATION_TRACKER_ENDPOINT: &str = "/conversations/{sender_id}/tracker";
pub(super) const CONVERSATION_TRACKER_EVENTS_ENDPOINT: &str =
    "/conversations/{sender_id}/tracker/events";
pub(super) const CONVERSATION_STORY_ENDPOINT: &str = "/conversations/{sender_id}/story";
pub(super) const CONVERSATION_MESSAGES_ENDPOINT: &str = "/conversations/{sender_id}/messages";
pub(super) const CONVERSATION_EXECUTE_ENDPOINT: &str = "/conversations/{sender_id}/execute";
pub(super) const CONVERSATION_RESPOND_ENDPOINT: &str = "/conversations/{sender_id}/respond";
pub(super) const CONVERSATION_PREDICT_ENDPOINT: &str = "/conversations/{sender_id}/predict";
pub(super) const HANDLE_MESSAGE_WITH_CONDITION_ENDPOINT: &str =
    "/conversations/handle-message-w-condition";
pub(super) const RESUME_DEAD_CONVERSATIONS_ENDPOINT: &str =
    "/conversations/resume-dead-conversations";

pub(super) const SENDER_ID_PARAM: &str = "sender_id";
pub(super) const INCLUDE_EVENTS_QUERY_KEY: &str = "include_events";
pub(super) const FORCE_UPDATE_FIELD: &str = "force_update";

const OWNED_BY_PATH: OwnershipKey = OwnershipKey::PathParam(SENDER_ID_PARAM);

pub(super) const STATUS_OPERATION: OperationSpec =
    OperationSpec::new("status", OwnershipKey::None, AgentRequirement::None);
pub(super) const MODEL_LOAD_OPERATION: OperationSpec =
    OperationSpec::new("model.load", OwnershipKey::None, AgentRequirement::None);
pub(super) const DOMAIN_OPERATION: OperationSpec =
    OperationSpec::new("domain", OwnershipKey::None, AgentRequirement::ReadyAgent);
pub(super) const TRACKER_PREDICT_OPERATION: OperationSpec =
    OperationSpec::new("tracker.predict", OwnershipKey::None, AgentRequirement::ReadyAgent);
pub(super) const LIST_CONVERSATIONS_OPERATION: OperationSpec = OperationSpec::new(
    "conversations.list",
    OwnershipKey::None,
    AgentRequirement::TrackerStore,
);
pub(super) const RETRIEVE_TRACKER_OPERATION: OperationSpec = OperationSpec::new(
    "conversation.tracker.retrieve",
    OWNED_BY_PATH,
    AgentRequirement::TrackerStore,
);
pub(super) const APPEND_EVENT_OPERATION: OperationSpec = OperationSpec::new(
    "conversation.tracker.append_event",
    OWNED_BY_PATH,
    AgentRequirement::ReadyAgent,
);
pub(super) const REPLACE_EVENTS_OPERATION: OperationSpec = OperationSpec::new(
    "conversation.tracker.replace_events",
    OWNED_BY_PATH,
    AgentRequirement::ReadyAgent,
);
pub(super) const RETRIEVE_STORY_OPERATION: OperationSpec = OperationSpec::new(
    "conversation.story",
    OWNED_BY_PATH,
    AgentRequirement::TrackerStore,
);
pub(super) const LIST_MESSAGES_OPERATION: OperationSpec = OperationSpec::new(
    "conversation.messages.list",
    OWNED_BY_PATH,
    AgentRequirement::TrackerStore,
);
pub(super) const LOG_MESSAGE_OPERATION: OperationSpec = OperationSpec::new(
    "conversation.messages.log",
    OWNED_BY_PATH,
    AgentRequirement::ReadyAgent,
);
pub(super) const DELETE_CONVERSATION_OPERATION: OperationSpec = OperationSpec::new(
    "conversation.delete",
    OWNED_BY_PATH,
    AgentRequirement::TrackerStore,
);
pub(super) const EXECUTE_ACTION_OPERATION: OperationSpec = OperationSpec::new(
    "conversation.execute",
    OWNED_BY_PATH,
    AgentRequirement::ReadyAgent,
);
pub(super) const RESPOND_OPERATION: OperationSpec = OperationSpec::new(
    "conversation.respond",
    OWNED_BY_PATH,
    AgentRequirement::ReadyAgent,
);
pub(super) const PREDICT_OPERATION: OperationSpec = OperationSpec::new(
    "conversation.predict",
    OWNED_BY_PATH,
    AgentRequirement::ReadyAgent,
);

pub(super) const HANDLE_MESSAGE_WITH_CONDITION_SWEEP: SweepOperationSpec = SweepOperationSpec {
    operation: OperationSpec::new(
        "conversations.handle_message_with_condition",
        OwnershipKey::None,
        AgentRequirement::ReadyAgent,
    ),
    predicate: SweepPredicateKind::SlotEquality,
    force_field: FORCE_UPDATE_FIELD,
};
pub(super) const RESUME_DEAD_CONVERSATIONS_SWEEP: SweepOperationSpec = SweepOperationSpec {
    operation: OperationSpec::new(
        "conversations.resume_dead",
        OwnershipKey::None,
        AgentRequirement::ReadyAgent,
    ),
    predicate: SweepPredicateKind::Staleness,
    force_field: FORCE_UPDATE_FIELD,
};
