//! Static per-operation metadata consulted by the gate before dispatch.
//!
//! Every protected operation names the request field that identifies the
//! conversation owner, if any. The gate never scans handler arguments or
//! request bodies to guess it.

use std::collections::BTreeMap;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Where an operation carries its owning conversation key.
pub enum OwnershipKey {
    /// Collection-level operation; only unrestricted callers pass.
    None,
    PathParam(&'static str),
    QueryParam(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Whether an operation needs a loaded, ready dialogue agent.
pub enum AgentRequirement {
    None,
    TrackerStore,
    ReadyAgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Public struct `OperationSpec` used across Parley components.
pub struct OperationSpec {
    pub name: &'static str,
    pub ownership: OwnershipKey,
    pub agent: AgentRequirement,
}

impl OperationSpec {
    pub const fn new(name: &'static str, ownership: OwnershipKey, agent: AgentRequirement) -> Self {
        Self {
            name,
            ownership,
            agent,
        }
    }

    /// Resolves the owning conversation key from the request's path and query.
    pub fn target_sender_id<'a>(&self, fields: &'a RequestFields) -> Option<&'a str> {
        match self.ownership {
            OwnershipKey::None => None,
            OwnershipKey::PathParam(name) => fields.path.get(name).map(String::as_str),
            OwnershipKey::QueryParam(name) => fields.query.get(name).map(String::as_str),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `SweepPredicateKind` values.
pub enum SweepPredicateKind {
    SlotEquality,
    Staleness,
}

impl SweepPredicateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SlotEquality => "slot-equality",
            Self::Staleness => "staleness",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Metadata for operations that sweep every stored conversation.
pub struct SweepOperationSpec {
    pub operation: OperationSpec,
    pub predicate: SweepPredicateKind,
    pub force_field: &'static str,
}

impl SweepOperationSpec {
    /// Reads the declared force flag from a request body. Absent or null
    /// means not forced; `None` when the field holds a non-boolean.
    pub fn force_requested(&self, body: &Value) -> Option<bool> {
        match body.get(self.force_field) {
            None | Some(Value::Null) => Some(false),
            Some(Value::Bool(force)) => Some(*force),
            Some(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Request fields the gate may read: path parameters and query arguments.
pub struct RequestFields {
    pub path: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
}

impl RequestFields {
    pub fn with_path_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.path.insert(name.to_string(), value.into());
        self
    }

    pub fn with_query(mut self, query: BTreeMap<String, String>) -> Self {
        self.query = query;
        self
    }
}
