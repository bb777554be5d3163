//! Installer event-stream wire format
//!
//! Each stream message is a JSON object tagged by `type`. Decoding happens in
//! two stages: the outer [`WireEnvelope`] first, then the typed inner payload
//! for the message types that nest a second JSON document (`prompt` of type
//! `choice`, `progress`).
//!
//! ```json
//! { "type": "cluster_state", "cluster_id": "c1", "description": "running" }
//! ```

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::domain::{
    domain_name_of, ChoicePayload, ClusterBuildError, ClusterFactory, DomainEvent, InstallPrompt,
};

/// Errors that make a stream message undeliverable
///
/// The message is dropped; the connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("message is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("malformed message envelope: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),

    #[error("`{kind}` message is missing `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("malformed prompt resource: {0}")]
    InvalidPrompt(#[source] serde_json::Error),

    #[error("choice prompt message is not a choice document: {0}")]
    InvalidChoice(#[source] serde_json::Error),

    #[error("progress description is not valid JSON: {0}")]
    InvalidProgress(#[source] serde_json::Error),

    #[error("cannot build cluster: {0}")]
    Cluster(#[from] ClusterBuildError),
}

// ============================================================================
// Envelope
// ============================================================================

/// Known values of the wire `type` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    NewCluster,
    ClusterUpdate,
    NewCredential,
    DeleteCredential,
    ClusterState,
    Prompt,
    Progress,
    InstallDone,
    Error,
    Log,
    /// Anything else, including a missing tag
    Other,
}

impl WireType {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "new_cluster" => Self::NewCluster,
            "cluster_update" => Self::ClusterUpdate,
            "new_credential" => Self::NewCredential,
            "delete_credential" => Self::DeleteCredential,
            "cluster_state" => Self::ClusterState,
            "prompt" => Self::Prompt,
            "progress" => Self::Progress,
            "install_done" => Self::InstallDone,
            "error" => Self::Error,
            "log" => Self::Log,
            _ => Self::Other,
        }
    }
}

/// First-stage decode of a stream message
///
/// Scalar fields are read leniently: numbers are accepted where the server
/// usually sends strings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireEnvelope {
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub cluster: Option<Value>,
    #[serde(default)]
    pub resource: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub resource_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: Option<String>,
}

impl WireEnvelope {
    pub fn wire_type(&self) -> WireType {
        WireType::parse(self.kind.as_deref().unwrap_or_default())
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode one stream message into the domain events it produces
///
/// Returns events in dispatch order:
/// - no events for `new_cluster` without a `cluster`
/// - two events for `install_done` (`InstallDone`, then `CheckCertRequested`)
/// - exactly one event otherwise
pub fn decode_message(
    data: &str,
    clusters: &dyn ClusterFactory,
) -> Result<Vec<DomainEvent>, DecodeError> {
    let raw: Value = serde_json::from_str(data).map_err(DecodeError::InvalidJson)?;
    decode_value(raw, clusters)
}

/// Same as [`decode_message`] for an already parsed message
pub fn decode_value(
    raw: Value,
    clusters: &dyn ClusterFactory,
) -> Result<Vec<DomainEvent>, DecodeError> {
    if !raw.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    let envelope = WireEnvelope::deserialize(&raw).map_err(DecodeError::InvalidEnvelope)?;
    let wire_type = envelope.wire_type();
    let WireEnvelope {
        cluster_id,
        cluster,
        resource,
        resource_id,
        description,
        ..
    } = envelope;

    let event = match wire_type {
        WireType::NewCluster => {
            let Some(cluster) = cluster.filter(|c| !c.is_null()) else {
                return Ok(Vec::new());
            };
            let cluster_type = cluster
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default();
            DomainEvent::NewCluster {
                cluster_id,
                cluster: clusters.build(cluster_type, &cluster)?,
            }
        }
        WireType::ClusterUpdate => DomainEvent::ClusterUpdate {
            cluster_id,
            cluster: cluster.unwrap_or(Value::Null),
        },
        WireType::NewCredential => DomainEvent::NewCredential {
            cluster_id,
            credential: resource.unwrap_or(Value::Null),
        },
        WireType::DeleteCredential => DomainEvent::CredentialDeleted {
            cluster_id,
            id: resource_id,
        },
        WireType::ClusterState => DomainEvent::ClusterState {
            cluster_id,
            state: description,
        },
        WireType::Prompt => decode_prompt(cluster_id, resource)?,
        WireType::Progress => DomainEvent::Progress {
            cluster_id,
            data: decode_progress(description)?,
        },
        WireType::InstallDone => return Ok(decode_install_done(cluster_id, cluster)),
        WireType::Error => DomainEvent::InstallError {
            cluster_id,
            message: description,
        },
        WireType::Log => DomainEvent::Log {
            cluster_id,
            data: raw,
        },
        WireType::Other => DomainEvent::UnknownEvent {
            cluster_id,
            data: raw,
        },
    };

    Ok(vec![event])
}

fn decode_prompt(
    cluster_id: Option<String>,
    resource: Option<Value>,
) -> Result<DomainEvent, DecodeError> {
    let resource = resource.ok_or(DecodeError::MissingField {
        kind: "prompt",
        field: "resource",
    })?;
    let mut prompt: InstallPrompt =
        serde_json::from_value(resource).map_err(DecodeError::InvalidPrompt)?;

    if prompt.resolved {
        return Ok(DomainEvent::InstallPromptResolved { cluster_id, prompt });
    }

    if prompt.is_choice() {
        let choice = ChoicePayload::decode(&prompt.message).map_err(DecodeError::InvalidChoice)?;
        prompt.apply_choice(choice);
    }
    Ok(DomainEvent::InstallPromptRequested { cluster_id, prompt })
}

fn decode_progress(description: Option<String>) -> Result<Value, DecodeError> {
    let description = description.ok_or(DecodeError::MissingField {
        kind: "progress",
        field: "description",
    })?;
    serde_json::from_str(&description).map_err(DecodeError::InvalidProgress)
}

fn decode_install_done(cluster_id: Option<String>, cluster: Option<Value>) -> Vec<DomainEvent> {
    let cluster = cluster.unwrap_or(Value::Null);
    let domain_name = cluster
        .as_object()
        .and_then(domain_name_of)
        .map(str::to_string);

    let mut events = vec![DomainEvent::InstallDone {
        cluster_id: cluster_id.clone(),
        cluster,
    }];

    match domain_name {
        Some(domain_name) => events.push(DomainEvent::CheckCertRequested {
            cluster_id,
            domain_name,
        }),
        None => warn!(
            cluster_id = cluster_id.as_deref().unwrap_or("-"),
            "[Wire] install_done without cluster domain, skipping cert check"
        ),
    }
    events
}

// ============================================================================
// TESTS
// ============================================================================
