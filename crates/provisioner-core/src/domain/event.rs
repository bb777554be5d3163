//! Domain Events - Unified event system for the provisioner client
//!
//! Every state change the dashboard cares about is represented here.
//! Events come from two producers:
//! - EventStreamConsumer (decoded server-pushed wire messages)
//! - RequestGateway (results of provisioning requests)
//!
//! and are consumed by whatever subscribes to the event bus (UI stores,
//! CertVerifier, the CLI printer).
//!
//! # Design Principles
//!
//! - **Single Source of Truth**: One enum for all domain events
//! - **Ephemeral**: Events are built, dispatched and dropped; never stored here
//! - **Serializable**: All events serialize with a `name` discriminant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{Cluster, InstallPrompt};

// ============================================================================
// DOMAIN EVENT ENUM
// ============================================================================

/// Unified domain events for the provisioner client
///
/// # Event Categories
///
/// - **Stream Events**: decoded from the installer event stream, each carrying
///   the `cluster_id` of the wire message when it had one
/// - **Credential Results**: create/delete outcomes
/// - **Cloud Listings**: regions and Azure subscriptions (always terminal)
/// - **Cluster Lifecycle**: launch and delete results
/// - **Certificates**: cert check request and its outcome
///
/// # Serialization
///
/// Events serialize with a `name` field in SCREAMING_SNAKE_CASE:
/// ```json
/// { "name": "CLUSTER_STATE", "cluster_id": "c1", "state": "running" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    // ════════════════════════════════════════════════════════════════════════
    // EVENT STREAM
    // ════════════════════════════════════════════════════════════════════════
    /// A cluster was created on the server
    NewCluster {
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
        cluster: Cluster,
    },

    /// A known cluster changed
    ClusterUpdate {
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
        cluster: Value,
    },

    /// A credential was stored
    NewCredential {
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
        credential: Value,
    },

    /// A credential was removed
    CredentialDeleted {
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
        id: Option<String>,
    },

    /// Installation state of a cluster changed (opaque state string)
    ClusterState {
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
        state: Option<String>,
    },

    /// The installer is waiting for an answer
    InstallPromptRequested {
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
        prompt: InstallPrompt,
    },

    /// A previously requested prompt was answered
    InstallPromptResolved {
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
        prompt: InstallPrompt,
    },

    /// Structured installation progress
    Progress {
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
        data: Value,
    },

    /// Installation finished
    InstallDone {
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
        cluster: Value,
    },

    /// Installation failed
    InstallError {
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
        message: Option<String>,
    },

    /// Installer log line (full raw payload)
    Log {
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
        data: Value,
    },

    /// Synthetic follow-up to `InstallDone`: the dashboard cert should be checked
    #[serde(rename = "CHECK_CERT")]
    CheckCertRequested {
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
        domain_name: String,
    },

    /// Wire message with a `type` this client does not know (full raw payload)
    #[serde(rename = "DEFAULT_EVENT")]
    UnknownEvent {
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
        data: Value,
    },

    // ════════════════════════════════════════════════════════════════════════
    // CREDENTIALS
    // ════════════════════════════════════════════════════════════════════════
    #[serde(rename = "CREATE_CREDENTIAL_SUCCESS")]
    CredentialCreated { res: Value },

    #[serde(rename = "CREATE_CREDENTIAL_ERROR")]
    CredentialCreateFailed { err: Value, status: u16 },

    #[serde(rename = "DELETE_CREDENTIAL_SUCCESS")]
    CredentialDeleteSucceeded { kind: String, id: String },

    #[serde(rename = "DELETE_CREDENTIAL_ERROR")]
    CredentialDeleteFailed { err: Value, status: u16 },

    // ════════════════════════════════════════════════════════════════════════
    // CLOUD LISTINGS
    // ════════════════════════════════════════════════════════════════════════
    /// Regions for a cloud/credential pair; empty when the lookup failed
    CloudRegions {
        cloud: String,
        credential_id: String,
        regions: Value,
    },

    /// Azure subscriptions for a credential; empty when the lookup failed
    AzureSubscriptions {
        credential_id: String,
        subscriptions: Value,
    },

    // ════════════════════════════════════════════════════════════════════════
    // CLUSTER LIFECYCLE
    // ════════════════════════════════════════════════════════════════════════
    #[serde(rename = "LAUNCH_CLUSTER_SUCCESS")]
    ClusterLaunched {
        cluster_id: String,
        res: Value,
        status: u16,
    },

    /// `cluster_id` is always `"new"`: no id was assigned
    #[serde(rename = "LAUNCH_CLUSTER_FAILURE")]
    ClusterLaunchFailed {
        cluster_id: String,
        res: Value,
        status: u16,
    },

    #[serde(rename = "DELETE_CLUSTER_SUCCESS")]
    ClusterDeleteSucceeded { cluster_id: String },

    #[serde(rename = "DELETE_CLUSTER_ERROR")]
    ClusterDeleteFailed {
        cluster_id: String,
        err: Value,
        status: u16,
    },

    // ════════════════════════════════════════════════════════════════════════
    // CERTIFICATES
    // ════════════════════════════════════════════════════════════════════════
    #[serde(rename = "CERT_VERIFIED")]
    CertVerified {
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
        domain_name: String,
    },

    #[serde(rename = "CERT_CHECK_FAILED")]
    CertCheckFailed {
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
        domain_name: String,
        error: String,
    },
}

impl DomainEvent {
    /// Discriminant name, identical to the serialized `name` field
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::NewCluster { .. } => "NEW_CLUSTER",
            Self::ClusterUpdate { .. } => "CLUSTER_UPDATE",
            Self::NewCredential { .. } => "NEW_CREDENTIAL",
            Self::CredentialDeleted { .. } => "CREDENTIAL_DELETED",
            Self::ClusterState { .. } => "CLUSTER_STATE",
            Self::InstallPromptRequested { .. } => "INSTALL_PROMPT_REQUESTED",
            Self::InstallPromptResolved { .. } => "INSTALL_PROMPT_RESOLVED",
            Self::Progress { .. } => "PROGRESS",
            Self::InstallDone { .. } => "INSTALL_DONE",
            Self::InstallError { .. } => "INSTALL_ERROR",
            Self::Log { .. } => "LOG",
            Self::CheckCertRequested { .. } => "CHECK_CERT",
            Self::UnknownEvent { .. } => "DEFAULT_EVENT",
            Self::CredentialCreated { .. } => "CREATE_CREDENTIAL_SUCCESS",
            Self::CredentialCreateFailed { .. } => "CREATE_CREDENTIAL_ERROR",
            Self::CredentialDeleteSucceeded { .. } => "DELETE_CREDENTIAL_SUCCESS",
            Self::CredentialDeleteFailed { .. } => "DELETE_CREDENTIAL_ERROR",
            Self::CloudRegions { .. } => "CLOUD_REGIONS",
            Self::AzureSubscriptions { .. } => "AZURE_SUBSCRIPTIONS",
            Self::ClusterLaunched { .. } => "LAUNCH_CLUSTER_SUCCESS",
            Self::ClusterLaunchFailed { .. } => "LAUNCH_CLUSTER_FAILURE",
            Self::ClusterDeleteSucceeded { .. } => "DELETE_CLUSTER_SUCCESS",
            Self::ClusterDeleteFailed { .. } => "DELETE_CLUSTER_ERROR",
            Self::CertVerified { .. } => "CERT_VERIFIED",
            Self::CertCheckFailed { .. } => "CERT_CHECK_FAILED",
        }
    }

    /// Cluster this event is about, if any
    pub fn cluster_id(&self) -> Option<&str> {
        match self {
            Self::NewCluster { cluster_id, .. }
            | Self::ClusterUpdate { cluster_id, .. }
            | Self::NewCredential { cluster_id, .. }
            | Self::CredentialDeleted { cluster_id, .. }
            | Self::ClusterState { cluster_id, .. }
            | Self::InstallPromptRequested { cluster_id, .. }
            | Self::InstallPromptResolved { cluster_id, .. }
            | Self::Progress { cluster_id, .. }
            | Self::InstallDone { cluster_id, .. }
            | Self::InstallError { cluster_id, .. }
            | Self::Log { cluster_id, .. }
            | Self::CheckCertRequested { cluster_id, .. }
            | Self::UnknownEvent { cluster_id, .. }
            | Self::CertVerified { cluster_id, .. }
            | Self::CertCheckFailed { cluster_id, .. } => cluster_id.as_deref(),
            Self::ClusterLaunched { cluster_id, .. }
            | Self::ClusterLaunchFailed { cluster_id, .. }
            | Self::ClusterDeleteSucceeded { cluster_id }
            | Self::ClusterDeleteFailed { cluster_id, .. } => Some(cluster_id.as_str()),
            Self::CredentialCreated { .. }
            | Self::CredentialCreateFailed { .. }
            | Self::CredentialDeleteSucceeded { .. }
            | Self::CredentialDeleteFailed { .. }
            | Self::CloudRegions { .. }
            | Self::AzureSubscriptions { .. } => None,
        }
    }

    /// Whether this event was decoded from the installer event stream
    pub fn is_stream_event(&self) -> bool {
        matches!(
            self,
            Self::NewCluster { .. }
                | Self::ClusterUpdate { .. }
                | Self::NewCredential { .. }
                | Self::CredentialDeleted { .. }
                | Self::ClusterState { .. }
                | Self::InstallPromptRequested { .. }
                | Self::InstallPromptResolved { .. }
                | Self::Progress { .. }
                | Self::InstallDone { .. }
                | Self::InstallError { .. }
                | Self::Log { .. }
                | Self::CheckCertRequested { .. }
                | Self::UnknownEvent { .. }
        )
    }
}

// ============================================================================
// EVENT METADATA
// ============================================================================

/// Metadata wrapper for events that leave the process (CLI output, logs)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEventEnvelope {
    /// Unique event ID
    pub event_id: Uuid,
    /// When the event was observed
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: DomainEvent,
}

impl DomainEventEnvelope {
    /// Wrap an event with metadata
    pub fn new(event: DomainEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
