//! Cluster entity
//!
//! The installer reports clusters as loosely typed JSON objects whose shape
//! depends on the cloud they were provisioned on. `Cluster` keeps the raw
//! attributes and adds a typed view of the fields the client relies on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::str::FromStr;

/// Cloud backend of a cluster, from the `type` field of the raw object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterKind {
    Aws,
    DigitalOcean,
    Azure,
    Ssh,
    /// A type this client has no dedicated handling for
    #[serde(untagged)]
    Other(String),
}

impl ClusterKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Aws => "aws",
            Self::DigitalOcean => "digital_ocean",
            Self::Azure => "azure",
            Self::Ssh => "ssh",
            Self::Other(s) => s,
        }
    }

}

impl From<&str> for ClusterKind {
    fn from(s: &str) -> Self {
        match s {
            "aws" => Self::Aws,
            "digital_ocean" => Self::DigitalOcean,
            "azure" => Self::Azure,
            "ssh" => Self::Ssh,
            other => Self::Other(other.to_string()),
        }
    }
}

impl FromStr for ClusterKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// Typed view over a raw cluster object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: Option<String>,
    pub kind: ClusterKind,
    pub state: Option<String>,
    pub name: Option<String>,
    pub credential_id: Option<String>,
    pub region: Option<String>,
    /// Full object as received
    pub attrs: Map<String, Value>,
}

impl Cluster {
    /// Dashboard domain (`domain.domain`) once installation assigned one
    pub fn domain_name(&self) -> Option<&str> {
        domain_name_of(&self.attrs)
    }
}

/// Reads `domain.domain` out of a raw cluster object
pub fn domain_name_of(attrs: &Map<String, Value>) -> Option<&str> {
    attrs
        .get("domain")
        .and_then(|d| d.get("domain"))
        .and_then(Value::as_str)
}

/// Builds a `Cluster` from the raw object the server sent
///
/// This is the seam for "construct a cluster object of the given type";
/// UIs that keep richer per-cloud models plug in their own factory.
pub trait ClusterFactory: Send + Sync {
    fn build(&self, cluster_type: &str, raw: &Value) -> Result<Cluster, ClusterBuildError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterBuildError {
    #[error("cluster payload is not an object")]
    NotAnObject,
}

/// Default factory: reads the common fields every cloud type shares
#[derive(Debug, Clone, Copy, Default)]
pub struct TypedClusterFactory;

impl ClusterFactory for TypedClusterFactory {
    fn build(&self, cluster_type: &str, raw: &Value) -> Result<Cluster, ClusterBuildError> {
        let attrs = raw.as_object().ok_or(ClusterBuildError::NotAnObject)?;
        let field = |key: &str| attrs.get(key).and_then(string_like);

        Ok(Cluster {
            id: field("id"),
            kind: ClusterKind::from(cluster_type),
            state: field("state"),
            name: field("name"),
            credential_id: field("credential_id"),
            region: field("region"),
            attrs: attrs.clone(),
        })
    }
}

// ids arrive as strings or numbers depending on the backend
fn string_like(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
