//! Request Gateway
//!
//! Performs one provisioning action per call against the installer API and
//! reports the outcome on the event bus.
//!
//! Failure policies:
//! - **hard** (credentials, launch, delete cluster): failure event + `Err`
//! - **soft** (region / subscription listings): failure is swallowed and an
//!   empty result is emitted, so subscribers always see a terminal event
//! - **fire-and-forget** (backup upload, prompt answers): failures are only
//!   logged

use bytes::Bytes;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use provisioner_core::{fill_template, DomainEvent, Endpoints, EventSender};

use crate::transport::{RequestResult, Transport, TransportError, TransportRequest};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Local precondition failure; the transport was never called
    #[error("can't make request without URL")]
    MissingUrl,

    #[error("request failed with status {}", .0.status)]
    Status(RequestResult),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl GatewayError {
    /// Body and status carried by failure events
    ///
    /// Failures without a response report status 0 and the error text.
    pub fn failure_parts(&self) -> (Value, u16) {
        match self {
            Self::Status(result) => (result.body.clone(), result.status),
            other => (Value::String(other.to_string()), 0),
        }
    }
}

/// A file sent as a raw request body
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub data: Bytes,
    pub content_type: String,
}

impl UploadFile {
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Answer to an installer prompt
#[derive(Debug, Clone, PartialEq)]
pub enum PromptResponse {
    /// Posted as the raw request body
    File(UploadFile),
    /// Posted as JSON
    Json(Value),
}

/// Gateway to the provisioning service
#[derive(Clone)]
pub struct RequestGateway {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    events: EventSender,
}

impl RequestGateway {
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints, events: EventSender) -> Self {
        Self {
            transport,
            endpoints,
            events,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Perform `request`, treating any status outside [200, 400) as failure
    pub async fn perform_request(
        &self,
        request: TransportRequest,
    ) -> Result<RequestResult, GatewayError> {
        if request.url.is_empty() {
            return Err(GatewayError::MissingUrl);
        }

        let method = request.method.clone();
        let url = request.url.clone();
        let result = self.transport.perform(request).await?;

        if result.is_success() {
            Ok(result)
        } else {
            warn!(
                method = %method,
                url = %url,
                status = result.status,
                "[RequestGateway] Request failed"
            );
            Err(GatewayError::Status(result))
        }
    }

    // ========================================================================
    // Credentials
    // ========================================================================

    /// Store a cloud credential
    ///
    /// Emits: `CREATE_CREDENTIAL_SUCCESS` / `CREATE_CREDENTIAL_ERROR`
    pub async fn create_credential(&self, data: Value) -> Result<RequestResult, GatewayError> {
        let request = TransportRequest::new(Method::POST, url_or_empty(&self.endpoints.credentials))
            .with_header("Content-Type", "application/json")
            .with_json(data);

        match self.perform_request(request).await {
            Ok(result) => {
                info!("[RequestGateway] Credential created");
                self.events.emit(DomainEvent::CredentialCreated {
                    res: result.body.clone(),
                });
                Ok(result)
            }
            Err(e) => {
                let (err, status) = e.failure_parts();
                self.events
                    .emit(DomainEvent::CredentialCreateFailed { err, status });
                Err(e)
            }
        }
    }

    /// Delete the credential `id` of cloud `kind`
    ///
    /// Emits: `DELETE_CREDENTIAL_SUCCESS` / `DELETE_CREDENTIAL_ERROR`
    pub async fn delete_credential(
        &self,
        kind: &str,
        id: &str,
    ) -> Result<RequestResult, GatewayError> {
        let url = self
            .endpoints
            .credentials
            .as_deref()
            .filter(|base| !base.is_empty())
            .map(|base| {
                format!(
                    "{}/{}/{}",
                    base,
                    urlencoding::encode(kind),
                    urlencoding::encode(id)
                )
            })
            .unwrap_or_default();

        match self
            .perform_request(TransportRequest::new(Method::DELETE, url))
            .await
        {
            Ok(result) => {
                info!(kind, id, "[RequestGateway] Credential deleted");
                self.events.emit(DomainEvent::CredentialDeleteSucceeded {
                    kind: kind.to_string(),
                    id: id.to_string(),
                });
                Ok(result)
            }
            Err(e) => {
                let (err, status) = e.failure_parts();
                self.events
                    .emit(DomainEvent::CredentialDeleteFailed { err, status });
                Err(e)
            }
        }
    }

    // ========================================================================
    // Cloud listings
    // ========================================================================

    /// List regions available to `credential_id` on `cloud`
    ///
    /// Emits: `CLOUD_REGIONS` (empty list on failure)
    pub async fn list_cloud_regions(&self, cloud: &str, credential_id: &str) {
        let request = TransportRequest::new(Method::GET, url_or_empty(&self.endpoints.regions))
            .with_query("cloud", cloud)
            .with_query("credential_id", credential_id);

        let regions = match self.perform_request(request).await {
            Ok(result) => result.body,
            Err(e) => {
                warn!(cloud, credential_id, error = %e, "[RequestGateway] Region lookup failed");
                json!([])
            }
        };

        self.events.emit(DomainEvent::CloudRegions {
            cloud: cloud.to_string(),
            credential_id: credential_id.to_string(),
            regions,
        });
    }

    /// List Azure subscriptions visible to `credential_id`
    ///
    /// Emits: `AZURE_SUBSCRIPTIONS` (empty list on failure)
    pub async fn list_azure_subscriptions(&self, credential_id: &str) {
        let request = TransportRequest::new(
            Method::GET,
            url_or_empty(&self.endpoints.azure_subscriptions),
        )
        .with_query("credential_id", credential_id);

        let subscriptions = match self.perform_request(request).await {
            Ok(result) => result.body,
            Err(e) => {
                warn!(credential_id, error = %e, "[RequestGateway] Subscription lookup failed");
                json!([])
            }
        };

        self.events.emit(DomainEvent::AzureSubscriptions {
            credential_id: credential_id.to_string(),
            subscriptions,
        });
    }

    // ========================================================================
    // Clusters
    // ========================================================================

    /// Create a cluster, then upload `backup` to it when one was supplied
    ///
    /// The backup upload does not affect the returned outcome.
    ///
    /// Emits: `LAUNCH_CLUSTER_SUCCESS` / `LAUNCH_CLUSTER_FAILURE`
    pub async fn launch_cluster(
        &self,
        data: Value,
        backup: Option<UploadFile>,
    ) -> Result<RequestResult, GatewayError> {
        let mut body = data.as_object().cloned().unwrap_or_default();
        body.insert("has_backup".to_string(), Value::Bool(backup.is_some()));

        let request = TransportRequest::new(Method::POST, url_or_empty(&self.endpoints.clusters))
            .with_header("Content-Type", "application/json")
            .with_json(Value::Object(body));

        let result = match self.perform_request(request).await {
            Ok(result) => result,
            Err(e) => {
                let (res, status) = e.failure_parts();
                self.events.emit(DomainEvent::ClusterLaunchFailed {
                    cluster_id: "new".to_string(),
                    res,
                    status,
                });
                return Err(e);
            }
        };

        let cluster_id = match result.body.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => String::new(),
        };
        info!(cluster_id = %cluster_id, "[RequestGateway] Cluster launched");

        self.events.emit(DomainEvent::ClusterLaunched {
            cluster_id: cluster_id.clone(),
            res: result.body.clone(),
            status: result.status,
        });

        if let Some(backup) = backup {
            if cluster_id.is_empty() {
                warn!("[RequestGateway] Launch response has no cluster id, backup not uploaded");
            } else {
                self.upload_backup(&cluster_id, backup).await;
            }
        }

        Ok(result)
    }

    /// Upload a backup for an already created cluster (logged on failure)
    pub async fn upload_backup(&self, cluster_id: &str, file: UploadFile) {
        let url = self
            .endpoints
            .upload_backup
            .as_deref()
            .map(|t| fill_template(t, &[(":id", cluster_id)]))
            .unwrap_or_default();
        let size = file.size();
        let request = TransportRequest::new(Method::POST, url)
            .with_header("Content-Length", size.to_string())
            .with_bytes(file.data, Some(file.content_type));

        match self.perform_request(request).await {
            Ok(_) => info!(cluster_id, size, "[RequestGateway] Backup uploaded"),
            Err(e) => error!(cluster_id, error = %e, "[RequestGateway] Backup upload failed"),
        }
    }

    /// Delete a cluster
    ///
    /// Emits: `DELETE_CLUSTER_SUCCESS` / `DELETE_CLUSTER_ERROR`
    pub async fn delete_cluster(&self, cluster_id: &str) -> Result<RequestResult, GatewayError> {
        let url = self
            .endpoints
            .cluster
            .as_deref()
            .map(|t| fill_template(t, &[(":id", cluster_id)]))
            .unwrap_or_default();

        match self
            .perform_request(TransportRequest::new(Method::DELETE, url))
            .await
        {
            Ok(result) => {
                info!(cluster_id, "[RequestGateway] Cluster delete accepted");
                self.events.emit(DomainEvent::ClusterDeleteSucceeded {
                    cluster_id: cluster_id.to_string(),
                });
                Ok(result)
            }
            Err(e) => {
                let (err, status) = e.failure_parts();
                self.events.emit(DomainEvent::ClusterDeleteFailed {
                    cluster_id: cluster_id.to_string(),
                    err,
                    status,
                });
                Err(e)
            }
        }
    }

    // ========================================================================
    // Installer interaction
    // ========================================================================

    /// Answer an installer prompt (logged on failure)
    pub async fn send_prompt_response(
        &self,
        cluster_id: &str,
        prompt_id: &str,
        response: PromptResponse,
    ) {
        let url = self
            .endpoints
            .prompt
            .as_deref()
            .map(|t| fill_template(t, &[(":id", cluster_id), (":prompt_id", prompt_id)]))
            .unwrap_or_default();

        let request = match response {
            PromptResponse::File(file) => TransportRequest::new(Method::POST, url)
                .with_header("Content-Length", file.size().to_string())
                .with_bytes(file.data, None),
            PromptResponse::Json(data) => TransportRequest::new(Method::POST, url)
                .with_header("Content-Type", "application/json")
                .with_json(data),
        };

        if let Err(e) = self.perform_request(request).await {
            error!(
                cluster_id,
                prompt_id,
                error = %e,
                "[RequestGateway] Prompt response failed"
            );
        }
    }

    /// Ping the dashboard of a freshly installed cluster over HTTPS
    pub async fn check_cert(&self, domain: &str) -> Result<RequestResult, GatewayError> {
        let url = self
            .endpoints
            .cert_ping
            .as_deref()
            .map(|t| fill_template(t, &[(":domain", domain)]))
            .unwrap_or_default();
        self.perform_request(TransportRequest::new(Method::GET, url))
            .await
    }
}

fn url_or_empty(endpoint: &Option<String>) -> String {
    endpoint.clone().unwrap_or_default()
}
