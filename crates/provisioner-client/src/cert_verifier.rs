//! Cert Verifier - pings the dashboard of freshly installed clusters
//!
//! Consumer that listens for `CHECK_CERT` events and answers each one with
//! `CERT_VERIFIED` or `CERT_CHECK_FAILED` once the dashboard of the cluster
//! responds (or doesn't) over HTTPS.

use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use provisioner_core::{DomainEvent, EventReceiver, EventSender};

use crate::gateway::RequestGateway;

pub struct CertVerifier {
    gateway: RequestGateway,
    events: EventSender,
}

impl CertVerifier {
    pub fn new(gateway: RequestGateway, events: EventSender) -> Self {
        Self { gateway, events }
    }

    /// Start listening for events
    ///
    /// Every check runs on its own task so a slow dashboard never holds up
    /// the receive loop. The verifier keeps a sender on the bus, so the loop
    /// runs until `shutdown` fires; checks still in flight are aborted then.
    pub fn start(
        self: Arc<Self>,
        mut event_rx: EventReceiver,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("[CertVerifier] Started listening for DomainEvents");
            let mut checks = JoinSet::new();
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    Some(done) = checks.join_next(), if !checks.is_empty() => {
                        if let Err(e) = done {
                            warn!(error = %e, "[CertVerifier] Check task failed");
                        }
                    }
                    event = event_rx.recv() => match event {
                        Some(DomainEvent::CheckCertRequested { cluster_id, domain_name }) => {
                            let verifier = self.clone();
                            checks.spawn(async move {
                                verifier.verify(cluster_id, domain_name).await;
                            });
                        }
                        Some(other) => {
                            trace!(event_type = other.type_name(), "[CertVerifier] Ignoring event");
                        }
                        None => break,
                    },
                }
            }
            if !checks.is_empty() {
                debug!(pending = checks.len(), "[CertVerifier] Aborting checks in flight");
            }
            checks.shutdown().await;
            info!("[CertVerifier] Stopped");
        })
    }

    /// Ping the dashboard of `domain_name` and emit the outcome
    pub async fn verify(&self, cluster_id: Option<String>, domain_name: String) -> DomainEvent {
        let outcome = match self.gateway.check_cert(&domain_name).await {
            Ok(_) => {
                info!(
                    cluster_id = cluster_id.as_deref().unwrap_or("-"),
                    domain = %domain_name,
                    "[CertVerifier] Certificate verified"
                );
                DomainEvent::CertVerified {
                    cluster_id,
                    domain_name,
                }
            }
            Err(e) => {
                warn!(
                    cluster_id = cluster_id.as_deref().unwrap_or("-"),
                    domain = %domain_name,
                    error = %e,
                    "[CertVerifier] Certificate check failed"
                );
                DomainEvent::CertCheckFailed {
                    cluster_id,
                    domain_name,
                    error: e.to_string(),
                }
            }
        };
        self.events.emit(outcome.clone());
        outcome
    }
}
