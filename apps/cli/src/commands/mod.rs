//! CLI command implementations

pub mod actions;
pub mod watch;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use provisioner_client::{RequestGateway, ReqwestTransport};
use provisioner_core::{DomainEvent, DomainEventEnvelope, Endpoints, EventBus};
use tracing::debug;

use crate::{Error, GlobalArgs, Result};

/// Everything a command needs to talk to the provisioning service
pub struct Client {
    pub bus: EventBus,
    pub endpoints: Endpoints,
    pub transport: ReqwestTransport,
    pub gateway: RequestGateway,
}

impl Client {
    pub fn connect(global: &GlobalArgs) -> Result<Self> {
        let endpoints = Endpoints::resolve(
            global.base_url.as_deref(),
            global.config.as_deref(),
            |key| std::env::var(key).ok(),
        )?;
        debug!(?endpoints, "[CLI] Resolved endpoints");

        let transport = ReqwestTransport::new()?;
        let bus = EventBus::new();
        let gateway = RequestGateway::new(
            Arc::new(transport.clone()),
            endpoints.clone(),
            bus.sender(),
        );

        Ok(Self {
            bus,
            endpoints,
            transport,
            gateway,
        })
    }
}

/// Print one event as a JSON line on stdout
pub fn print_event(event: DomainEvent) -> Result<()> {
    let line = serde_json::to_string(&DomainEventEnvelope::new(event))?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", line)?;
    stdout.flush()?;
    Ok(())
}

pub(crate) async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|source| Error::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) async fn read_json(path: &Path) -> Result<serde_json::Value> {
    let bytes = read_file(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
