//! `watch` - follow the installer event stream

use clap::Args;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use provisioner_client::{
    signal_channel, CertVerifier, EventStreamConsumer, ReconnectState, SseConnector,
};
use provisioner_core::{EventReceiver, StreamConfig, TypedClusterFactory};

use super::{print_event, Client};
use crate::{Error, Result};

#[derive(Args, Debug, Default)]
pub struct WatchArgs {
    /// Don't ping cluster dashboards after installs finish
    #[arg(long)]
    pub no_cert_check: bool,
}

/// Stream events until Ctrl-C or until reconnects run out
pub async fn run(client: &Client, args: WatchArgs) -> Result<()> {
    if client.endpoints.events.is_none() {
        return Err(Error::validation(
            "no events endpoint; set --base-url or PROVISIONER_EVENTS_URL",
        ));
    }
    let stream_config = StreamConfig::from_env()?;

    let stop_printing = CancellationToken::new();
    let printer = tokio::spawn(print_events(client.bus.subscribe(), stop_printing.clone()));

    let stop_verifying = CancellationToken::new();
    let verifier = (!args.no_cert_check).then(|| {
        Arc::new(CertVerifier::new(client.gateway.clone(), client.bus.sender()))
            .start(client.bus.subscribe(), stop_verifying.clone())
    });

    let (signal_tx, signals) = signal_channel();
    let connector = SseConnector::new(client.transport.client().clone(), signal_tx);
    let mut consumer = EventStreamConsumer::new(
        client.endpoints.events.clone(),
        Box::new(connector),
        client.bus.sender(),
        Arc::new(TypedClusterFactory),
        &stream_config,
    );

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("[Watch] Interrupted, closing event stream");
            ctrl_c.cancel();
        }
    });

    let state = consumer.run(signals, shutdown).await;
    let attempts = consumer.reconnect_attempts();
    drop(consumer);

    stop_verifying.cancel();
    if let Some(verifier) = verifier {
        if let Err(e) = verifier.await {
            warn!(error = %e, "[Watch] Cert verifier task failed");
        }
    }

    stop_printing.cancel();
    match printer.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "[Watch] Printer task failed"),
    }

    match state {
        ReconnectState::GivenUp => Err(Error::StreamGaveUp { attempts }),
        _ => Ok(()),
    }
}

/// Print events as they arrive; on `stop`, print what is still queued
async fn print_events(mut rx: EventReceiver, stop: CancellationToken) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Some(event) => print_event(event)?,
                None => return Ok(()),
            },
            _ = stop.cancelled() => {
                for event in rx.drain() {
                    print_event(event)?;
                }
                return Ok(());
            }
        }
    }
}
