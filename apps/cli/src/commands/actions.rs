//! One-shot provisioning actions
//!
//! Each command performs one gateway call and prints the events it emitted.
//! Hard failures also end the process with an error.

use clap::Args;
use std::path::{Path, PathBuf};

use provisioner_client::{GatewayError, PromptResponse, UploadFile};
use provisioner_core::EventReceiver;

use super::{print_event, read_file, read_json, Client};
use crate::{Error, Result};

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("answer").required(true).args(["file", "json"]))]
pub struct RespondArgs {
    #[arg(long = "cluster")]
    pub cluster_id: String,

    #[arg(long = "prompt")]
    pub prompt_id: String,

    /// Answer with the raw contents of a file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Answer with an inline JSON value
    #[arg(long)]
    pub json: Option<String>,
}

fn print_emitted(mut rx: EventReceiver) -> Result<()> {
    for event in rx.drain() {
        print_event(event)?;
    }
    Ok(())
}

/// Print the emitted events, then surface `outcome`'s error if any
fn finish<T>(rx: EventReceiver, outcome: std::result::Result<T, GatewayError>) -> Result<()> {
    print_emitted(rx)?;
    outcome.map(|_| ()).map_err(Error::from)
}

pub async fn regions(client: &Client, cloud: &str, credential_id: &str) -> Result<()> {
    let rx = client.bus.subscribe();
    client.gateway.list_cloud_regions(cloud, credential_id).await;
    print_emitted(rx)
}

pub async fn subscriptions(client: &Client, credential_id: &str) -> Result<()> {
    let rx = client.bus.subscribe();
    client.gateway.list_azure_subscriptions(credential_id).await;
    print_emitted(rx)
}

pub async fn create_credential(client: &Client, file: &Path) -> Result<()> {
    let data = read_json(file).await?;
    let rx = client.bus.subscribe();
    let outcome = client.gateway.create_credential(data).await;
    finish(rx, outcome)
}

pub async fn delete_credential(client: &Client, kind: &str, id: &str) -> Result<()> {
    let rx = client.bus.subscribe();
    let outcome = client.gateway.delete_credential(kind, id).await;
    finish(rx, outcome)
}

pub async fn launch(client: &Client, file: &Path, backup: Option<&Path>) -> Result<()> {
    let data = read_json(file).await?;
    let backup = match backup {
        Some(path) => Some(UploadFile::new(read_file(path).await?, OCTET_STREAM)),
        None => None,
    };

    let rx = client.bus.subscribe();
    let outcome = client.gateway.launch_cluster(data, backup).await;
    finish(rx, outcome)
}

pub async fn delete_cluster(client: &Client, cluster_id: &str) -> Result<()> {
    let rx = client.bus.subscribe();
    let outcome = client.gateway.delete_cluster(cluster_id).await;
    finish(rx, outcome)
}

pub async fn respond(client: &Client, args: RespondArgs) -> Result<()> {
    let response = match (args.file, args.json) {
        (Some(path), _) => {
            PromptResponse::File(UploadFile::new(read_file(&path).await?, OCTET_STREAM))
        }
        (None, Some(json)) => PromptResponse::Json(serde_json::from_str(&json)?),
        (None, None) => return Err(Error::validation("either --file or --json is required")),
    };

    client
        .gateway
        .send_prompt_response(&args.cluster_id, &args.prompt_id, response)
        .await;
    Ok(())
}
