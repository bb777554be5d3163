//! Provisioner CLI library

pub mod commands;
pub mod error;
pub mod logging;

pub use error::{Error, Result};

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Provisioner - cluster provisioning from the command line
#[derive(Parser, Debug)]
#[command(name = "provisioner")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Endpoint resolution shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Base URL of the provisioning service
    #[arg(long, global = true, env = "PROVISIONER_BASE_URL")]
    pub base_url: Option<String>,

    /// JSON file with endpoint URL templates
    #[arg(long, global = true, env = "PROVISIONER_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream installer events as JSON lines
    Watch(commands::watch::WatchArgs),

    /// List regions available to a credential
    Regions {
        /// Cloud provider (aws, digital_ocean, azure)
        #[arg(long)]
        cloud: String,

        #[arg(long = "credential")]
        credential_id: String,
    },

    /// List Azure subscriptions visible to a credential
    Subscriptions {
        #[arg(long = "credential")]
        credential_id: String,
    },

    /// Store a credential read from a JSON file
    CreateCredential {
        #[arg(long)]
        file: PathBuf,
    },

    /// Delete a stored credential
    DeleteCredential {
        /// Credential kind (aws, digital_ocean, azure, ssh)
        #[arg(long)]
        kind: String,

        #[arg(long)]
        id: String,
    },

    /// Launch a cluster described by a JSON file
    Launch {
        #[arg(long)]
        file: PathBuf,

        /// Backup archive uploaded once the cluster exists
        #[arg(long)]
        backup: Option<PathBuf>,
    },

    /// Delete a cluster
    DeleteCluster {
        #[arg(long)]
        id: String,
    },

    /// Answer an installer prompt
    Respond(commands::actions::RespondArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let client = commands::Client::connect(&self.global)?;

        match self.command {
            Commands::Watch(args) => commands::watch::run(&client, args).await,
            Commands::Regions {
                cloud,
                credential_id,
            } => commands::actions::regions(&client, &cloud, &credential_id).await,
            Commands::Subscriptions { credential_id } => {
                commands::actions::subscriptions(&client, &credential_id).await
            }
            Commands::CreateCredential { file } => {
                commands::actions::create_credential(&client, &file).await
            }
            Commands::DeleteCredential { kind, id } => {
                commands::actions::delete_credential(&client, &kind, &id).await
            }
            Commands::Launch { file, backup } => {
                commands::actions::launch(&client, &file, backup.as_deref()).await
            }
            Commands::DeleteCluster { id } => commands::actions::delete_cluster(&client, &id).await,
            Commands::Respond(args) => commands::actions::respond(&client, args).await,
        }
    }
}
