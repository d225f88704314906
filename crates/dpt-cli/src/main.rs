//! Command-line client for Digital Paper devices
//!
//! # Usage
//!
//! ```bash
//! dpt --client-id-file deviceid.dat --key-file privatekey.dat ls Document
//! dpt upload notes.pdf Document/Notes/notes.pdf
//! dpt download Document/Notes/notes.pdf
//! dpt convert-key privatekey.dat
//! ```
//!
//! Every option also reads a `DPT_*` environment variable; set `RUST_LOG=debug`
//! to see the requests.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use dpt_client::{
    config::{read_key, DEFAULT_URL},
    DptClient, DptConfig, DptError, Entry, HttpTransport,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "dpt")]
#[command(about = "Manage documents on a Digital Paper device")]
#[command(version)]
struct Cli {
    /// Device API URL
    #[arg(long, env = "DPT_URL", default_value = DEFAULT_URL)]
    url: String,

    /// Client id registered with the device
    #[arg(long, env = "DPT_CLIENT_ID")]
    client_id: Option<String>,

    /// File holding the client id
    #[arg(long, env = "DPT_CLIENT_ID_FILE")]
    client_id_file: Option<PathBuf>,

    /// Private key file (PEM or bare base64)
    #[arg(long, env = "DPT_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Request and handshake timeout in seconds
    #[arg(long, env = "DPT_TIMEOUT_SECS", default_value_t = 30)]
    timeout: u64,

    /// Skip verification of the device's self-signed certificate
    #[arg(
        long,
        env = "DPT_ACCEPT_INVALID_CERTS",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    accept_invalid_certs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a key file as base64 PKCS#8 (no network access)
    ConvertKey {
        key_file: PathBuf,
    },
    #[command(flatten)]
    Device(DeviceCommand),
}

/// Commands that authenticate with the device first
#[derive(Subcommand)]
enum DeviceCommand {
    /// Authenticate and exit
    Auth,
    /// List a folder, or every entry when no path is given
    Ls {
        path: Option<String>,
    },
    /// List all documents
    Docs,
    /// Create a folder
    Mkdir {
        /// Existing parent folder
        parent: String,
        /// New folder name
        name: String,
    },
    /// Delete a document
    Rm {
        path: String,
    },
    /// Delete a folder
    Rmdir {
        path: String,
    },
    /// Copy a document to a folder or a new path
    Cp {
        source: String,
        destination: String,
    },
    /// Move or rename a document
    Mv {
        source: String,
        destination: String,
    },
    /// Upload a local file
    Upload {
        local: PathBuf,
        remote: String,
    },
    /// Download a document
    Download {
        remote: String,
        /// Defaults to the document's file name
        local: Option<PathBuf>,
    },
    /// Open a document on the device screen
    Open {
        path: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// List note templates
    Templates,
}

impl Cli {
    fn config(&self) -> DptConfig {
        DptConfig {
            base_url: self.url.clone(),
            client_id: self
                .client_id
                .as_deref()
                .and_then(dpt_client::config::normalize_client_id),
            client_id_file: self.client_id_file.clone(),
            key_file: self.key_file.clone(),
            timeout: Duration::from_secs(self.timeout),
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn print_entries(entries: &[Entry]) {
    for entry in entries {
        let marker = if entry.is_folder() { "/" } else { "" };
        println!("{}{}", entry.entry_path, marker);
    }
}

async fn run(cli: Cli) -> Result<(), DptError> {
    let command = match &cli.command {
        Commands::ConvertKey { key_file } => {
            println!("{}", read_key(key_file)?);
            return Ok(());
        }
        Commands::Device(command) => command,
    };

    let config = cli.config();
    let client: DptClient<HttpTransport> = DptClient::from_config(&config)?;
    info!(
        "Authenticating {} with {}...",
        client.client_id(),
        config.base_url
    );
    client.authenticate().await?;
    run_device_command(&client, command).await
}

async fn run_device_command(
    client: &DptClient<HttpTransport>,
    command: &DeviceCommand,
) -> Result<(), DptError> {
    match command {
        DeviceCommand::Auth => println!("Authenticated."),
        DeviceCommand::Ls { path: Some(path) } => print_entries(&client.list_folder(path).await?),
        DeviceCommand::Ls { path: None } => print_entries(&client.list_all().await?),
        DeviceCommand::Docs => print_entries(&client.list_documents().await?),
        DeviceCommand::Mkdir { parent, name } => client.new_folder(parent, name).await?,
        DeviceCommand::Rm { path } => client.delete_document(path).await?,
        DeviceCommand::Rmdir { path } => client.delete_folder(path).await?,
        DeviceCommand::Cp {
            source,
            destination,
        } => client.copy_file(source, destination).await?,
        DeviceCommand::Mv {
            source,
            destination,
        } => client.move_file(source, destination).await?,
        DeviceCommand::Upload { local, remote } => {
            let bytes = tokio::fs::read(local)
                .await
                .map_err(|e| DptError::local_file(local, e))?;
            let id = client.upload(remote, bytes).await?;
            info!("Uploaded {} as document {}", local.display(), id);
        }
        DeviceCommand::Download { remote, local } => {
            let bytes = client.download(remote).await?;
            let local = local
                .clone()
                .unwrap_or_else(|| PathBuf::from(dpt_client::client::split_path(remote).1));
            tokio::fs::write(&local, &bytes)
                .await
                .map_err(|e| DptError::local_file(&local, e))?;
            info!("Wrote {} bytes to {}", bytes.len(), local.display());
        }
        DeviceCommand::Open { path, page } => client.display_document(path, *page).await?,
        DeviceCommand::Templates => {
            for template in client.list_templates().await? {
                println!("{}", template);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Hint: {}", suggestion);
            }
            ExitCode::FAILURE
        }
    }
}
