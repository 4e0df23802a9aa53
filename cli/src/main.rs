//! HoppyShare CLI - provision, inspect and exercise the protocol.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hoppyshare")]
#[command(about = "HoppyShare protocol tool", long_about = None)]
struct Cli {
    /// Path to the credentials file
    #[arg(short, long, default_value_os_t = hoppyshare_core::Credentials::default_path())]
    credentials: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate local credentials: RSA keypair plus a wrapped group key
    Init {
        /// Device identifier; random when omitted
        #[arg(long)]
        device_id: Option<String>,
        /// Overwrite existing credentials
        #[arg(long)]
        force: bool,
    },
    /// Show device identity and verify the group key unwraps
    Info,
    /// Encrypt a file into an envelope
    Encode {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Mime type to carry in the envelope header
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
        /// Filename to carry; defaults to the input's name
        #[arg(long)]
        filename: Option<String>,
    },
    /// Decrypt an envelope; writes the payload or prints text
    Decode {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Preview how a file fragments for the BLE link
    Chunk {
        input: PathBuf,
        /// Maximum chunk payload bytes
        #[arg(long, default_value_t = 120)]
        mtu: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("hoppyshare=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { device_id, force } => {
            commands::init(&cli.credentials, device_id, force)
        }
        Commands::Info => commands::show_info(&cli.credentials),
        Commands::Encode {
            input,
            output,
            mime,
            filename,
        } => commands::encode(&cli.credentials, &input, &output, &mime, filename),
        Commands::Decode { input, output } => {
            commands::decode(&cli.credentials, &input, output.as_deref())
        }
        Commands::Chunk { input, mtu } => commands::chunk(&input, mtu),
    }
}
