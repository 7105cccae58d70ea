use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lanshare")]
#[command(version)]
#[command(about = "Share a local directory over HTTP(S) on your LAN", long_about = None)]
pub(crate) struct Cli {
    /// Override the control surface port. Can also be set via
    /// LANSHARE_CONTROL_PORT env var.
    #[arg(long, global = true)]
    pub control_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the control plane in the foreground (Ctrl+C to stop)
    Run,

    /// Run the serving process (normally spawned by the control plane)
    Serve {
        /// Directory to share
        directory: PathBuf,

        /// Port to bind on all interfaces
        #[arg(short, long)]
        port: u16,

        /// Seconds of inactivity before the watchdog stops the share (0 = never)
        #[arg(long, default_value = "60")]
        timeout: u64,

        /// Allow uploads into the shared directory
        #[arg(long)]
        enable_uploads: bool,

        /// Advertise entries without thumbnail previews
        #[arg(long)]
        disable_thumbnails: bool,
    },

    /// Show the current share status
    Status,

    /// Start the share with the stored settings
    Start,

    /// Stop the share
    Stop,

    /// Read or change stored settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Acknowledge the open-network warning
    AcceptWarning,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigCommands {
    /// Print the stored settings
    Show,

    /// Change the shared directory
    Directory { path: PathBuf },

    /// Change the share port
    Port { port: u16 },

    /// Change the idle timeout in seconds (0 = never)
    Timeout { seconds: u64 },

    /// Enable or disable uploads
    Uploads {
        #[arg(value_parser = clap::builder::BoolishValueParser::new())]
        enabled: bool,
    },

    /// Enable or disable thumbnail previews
    Thumbnails {
        #[arg(value_parser = clap::builder::BoolishValueParser::new())]
        enabled: bool,
    },
}
