mod args;
mod commands;

use args::{Cli, Commands};
use clap::{CommandFactory, Parser};
use lanshare::control::ControlClient;
use lanshare::server::ServeOptions;
use lanshare::shareenv;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Log to stderr: the supervisor captures the serving process's output
    // and reads request lines as the activity signal.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let control_port = cli.control_port.unwrap_or_else(shareenv::control_port);

    match cli.command {
        Commands::Run => lanshare::control::api::run(control_port).await?,
        Commands::Serve {
            directory,
            port,
            timeout,
            enable_uploads,
            disable_thumbnails,
        } => {
            lanshare::server::run(ServeOptions {
                directory,
                port,
                idle_timeout_secs: timeout,
                uploads_enabled: enable_uploads,
                thumbnails_disabled: disable_thumbnails,
            })
            .await?
        }
        Commands::Status => commands::cmd_status(&ControlClient::new(control_port)).await?,
        Commands::Start => {
            commands::cmd_set_running(&ControlClient::new(control_port), true).await?
        }
        Commands::Stop => {
            commands::cmd_set_running(&ControlClient::new(control_port), false).await?
        }
        Commands::Config { command } => {
            commands::cmd_config(&ControlClient::new(control_port), command).await?
        }
        Commands::AcceptWarning => {
            commands::cmd_accept_warning(&ControlClient::new(control_port)).await?
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "lanshare",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
