//! Operator-facing subcommands, all thin wrappers over the control client.

use crate::args::ConfigCommands;
use anyhow::Result;
use lanshare::control::{ControlClient, ShareStatus, StatusPatch};

pub async fn cmd_status(client: &ControlClient) -> Result<()> {
    print_status(&client.status().await?);
    Ok(())
}

pub async fn cmd_set_running(client: &ControlClient, running: bool) -> Result<()> {
    let status = client
        .set_status(&StatusPatch {
            running: Some(running),
            ..StatusPatch::default()
        })
        .await?;

    match (running, status.running) {
        (true, true) => println!("Share started on port {}", status.port),
        (true, false) => println!(
            "Share failed to start: {}",
            status.error.as_deref().unwrap_or("unknown error")
        ),
        (false, _) => println!("Share stopped"),
    }
    Ok(())
}

pub async fn cmd_config(client: &ControlClient, command: ConfigCommands) -> Result<()> {
    let patch = match command {
        ConfigCommands::Show => {
            print_status(&client.status().await?);
            return Ok(());
        }
        ConfigCommands::Directory { path } => StatusPatch {
            directory: Some(path),
            ..StatusPatch::default()
        },
        ConfigCommands::Port { port } => StatusPatch {
            port: Some(port),
            ..StatusPatch::default()
        },
        ConfigCommands::Timeout { seconds } => StatusPatch {
            timeout: Some(seconds),
            ..StatusPatch::default()
        },
        ConfigCommands::Uploads { enabled } => StatusPatch {
            uploads_enabled: Some(enabled),
            ..StatusPatch::default()
        },
        ConfigCommands::Thumbnails { enabled } => StatusPatch {
            thumbnails_disabled: Some(!enabled),
            ..StatusPatch::default()
        },
    };

    print_status(&client.set_status(&patch).await?);
    Ok(())
}

pub async fn cmd_accept_warning(client: &ControlClient) -> Result<()> {
    client.accept_warning().await?;
    println!("Warning acknowledged");
    Ok(())
}

fn print_status(status: &ShareStatus) {
    println!(
        "Share:      {}",
        if status.running { "running" } else { "stopped" }
    );
    println!("Directory:  {}", status.directory.display());
    println!("Port:       {}", status.port);
    if let Some(ip) = &status.ip_address {
        println!("Address:    https://{}:{}", ip, status.port);
    }
    println!(
        "Idle stop:  {}",
        if status.timeout == 0 {
            "never".to_string()
        } else {
            format!("after {}s", status.timeout)
        }
    );
    println!(
        "Uploads:    {}",
        if status.uploads_enabled { "enabled" } else { "disabled" }
    );
    if let Some(error) = &status.error {
        println!("Last error: {error}");
    }
    if !status.history.is_empty() {
        println!("Recent directories:");
        for path in &status.history {
            println!("  {}", path.display());
        }
    }
}
