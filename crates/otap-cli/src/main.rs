//! otc — OTAP control CLI.
//!
//! Operator front-end for the otapd `/rpc` control surface and the
//! artifact upload endpoint.

#![allow(clippy::print_stdout)]

use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};

use otap_cli::client::ControlClient;
use otap_cli::table;

#[derive(Parser, Debug)]
#[command(name = "otc")]
#[command(version, about = "OTAP control")]
struct Cli {
    /// OTAP server base URL.
    #[arg(long, env = "OTC_URL")]
    url: String,

    /// Shared control secret.
    #[arg(long, env = "OTC_KEY", hide_env_values = true)]
    key: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Liveness and credential probe.
    Ping,
    /// List registered devices, optionally a single IMEI.
    Show { imei: Option<String> },
    /// List devices carrying a terminal label.
    Find { tid: String },
    /// List stored firmware versions.
    Jars,
    /// Register (or re-register) a device. Clears its block flag.
    Add {
        imei: String,
        custid: String,
        tid: String,
    },
    /// Assign a delivery target: exact version, `latest`, or `*`.
    Deliver { imei: String, version: String },
    /// Block devices from receiving upgrades.
    Block {
        /// Block every registered device.
        #[arg(long)]
        all: bool,
        imei: Option<String>,
    },
    /// Re-enable blocked devices.
    Unblock {
        /// Unblock every registered device.
        #[arg(long)]
        all: bool,
        imei: Option<String>,
    },
    /// Delete a stored firmware version.
    Purge { version: String },
    /// Print the provisioning URI lines for a customer.
    Config { custid: String },
    /// Upload a firmware JAR; it is stored under its manifest version.
    Upload {
        file: PathBuf,
        #[arg(long)]
        overwrite: bool,
    },
}

/// Resolve the `--all`/IMEI pair shared by block and unblock.
fn block_target(all: bool, imei: Option<String>) -> anyhow::Result<String> {
    match (all, imei) {
        (true, None) => Ok("ALL".to_string()),
        (false, Some(imei)) => Ok(imei),
        (true, Some(_)) => bail!("give either --all or an IMEI, not both"),
        (false, None) => bail!("an IMEI is required unless --all is given"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    otap_core::tracing_init::init_tracing("otc=warn", false);
    let cli = Cli::parse();
    let client = ControlClient::new(&cli.url, &cli.key)?;

    match cli.command {
        Command::Ping => {
            client.ping().await?;
            println!("pong");
        }
        Command::Show { imei } => {
            let rows = client.show(imei.as_deref()).await?;
            println!("{}", table::render(&rows));
        }
        Command::Find { tid } => {
            let rows = client.find(&tid).await?;
            println!("{}", table::render(&rows));
        }
        Command::Jars => {
            for version in client.jars().await? {
                println!("{version}");
            }
        }
        Command::Add { imei, custid, tid } => {
            client.add(&imei, &custid, &tid).await?;
            println!("added {imei}");
        }
        Command::Deliver { imei, version } => {
            let resolved = client.deliver(&imei, &version).await?;
            println!("delivering {resolved} to {imei}");
        }
        Command::Block { all, imei } => {
            let updated = client.block(&block_target(all, imei)?, true).await?;
            println!("blocked {updated} device(s)");
        }
        Command::Unblock { all, imei } => {
            let updated = client.block(&block_target(all, imei)?, false).await?;
            println!("unblocked {updated} device(s)");
        }
        Command::Purge { version } => {
            client.purge(&version).await?;
            println!("purged {version}");
        }
        Command::Config { custid } => {
            for line in client.config(&custid).await? {
                println!("{line}");
            }
        }
        Command::Upload { file, overwrite } => {
            println!("{}", client.upload(&file, overwrite).await?);
        }
    }

    Ok(())
}
