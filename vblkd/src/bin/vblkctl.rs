//! vblkctl - CLI client for the vblkd daemon.
//!
//! Usage:
//!   vblkctl create --id disk-1 --pf 0 --volume Malloc0 --max-io-qps 4
//!   vblkctl list [--page-size N] [--page-token T]
//!   vblkctl get <name>
//!   vblkctl update <name> [--mask max_io_qps] ...
//!   vblkctl delete <name> [--allow-missing]
//!   vblkctl stats <controller-id>

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use vblkd::control::{Request, Response};
use vblkd::types::{
    CreateVirtioBlkRequest, DeleteVirtioBlkRequest, FieldMask, GetVirtioBlkRequest,
    ListVirtioBlksRequest, ObjectKey, PciEndpoint, UpdateVirtioBlkRequest, VirtioBlk,
    VirtioBlkStatsRequest,
};

const DEFAULT_SOCKET_PATH: &str = "/run/vblkd/vblkd.sock";

#[derive(Parser)]
#[command(name = "vblkctl")]
#[command(about = "Control the vblkd daemon")]
struct Cli {
    /// Control socket path
    #[arg(short, long, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    /// Print responses as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a virtio-blk controller
    Create {
        /// Resource id; generated when omitted
        #[arg(long)]
        id: Option<String>,
        /// PCIe physical function
        #[arg(long)]
        pf: u32,
        /// Backing volume (bdev) name
        #[arg(long)]
        volume: String,
        /// Number of I/O queues
        #[arg(long, default_value = "1")]
        max_io_qps: u32,
    },
    /// Delete a controller
    Delete {
        /// Resource name
        name: String,
        /// Succeed if the controller does not exist
        #[arg(long)]
        allow_missing: bool,
    },
    /// Update a controller
    Update {
        /// Resource name
        name: String,
        #[arg(long)]
        pf: Option<u32>,
        #[arg(long)]
        volume: Option<String>,
        #[arg(long)]
        max_io_qps: Option<u32>,
        /// Field paths to update, comma separated
        #[arg(long, value_delimiter = ',')]
        mask: Vec<String>,
        #[arg(long)]
        allow_missing: bool,
    },
    /// List controllers
    List {
        #[arg(long, default_value = "0")]
        page_size: i32,
        #[arg(long, default_value = "")]
        page_token: String,
    },
    /// Get a controller
    Get {
        /// Resource name
        name: String,
    },
    /// Show I/O statistics
    Stats {
        /// Device name as known to the backend
        controller_id: String,
    },
}

impl Commands {
    fn into_request(self) -> Request {
        match self {
            Commands::Create {
                id,
                pf,
                volume,
                max_io_qps,
            } => Request::Create(CreateVirtioBlkRequest {
                virtio_blk: Some(VirtioBlk {
                    name: String::new(),
                    pcie_id: Some(PciEndpoint {
                        physical_function: pf,
                        virtual_function: None,
                    }),
                    volume_id: Some(ObjectKey::new(volume)),
                    max_io_qps,
                }),
                virtio_blk_id: id,
            }),
            Commands::Delete {
                name,
                allow_missing,
            } => Request::Delete(DeleteVirtioBlkRequest {
                name,
                allow_missing,
            }),
            Commands::Update {
                name,
                pf,
                volume,
                max_io_qps,
                mask,
                allow_missing,
            } => Request::Update(UpdateVirtioBlkRequest {
                virtio_blk: Some(VirtioBlk {
                    name,
                    pcie_id: pf.map(|physical_function| PciEndpoint {
                        physical_function,
                        virtual_function: None,
                    }),
                    volume_id: volume.map(ObjectKey::new),
                    max_io_qps: max_io_qps.unwrap_or_default(),
                }),
                update_mask: (!mask.is_empty()).then(|| FieldMask::new(mask)),
                allow_missing,
            }),
            Commands::List {
                page_size,
                page_token,
            } => Request::List(ListVirtioBlksRequest {
                page_size,
                page_token,
            }),
            Commands::Get { name } => Request::Get(GetVirtioBlkRequest { name }),
            Commands::Stats { controller_id } => Request::Stats(VirtioBlkStatsRequest {
                controller_id: Some(ObjectKey::new(controller_id)),
            }),
        }
    }
}

async fn send_request(socket: &Path, request: &Request) -> Result<Response> {
    let stream = UnixStream::connect(socket)
        .await
        .with_context(|| format!("Failed to connect to daemon at {}", socket.display()))?;

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let req_json = serde_json::to_string(request)? + "\n";
    writer.write_all(req_json.as_bytes()).await?;

    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        bail!("daemon closed the connection without responding");
    }
    let response: Response = serde_json::from_str(&line).context("Malformed response")?;

    Ok(response)
}

fn print_controller(blk: &VirtioBlk) {
    println!("VirtioBlk: {}", blk.name);
    if let Some(pcie) = &blk.pcie_id {
        println!("  PF:         {}", pcie.physical_function);
        if let Some(vf) = pcie.virtual_function {
            println!("  VF:         {vf}");
        }
    }
    if let Some(volume) = &blk.volume_id {
        println!("  Volume:     {}", volume.value);
    }
    println!("  Queues:     {}", blk.max_io_qps);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let request = cli.command.into_request();

    let response = send_request(&cli.socket, &request).await?;

    if let Some(status) = response.status() {
        eprintln!("Error: {:?}: {}", status.code(), status.message());
        std::process::exit(1);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    match response {
        Response::Empty => println!("OK"),
        Response::VirtioBlk(blk) => print_controller(&blk),
        Response::List(list) => {
            if list.virtio_blks.is_empty() {
                println!("No controllers");
            } else {
                println!("{:<56} {:>4} {:<24} {:>6}", "NAME", "PF", "VOLUME", "QUEUES");
                for blk in &list.virtio_blks {
                    let pf = blk
                        .pcie_id
                        .as_ref()
                        .map_or_else(|| "-".to_string(), |p| p.physical_function.to_string());
                    let volume = blk.volume_id.as_ref().map_or("-", |v| v.value.as_str());
                    println!(
                        "{:<56} {:>4} {:<24} {:>6}",
                        blk.name, pf, volume, blk.max_io_qps
                    );
                }
            }
            if !list.next_page_token.is_empty() {
                println!("Next page token: {}", list.next_page_token);
            }
        }
        Response::Stats(stats) => {
            println!("Stats: {}", stats.id.value);
            println!("  Read ops:   {}", stats.stats.read_ops_count);
            println!("  Write ops:  {}", stats.stats.write_ops_count);
        }
        // Reported above.
        Response::Error { .. } => {}
    }

    Ok(())
}
