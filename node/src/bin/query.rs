//! UDP query client for exercising a running filebeacon node.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use filebeacon_server::MAX_DATAGRAM;
use serde_json::{json, Value};
use tokio::net::UdpSocket;
use tokio::time::timeout;

#[derive(Parser, Debug)]
#[command(
    name = "filebeacon-query",
    about = "Send an availability query to a filebeacon node"
)]
struct Cli {
    /// Base file name, or a full dotted name when no extension is given
    filename: String,

    /// File extension without the leading dot
    extension: Option<String>,

    /// Server address
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:50000")]
    addr: SocketAddr,

    /// Seconds to wait for a reply
    #[arg(long, default_value_t = 5)]
    timeout_seconds: u64,
}

fn build_payload(filename: &str, extension: Option<&str>) -> Value {
    match extension {
        Some(ext) if !ext.is_empty() => json!({"filename": filename, "extension": ext}),
        _ => match filename.rsplit_once('.') {
            Some((base, ext)) if !base.is_empty() => {
                json!({"filename": base, "extension": ext})
            }
            _ => json!({"filename": filename}),
        },
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let payload = build_payload(&cli.filename, cli.extension.as_deref());
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("failed to bind client socket")?;
    socket
        .send_to(payload.to_string().as_bytes(), cli.addr)
        .await
        .with_context(|| format!("failed to send query to {}", cli.addr))?;

    let mut buffer = vec![0u8; MAX_DATAGRAM];
    let (received, _) = timeout(
        Duration::from_secs(cli.timeout_seconds),
        socket.recv_from(&mut buffer),
    )
    .await
    .context("no reply within timeout")?
    .context("failed to receive reply")?;

    let reply: Value =
        serde_json::from_slice(&buffer[..received]).context("reply was not JSON")?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(reply.get("status").and_then(Value::as_str) == Some("ACK"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
