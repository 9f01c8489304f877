//! Entry point: run a replica or talk to one.
//!
//! Start a 3-node cluster:
//! ```bash
//! cargo run --bin node -- serve --id a --listen 127.0.0.1:8001 --peer 127.0.0.1:8002,127.0.0.1:8003
//! cargo run --bin node -- serve --id b --listen 127.0.0.1:8002 --peer 127.0.0.1:8001,127.0.0.1:8003
//! cargo run --bin node -- serve --id c --listen 127.0.0.1:8003 --peer 127.0.0.1:8001,127.0.0.1:8002
//! cargo run --bin node -- put --node 127.0.0.1:8001 greeting hello
//! cargo run --bin node -- get --node 127.0.0.1:8002 greeting
//! ```

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use quorum_kv::cli::{Cli, Command, ServeArgs};
use quorum_kv::client::{GetOutcome, KvClient, PutOutcome};
use quorum_kv::node::Node;
use quorum_kv::runtime::Server;

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await?,
        Command::Put(args) => {
            let client = KvClient::new(&args.target.node)?;
            match client.put(&args.key, &args.value).await? {
                PutOutcome::Ok { acks } => println!("ok ({acks} acks)"),
                PutOutcome::QuorumNotReached { acks } => {
                    bail!("quorum not reached ({acks} acks)")
                }
                PutOutcome::Timeout => bail!("timed out; the write may still be applied"),
            }
        }
        Command::Get(args) => {
            let client = KvClient::new(&args.target.node)?;
            match client.get(&args.key).await? {
                GetOutcome::Found(value) => println!("{} (ts {})", value.payload, value.timestamp),
                GetOutcome::NotFound => bail!("not found"),
                GetOutcome::QuorumNotReached { acks } => {
                    bail!("quorum not reached ({acks} responses)")
                }
                GetOutcome::Timeout => bail!("timed out"),
            }
        }
        Command::Status(args) => {
            let status = KvClient::new(&args.node)?.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

async fn serve(args: ServeArgs) -> Result<()> {
    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    let addr = listener.local_addr()?;
    let node = Node::with_http_client(args.to_config(addr))?;
    let server = Server::new(listener, Arc::new(node));

    info!("node listening on {}", addr);
    if let Err(err) = server.run_until_ctrl_c().await {
        warn!("node exited with error: {err:?}");
        return Err(err);
    }
    Ok(())
}
