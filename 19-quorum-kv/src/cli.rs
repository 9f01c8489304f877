use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::NodeConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a replica node.
    Serve(ServeArgs),
    /// Write a key through a node.
    Put(PutArgs),
    /// Read a key through a node.
    Get(GetArgs),
    /// Show a node's topology and key count.
    Status(NodeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Name reported by the status endpoint. Defaults to the listen address.
    #[arg(long)]
    pub id: Option<String>,

    /// Socket address to bind. Peers must list this exact address.
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub listen: SocketAddr,

    /// Other replicas, comma separated or repeated.
    #[arg(long = "peer", value_delimiter = ',')]
    pub peers: Vec<String>,

    #[arg(long, default_value_t = 10_000)]
    pub write_timeout_ms: u64,

    #[arg(long, default_value_t = 10_000)]
    pub read_timeout_ms: u64,

    /// Connect timeout for calls to peers. Requests are bounded by the deadlines.
    #[arg(long, default_value_t = 2_000)]
    pub connect_timeout_ms: u64,

    /// Strict `acks > W` comparison and no credit for the local write.
    #[arg(long)]
    pub legacy_quorum: bool,

    #[arg(long)]
    pub no_read_repair: bool,
}

impl ServeArgs {
    /// Builds the node configuration. `address` is the bound address.
    pub fn to_config(&self, address: SocketAddr) -> NodeConfig {
        let address = address.to_string();
        let id = self.id.clone().unwrap_or_else(|| address.clone());
        let config = NodeConfig::new(id, address)
            .with_peers(self.peers.iter().cloned())
            .with_write_timeout(Duration::from_millis(self.write_timeout_ms))
            .with_read_timeout(Duration::from_millis(self.read_timeout_ms))
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_read_repair(!self.no_read_repair);
        if self.legacy_quorum {
            config.with_legacy_quorum()
        } else {
            config
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    /// Node to talk to.
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub node: String,
}

#[derive(Args, Debug, Clone)]
pub struct PutArgs {
    #[command(flatten)]
    pub target: NodeArgs,
    pub key: String,
    pub value: String,
}

#[derive(Args, Debug, Clone)]
pub struct GetArgs {
    #[command(flatten)]
    pub target: NodeArgs,
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quorum::AckRule;

    #[test]
    fn serve_flags_build_config() {
        let cli = Cli::parse_from([
            "node",
            "serve",
            "--id",
            "a",
            "--listen",
            "127.0.0.1:8001",
            "--peer",
            "127.0.0.1:8002,127.0.0.1:8003",
            "--write-timeout-ms",
            "500",
            "--legacy-quorum",
            "--no-read-repair",
        ]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        let config = args.to_config(args.listen);
        assert_eq!(config.id, "a");
        assert_eq!(config.address, "127.0.0.1:8001");
        assert_eq!(config.peers, vec!["127.0.0.1:8002", "127.0.0.1:8003"]);
        assert_eq!(config.write_timeout, Duration::from_millis(500));
        assert_eq!(config.read_timeout, Duration::from_secs(10));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.ack_rule, AckRule::Strict);
        assert!(!config.count_local_write);
        assert!(!config.read_repair);
    }

    #[test]
    fn put_takes_key_and_value() {
        let cli = Cli::parse_from(["node", "put", "--node", "127.0.0.1:9000", "k", "v"]);
        let Command::Put(args) = cli.command else {
            panic!("expected put");
        };
        assert_eq!(args.target.node, "127.0.0.1:9000");
        assert_eq!((args.key.as_str(), args.value.as_str()), ("k", "v"));
    }
}
