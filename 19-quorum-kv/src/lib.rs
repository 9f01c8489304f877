//! Quorum-replicated in-memory key-value store.
//!
//! Every node is symmetric: any node can coordinate a client request. A node
//! knows a static list of peers (N), and writes and reads both need a majority
//! of them (W = R = N/2 + 1). Conflicts are resolved by last-writer-wins on a
//! per-node logical timestamp.
//!
//! # Request flow
//!
//! - **Write**: the coordinator stamps the value, applies it locally, then fans
//!   out one tokio task per peer and returns as soon as the ack tally decides.
//! - **Read**: the local copy plus peer copies are gathered until R answers
//!   arrive; the newest wins and stale replicas are repaired in the background.
//! - **Replica write**: a peer merges the incoming value if it is not older than
//!   what it holds.
//!
//! # Modules
//!
//! - [`store`]: in-memory map with last-writer-wins merge
//! - [`clock`]: strictly increasing timestamps
//! - [`quorum`]: majority size and ack counting
//! - [`replica`]: outbound peer calls and the inbound replica write path
//! - [`write`], [`read`]: the coordinators
//! - [`node`], [`http`], [`runtime`]: wiring, routes, serving
//! - [`client`], [`cli`]: command-line client for the public routes

pub mod cli;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod node;
pub mod protocol;
pub mod quorum;
pub mod read;
pub mod replica;
pub mod runtime;
pub mod store;
pub mod topology;
pub mod write;
