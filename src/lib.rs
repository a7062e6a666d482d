//! An in-memory key-value server that speaks RESP and replicates writes from
//! one primary to any number of replicas.
//!
//! Supported commands: PING, ECHO, GET, SET (with `PX` expiry), INFO, and the
//! replication pair REPLCONF / PSYNC. A replica performs the handshake with its
//! primary on startup, receives a snapshot, then applies the primary's write
//! stream while serving read-only clients.
//!
//! Connections are handled concurrently, one Tokio task each.

pub mod commands;
pub mod config;
pub mod connection;
pub mod handshake;
pub mod input;
pub mod key_value_store;
pub mod rdb;
pub mod replication;
pub mod resp;
pub mod server;
