//! Primary-side replication bookkeeping.
//!
//! A primary keeps one [`ReplicaLink`] per connection that announced itself as
//! a replica, plus a FIFO of wire-encoded write commands waiting to be
//! forwarded. [`Replicas::propagate`] drains that queue to every link that has
//! finished its full resync.
//!
//! Each online link owns a writer task fed through an unbounded channel, so
//! propagating never waits on a replica socket. A replica that stops reading
//! only stalls its own task.

use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::Arc,
};

use bytes::Bytes;
use thiserror::Error;
use tokio::{
    io::AsyncWriteExt,
    net::tcp::OwnedWriteHalf,
    sync::{mpsc, RwLock},
};
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum PropagationError {
    #[error("failed to write to replica {replica}: {source}")]
    Write {
        replica: String,
        #[source]
        source: io::Error,
    },
    #[error("replica {replica} stopped accepting commands")]
    LinkClosed { replica: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Sent `REPLCONF listening-port` but has not received its snapshot yet.
    AwaitingSync,
    /// Snapshot delivered; receives every propagated write.
    Online,
}

#[derive(Debug)]
pub struct ReplicaLink {
    pub listening_port: Option<u16>,
    pub state: LinkState,
    pub writer: Arc<RwLock<OwnedWriteHalf>>,
    /// Feeds the link's writer task once it is online.
    outbox: Option<mpsc::UnboundedSender<Bytes>>,
}

#[derive(Debug, Default)]
pub struct Replicas {
    links: HashMap<String, ReplicaLink>,
    pending: VecDeque<String>,
}

impl Replicas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the connection from `client_address` is a replica listening on `listening_port`.
    pub fn register(
        &mut self,
        client_address: &str,
        listening_port: u16,
        writer: Arc<RwLock<OwnedWriteHalf>>,
    ) {
        self.links
            .entry(client_address.to_string())
            .and_modify(|link| link.listening_port = Some(listening_port))
            .or_insert(ReplicaLink {
                listening_port: Some(listening_port),
                state: LinkState::AwaitingSync,
                writer,
                outbox: None,
            });
    }

    /// Marks the link as synced, registering it first if it skipped `REPLCONF listening-port`.
    ///
    /// Starts the link's writer task, so this must run inside a tokio runtime.
    pub fn mark_online(&mut self, client_address: &str, writer: Arc<RwLock<OwnedWriteHalf>>) {
        let link = self
            .links
            .entry(client_address.to_string())
            .or_insert(ReplicaLink {
                listening_port: None,
                state: LinkState::AwaitingSync,
                writer,
                outbox: None,
            });

        if link.outbox.is_none() {
            let (sender, receiver) = mpsc::unbounded_channel();
            tokio::spawn(forward_to_replica(
                client_address.to_string(),
                Arc::clone(&link.writer),
                receiver,
            ));
            link.outbox = Some(sender);
        }

        link.state = LinkState::Online;
    }

    /// Brings a replica online and hands its writer task the `FULLRESYNC`
    /// reply and snapshot, ahead of any write propagated afterwards.
    pub fn start_full_resync(
        &mut self,
        client_address: &str,
        writer: Arc<RwLock<OwnedWriteHalf>>,
        resync: Bytes,
    ) {
        self.mark_online(client_address, writer);

        let outbox = self
            .links
            .get(client_address)
            .and_then(|link| link.outbox.as_ref());

        if let Some(outbox) = outbox {
            if outbox.send(resync).is_err() {
                warn!(replica = %client_address, "replica stopped accepting commands before its resync");
            }
        }
    }

    pub fn remove(&mut self, client_address: &str) -> Option<ReplicaLink> {
        self.links.remove(client_address)
    }

    pub fn get(&self, client_address: &str) -> Option<&ReplicaLink> {
        self.links.get(client_address)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn queue(&mut self, command: String) {
        self.pending.push_back(command);
    }

    pub fn pending(&self) -> impl Iterator<Item = &String> {
        self.pending.iter()
    }

    /// Hands every queued command, oldest first, to every online replica's writer task.
    ///
    /// Never waits on a socket. The queue is emptied whether or not the
    /// replicas end up receiving the commands; nothing is retried. A link whose
    /// writer task has stopped, because an earlier write failed or the
    /// connection went away, is dropped and the others still get the commands.
    ///
    /// # Returns
    ///
    /// One [`PropagationError::LinkClosed`] per replica that was dropped.
    pub fn propagate(&mut self) -> Vec<PropagationError> {
        let commands: Vec<Bytes> = self.pending.drain(..).map(Bytes::from).collect();

        if commands.is_empty() {
            return Vec::new();
        }

        let mut failures = Vec::new();

        for (client_address, link) in &self.links {
            let (LinkState::Online, Some(outbox)) = (link.state, &link.outbox) else {
                debug!(replica = %client_address, "skipping replica that has not finished syncing");
                continue;
            };

            let delivered = commands
                .iter()
                .all(|command| outbox.send(command.clone()).is_ok());

            if !delivered {
                failures.push(PropagationError::LinkClosed {
                    replica: client_address.clone(),
                });
            }
        }

        for failure in &failures {
            warn!("{}", failure);

            if let PropagationError::LinkClosed { replica } = failure {
                self.links.remove(replica);
            }
        }

        failures
    }
}

/// Writes the commands handed to one link until the link is dropped or a write fails.
async fn forward_to_replica(
    client_address: String,
    writer: Arc<RwLock<OwnedWriteHalf>>,
    mut receiver: mpsc::UnboundedReceiver<Bytes>,
) {
    while let Some(command) = receiver.recv().await {
        debug!(replica = %client_address, command = %String::from_utf8_lossy(&command).escape_debug(), "propagating to replica");

        if let Err(source) = write_command(&writer, &command).await {
            warn!(
                "{}",
                PropagationError::Write {
                    replica: client_address,
                    source,
                }
            );
            return;
        }
    }
}

async fn write_command(writer: &Arc<RwLock<OwnedWriteHalf>>, command: &[u8]) -> io::Result<()> {
    let mut writer_guard = writer.write().await;
    writer_guard.write_all(command).await?;
    writer_guard.flush().await
}
