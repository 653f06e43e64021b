//! Gossip boundary between the engine and the network.
//!
//! Payloads are `bincode` encodings of [`Block`], [`Vote`] and
//! [`Transaction`]. [`LocalHub`] wires several engines together in-process.
//!
//! [`Block`]: vnc_types::Block
//! [`Vote`]: vnc_types::Vote
//! [`Transaction`]: vnc_types::Transaction

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Block,
    Vote,
    Transaction,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Vote => "vote",
            Self::Transaction => "transaction",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget broadcast to every peer.
pub trait Transport: Send + Sync {
    fn broadcast(&self, kind: MessageKind, payload: Vec<u8>);
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(CodecError::Encode)
}

pub fn decode<T: DeserializeOwned>(kind: MessageKind, payload: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(payload).map_err(|source| CodecError::Decode {
        kind: kind.as_str(),
        source,
    })
}

/// A message delivered to an endpoint's inbox.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: usize,
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

type Endpoints = Arc<RwLock<Vec<(usize, mpsc::UnboundedSender<Envelope>)>>>;

/// In-process broadcast hub.
#[derive(Debug, Clone, Default)]
pub struct LocalHub {
    endpoints: Endpoints,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new endpoint and return its transport and inbox.
    pub fn connect(&self) -> (HubTransport, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut endpoints = self.endpoints.write();
        let id = endpoints.len();
        endpoints.push((id, tx));
        (
            HubTransport {
                id,
                endpoints: self.endpoints.clone(),
            },
            rx,
        )
    }

    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct HubTransport {
    id: usize,
    endpoints: Endpoints,
}

impl HubTransport {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl Transport for HubTransport {
    fn broadcast(&self, kind: MessageKind, payload: Vec<u8>) {
        let endpoints = self.endpoints.read();
        for (id, sender) in endpoints.iter().filter(|(id, _)| *id != self.id) {
            let envelope = Envelope {
                from: self.id,
                kind,
                payload: payload.clone(),
            };
            if sender.send(envelope).is_err() {
                debug!("endpoint {} disconnected, dropping {}", id, kind);
            }
        }
    }
}

/// Transport for a node without peers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransport;

impl Transport for NoopTransport {
    fn broadcast(&self, _kind: MessageKind, _payload: Vec<u8>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use vnc_types::{Address, Amount, Transaction, Vote};

    #[test]
    fn hub_skips_the_sender() {
        let hub = LocalHub::new();
        let (a, mut a_rx) = hub.connect();
        let (_b, mut b_rx) = hub.connect();
        let (_c, mut c_rx) = hub.connect();

        a.broadcast(MessageKind::Vote, vec![1, 2, 3]);

        assert!(a_rx.try_recv().is_err());
        for rx in [&mut b_rx, &mut c_rx] {
            let envelope = rx.try_recv().unwrap();
            assert_eq!(envelope.from, 0);
            assert_eq!(envelope.kind, MessageKind::Vote);
            assert_eq!(envelope.payload, vec![1, 2, 3]);
        }
    }

    #[test]
    fn closed_inbox_does_not_stop_delivery() {
        let hub = LocalHub::new();
        let (a, _a_rx) = hub.connect();
        let (_b, b_rx) = hub.connect();
        let (_c, mut c_rx) = hub.connect();
        drop(b_rx);

        a.broadcast(MessageKind::Block, vec![9]);
        assert_eq!(c_rx.try_recv().unwrap().payload, vec![9]);
    }

    #[test]
    fn codec_preserves_messages() {
        let tx = Transaction::new(Address::from("a"), Address::from("b"), Amount::from_tokens(3), 7);
        let bytes = encode(&tx).unwrap();
        let decoded: Transaction = decode(MessageKind::Transaction, &bytes).unwrap();
        assert_eq!(decoded, tx);

        let vote = Vote::new(Address::from("v"), 4, [3u8; 32], true);
        let decoded: Vote = decode(MessageKind::Vote, &encode(&vote).unwrap()).unwrap();
        assert_eq!(decoded, vote);
    }

    #[test]
    fn garbage_payload_reports_kind() {
        let err = decode::<Vote>(MessageKind::Vote, &[0xff]).unwrap_err();
        assert!(err.to_string().contains("vote"));
    }
}
