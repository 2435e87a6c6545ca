// Transport capability: pub/sub broadcast plus direct stream dial, modeled as a trait so
// handlers never depend on a concrete network/host type.

use crate::error::{DfsError, DfsResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// The envelope every pub/sub and stream message is wrapped in.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub sender: String,
    pub receiver: String,
    pub message_type: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct StreamResponse {
    pub status: u16,
    pub payload: Vec<u8>,
}

impl StreamResponse {
    pub fn ok(payload: Vec<u8>) -> Self {
        StreamResponse { status: 200, payload }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn broadcast(&self, topic: &str, envelope: Envelope) -> DfsResult<()>;
    async fn dial(
        &self,
        protocol: &str,
        peer: &str,
        envelope: Envelope,
        deadline: Duration,
    ) -> DfsResult<StreamResponse>;
}

type StreamHandler = Arc<dyn Fn(Envelope) -> DfsResult<StreamResponse> + Send + Sync>;
type TopicHandler = mpsc::UnboundedSender<(String, Envelope)>;

/// In-memory adapter: each peer is a named inbox. Broadcasts fan out to every registered
/// topic subscriber; dials invoke a registered protocol handler directly. Used by tests and
/// the CLI's single-process demo mode, the way the teacher substitutes an in-process
/// `MemoryStore` for a live Kademlia swarm rather than requiring real networking everywhere.
pub struct LoopbackTransport {
    topic_subscribers: Mutex<HashMap<String, Vec<TopicHandler>>>,
    stream_handlers: Mutex<HashMap<(String, String), StreamHandler>>,
    stream_mutex: Mutex<()>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    pub fn new() -> Self {
        LoopbackTransport {
            topic_subscribers: Mutex::new(HashMap::new()),
            stream_handlers: Mutex::new(HashMap::new()),
            stream_mutex: Mutex::new(()),
        }
    }

    pub async fn subscribe(&self, topic: &str) -> mpsc::UnboundedReceiver<(String, Envelope)> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.topic_subscribers
            .lock()
            .await
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        rx
    }

    pub async fn register_stream_handler(
        &self,
        protocol: &str,
        peer: &str,
        handler: StreamHandler,
    ) {
        self.stream_handlers
            .lock()
            .await
            .insert((protocol.to_string(), peer.to_string()), handler);
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn broadcast(&self, topic: &str, envelope: Envelope) -> DfsResult<()> {
        let subscribers = self.topic_subscribers.lock().await;
        if let Some(handlers) = subscribers.get(topic) {
            for handler in handlers {
                let _ = handler.send((topic.to_string(), envelope.clone()));
            }
        }
        Ok(())
    }

    async fn dial(
        &self,
        protocol: &str,
        peer: &str,
        envelope: Envelope,
        _deadline: Duration,
    ) -> DfsResult<StreamResponse> {
        // Serializes outgoing stream usage for this host, matching the core's single
        // global stream mutex (see DESIGN.md's Open Question resolution).
        let _guard = self.stream_mutex.lock().await;
        let handlers = self.stream_handlers.lock().await;
        match handlers.get(&(protocol.to_string(), peer.to_string())) {
            Some(handler) => handler(envelope),
            None => Err(DfsError::Network(format!(
                "no stream handler registered for {}/{}",
                protocol, peer
            ))),
        }
    }
}
