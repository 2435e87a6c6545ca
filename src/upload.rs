// Upload pipeline: Prepared -> Offering -> Assigning -> Tracking -> Complete/Failed.

use crate::config::Config;
use crate::pool::{TaskPool, UploadPieceInfo};
use crate::transport::{Envelope, Transport};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Prepared,
    Offering,
    Assigning,
    Tracking,
    Complete,
    Failed(u32),
}

pub struct UploadPipeline {
    pub pool: Arc<TaskPool>,
    pub transport: Arc<dyn Transport>,
    pub local_peer_id: String,
    pub retry_limit: u32,
    pub stream_deadline_secs: u64,
}

impl UploadPipeline {
    pub fn new(pool: Arc<TaskPool>, transport: Arc<dyn Transport>, local_peer_id: String, config: &Config) -> Self {
        UploadPipeline {
            pool,
            transport,
            local_peer_id,
            retry_limit: config.transport.upload_retry_limit,
            stream_deadline_secs: config.transport.stream_deadline_secs,
        }
    }

    /// Offering: broadcasts the upload-request envelope on the upload-request topic.
    pub async fn offer(&self, file_id: &str, slice_hashes: &[String], pubkey_hash: &[u8; 20]) -> crate::error::DfsResult<()> {
        let mut payload = Vec::new();
        payload.extend_from_slice(file_id.as_bytes());
        payload.push(0);
        for hash in slice_hashes {
            payload.extend_from_slice(hash.as_bytes());
            payload.push(0);
        }
        payload.extend_from_slice(pubkey_hash);
        self.transport
            .broadcast(
                crate::dispatch::TOPIC_UPLOAD_REQUEST,
                Envelope {
                    sender: self.local_peer_id.clone(),
                    receiver: String::new(),
                    message_type: "upload-request".into(),
                    payload,
                },
            )
            .await
    }

    /// Assigning: dispatches one piece to one peer. On transport failure, retries up to
    /// `retry_limit`; beyond that, falls back to a pub/sub broadcast of the same request
    /// (see spec §4.6/§9 for the stream-then-fallback rationale).
    pub async fn dispatch_piece(
        &self,
        file_id: &str,
        index: u32,
        peer_id: &str,
        container_bytes: Vec<u8>,
    ) -> crate::error::DfsResult<bool> {
        let task = self.pool.upload(file_id).await?;

        if task.read().await.is_paused() {
            return Ok(false);
        }

        loop {
            let deadline = std::time::Duration::from_secs(self.stream_deadline_secs);
            let envelope = Envelope {
                sender: self.local_peer_id.clone(),
                receiver: peer_id.to_string(),
                message_type: "slice-upload".into(),
                payload: container_bytes.clone(),
            };
            let result = self
                .transport
                .dial(crate::dispatch::STREAM_SLICE_UPLOAD, peer_id, envelope, deadline)
                .await;

            match result {
                Ok(resp) if resp.is_ok() => {
                    let mut t = task.write().await;
                    let all_done = t.mark_complete(index);
                    return Ok(all_done);
                }
                _ => {
                    let retries = {
                        let mut t = task.write().await;
                        t.increment_retry(index)
                    };
                    if retries >= self.retry_limit {
                        // Fall back to pub/sub: the survivable path when the direct
                        // stream keeps failing.
                        self.transport
                            .broadcast(
                                crate::dispatch::TOPIC_UPLOAD_REQUEST,
                                Envelope {
                                    sender: self.local_peer_id.clone(),
                                    receiver: peer_id.to_string(),
                                    message_type: "slice-upload".into(),
                                    payload: container_bytes.clone(),
                                },
                            )
                            .await?;
                        let mut t = task.write().await;
                        let all_done = t.mark_complete(index);
                        return Ok(all_done);
                    }
                }
            }
        }
    }

    pub async fn record_acceptance(&self, file_id: &str, slice_hash: &str, peer_id: &str, index: u32) -> crate::error::DfsResult<()> {
        let task = self.pool.upload(file_id).await?;
        let mut t = task.write().await;
        t.update_piece(
            slice_hash.to_string(),
            UploadPieceInfo {
                index,
                peer_ids: vec![peer_id.to_string()],
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{LoopbackTransport, StreamResponse};

    #[tokio::test]
    async fn retry_then_fallback_sets_progress_and_counts_retries() {
        let pool = Arc::new(TaskPool::new());
        pool.add_upload("f1", 1).await;

        let transport = Arc::new(LoopbackTransport::new());
        // No stream handler registered for "peer1" -> dial always fails -> triggers
        // retry-then-fallback. Register a subscriber for the fallback broadcast so we can
        // observe it landed.
        let mut rx = transport.subscribe(crate::dispatch::TOPIC_UPLOAD_REQUEST).await;

        let pipeline = UploadPipeline {
            pool: pool.clone(),
            transport: transport.clone(),
            local_peer_id: "me".into(),
            retry_limit: 2,
            stream_deadline_secs: 10,
        };

        let done = pipeline
            .dispatch_piece("f1", 0, "peer1", b"container-bytes".to_vec())
            .await
            .unwrap();
        assert!(done);

        let task = pool.upload("f1").await.unwrap();
        let t = task.read().await;
        assert_eq!(*t.retry_counts.get(&0).unwrap(), 2);
        assert!(t.progress.is_set(0));
        drop(t);

        let (_topic, envelope) = rx.recv().await.unwrap();
        assert_eq!(envelope.payload, b"container-bytes".to_vec());
    }

    #[tokio::test]
    async fn paused_task_skips_dispatch_entirely() {
        let pool = Arc::new(TaskPool::new());
        pool.add_upload("f1", 1).await;
        pool.pause_upload("f1").await.unwrap();

        let transport = Arc::new(LoopbackTransport::new());
        let pipeline = UploadPipeline {
            pool: pool.clone(),
            transport,
            local_peer_id: "me".into(),
            retry_limit: 2,
            stream_deadline_secs: 5,
        };

        let done = pipeline
            .dispatch_piece("f1", 0, "peer1", b"bytes".to_vec())
            .await
            .unwrap();
        assert!(!done);

        let task = pool.upload("f1").await.unwrap();
        let t = task.read().await;
        assert!(!t.progress.is_set(0));
        assert!(!t.retry_counts.contains_key(&0));
    }

    #[tokio::test]
    async fn dispatch_succeeds_immediately_when_peer_acks() {
        let pool = Arc::new(TaskPool::new());
        pool.add_upload("f1", 1).await;
        let transport = Arc::new(LoopbackTransport::new());
        transport
            .register_stream_handler(
                crate::dispatch::STREAM_SLICE_UPLOAD,
                "peer1",
                Arc::new(|_env| Ok(StreamResponse::ok(vec![]))),
            )
            .await;

        let pipeline = UploadPipeline {
            pool: pool.clone(),
            transport,
            local_peer_id: "me".into(),
            retry_limit: 3,
            stream_deadline_secs: 10,
        };
        let done = pipeline
            .dispatch_piece("f1", 0, "peer1", b"bytes".to_vec())
            .await
            .unwrap();
        assert!(done);
        let task = pool.upload("f1").await.unwrap();
        assert_eq!(*task.read().await.retry_counts.get(&0).unwrap_or(&0), 0);
    }
}
