//! High-level service that coordinates codec, chunking and cache
//!
//! Transports stay outside this crate. The MQTT client calls
//! [`HoppyshareService::handle_envelope`] with whole envelopes; the BLE
//! driver calls [`HoppyshareService::handle_chunk`] with raw link frames and
//! drains outbound frames from the channel given to
//! [`HoppyshareService::send_chunked`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::{CacheEvent, CachedMessage, MessageCache};
use crate::crypto::{hash_device_id, GroupKey};
use crate::protocol::{self, DecodedMessage, Reassembler};
use crate::settings::Settings;
use crate::{Config, Credentials, Error, Result, Transport};

/// Events emitted by the service
#[derive(Debug, Clone)]
pub enum ServiceEvent {
    /// A message was decoded and cached
    MessageReceived {
        filename: String,
        content_type: String,
        size: usize,
        source: Transport,
    },
    /// The cached message expired and was dropped
    MessageExpired,
    /// A settings push changed our configuration
    SettingsChanged(Settings),
}

/// Main HoppyShare service
pub struct HoppyshareService {
    device_id: String,
    group_key: GroupKey,
    config: Config,
    settings: Arc<RwLock<Settings>>,
    cache: MessageCache,
    reassembler: Arc<Mutex<Reassembler>>,
    events: mpsc::Sender<ServiceEvent>,
}

impl HoppyshareService {
    /// Construct the service, unwrapping the group key exactly once.
    ///
    /// Unwrap failure is fatal to all codec operations, so it surfaces here
    /// rather than on first use. Returns the service and its event stream.
    pub fn new(
        credentials: &Credentials,
        config: Config,
    ) -> Result<(Self, mpsc::Receiver<ServiceEvent>)> {
        let group_key =
            GroupKey::unwrap(&credentials.wrapped_group_key, &credentials.private_key_pem)?;

        let (events_tx, events_rx) = mpsc::channel(64);
        let (cache, cache_events) = MessageCache::new(config.cache_time);
        let reassembler = Arc::new(Mutex::new(Reassembler::new()));

        let service = Self {
            device_id: credentials.device_id.clone(),
            group_key,
            config,
            settings: Arc::new(RwLock::new(Settings::default())),
            cache,
            reassembler: reassembler.clone(),
            events: events_tx.clone(),
        };

        service.spawn_expiry_task(cache_events, events_tx);
        service.spawn_sweep_task();

        info!(device_id = %service.device_id, "service initialized");
        Ok((service, events_rx))
    }

    /// Forward cache expiry upward and purge in-flight reassembly so a stale
    /// partial message cannot complete after the user forgot the original.
    fn spawn_expiry_task(
        &self,
        mut cache_events: mpsc::Receiver<CacheEvent>,
        events: mpsc::Sender<ServiceEvent>,
    ) {
        let reassembler = self.reassembler.clone();
        tokio::spawn(async move {
            while let Some(event) = cache_events.recv().await {
                if event == CacheEvent::Expired {
                    reassembler.lock().await.clear();
                    if events.send(ServiceEvent::MessageExpired).await.is_err() {
                        break;
                    }
                }
            }
        });
    }

    /// Periodically evict reassembly buffers that stopped receiving chunks
    fn spawn_sweep_task(&self) {
        let stall = self.config.reassembly_stall_timeout;
        let reassembler = Arc::downgrade(&self.reassembler);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(stall);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(reassembler) = reassembler.upgrade() else {
                    break;
                };
                reassembler.lock().await.evict_stale(stall);
            }
        });
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Hex digest of our device id, as carried in the envelope header
    pub fn fingerprint(&self) -> String {
        hash_device_id(&self.device_id)
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Encode a message for the reliable pub/sub path
    pub fn encode_message(
        &self,
        mime_type: &str,
        filename: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        protocol::encode(mime_type, filename, &self.device_id, payload, &self.group_key)
    }

    /// Decode an envelope without caching it (inspection and tooling)
    pub fn decode_message(&self, data: &[u8]) -> Result<DecodedMessage> {
        protocol::decode(data, &self.group_key)
    }

    /// Encode, fragment and pace a message into the link's outbound queue.
    ///
    /// The sleep between frames is deliberate spacing for the radio's
    /// buffering, not a lock wait; it runs on the calling task.
    pub async fn send_chunked(
        &self,
        mime_type: &str,
        filename: &str,
        payload: &[u8],
        sink: &mpsc::Sender<Vec<u8>>,
    ) -> Result<()> {
        let envelope = self.encode_message(mime_type, filename, payload)?;
        if envelope.len() > protocol::constants::MAX_CHUNK_COUNT * self.config.max_chunk_payload {
            return Err(Error::Transport(format!(
                "{} byte envelope exceeds the link's sequence space",
                envelope.len()
            )));
        }
        let chunks = protocol::fragment(&envelope, self.config.max_chunk_payload);
        let total = chunks.len();

        for (i, chunk) in chunks.into_iter().enumerate() {
            sink.send(chunk.to_bytes())
                .await
                .map_err(|_| Error::Transport("link outbound queue closed".into()))?;
            debug!("sent chunk {}/{}", i + 1, total);

            if i + 1 < total {
                tokio::time::sleep(self.config.chunk_send_interval).await;
            }
        }
        Ok(())
    }

    /// Handle a whole envelope from the reliable transport.
    ///
    /// Returns the decoded message when it was accepted and cached, `None`
    /// when policy dropped it (device disabled, or own message with
    /// send-to-self off). Codec errors propagate to the caller.
    pub async fn handle_envelope(
        &self,
        data: &[u8],
        source: Transport,
    ) -> Result<Option<DecodedMessage>> {
        let settings = self.settings.read().await.clone();
        if !settings.enabled {
            return Ok(None);
        }

        let decoded = protocol::decode(data, &self.group_key)?;

        if !settings.send_to_self && decoded.is_from(&self.device_id) {
            debug!("dropping own message");
            return Ok(None);
        }

        self.cache
            .store(CachedMessage {
                filename: decoded.filename.clone(),
                content_type: decoded.mime_type.clone(),
                payload: decoded.payload.clone(),
                source,
            })
            .await;

        let _ = self
            .events
            .send(ServiceEvent::MessageReceived {
                filename: decoded.filename.clone(),
                content_type: decoded.mime_type.clone(),
                size: decoded.payload.len(),
                source,
            })
            .await;

        Ok(Some(decoded))
    }

    /// Handle one raw frame from the unreliable link. Malformed frames are
    /// swallowed here; only a completed message can surface codec errors.
    pub async fn handle_chunk(&self, frame: &[u8]) -> Result<Option<DecodedMessage>> {
        let completed = self.reassembler.lock().await.handle(frame);

        match completed {
            Some(envelope) => self.handle_envelope(&envelope, Transport::Ble).await,
            None => Ok(None),
        }
    }

    /// Apply a pushed settings document and propagate the cache TTL
    pub async fn handle_settings_push(&self, data: &[u8]) -> Result<()> {
        let mut settings = self.settings.write().await;
        if !settings.apply_push(data, &self.device_id)? {
            return Ok(());
        }

        self.cache
            .set_ttl(Duration::from_secs(settings.cache_time))
            .await;

        if settings.destroy {
            warn!("destroy flag set by settings push");
        }

        let _ = self
            .events
            .send(ServiceEvent::SettingsChanged(settings.clone()))
            .await;
        Ok(())
    }

    /// The most recent decoded message, if it has not expired
    pub async fn last_message(&self) -> Option<CachedMessage> {
        self.cache.get().await
    }

    /// Forget the cached message and abandon any partial reassembly
    pub async fn clear(&self) {
        self.cache.clear().await;
        self.reassembler.lock().await.clear();
    }
}
