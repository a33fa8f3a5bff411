//! Ingestion: turns channel messages into persisted readings
//!
//! [`IngestionProcessor`] handles one payload. [`IngestionConsumer`] runs one
//! worker per partition, so messages of a sensor are persisted in publish
//! order while different partitions progress independently.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use shared::Reading;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::channel::{subscribe, Channel, Delivery, MessageCodec, Subscription};
use crate::error::AppResult;
use crate::stores::{ReadingStore, SensorRegistry};

/// What happened to one message
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Persisted(Reading),
    /// Dropped: the sensor id does not resolve
    UnknownSensor(i64),
    /// Dropped: the payload could not be decoded
    Malformed(String),
}

/// Validates and persists single messages
pub struct IngestionProcessor {
    registry: Arc<dyn SensorRegistry>,
    store: Arc<dyn ReadingStore>,
    codec: Arc<dyn MessageCodec>,
}

impl IngestionProcessor {
    /// Create a new IngestionProcessor
    pub fn new(
        registry: Arc<dyn SensorRegistry>,
        store: Arc<dyn ReadingStore>,
        codec: Arc<dyn MessageCodec>,
    ) -> Self {
        Self {
            registry,
            store,
            codec,
        }
    }

    /// Handle one payload.
    ///
    /// Unknown sensors and undecodable payloads are logged and reported as
    /// dropped outcomes. An `Err` means the registry or the store failed and
    /// the message should be retried.
    pub async fn on_message(&self, payload: &[u8]) -> AppResult<IngestOutcome> {
        let message = match self.codec.decode(payload) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "Dropping malformed message");
                return Ok(IngestOutcome::Malformed(e.to_string()));
            }
        };

        let sensor_id = message.sensor_id;
        if self.registry.find(sensor_id).await?.is_none() {
            error!(sensor_id, "Dropping message for unknown sensor");
            return Ok(IngestOutcome::UnknownSensor(sensor_id));
        }

        // Persistence time, never earlier than the build time
        let persisted_at = Utc::now().max(message.collected_at);
        let reading = self
            .store
            .insert(message.into_new_reading(persisted_at))
            .await?;

        debug!(sensor_id, reading_id = reading.id, "Reading persisted");
        Ok(IngestOutcome::Persisted(reading))
    }
}

/// Long-lived consumer of the reading channel
pub struct IngestionConsumer {
    processor: Arc<IngestionProcessor>,
    channel: Arc<dyn Channel>,
    group: String,
    poll_interval: Duration,
    batch_size: usize,
    retry_backoff: Duration,
}

/// Running consumer workers
pub struct ConsumerHandle {
    token: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl IngestionConsumer {
    /// Create a new IngestionConsumer
    pub fn new(
        processor: Arc<IngestionProcessor>,
        channel: Arc<dyn Channel>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            processor,
            channel,
            group: group.into(),
            poll_interval: Duration::from_millis(500),
            batch_size: 100,
            retry_backoff: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Open every partition and spawn one worker per partition
    pub async fn start(self) -> AppResult<ConsumerHandle> {
        let subscriptions = subscribe(
            self.channel.clone(),
            &self.group,
            self.poll_interval,
            self.batch_size,
        )
        .await?;

        let token = CancellationToken::new();
        let workers = subscriptions
            .into_iter()
            .map(|subscription| {
                let worker = PartitionWorker {
                    subscription,
                    processor: self.processor.clone(),
                    token: token.clone(),
                    retry_backoff: self.retry_backoff,
                };
                tokio::spawn(worker.run())
            })
            .collect::<Vec<_>>();

        info!(
            topic = self.channel.topic(),
            group = %self.group,
            partitions = workers.len(),
            "Ingestion consumer started"
        );
        Ok(ConsumerHandle { token, workers })
    }
}

impl ConsumerHandle {
    /// Stop every worker and wait for them. A message being processed is
    /// finished or left uncommitted, never half-acknowledged.
    pub async fn stop(self) {
        self.token.cancel();
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Ingestion worker failed");
            }
        }
        info!("Ingestion consumer stopped");
    }
}

struct PartitionWorker {
    subscription: Subscription,
    processor: Arc<IngestionProcessor>,
    token: CancellationToken,
    retry_backoff: Duration,
}

impl PartitionWorker {
    #[instrument(name = "ingestion_worker", skip(self), fields(partition = self.subscription.partition()))]
    async fn run(mut self) {
        debug!("Partition worker started");

        loop {
            let delivery = match self.subscription.next(&self.token).await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Fetching from channel failed");
                    if !self.backoff().await {
                        break;
                    }
                    continue;
                }
            };

            if !self.process(&delivery).await {
                break;
            }
        }

        debug!("Partition worker stopped");
    }

    /// Process one delivery until it is handled. Returns false on shutdown.
    async fn process(&self, delivery: &Delivery) -> bool {
        loop {
            match self.processor.on_message(&delivery.payload).await {
                Ok(outcome) => {
                    if let IngestOutcome::Persisted(reading) = &outcome {
                        debug!(offset = delivery.offset, reading_id = reading.id, "Message ingested");
                    } else {
                        debug!(offset = delivery.offset, key = %delivery.key, "Message dropped");
                    }
                    self.commit(delivery).await;
                    return true;
                }
                Err(e) if !e.is_infrastructure() => {
                    error!(offset = delivery.offset, key = %delivery.key, error = %e, "Message rejected by the store, dropping");
                    self.commit(delivery).await;
                    return true;
                }
                Err(e) => {
                    warn!(offset = delivery.offset, error = %e, "Ingestion failed, retrying");
                    if !self.backoff().await {
                        return false;
                    }
                }
            }
        }
    }

    async fn commit(&self, delivery: &Delivery) {
        if let Err(e) = self.subscription.ack(delivery).await {
            // Redelivered after a restart; duplicates are accepted
            warn!(offset = delivery.offset, error = %e, "Commit failed");
        }
    }

    async fn backoff(&self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.retry_backoff) => true,
            _ = self.token.cancelled() => false,
        }
    }
}
