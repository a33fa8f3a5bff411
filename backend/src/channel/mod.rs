//! Ordered, partitioned, at-least-once message channel
//!
//! Decouples collection from persistence. Messages with the same key always
//! land on the same partition, so per-sensor order is preserved end to end.
//! There is no ordering guarantee across partitions.

pub mod codec;
pub mod memory;
pub mod postgres;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;

pub use codec::{JsonCodec, MessageCodec};
pub use memory::MemoryChannel;
pub use postgres::PgChannel;

/// Offset reported for a partition a group has never committed on
pub const NO_OFFSET: i64 = -1;

/// A message read back from a partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub partition: u32,
    pub offset: i64,
    pub key: String,
    pub payload: Vec<u8>,
}

/// Where a published message was stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceipt {
    pub partition: u32,
    pub offset: i64,
}

/// Transport contract. Offsets grow strictly within a partition.
#[async_trait]
pub trait Channel: Send + Sync {
    fn topic(&self) -> &str;

    fn partition_count(&self) -> u32;

    /// Append a message. Failures are returned to the caller and not retried.
    async fn publish(&self, key: &str, payload: Vec<u8>) -> AppResult<PublishReceipt>;

    /// Up to `max` deliveries of `partition` with an offset greater than `after`
    async fn fetch(&self, partition: u32, after: i64, max: usize) -> AppResult<Vec<Delivery>>;

    /// Last offset committed by `group` on `partition`, or [`NO_OFFSET`]
    async fn committed_offset(&self, group: &str, partition: u32) -> AppResult<i64>;

    /// Record that `group` has processed everything up to `offset`
    async fn commit(&self, group: &str, partition: u32, offset: i64) -> AppResult<()>;
}

/// Stable partition assignment for a message key.
///
/// Numeric keys (sensor ids) map by remainder; any other key is hashed with
/// 32-bit FNV-1a.
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    let partitions = partitions.max(1);
    if let Ok(id) = key.parse::<i64>() {
        return id.rem_euclid(partitions as i64) as u32;
    }

    let mut hash: u32 = 0x811c_9dc5;
    for byte in key.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash % partitions
}

/// Cursor over one partition for one consumer group
pub struct Subscription {
    channel: Arc<dyn Channel>,
    group: String,
    partition: u32,
    position: i64,
    buffer: VecDeque<Delivery>,
    poll_interval: Duration,
    batch_size: usize,
}

impl Subscription {
    /// Open a cursor positioned after the group's last committed offset
    pub async fn open(
        channel: Arc<dyn Channel>,
        group: &str,
        partition: u32,
        poll_interval: Duration,
        batch_size: usize,
    ) -> AppResult<Self> {
        let position = channel.committed_offset(group, partition).await?;

        Ok(Self {
            channel,
            group: group.to_string(),
            partition,
            position,
            buffer: VecDeque::new(),
            poll_interval,
            batch_size: batch_size.max(1),
        })
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// Wait for the next delivery. Returns `None` once `cancel` fires.
    pub async fn next(&mut self, cancel: &CancellationToken) -> AppResult<Option<Delivery>> {
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            if let Some(delivery) = self.buffer.pop_front() {
                self.position = delivery.offset;
                return Ok(Some(delivery));
            }

            let batch = self
                .channel
                .fetch(self.partition, self.position, self.batch_size)
                .await?;

            if batch.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = cancel.cancelled() => return Ok(None),
                }
            } else {
                self.buffer.extend(batch);
            }
        }
    }

    /// Commit a delivery once it has been handled
    pub async fn ack(&self, delivery: &Delivery) -> AppResult<()> {
        self.channel
            .commit(&self.group, delivery.partition, delivery.offset)
            .await
    }
}

/// Open one subscription per partition of the channel
pub async fn subscribe(
    channel: Arc<dyn Channel>,
    group: &str,
    poll_interval: Duration,
    batch_size: usize,
) -> AppResult<Vec<Subscription>> {
    let mut subscriptions = Vec::with_capacity(channel.partition_count() as usize);
    for partition in 0..channel.partition_count() {
        subscriptions.push(
            Subscription::open(channel.clone(), group, partition, poll_interval, batch_size)
                .await?,
        );
    }
    Ok(subscriptions)
}
