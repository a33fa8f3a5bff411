//! In-process channel backed by partitioned append-only logs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{partition_for, Channel, Delivery, PublishReceipt, NO_OFFSET};
use crate::error::{AppError, AppResult};

struct StoredMessage {
    key: String,
    payload: Vec<u8>,
}

/// Channel kept entirely in memory. Offsets are log indexes starting at 0.
pub struct MemoryChannel {
    topic: String,
    partitions: Vec<RwLock<Vec<StoredMessage>>>,
    offsets: RwLock<HashMap<(String, u32), i64>>,
}

impl MemoryChannel {
    /// Create a new MemoryChannel
    pub fn new(topic: impl Into<String>, partitions: u32) -> Self {
        Self {
            topic: topic.into(),
            partitions: (0..partitions.max(1)).map(|_| RwLock::new(Vec::new())).collect(),
            offsets: RwLock::new(HashMap::new()),
        }
    }

    fn log(&self, partition: u32) -> AppResult<&RwLock<Vec<StoredMessage>>> {
        self.partitions
            .get(partition as usize)
            .ok_or_else(|| AppError::Channel(format!("No partition {} on {}", partition, self.topic)))
    }

    /// Every stored message, partition by partition
    pub async fn snapshot(&self) -> Vec<Delivery> {
        let mut all = Vec::new();
        for (partition, log) in self.partitions.iter().enumerate() {
            let log = log.read().await;
            all.extend(log.iter().enumerate().map(|(offset, m)| Delivery {
                partition: partition as u32,
                offset: offset as i64,
                key: m.key.clone(),
                payload: m.payload.clone(),
            }));
        }
        all
    }

    /// Number of messages not yet committed by `group`
    pub async fn lag(&self, group: &str) -> i64 {
        let offsets = self.offsets.read().await;
        let mut lag = 0;
        for (partition, log) in self.partitions.iter().enumerate() {
            let end = log.read().await.len() as i64 - 1;
            let committed = offsets
                .get(&(group.to_string(), partition as u32))
                .copied()
                .unwrap_or(NO_OFFSET);
            lag += end - committed;
        }
        lag
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn partition_count(&self) -> u32 {
        self.partitions.len() as u32
    }

    async fn publish(&self, key: &str, payload: Vec<u8>) -> AppResult<PublishReceipt> {
        let partition = partition_for(key, self.partition_count());
        let mut log = self.log(partition)?.write().await;
        log.push(StoredMessage {
            key: key.to_string(),
            payload,
        });

        Ok(PublishReceipt {
            partition,
            offset: log.len() as i64 - 1,
        })
    }

    async fn fetch(&self, partition: u32, after: i64, max: usize) -> AppResult<Vec<Delivery>> {
        let log = self.log(partition)?.read().await;
        let start = (after + 1).max(0) as usize;

        Ok(log
            .iter()
            .enumerate()
            .skip(start)
            .take(max)
            .map(|(offset, m)| Delivery {
                partition,
                offset: offset as i64,
                key: m.key.clone(),
                payload: m.payload.clone(),
            })
            .collect())
    }

    async fn committed_offset(&self, group: &str, partition: u32) -> AppResult<i64> {
        self.log(partition)?;
        let offsets = self.offsets.read().await;
        Ok(offsets
            .get(&(group.to_string(), partition))
            .copied()
            .unwrap_or(NO_OFFSET))
    }

    async fn commit(&self, group: &str, partition: u32, offset: i64) -> AppResult<()> {
        self.log(partition)?;
        let mut offsets = self.offsets.write().await;
        let entry = offsets
            .entry((group.to_string(), partition))
            .or_insert(NO_OFFSET);
        // Commits never move backwards
        *entry = (*entry).max(offset);
        Ok(())
    }
}
