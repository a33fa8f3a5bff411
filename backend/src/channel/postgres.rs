//! Durable channel stored in Postgres
//!
//! Messages live in `channel_messages`, consumer positions in
//! `channel_offsets`. The message id doubles as the offset. Inserts into one
//! partition are serialised with a transaction-scoped advisory lock, so ids
//! become visible in commit order and a consumer never skips a message.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use super::{partition_for, Channel, Delivery, PublishReceipt, NO_OFFSET};
use crate::error::{AppError, AppResult};

/// Postgres-backed channel
#[derive(Clone)]
pub struct PgChannel {
    pool: PgPool,
    topic: String,
    partitions: u32,
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: i64,
    partition: i32,
    message_key: String,
    payload: Vec<u8>,
}

fn channel_error(err: sqlx::Error) -> AppError {
    AppError::Channel(err.to_string())
}

impl PgChannel {
    /// Create a new PgChannel
    pub fn new(pool: PgPool, topic: impl Into<String>, partitions: u32) -> Self {
        Self {
            pool,
            topic: topic.into(),
            partitions: partitions.max(1),
        }
    }
}

#[async_trait]
impl Channel for PgChannel {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn partition_count(&self) -> u32 {
        self.partitions
    }

    async fn publish(&self, key: &str, payload: Vec<u8>) -> AppResult<PublishReceipt> {
        let partition = partition_for(key, self.partitions);
        let mut tx = self.pool.begin().await.map_err(channel_error)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1), $2)")
            .bind(&self.topic)
            .bind(partition as i32)
            .execute(&mut *tx)
            .await
            .map_err(channel_error)?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO channel_messages (topic, partition, message_key, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&self.topic)
        .bind(partition as i32)
        .bind(key)
        .bind(payload)
        .fetch_one(&mut *tx)
        .await
        .map_err(channel_error)?;

        tx.commit().await.map_err(channel_error)?;

        Ok(PublishReceipt {
            partition,
            offset: id,
        })
    }

    async fn fetch(&self, partition: u32, after: i64, max: usize) -> AppResult<Vec<Delivery>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, partition, message_key, payload
            FROM channel_messages
            WHERE topic = $1 AND partition = $2 AND id > $3
            ORDER BY id
            LIMIT $4
            "#,
        )
        .bind(&self.topic)
        .bind(partition as i32)
        .bind(after)
        .bind(max as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(channel_error)?;

        Ok(rows
            .into_iter()
            .map(|row| Delivery {
                partition: row.partition as u32,
                offset: row.id,
                key: row.message_key,
                payload: row.payload,
            })
            .collect())
    }

    async fn committed_offset(&self, group: &str, partition: u32) -> AppResult<i64> {
        let committed: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT committed_id
            FROM channel_offsets
            WHERE consumer_group = $1 AND topic = $2 AND partition = $3
            "#,
        )
        .bind(group)
        .bind(&self.topic)
        .bind(partition as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(channel_error)?;

        Ok(committed.map(|(id,)| id).unwrap_or(NO_OFFSET))
    }

    async fn commit(&self, group: &str, partition: u32, offset: i64) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO channel_offsets (consumer_group, topic, partition, committed_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (consumer_group, topic, partition)
            DO UPDATE SET committed_id = GREATEST(channel_offsets.committed_id, EXCLUDED.committed_id),
                          committed_at = NOW()
            "#,
        )
        .bind(group)
        .bind(&self.topic)
        .bind(partition as i32)
        .bind(offset)
        .execute(&self.pool)
        .await
        .map_err(channel_error)?;

        Ok(())
    }
}
