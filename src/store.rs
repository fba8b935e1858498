use anyhow::{Context as _, Result};
use std::sync::Arc;

use chrono::Utc;
use futures::lock::{Mutex, MutexGuard};
use rusqlite::{params, Connection, OptionalExtension};
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};

/// A message posted to the catstare board
#[derive(Debug, PartialEq, Clone)]
pub struct BoardRecord {
    /// Reacted message
    pub message_id: MessageId,
    /// Channel of the reacted message
    pub channel_id: ChannelId,
    /// Post on the board
    pub board_message_id: MessageId,
    /// Last count shown on the board
    pub count: u64,
}

/// A pair of frens
#[derive(Debug, PartialEq, Clone)]
pub struct FrenRecord {
    pub guild_id: GuildId,
    /// User who sent the request
    pub inviter_id: UserId,
    /// User who accepted it
    pub fren_id: UserId,
    /// Unix time of acceptance
    pub timestamp: i64,
}

/// Persistent bot state
pub struct Store {
    /// sql connection
    conn: Arc<Mutex<Connection>>,
    /// Held while a board post is read, changed on Discord and saved
    board_lock: Arc<Mutex<()>>,
}

impl Store {
    /// Opens the database in `basedir`
    pub fn open(basedir: &str) -> Result<Store> {
        let conn = Connection::open(format!("{}/catstare_bot.db", basedir))
            .context("failed to open the database")?;
        Self::init(conn)
    }

    /// Opens a throwaway database
    pub fn in_memory() -> Result<Store> {
        let conn = Connection::open_in_memory().context("failed to open the database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Store> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS catstare_board (
                message_id        VARCHAR(20) PRIMARY KEY,
                channel_id        VARCHAR(20) NOT NULL,
                board_message_id  VARCHAR(20) NOT NULL,
                count             INTEGER     NOT NULL
            );
            CREATE TABLE IF NOT EXISTS frens (
                guild_id    VARCHAR(20) NOT NULL,
                inviter_id  VARCHAR(20) NOT NULL,
                fren_id     VARCHAR(20) NOT NULL,
                timestamp   TIMESTAMP   NOT NULL,
                PRIMARY KEY (guild_id, inviter_id, fren_id)
            );",
        )
        .context("failed to create the tables")?;

        Ok(Store {
            conn: Arc::new(Mutex::new(conn)),
            board_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Serializes board changes
    pub async fn lock_board(&self) -> MutexGuard<'_, ()> {
        self.board_lock.lock().await
    }

    /// Looks up the board post of a message
    pub async fn board_post(&self, message_id: MessageId) -> Result<Option<BoardRecord>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT channel_id, board_message_id, count
                FROM catstare_board
                WHERE message_id = ?1",
                params!(message_id.to_string()),
                |row| {
                    let channel_id: String = row.get(0)?;
                    let board_message_id: String = row.get(1)?;
                    let count: i64 = row.get(2)?;
                    Ok((channel_id, board_message_id, count))
                },
            )
            .optional()
            .with_context(|| format!("failed to read the board post of {}", message_id))?;

        let Some((channel_id, board_message_id, count)) = row else {
            return Ok(None);
        };
        Ok(Some(BoardRecord {
            message_id,
            channel_id: ChannelId(channel_id.parse()?),
            board_message_id: MessageId(board_message_id.parse()?),
            count: count.max(0) as u64,
        }))
    }

    /// Records or updates a board post
    pub async fn save_board_post(&self, record: &BoardRecord) -> Result<()> {
        self.conn
            .lock()
            .await
            .execute(
                "REPLACE INTO catstare_board (message_id, channel_id, board_message_id, count)
                VALUES (?1, ?2, ?3, ?4)",
                params!(
                    record.message_id.to_string(),
                    record.channel_id.to_string(),
                    record.board_message_id.to_string(),
                    record.count as i64,
                ),
            )
            .with_context(|| format!("failed to save the board post: {:?}", record))?;
        Ok(())
    }

    /// Forgets a board post
    pub async fn delete_board_post(&self, message_id: MessageId) -> Result<()> {
        self.conn
            .lock()
            .await
            .execute(
                "DELETE FROM catstare_board WHERE message_id = ?1",
                params!(message_id.to_string()),
            )
            .with_context(|| format!("failed to delete the board post of {}", message_id))?;
        Ok(())
    }

    /// Records a frenship, returns `false` when it already existed in either direction
    pub async fn add_fren(
        &self,
        guild_id: GuildId,
        inviter_id: UserId,
        fren_id: UserId,
    ) -> Result<bool> {
        let inserted = self
            .conn
            .lock()
            .await
            .execute(
                "INSERT OR IGNORE INTO frens (guild_id, inviter_id, fren_id, timestamp)
                SELECT ?1, ?2, ?3, ?4
                WHERE NOT EXISTS (
                    SELECT 1 FROM frens
                    WHERE guild_id = ?1
                    AND ((inviter_id = ?2 AND fren_id = ?3) OR (inviter_id = ?3 AND fren_id = ?2))
                )",
                params!(
                    guild_id.to_string(),
                    inviter_id.to_string(),
                    fren_id.to_string(),
                    Utc::now().timestamp(),
                ),
            )
            .with_context(|| format!("failed to record fren {} -> {}", inviter_id, fren_id))?;
        Ok(inserted > 0)
    }

    /// Frens of a user in a guild, either direction
    pub async fn frens_of(&self, guild_id: GuildId, user_id: UserId) -> Result<Vec<FrenRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT guild_id, inviter_id, fren_id, timestamp
                FROM frens
                WHERE guild_id = ?1 AND (inviter_id = ?2 OR fren_id = ?2)
                ORDER BY timestamp",
            )
            .context("failed to prepare the fren query")?;
        let rows = stmt
            .query_map(params!(guild_id.to_string(), user_id.to_string()), |row| {
                let guild_id: String = row.get(0)?;
                let inviter_id: String = row.get(1)?;
                let fren_id: String = row.get(2)?;
                let timestamp: i64 = row.get(3)?;
                Ok((guild_id, inviter_id, fren_id, timestamp))
            })
            .context("failed to read frens")?;

        rows.map(|row| -> Result<FrenRecord> {
            let (guild_id, inviter_id, fren_id, timestamp) = row?;
            Ok(FrenRecord {
                guild_id: GuildId(guild_id.parse()?),
                inviter_id: UserId(inviter_id.parse()?),
                fren_id: UserId(fren_id.parse()?),
                timestamp,
            })
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn board_posts_round_trip() {
        let store = Store::in_memory().unwrap();
        assert_eq!(store.board_post(MessageId(1)).await.unwrap(), None);

        let record = BoardRecord {
            message_id: MessageId(1),
            channel_id: ChannelId(2),
            board_message_id: MessageId(3),
            count: 4,
        };
        store.save_board_post(&record).await.unwrap();
        assert_eq!(store.board_post(MessageId(1)).await.unwrap(), Some(record.clone()));

        let updated = BoardRecord { count: 7, ..record };
        store.save_board_post(&updated).await.unwrap();
        assert_eq!(store.board_post(MessageId(1)).await.unwrap(), Some(updated));

        store.delete_board_post(MessageId(1)).await.unwrap();
        assert_eq!(store.board_post(MessageId(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn frens_are_recorded_once() {
        let store = Store::in_memory().unwrap();
        let guild = GuildId(1);
        assert!(store.add_fren(guild, UserId(10), UserId(20)).await.unwrap());
        assert!(!store.add_fren(guild, UserId(10), UserId(20)).await.unwrap());
        assert!(store.add_fren(guild, UserId(30), UserId(10)).await.unwrap());

        let frens = store.frens_of(guild, UserId(10)).await.unwrap();
        assert_eq!(frens.len(), 2);
        assert!(frens.iter().all(|f| f.guild_id == guild));

        assert!(store.frens_of(GuildId(2), UserId(10)).await.unwrap().is_empty());
        assert_eq!(store.frens_of(guild, UserId(20)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reversed_request_is_the_same_frenship() {
        let store = Store::in_memory().unwrap();
        let guild = GuildId(1);
        assert!(store.add_fren(guild, UserId(10), UserId(20)).await.unwrap());
        assert!(!store.add_fren(guild, UserId(20), UserId(10)).await.unwrap());

        let frens = store.frens_of(guild, UserId(10)).await.unwrap();
        assert_eq!(frens.len(), 1);
        assert_eq!(frens[0].inviter_id, UserId(10));
        assert_eq!(store.frens_of(guild, UserId(20)).await.unwrap().len(), 1);

        // other guilds keep their own frenships
        assert!(store.add_fren(GuildId(2), UserId(20), UserId(10)).await.unwrap());
    }
}
