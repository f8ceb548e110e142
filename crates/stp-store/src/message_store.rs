use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, Row, TransactionBehavior};
use stp_models::{InboundMessage, MessageId};

use crate::error::StoreError;
use crate::gateway::MessageStore;
use crate::sql::{parse_opt_ts, parse_ts, ts};

const SELECT_COLUMNS: &str =
    "SELECT id, source, payload, received_at, parsed, parsed_at, parse_error FROM inbound_messages";

/// SQLite-backed staging store for inbound messages.
///
/// `fetch_unparsed` claims the rows it returns for this worker inside an
/// IMMEDIATE transaction, so a second poller on the same database skips them
/// until the claim is older than the claim TTL. `write_parse_state` releases the claim.
///
/// Access is synchronized via `Mutex` since `rusqlite::Connection` is not `Sync`.
pub struct SqliteMessageStore {
    conn: Mutex<Connection>,
    worker_id: String,
    claim_ttl: Duration,
}

impl SqliteMessageStore {
    /// Open (or create) the message database in WAL mode.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(stp_models::schema::MESSAGE_TABLE_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(stp_models::schema::MESSAGE_TABLE_DDL)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            worker_id: "stp-local".to_string(),
            claim_ttl: Duration::from_secs(300),
        }
    }

    /// Set the identity written into claims and how long a claim stays valid.
    pub fn with_claim_policy(mut self, worker_id: impl Into<String>, claim_ttl: Duration) -> Self {
        self.worker_id = worker_id.into();
        self.claim_ttl = claim_ttl;
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("SQLite mutex poisoned: {e}")))
    }

    /// Stage a new raw message. Normally done by upstream ingestion.
    pub fn stage(&self, source: &str, payload: &str) -> Result<MessageId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO inbound_messages (source, payload, received_at, parsed) \
             VALUES (?1, ?2, ?3, 0)",
            rusqlite::params![source, payload, ts(&Utc::now())],
        )?;
        Ok(MessageId(conn.last_insert_rowid()))
    }

    pub fn count_unparsed(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: usize = conn.query_row(
            "SELECT COUNT(*) FROM inbound_messages WHERE parsed = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Current claimant of a message, if any.
    pub fn claimed_by(&self, id: MessageId) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT claimed_by FROM inbound_messages WHERE id = ?1",
            rusqlite::params![id.0],
            |row| row.get::<_, Option<String>>(0),
        );
        match result {
            Ok(claimant) => Ok(claimant),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::MessageNotFound(id)),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<InboundMessage> {
    let received_at: String = row.get(3)?;
    Ok(InboundMessage {
        id: MessageId(row.get(0)?),
        source: row.get(1)?,
        payload: row.get(2)?,
        received_at: parse_ts(3, &received_at)?,
        parsed: row.get(4)?,
        parsed_at: parse_opt_ts(5, row.get(5)?)?,
        parse_error: row.get(6)?,
    })
}

impl MessageStore for SqliteMessageStore {
    fn fetch_unparsed(&self, max_count: usize) -> Result<Vec<InboundMessage>, StoreError> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.claim_ttl)
            .map_err(|e| StoreError::Unavailable(format!("claim TTL out of range: {e}")))?;
        let cutoff = ts(&(now - ttl));
        let limit = i64::try_from(max_count).unwrap_or(i64::MAX);

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let messages = {
            let mut stmt = tx.prepare_cached(&format!(
                "{SELECT_COLUMNS} WHERE parsed = 0 \
                 AND (claimed_by IS NULL OR claimed_by = ?1 OR claimed_at < ?2) \
                 ORDER BY id LIMIT ?3"
            ))?;
            let rows = stmt
                .query_map(
                    rusqlite::params![self.worker_id, cutoff, limit],
                    message_from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        {
            let mut claim = tx.prepare_cached(
                "UPDATE inbound_messages SET claimed_by = ?1, claimed_at = ?2 WHERE id = ?3",
            )?;
            let claimed_at = ts(&now);
            for message in &messages {
                claim.execute(rusqlite::params![self.worker_id, claimed_at, message.id.0])?;
            }
        }
        tx.commit()?;

        tracing::debug!(
            worker = %self.worker_id,
            count = messages.len(),
            "Claimed unparsed messages"
        );
        Ok(messages)
    }

    fn fetch_by_id(&self, id: MessageId) -> Result<Option<InboundMessage>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
        match stmt.query_row(rusqlite::params![id.0], message_from_row) {
            Ok(message) => Ok(Some(message)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    fn write_parse_state(&self, message: &InboundMessage) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE inbound_messages \
             SET parsed = ?1, parsed_at = ?2, parse_error = ?3, claimed_by = NULL, claimed_at = NULL \
             WHERE id = ?4",
            rusqlite::params![
                message.parsed,
                message.parsed_at.as_ref().map(ts),
                message.parse_error,
                message.id.0,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::MessageNotFound(message.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_and_fetch_by_id() {
        let store = SqliteMessageStore::open_in_memory().unwrap();
        let id = store.stage("FIX", "8=FIX.4.4|35=8").unwrap();

        let msg = store.fetch_by_id(id).unwrap().unwrap();
        assert_eq!(msg.source, "FIX");
        assert_eq!(msg.payload, "8=FIX.4.4|35=8");
        assert!(!msg.parsed);
        assert!(msg.parse_error.is_none());
    }

    #[test]
    fn fetch_missing_id() {
        let store = SqliteMessageStore::open_in_memory().unwrap();
        assert!(store.fetch_by_id(MessageId(404)).unwrap().is_none());
    }

    #[test]
    fn fetch_unparsed_respects_limit_and_order() {
        let store = SqliteMessageStore::open_in_memory().unwrap();
        let ids: Vec<MessageId> = (0..5)
            .map(|i| store.stage("FILE", &format!("row {i}")).unwrap())
            .collect();

        let batch = store.fetch_unparsed(3).unwrap();
        let fetched: Vec<MessageId> = batch.iter().map(|m| m.id).collect();
        assert_eq!(fetched, ids[..3].to_vec());
    }

    #[test]
    fn parsed_messages_are_not_reselected() {
        let store = SqliteMessageStore::open_in_memory().unwrap();
        let id = store.stage("EMAIL", "hello").unwrap();
        let mut msg = store.fetch_by_id(id).unwrap().unwrap();
        msg.mark_failed("No parser available", Utc::now());
        store.write_parse_state(&msg).unwrap();

        assert!(store.fetch_unparsed(10).unwrap().is_empty());
        let stored = store.fetch_by_id(id).unwrap().unwrap();
        assert!(stored.parsed);
        assert!(stored.parsed_at.is_some());
        assert_eq!(stored.parse_error.as_deref(), Some("No parser available"));
        assert_eq!(store.count_unparsed().unwrap(), 0);
    }

    #[test]
    fn claims_hide_messages_from_other_workers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claims.db");
        let path = path.to_str().unwrap();

        let a = SqliteMessageStore::open(path)
            .unwrap()
            .with_claim_policy("worker-a", Duration::from_secs(300));
        let b = SqliteMessageStore::open(path)
            .unwrap()
            .with_claim_policy("worker-b", Duration::from_secs(300));

        let id = a.stage("FIX", "payload").unwrap();
        assert_eq!(a.fetch_unparsed(10).unwrap().len(), 1);
        assert_eq!(a.claimed_by(id).unwrap().as_deref(), Some("worker-a"));
        assert!(b.fetch_unparsed(10).unwrap().is_empty());

        // The owner may re-fetch its own claim.
        assert_eq!(a.fetch_unparsed(10).unwrap().len(), 1);
    }

    #[test]
    fn expired_claims_are_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expired.db");
        let path = path.to_str().unwrap();

        let a = SqliteMessageStore::open(path)
            .unwrap()
            .with_claim_policy("worker-a", Duration::from_secs(0));
        let b = SqliteMessageStore::open(path)
            .unwrap()
            .with_claim_policy("worker-b", Duration::from_secs(0));

        let id = a.stage("FIX", "payload").unwrap();
        assert_eq!(a.fetch_unparsed(10).unwrap().len(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(b.fetch_unparsed(10).unwrap().len(), 1);
        assert_eq!(b.claimed_by(id).unwrap().as_deref(), Some("worker-b"));
    }

    #[test]
    fn writeback_releases_claim() {
        let store = SqliteMessageStore::open_in_memory().unwrap();
        let id = store.stage("FIX", "payload").unwrap();
        let mut msg = store.fetch_unparsed(1).unwrap().remove(0);
        assert!(store.claimed_by(id).unwrap().is_some());

        msg.mark_succeeded(Utc::now());
        store.write_parse_state(&msg).unwrap();
        assert!(store.claimed_by(id).unwrap().is_none());
    }

    #[test]
    fn writeback_of_unknown_message_fails() {
        let store = SqliteMessageStore::open_in_memory().unwrap();
        let msg = InboundMessage::new(MessageId(99), "FIX", "x");
        assert!(matches!(
            store.write_parse_state(&msg),
            Err(StoreError::MessageNotFound(MessageId(99)))
        ));
    }
}
