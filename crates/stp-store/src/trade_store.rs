use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use stp_models::{
    EventId, LinkId, LinkStatus, MessageId, Trade, TradeId, TradeSystemLink, TradeWorkflowEvent,
};

use crate::error::StoreError;
use crate::gateway::TradeStore;
use crate::sql::{parse_date, parse_decimal, parse_enum, parse_opt_date, parse_opt_decimal, parse_ts, ts};

const TRADE_COLUMNS: &str = "id, trade_ref, product, source_type, venue, counterparty, broker, \
    currency_pair, side, notional, notional_currency, strike, cut, trade_date, expiry_date, \
    settlement_date, premium, premium_currency, premium_date, inbound_message_id";

const LINK_COLUMNS: &str = "id, trade_id, system, external_trade_id, status, error_code, \
    error_message, created_at, updated_at, deleted";

const EVENT_COLUMNS: &str = "id, trade_id, system_code, event_type, description, field_name, \
    old_value, new_value, event_time, initiated_by";

/// SQLite-backed trade store.
///
/// Every insert commits on its own; foreign keys are enforced, so a link or
/// event pointing at a trade that was never inserted is rejected.
pub struct SqliteTradeStore {
    conn: Mutex<Connection>,
}

impl SqliteTradeStore {
    /// Open (or create) the trade database in WAL mode.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(stp_models::schema::TRADE_TABLES_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(stp_models::schema::TRADE_TABLES_DDL)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("SQLite mutex poisoned: {e}")))
    }

    pub fn count_trades(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: usize = conn.query_row("SELECT COUNT(*) FROM trades", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All trades parsed from one inbound message, in insertion order.
    pub fn trades_for_message(&self, id: MessageId) -> Result<Vec<(TradeId, Trade)>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades WHERE inbound_message_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(rusqlite::params![id.0], trade_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Non-deleted system links of a trade.
    pub fn links_for_trade(
        &self,
        trade_id: TradeId,
    ) -> Result<Vec<(LinkId, TradeSystemLink)>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {LINK_COLUMNS} FROM trade_system_links \
             WHERE trade_id = ?1 AND deleted = 0 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(rusqlite::params![trade_id.0], link_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn events_for_trade(
        &self,
        trade_id: TradeId,
    ) -> Result<Vec<(EventId, TradeWorkflowEvent)>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {EVENT_COLUMNS} FROM trade_workflow_events WHERE trade_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(rusqlite::params![trade_id.0], event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Move a system link through its booking lifecycle and persist the change.
    pub fn transition_link(
        &self,
        link_id: LinkId,
        to: LinkStatus,
        error: Option<(Option<String>, String)>,
        now: DateTime<Utc>,
    ) -> Result<TradeSystemLink, StoreError> {
        let conn = self.lock()?;
        let mut link = {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {LINK_COLUMNS} FROM trade_system_links WHERE id = ?1"
            ))?;
            match stmt.query_row(rusqlite::params![link_id.0], link_from_row) {
                Ok((_, link)) => link,
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    return Err(StoreError::LinkNotFound(link_id))
                }
                Err(e) => return Err(StoreError::Sqlite(e)),
            }
        };

        link.transition(to, error, now)?;
        conn.execute(
            "UPDATE trade_system_links \
             SET status = ?1, error_code = ?2, error_message = ?3, updated_at = ?4 WHERE id = ?5",
            rusqlite::params![
                link.status.as_str(),
                link.error_code,
                link.error_message,
                ts(&link.updated_at),
                link_id.0,
            ],
        )?;
        Ok(link)
    }

    /// Soft-delete a link; the row is kept for audit.
    pub fn soft_delete_link(&self, link_id: LinkId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE trade_system_links SET deleted = 1, updated_at = ?1 WHERE id = ?2",
            rusqlite::params![ts(&Utc::now()), link_id.0],
        )?;
        if updated == 0 {
            return Err(StoreError::LinkNotFound(link_id));
        }
        Ok(())
    }
}

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<(TradeId, Trade)> {
    let product: String = row.get(2)?;
    let side: String = row.get(8)?;
    let notional: String = row.get(9)?;
    let trade_date: String = row.get(13)?;
    let trade = Trade {
        trade_ref: row.get(1)?,
        product: parse_enum(2, &product)?,
        source_type: row.get(3)?,
        venue: row.get(4)?,
        counterparty: row.get(5)?,
        broker: row.get(6)?,
        currency_pair: row.get(7)?,
        side: parse_enum(8, &side)?,
        notional: parse_decimal(9, &notional)?,
        notional_currency: row.get(10)?,
        strike: parse_opt_decimal(11, row.get(11)?)?,
        cut: row.get(12)?,
        trade_date: parse_date(13, &trade_date)?,
        expiry_date: parse_opt_date(14, row.get(14)?)?,
        settlement_date: parse_opt_date(15, row.get(15)?)?,
        premium: parse_opt_decimal(16, row.get(16)?)?,
        premium_currency: row.get(17)?,
        premium_date: parse_opt_date(18, row.get(18)?)?,
        inbound_message_id: row.get::<_, Option<i64>>(19)?.map(MessageId),
    };
    Ok((TradeId(row.get(0)?), trade))
}

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<(LinkId, TradeSystemLink)> {
    let status: String = row.get(4)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    let link = TradeSystemLink {
        trade_id: TradeId(row.get(1)?),
        system: row.get(2)?,
        external_trade_id: row.get(3)?,
        status: parse_enum(4, &status)?,
        error_code: row.get(5)?,
        error_message: row.get(6)?,
        created_at: parse_ts(7, &created_at)?,
        updated_at: parse_ts(8, &updated_at)?,
        deleted: row.get(9)?,
    };
    Ok((LinkId(row.get(0)?), link))
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<(EventId, TradeWorkflowEvent)> {
    let event_time: String = row.get(8)?;
    let event = TradeWorkflowEvent {
        trade_id: TradeId(row.get(1)?),
        system_code: row.get(2)?,
        event_type: row.get(3)?,
        description: row.get(4)?,
        field_name: row.get(5)?,
        old_value: row.get(6)?,
        new_value: row.get(7)?,
        event_time: parse_ts(8, &event_time)?,
        initiated_by: row.get(9)?,
    };
    Ok((EventId(row.get(0)?), event))
}

impl TradeStore for SqliteTradeStore {
    fn insert_trade(&self, trade: &Trade) -> Result<TradeId, StoreError> {
        if trade.trade_ref.trim().is_empty() {
            return Err(StoreError::Constraint("trade_ref must not be empty".to_string()));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO trades \
             (trade_ref, product, source_type, venue, counterparty, broker, currency_pair, side, \
              notional, notional_currency, strike, cut, trade_date, expiry_date, settlement_date, \
              premium, premium_currency, premium_date, inbound_message_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            rusqlite::params![
                trade.trade_ref,
                trade.product.as_str(),
                trade.source_type,
                trade.venue,
                trade.counterparty,
                trade.broker,
                trade.currency_pair,
                trade.side.as_str(),
                trade.notional.to_string(),
                trade.notional_currency,
                trade.strike.map(|d| d.to_string()),
                trade.cut,
                trade.trade_date.to_string(),
                trade.expiry_date.map(|d| d.to_string()),
                trade.settlement_date.map(|d| d.to_string()),
                trade.premium.map(|d| d.to_string()),
                trade.premium_currency,
                trade.premium_date.map(|d| d.to_string()),
                trade.inbound_message_id.map(|id| id.0),
            ],
        )?;
        Ok(TradeId(conn.last_insert_rowid()))
    }

    fn insert_system_link(&self, link: &TradeSystemLink) -> Result<LinkId, StoreError> {
        link.validate()
            .map_err(|e| StoreError::Constraint(format!("system link for {}: {e}", link.system)))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO trade_system_links \
             (trade_id, system, external_trade_id, status, error_code, error_message, \
              created_at, updated_at, deleted) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                link.trade_id.0,
                link.system,
                link.external_trade_id,
                link.status.as_str(),
                link.error_code,
                link.error_message,
                ts(&link.created_at),
                ts(&link.updated_at),
                link.deleted,
            ],
        )?;
        Ok(LinkId(conn.last_insert_rowid()))
    }

    fn insert_workflow_event(&self, event: &TradeWorkflowEvent) -> Result<EventId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO trade_workflow_events \
             (trade_id, system_code, event_type, description, field_name, old_value, new_value, \
              event_time, initiated_by) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                event.trade_id.0,
                event.system_code,
                event.event_type,
                event.description,
                event.field_name,
                event.old_value,
                event.new_value,
                ts(&event.event_time),
                event.initiated_by,
            ],
        )?;
        Ok(EventId(conn.last_insert_rowid()))
    }
}
