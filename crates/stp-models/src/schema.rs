/// Staging table for inbound messages. Upstream ingestion inserts rows; the
/// pipeline only ever updates the parse-state and claim columns.
///
/// `claimed_by`/`claimed_at` implement a lease so two pollers sharing a database
/// do not pick up the same message.
pub const MESSAGE_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS inbound_messages (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    source       TEXT NOT NULL,
    payload      TEXT NOT NULL,
    received_at  TEXT NOT NULL,
    parsed       INTEGER NOT NULL DEFAULT 0,
    parsed_at    TEXT,
    parse_error  TEXT,
    claimed_by   TEXT,
    claimed_at   TEXT
);

CREATE INDEX IF NOT EXISTS idx_inbound_unparsed ON inbound_messages(parsed, id);
";

/// Normalized trades and their dependent records.
///
/// ```sql
/// trades 1 --- * trade_system_links
/// trades 1 --- * trade_workflow_events
/// ```
pub const TRADE_TABLES_DDL: &str = "\
CREATE TABLE IF NOT EXISTS trades (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    trade_ref           TEXT NOT NULL,
    product             TEXT NOT NULL,
    source_type         TEXT NOT NULL,
    venue               TEXT,
    counterparty        TEXT NOT NULL,
    broker              TEXT,
    currency_pair       TEXT NOT NULL,
    side                TEXT NOT NULL,
    notional            TEXT NOT NULL,
    notional_currency   TEXT NOT NULL,
    strike              TEXT,
    cut                 TEXT,
    trade_date          TEXT NOT NULL,
    expiry_date         TEXT,
    settlement_date     TEXT,
    premium             TEXT,
    premium_currency    TEXT,
    premium_date        TEXT,
    inbound_message_id  INTEGER
);

CREATE INDEX IF NOT EXISTS idx_trades_message ON trades(inbound_message_id);

CREATE TABLE IF NOT EXISTS trade_system_links (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    trade_id           INTEGER NOT NULL REFERENCES trades(id),
    system             TEXT NOT NULL,
    external_trade_id  TEXT,
    status             TEXT NOT NULL,
    error_code         TEXT,
    error_message      TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    deleted            INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_links_trade ON trade_system_links(trade_id);

CREATE TABLE IF NOT EXISTS trade_workflow_events (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    trade_id      INTEGER NOT NULL REFERENCES trades(id),
    system_code   TEXT NOT NULL,
    event_type    TEXT NOT NULL,
    description   TEXT NOT NULL,
    field_name    TEXT,
    old_value     TEXT,
    new_value     TEXT,
    event_time    TEXT NOT NULL,
    initiated_by  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_trade ON trade_workflow_events(trade_id);
";
