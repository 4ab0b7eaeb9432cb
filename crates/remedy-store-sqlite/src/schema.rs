//! SQL schema for the Remedy SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Every offer, demand and resource owns exactly one address row.
-- Addresses are soft-deleted in lockstep with their owning resource.
CREATE TABLE IF NOT EXISTS address (
    id          INTEGER PRIMARY KEY,
    street      TEXT NOT NULL DEFAULT '',
    city        TEXT NOT NULL DEFAULT '',
    postalcode  TEXT NOT NULL DEFAULT '',
    country     TEXT NOT NULL DEFAULT '',
    latitude    REAL,            -- NULL until geocoded
    longitude   REAL,
    is_deleted  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS offer (
    id           INTEGER PRIMARY KEY,
    name         TEXT NOT NULL,
    organisation TEXT NOT NULL,
    phone        TEXT NOT NULL DEFAULT '',
    mail         TEXT NOT NULL,
    is_public    INTEGER NOT NULL DEFAULT 0,
    address_id   INTEGER NOT NULL REFERENCES address(id),
    token        TEXT NOT NULL UNIQUE,
    created_at   TEXT NOT NULL    -- RFC 3339 UTC; server-assigned
);

-- One table per offered resource kind; they share the category/soft-delete
-- contract but diverge on kind-specific columns.
CREATE TABLE IF NOT EXISTS consumable (
    id           INTEGER PRIMARY KEY,
    offer_id     INTEGER NOT NULL REFERENCES offer(id) ON DELETE CASCADE,
    address_id   INTEGER NOT NULL REFERENCES address(id),
    category     TEXT NOT NULL,
    name         TEXT NOT NULL DEFAULT '',
    manufacturer TEXT NOT NULL DEFAULT '',
    ordernumber  TEXT NOT NULL DEFAULT '',
    unit         TEXT NOT NULL DEFAULT '',
    annotation   TEXT NOT NULL DEFAULT '',
    amount       INTEGER NOT NULL,
    is_deleted   INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS device (
    id           INTEGER PRIMARY KEY,
    offer_id     INTEGER NOT NULL REFERENCES offer(id) ON DELETE CASCADE,
    address_id   INTEGER NOT NULL REFERENCES address(id),
    category     TEXT NOT NULL,
    name         TEXT NOT NULL DEFAULT '',
    manufacturer TEXT NOT NULL DEFAULT '',
    ordernumber  TEXT NOT NULL DEFAULT '',
    annotation   TEXT NOT NULL DEFAULT '',
    amount       INTEGER NOT NULL,
    is_deleted   INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS personal (
    id                INTEGER PRIMARY KEY,
    offer_id          INTEGER NOT NULL REFERENCES offer(id) ON DELETE CASCADE,
    address_id        INTEGER NOT NULL REFERENCES address(id),
    category          TEXT NOT NULL,
    qualification     TEXT NOT NULL,
    area              TEXT NOT NULL,
    institution       TEXT NOT NULL DEFAULT '',
    researchgroup     TEXT NOT NULL DEFAULT '',
    experience_rt_pcr INTEGER NOT NULL DEFAULT 0,
    annotation        TEXT NOT NULL DEFAULT '',
    is_deleted        INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS demand (
    id          INTEGER PRIMARY KEY,
    institution TEXT NOT NULL DEFAULT '',
    name        TEXT NOT NULL DEFAULT '',
    mail        TEXT NOT NULL DEFAULT '',
    phone       TEXT NOT NULL DEFAULT '',
    address_id  INTEGER REFERENCES address(id),   -- demands may be unlocated
    token       TEXT UNIQUE,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS demand_consumable (
    id           INTEGER PRIMARY KEY,
    demand_id    INTEGER NOT NULL REFERENCES demand(id) ON DELETE CASCADE,
    category     TEXT NOT NULL,
    name         TEXT NOT NULL DEFAULT '',
    manufacturer TEXT NOT NULL DEFAULT '',
    ordernumber  TEXT NOT NULL DEFAULT '',
    unit         TEXT NOT NULL DEFAULT '',
    annotation   TEXT NOT NULL DEFAULT '',
    amount       INTEGER NOT NULL,
    is_deleted   INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS demand_device (
    id           INTEGER PRIMARY KEY,
    demand_id    INTEGER NOT NULL REFERENCES demand(id) ON DELETE CASCADE,
    category     TEXT NOT NULL,
    name         TEXT NOT NULL DEFAULT '',
    manufacturer TEXT NOT NULL DEFAULT '',
    ordernumber  TEXT NOT NULL DEFAULT '',
    annotation   TEXT NOT NULL DEFAULT '',
    amount       INTEGER NOT NULL,
    is_deleted   INTEGER NOT NULL DEFAULT 0
);

-- The change log is strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS change_log (
    id           INTEGER PRIMARY KEY,
    element_type TEXT NOT NULL,    -- 'consumable' | 'device' | 'personal'
    element_id   INTEGER NOT NULL,
    change_type  TEXT NOT NULL,    -- 'INCREASE_AMOUNT' | 'DECREASE_AMOUNT' | 'DELETE_RESOURCE'
    diff_amount  INTEGER NOT NULL,
    reason       TEXT NOT NULL DEFAULT '',
    timestamp    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS region_subscription (
    id         INTEGER PRIMARY KEY,
    name       TEXT NOT NULL DEFAULT '',
    email      TEXT NOT NULL,
    postalcode TEXT NOT NULL,
    latitude   REAL NOT NULL,      -- geocoded at subscribe time
    longitude  REAL NOT NULL,
    active     INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS consumable_category_idx ON consumable(category);
CREATE INDEX IF NOT EXISTS device_category_idx     ON device(category);
CREATE INDEX IF NOT EXISTS personal_category_idx   ON personal(category);
CREATE INDEX IF NOT EXISTS change_log_element_idx  ON change_log(element_type, element_id);
CREATE INDEX IF NOT EXISTS offer_created_idx       ON offer(created_at);

PRAGMA user_version = 1;
";
