//! SQLite schema definitions
//!
//! Initial schema with all tables. No migrations needed for first version.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- 1. Leads (must be before sessions due to FK)
-- =============================================================================
CREATE TABLE IF NOT EXISTS leads (
    id TEXT PRIMARY KEY,
    email TEXT,
    external_ref TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_leads_external_ref ON leads(external_ref);

-- =============================================================================
-- 2. Sessions (one browsing session per opaque session key)
-- =============================================================================
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    lead_id TEXT NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
    first_touch_at INTEGER NOT NULL,
    last_touch_at INTEGER NOT NULL,
    attribution_model TEXT,
    source TEXT,
    medium TEXT,
    campaign TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_lead ON sessions(lead_id);

-- =============================================================================
-- 3. Touchpoints (immutable once written)
-- =============================================================================
CREATE TABLE IF NOT EXISTS touchpoints (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    lead_id TEXT NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
    ordinal INTEGER NOT NULL,
    channel TEXT NOT NULL,
    campaign TEXT,
    occurred_at INTEGER NOT NULL,
    params TEXT,
    created_at INTEGER NOT NULL,
    UNIQUE (lead_id, ordinal)
);

CREATE INDEX IF NOT EXISTS idx_touchpoints_lead_order ON touchpoints(lead_id, occurred_at, ordinal);
CREATE INDEX IF NOT EXISTS idx_touchpoints_session ON touchpoints(session_id);

-- =============================================================================
-- 4. Journeys (materialized attribution results; rebuilt, not patched)
-- =============================================================================
CREATE TABLE IF NOT EXISTS journeys (
    id TEXT PRIMARY KEY,
    lead_id TEXT NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
    model TEXT NOT NULL,
    touchpoint_count INTEGER NOT NULL,
    credits TEXT NOT NULL,
    assembled_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_journeys_lead_assembled ON journeys(lead_id, assembled_at DESC);

-- =============================================================================
-- 5. Sync attempts (append-only audit log)
-- =============================================================================
CREATE TABLE IF NOT EXISTS sync_attempts (
    id TEXT PRIMARY KEY,
    lead_id TEXT NOT NULL,
    destination TEXT NOT NULL,
    idempotency_key TEXT NOT NULL,
    attempt INTEGER NOT NULL,
    outcome TEXT NOT NULL CHECK(outcome IN ('pending', 'success', 'failed', 'rejected')),
    http_status INTEGER,
    request_snapshot TEXT NOT NULL,
    response_snapshot TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_attempts_key ON sync_attempts(idempotency_key, outcome);
CREATE INDEX IF NOT EXISTS idx_sync_attempts_pair ON sync_attempts(lead_id, destination, created_at);
"#;
