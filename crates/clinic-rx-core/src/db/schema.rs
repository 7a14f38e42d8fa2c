//! SQLite schema definition.

/// Storage key for the bearer token.
pub const TOKEN_KEY: &str = "token";

/// Storage key for the JSON-encoded identity.
pub const USER_KEY: &str = "user";

/// Complete database schema for durable client storage.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Session entries (key/value, survives process restarts)
-- ============================================================================

CREATE TABLE IF NOT EXISTS session_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
