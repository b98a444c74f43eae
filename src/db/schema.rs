pub const SCHEMA_VERSION: i32 = 2;

pub const SCHEMA_V1: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY,
    version INTEGER NOT NULL
);

-- Contact rows. Integer ids are assigned monotonically so id order can
-- stand in for creation order when timestamps tie.
CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT,
    phone TEXT,
    linked_id INTEGER,
    link_precedence TEXT NOT NULL DEFAULT 'primary'
        CHECK (link_precedence IN ('primary', 'secondary')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT,
    CHECK (email IS NOT NULL OR phone IS NOT NULL),
    FOREIGN KEY (linked_id) REFERENCES contacts(id)
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_contact_email ON contacts(email);
CREATE INDEX IF NOT EXISTS idx_contact_phone ON contacts(phone);
CREATE INDEX IF NOT EXISTS idx_contact_linked ON contacts(linked_id);
"#;

/// V2 migration: index the tombstone column so the deleted_at IS NULL
/// filter on every read stays cheap as tombstones accumulate.
pub const MIGRATION_V2: &str = r#"
CREATE INDEX IF NOT EXISTS idx_contact_deleted ON contacts(deleted_at);
"#;
