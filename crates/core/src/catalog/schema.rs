//! Catalog DDL. Every statement is idempotent and runs on each connect.

pub(crate) const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS node_sequences (
        user_id INTEGER PRIMARY KEY,
        next_id INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS file_nodes (
        user_id INTEGER NOT NULL,
        id INTEGER NOT NULL,
        title TEXT NOT NULL,
        parent_id INTEGER NULL,
        node_type INTEGER NOT NULL,
        filesystem_path TEXT NOT NULL,
        mime_type TEXT NOT NULL,
        modified_at TEXT NOT NULL,
        node_size INTEGER NOT NULL,
        node_version INTEGER NOT NULL CHECK (node_version >= 1),
        hash_sum TEXT NULL,
        PRIMARY KEY (user_id, id),
        FOREIGN KEY (user_id, parent_id) REFERENCES file_nodes (user_id, id)
            DEFERRABLE INITIALLY DEFERRED
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS ux_file_nodes_sibling_title
        ON file_nodes (user_id, IFNULL(parent_id, -1), title)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS ix_file_nodes_parent
        ON file_nodes (user_id, parent_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS file_versions (
        user_id INTEGER NOT NULL,
        id INTEGER NOT NULL,
        node_version INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        node_size INTEGER NOT NULL,
        file_name TEXT NOT NULL,
        PRIMARY KEY (user_id, id, node_version)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS trash_box (
        trash_id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        id INTEGER NOT NULL,
        title TEXT NOT NULL,
        parent_id INTEGER NULL,
        node_type INTEGER NOT NULL,
        filesystem_path TEXT NOT NULL,
        mime_type TEXT NOT NULL,
        version_created_at TEXT NOT NULL,
        deleted_at TEXT NOT NULL,
        node_size INTEGER NOT NULL,
        node_version INTEGER NOT NULL,
        file_name TEXT NULL,
        UNIQUE (user_id, filesystem_path, node_version)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS file_node_locks (
        user_id INTEGER NOT NULL,
        id INTEGER NOT NULL,
        write_lock INTEGER NOT NULL,
        lock_type INTEGER NOT NULL,
        PRIMARY KEY (user_id, id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS favorite_nodes (
        user_id INTEGER NOT NULL,
        id INTEGER NOT NULL,
        PRIMARY KEY (user_id, id),
        FOREIGN KEY (user_id, id) REFERENCES file_nodes (user_id, id) ON DELETE CASCADE
    )
    "#,
];
