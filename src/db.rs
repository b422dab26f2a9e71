// ==========================================
// 排课数据同步系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 提供幂等建表（CREATE TABLE IF NOT EXISTS），不做迁移
// ==========================================

use rusqlite::Connection;
use std::time::Duration;
use tracing::debug;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表语句
///
/// 唯一约束即各实体的自然键；associations 每行恰好引用一种资源
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS config_scope (
    scope_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(scope_type, scope_key)
);

INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS terms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    name TEXT,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    UNIQUE(start_date, end_date)
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    name TEXT
);

CREATE TABLE IF NOT EXISTS methods (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    name TEXT
);

CREATE TABLE IF NOT EXISTS grids (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    name TEXT,
    definition TEXT
);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    name TEXT,
    subject_no TEXT,
    description TEXT
);

CREATE TABLE IF NOT EXISTS class_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    name TEXT,
    full_name TEXT,
    category_id INTEGER REFERENCES categories(id),
    grid_id INTEGER REFERENCES grids(id)
);

CREATE TABLE IF NOT EXISTS persons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL,
    surname TEXT,
    forename TEXT,
    title TEXT,
    username TEXT
);
CREATE INDEX IF NOT EXISTS idx_persons_code ON persons(code);
CREATE INDEX IF NOT EXISTS idx_persons_username ON persons(username);

CREATE TABLE IF NOT EXISTS rooms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    name TEXT,
    capacity INTEGER
);

CREATE TABLE IF NOT EXISTS associations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    organization_id INTEGER NOT NULL,
    category_id INTEGER REFERENCES categories(id),
    event_id INTEGER REFERENCES events(id),
    group_id INTEGER REFERENCES class_groups(id),
    method_id INTEGER REFERENCES methods(id),
    person_id INTEGER REFERENCES persons(id),
    room_id INTEGER REFERENCES rooms(id),
    CHECK (
        (category_id IS NOT NULL) + (event_id IS NOT NULL) + (group_id IS NOT NULL)
        + (method_id IS NOT NULL) + (person_id IS NOT NULL) + (room_id IS NOT NULL) = 1
    )
);

CREATE TABLE IF NOT EXISTS units (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    organization_id INTEGER NOT NULL,
    term_id INTEGER NOT NULL REFERENCES terms(id),
    code TEXT NOT NULL,
    grid_id INTEGER REFERENCES grids(id),
    comment TEXT,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    effective_start TEXT,
    effective_end TEXT,
    modified TEXT,
    UNIQUE(organization_id, term_id, code)
);

CREATE TABLE IF NOT EXISTS blocks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    day_of_week INTEGER NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    UNIQUE(date, start_time, end_time)
);

CREATE TABLE IF NOT EXISTS instances (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    unit_id INTEGER NOT NULL REFERENCES units(id),
    block_id INTEGER NOT NULL REFERENCES blocks(id),
    event_id INTEGER NOT NULL REFERENCES events(id),
    method_id INTEGER REFERENCES methods(id),
    comment TEXT,
    modified TEXT,
    UNIQUE(unit_id, block_id, event_id)
);

CREATE TABLE IF NOT EXISTS instance_persons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    instance_id INTEGER NOT NULL REFERENCES instances(id),
    person_id INTEGER NOT NULL REFERENCES persons(id),
    role_id INTEGER NOT NULL,
    modified TEXT,
    UNIQUE(instance_id, person_id)
);

CREATE TABLE IF NOT EXISTS instance_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    assoc_id INTEGER NOT NULL REFERENCES instance_persons(id),
    group_id INTEGER NOT NULL REFERENCES class_groups(id),
    modified TEXT,
    UNIQUE(assoc_id, group_id)
);

CREATE TABLE IF NOT EXISTS instance_rooms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    assoc_id INTEGER NOT NULL REFERENCES instance_persons(id),
    room_id INTEGER NOT NULL REFERENCES rooms(id),
    modified TEXT,
    UNIQUE(assoc_id, room_id)
);

CREATE TABLE IF NOT EXISTS import_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL UNIQUE,
    organization_id INTEGER NOT NULL,
    term_id INTEGER NOT NULL REFERENCES terms(id),
    created TEXT NOT NULL,
    imported_at TEXT NOT NULL,
    error_count INTEGER NOT NULL DEFAULT 0,
    warning_count INTEGER NOT NULL DEFAULT 0,
    report_json TEXT,
    config_snapshot TEXT,
    UNIQUE(organization_id, term_id, created)
);
"#;

/// 初始化数据库 schema（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    debug!("数据库 schema 已就绪");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('terms', 'units', 'blocks', 'import_runs')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
