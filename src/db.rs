// ==========================================
// LoRaWAN 设备管理 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 建表（config_kv / import_profile），幂等
// ==========================================

use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Duration;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "LORAWAN_ADMIN_DB_PATH";

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

/// 确保本系统使用的表存在
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS import_profile (
            profile_id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            required_tags_json TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
}

/// 默认数据库路径
///
/// 优先级: 环境变量 LORAWAN_ADMIN_DB_PATH → 用户数据目录 → 当前目录
pub fn default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./lorawan_admin.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("lorawan-device-admin");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("lorawan_admin.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('config_kv', 'import_profile')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_default_db_path_has_db_suffix() {
        let path = default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db") || std::env::var(DB_PATH_ENV).is_ok());
    }
}
