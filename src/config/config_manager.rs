// ==========================================
// LoRaWAN 设备管理 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::types::RaggedRowPolicy;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
            crate::db::ensure_schema(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 读取数值配置；格式错误或非正数时回退默认值
    fn get_positive_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: std::str::FromStr + PartialOrd + Default + Copy + std::fmt::Display,
    {
        let raw = self.get_config_or_default(key, &default.to_string())?;
        match raw.trim().parse::<T>() {
            Ok(v) if v > T::default() => Ok(v),
            _ => {
                tracing::warn!(config_key = key, raw_value = %raw, "配置值非法，使用默认值");
                Ok(default)
            }
        }
    }

    /// 获取所有 import.* 配置的快照
    pub fn get_import_config_snapshot(&self) -> ConfigResult<HashMap<String, String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' AND key LIKE 'import.%' ORDER BY key",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(config_map)
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_max_upload_bytes(&self) -> ConfigResult<usize> {
        self.get_positive_or_default(config_keys::MAX_UPLOAD_BYTES, defaults::MAX_UPLOAD_BYTES)
    }

    async fn get_ragged_row_policy(&self) -> ConfigResult<RaggedRowPolicy> {
        let value = self.get_config_or_default(
            config_keys::RAGGED_ROW_POLICY,
            &RaggedRowPolicy::default().to_string(),
        )?;
        Ok(RaggedRowPolicy::from_str(&value).unwrap_or_default())
    }

    async fn get_tag_column_prefix(&self) -> ConfigResult<String> {
        let value =
            self.get_config_or_default(config_keys::TAG_COLUMN_PREFIX, defaults::TAG_COLUMN_PREFIX)?;
        let value = value.trim().to_string();
        if value.is_empty() {
            Ok(defaults::TAG_COLUMN_PREFIX.to_string())
        } else {
            Ok(value)
        }
    }

    async fn get_max_in_flight(&self) -> ConfigResult<usize> {
        self.get_positive_or_default(config_keys::MAX_IN_FLIGHT, defaults::MAX_IN_FLIGHT)
    }

    async fn get_call_timeout_ms(&self) -> ConfigResult<u64> {
        self.get_positive_or_default(config_keys::CALL_TIMEOUT_MS, defaults::CALL_TIMEOUT_MS)
    }

    async fn get_unreachable_threshold(&self) -> ConfigResult<usize> {
        self.get_positive_or_default(
            config_keys::UNREACHABLE_THRESHOLD,
            defaults::UNREACHABLE_THRESHOLD,
        )
    }

    async fn get_undo_retention_hours(&self) -> ConfigResult<i64> {
        self.get_positive_or_default(
            config_keys::UNDO_RETENTION_HOURS,
            defaults::UNDO_RETENTION_HOURS,
        )
    }

    async fn get_max_retained_runs(&self) -> ConfigResult<usize> {
        self.get_positive_or_default(config_keys::MAX_RETAINED_RUNS, defaults::MAX_RETAINED_RUNS)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 上传
    pub const MAX_UPLOAD_BYTES: &str = "import.max_upload_bytes";
    pub const RAGGED_ROW_POLICY: &str = "import.ragged_row_policy";
    pub const TAG_COLUMN_PREFIX: &str = "import.tag_column_prefix";

    // 并发与超时
    pub const MAX_IN_FLIGHT: &str = "import.max_in_flight";
    pub const CALL_TIMEOUT_MS: &str = "import.call_timeout_ms";
    pub const UNREACHABLE_THRESHOLD: &str = "import.unreachable_threshold";

    // 撤销日志
    pub const UNDO_RETENTION_HOURS: &str = "import.undo_retention_hours";
    pub const MAX_RETAINED_RUNS: &str = "import.max_retained_runs";
}

// ==========================================
// 配置默认值
// ==========================================
pub mod defaults {
    pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
    pub const TAG_COLUMN_PREFIX: &str = "tag_";
    pub const MAX_IN_FLIGHT: usize = 8;
    pub const CALL_TIMEOUT_MS: u64 = 10_000;
    pub const UNREACHABLE_THRESHOLD: usize = 5;
    pub const UNDO_RETENTION_HOURS: i64 = 24;
    pub const MAX_RETAINED_RUNS: usize = 256;
}
