// ==========================================
// LoRaWAN 设备管理 - 导入规则集仓储
// ==========================================
// 约束: Repository 不含业务逻辑
// 存储: import_profile 表（required_tags 以 JSON 数组存储）
// ==========================================

use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::import::{normalize_tag_names, ImportProfile};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ImportProfileStore Trait
// ==========================================
// 用途: 导入流程只读访问规则集（每次导入读取一次）
pub trait ImportProfileStore: Send + Sync {
    /// 按 ID 读取规则集
    ///
    /// # 返回
    /// - Err(RepositoryError::NotFound): 规则集不存在
    fn get(&self, profile_id: &str) -> RepositoryResult<ImportProfile>;
}

// ==========================================
// ImportProfileRepository - 规则集仓储
// ==========================================
/// 职责: 管理 import_profile 表的 CRUD 操作
pub struct ImportProfileRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportProfileRepository {
    /// 创建新的仓储实例（自动建表）
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            ensure_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建规则集
    pub fn create(&self, profile: &ImportProfile) -> RepositoryResult<()> {
        let tags_json = serde_json::to_string(&normalize_tag_names(&profile.required_tags))?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_profile (
                profile_id, name, description, required_tags_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                profile.id,
                profile.name,
                profile.description,
                tags_json,
                profile.created_at,
                profile.updated_at,
            ],
        )?;
        tracing::info!(profile_id = %profile.id, name = %profile.name, "导入规则集已创建");
        Ok(())
    }

    /// 更新规则集（名称/说明/必填标签），刷新 updated_at
    pub fn update(&self, profile: &ImportProfile) -> RepositoryResult<ImportProfile> {
        let tags = normalize_tag_names(&profile.required_tags);
        let tags_json = serde_json::to_string(&tags)?;
        let now = Utc::now();

        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE import_profile
            SET name = ?2, description = ?3, required_tags_json = ?4, updated_at = ?5
            WHERE profile_id = ?1
            "#,
            params![profile.id, profile.name, profile.description, tags_json, now],
        )?;

        if affected == 0 {
            return Err(not_found(&profile.id));
        }

        Ok(ImportProfile {
            required_tags: tags,
            updated_at: now,
            ..profile.clone()
        })
    }

    /// 删除规则集
    pub fn delete(&self, profile_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM import_profile WHERE profile_id = ?1",
            params![profile_id],
        )?;
        if affected == 0 {
            return Err(not_found(profile_id));
        }
        tracing::info!(profile_id = %profile_id, "导入规则集已删除");
        Ok(())
    }

    /// 按主键查询
    pub fn find_by_id(&self, profile_id: &str) -> RepositoryResult<Option<ImportProfile>> {
        let conn = self.get_conn()?;
        let raw = conn
            .query_row(
                r#"
                SELECT profile_id, name, description, required_tags_json, created_at, updated_at
                FROM import_profile WHERE profile_id = ?1
                "#,
                params![profile_id],
                map_row,
            )
            .optional()?;

        raw.map(RawProfileRow::into_profile).transpose()
    }

    /// 列出全部规则集（按名称排序）
    pub fn list(&self) -> RepositoryResult<Vec<ImportProfile>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT profile_id, name, description, required_tags_json, created_at, updated_at
            FROM import_profile ORDER BY name
            "#,
        )?;

        let rows = stmt.query_map([], map_row)?;
        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?.into_profile()?);
        }
        Ok(profiles)
    }
}

impl ImportProfileStore for ImportProfileRepository {
    fn get(&self, profile_id: &str) -> RepositoryResult<ImportProfile> {
        self.find_by_id(profile_id)?
            .ok_or_else(|| not_found(profile_id))
    }
}

fn not_found(profile_id: &str) -> RepositoryError {
    RepositoryError::NotFound {
        entity: "ImportProfile".to_string(),
        id: profile_id.to_string(),
    }
}

struct RawProfileRow {
    id: String,
    name: String,
    description: Option<String>,
    tags_json: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RawProfileRow {
    fn into_profile(self) -> RepositoryResult<ImportProfile> {
        let tags: BTreeSet<String> = serde_json::from_str(&self.tags_json)?;
        Ok(ImportProfile {
            id: self.id,
            name: self.name,
            description: self.description,
            required_tags: tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<RawProfileRow> {
    Ok(RawProfileRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        tags_json: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
