// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供临时数据库、故障注入注册中心、上传文件构造等功能
// ==========================================

#![allow(dead_code)]

use async_trait::async_trait;
use lorawan_admin::config::ImportSettings;
use lorawan_admin::db::{ensure_schema, open_sqlite_connection};
use lorawan_admin::domain::{DeviceRecord, DeviceSpec, ImportProfile, TagSet, Upload};
use lorawan_admin::importer::DeviceImporterImpl;
use lorawan_admin::registry::{InMemoryRegistry, RegistryClient, RegistryError, RegistryResult};
use lorawan_admin::repository::ImportProfileRepository;
use std::collections::HashSet;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

pub const APP_ID: &str = "app-1";
pub const DEVICE_PROFILE_ID: &str = "dp-1";
pub const APP_KEY: &str = "00112233445566778899AABBCCDDEEFF";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径非 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 第 n 个测试设备的 devEui（16 位大写十六进制）
pub fn dev_eui(n: usize) -> String {
    format!("{:016X}", n)
}

/// 构造 CSV 上传：表头 + 数据行
pub fn csv_upload(header: &str, rows: &[Vec<String>]) -> Upload {
    let mut text = String::from(header);
    text.push('\n');
    for row in rows {
        text.push_str(&row.join(","));
        text.push('\n');
    }
    Upload::new(text.into_bytes()).with_file_name("devices.csv")
}

/// n 行合法设备（devEui,appKey,tag_site）
pub fn valid_site_upload(n: usize) -> Upload {
    let rows: Vec<Vec<String>> = (1..=n)
        .map(|i| vec![dev_eui(i), APP_KEY.to_string(), "north".to_string()])
        .collect();
    csv_upload("devEui,appKey,tag_site", &rows)
}

/// 已注册设备记录
pub fn existing_device(dev_eui: &str) -> DeviceRecord {
    DeviceRecord {
        dev_eui: dev_eui.to_string(),
        name: dev_eui.to_string(),
        application_id: APP_ID.to_string(),
        device_profile_id: DEVICE_PROFILE_ID.to_string(),
        tags: TagSet::new(),
    }
}

/// 带默认应用/设备配置的内存注册中心
pub fn seeded_registry() -> InMemoryRegistry {
    InMemoryRegistry::new()
        .with_application(APP_ID)
        .with_application("app-2")
        .with_device_profile(DEVICE_PROFILE_ID)
        .with_device_profile("dp-2")
}

// ==========================================
// FlakyRegistry - 故障注入注册中心
// ==========================================
// 计数范围: 设备级调用（create/delete/get/set_*），不含 list_device_ids
#[derive(Debug, Default, Clone)]
pub struct FaultPlan {
    /// 每第 N 次调用返回 Unreachable
    pub unreachable_every: Option<usize>,
    /// 全部调用返回 Unreachable
    pub always_unreachable: bool,
    /// 每次调用前延迟
    pub delay: Option<Duration>,
    /// 第 N 次调用时触发取消
    pub cancel_on_call: Option<usize>,
    /// list_device_ids 失败
    pub list_unavailable: bool,
}

pub struct FlakyRegistry {
    inner: Arc<InMemoryRegistry>,
    plan: FaultPlan,
    calls: AtomicUsize,
    cancel: CancellationToken,
}

impl FlakyRegistry {
    pub fn new(inner: Arc<InMemoryRegistry>, plan: FaultPlan) -> Self {
        Self {
            inner,
            plan,
            calls: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// 与 cancel_on_call 配合使用的取消令牌
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn before_call(&self) -> RegistryResult<()> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if self.plan.cancel_on_call == Some(n) {
            self.cancel.cancel();
        }
        if let Some(delay) = self.plan.delay {
            tokio::time::sleep(delay).await;
        }
        if self.plan.always_unreachable {
            return Err(RegistryError::Unreachable("connection refused".to_string()));
        }
        if let Some(every) = self.plan.unreachable_every {
            if n % every == 0 {
                return Err(RegistryError::Unreachable(format!("第 {} 次调用注入故障", n)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryClient for FlakyRegistry {
    async fn create_device(&self, spec: &DeviceSpec) -> RegistryResult<String> {
        self.before_call().await?;
        self.inner.create_device(spec).await
    }

    async fn delete_device(&self, device_id: &str) -> RegistryResult<()> {
        self.before_call().await?;
        self.inner.delete_device(device_id).await
    }

    async fn get_device(&self, device_id: &str) -> RegistryResult<DeviceRecord> {
        self.before_call().await?;
        self.inner.get_device(device_id).await
    }

    async fn set_application(&self, device_id: &str, application_id: &str) -> RegistryResult<()> {
        self.before_call().await?;
        self.inner.set_application(device_id, application_id).await
    }

    async fn set_profile(&self, device_id: &str, device_profile_id: &str) -> RegistryResult<()> {
        self.before_call().await?;
        self.inner.set_profile(device_id, device_profile_id).await
    }

    async fn set_tags(&self, device_id: &str, tags: &TagSet) -> RegistryResult<()> {
        self.before_call().await?;
        self.inner.set_tags(device_id, tags).await
    }

    async fn list_device_ids(&self) -> RegistryResult<HashSet<String>> {
        if self.plan.list_unavailable {
            return Err(RegistryError::Unreachable("connection refused".to_string()));
        }
        self.inner.list_device_ids().await
    }
}

// ==========================================
// 导入器构造
// ==========================================
pub struct ImporterFixture {
    pub _temp_file: NamedTempFile,
    pub db_path: String,
    pub importer: DeviceImporterImpl<ImportProfileRepository>,
}

/// 创建导入器，并预置规则集 "site-profile"（要求标签 site）
pub fn create_importer(
    registry: Arc<dyn RegistryClient>,
    settings: ImportSettings,
) -> Result<ImporterFixture, Box<dyn Error>> {
    let (temp_file, db_path) = create_test_db()?;
    let profiles = ImportProfileRepository::new(&db_path)?;
    profiles.create(&ImportProfile::new("site-profile", "站点规则", vec!["site"]))?;

    Ok(ImporterFixture {
        _temp_file: temp_file,
        db_path,
        importer: DeviceImporterImpl::new(profiles, registry, settings),
    })
}
