// ==========================================
// LoRaWAN 设备管理 - 设备导入器实现
// ==========================================
// 职责: 整合导入流程，从上传文件到注册中心
// 流程: 大小检查 → 规则集 → 解析 → 快照 → 校验 → 下发 → 撤销日志
// ==========================================

use crate::config::{ImportConfigReader, ImportSettings};
use crate::domain::import::{
    BulkOperationReport, ImportProfile, ImportRequest, ImportRunReport, ParsedRow,
    RegistrySnapshot, Upload, ValidationVerdict,
};
use crate::engine::bulk_mutation::BulkMutationEngine;
use crate::importer::device_importer_trait::{DeviceImporter, FileParser, RowValidator};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::import_executor::ImportExecutor;
use crate::importer::row_validator::DeviceRowValidator;
use crate::importer::undo_log::UndoLogStore;
use crate::registry::RegistryClient;
use crate::repository::{ImportProfileStore, RepositoryError};
use async_trait::async_trait;
use chrono::Utc;
use std::error::Error;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

// ==========================================
// DeviceImporterImpl - 设备导入器实现
// ==========================================
pub struct DeviceImporterImpl<P>
where
    P: ImportProfileStore,
{
    // 规则集存储
    profiles: P,

    // 注册中心
    registry: Arc<dyn RegistryClient>,

    // 配置快照
    settings: ImportSettings,

    // 导入组件
    file_parser: Box<dyn FileParser>,
    row_validator: Box<dyn RowValidator>,
    executor: ImportExecutor,

    // 撤销
    bulk_engine: BulkMutationEngine,
    undo_store: UndoLogStore,
}

impl<P> DeviceImporterImpl<P>
where
    P: ImportProfileStore,
{
    /// 使用默认组件创建导入器
    pub fn new(profiles: P, registry: Arc<dyn RegistryClient>, settings: ImportSettings) -> Self {
        let file_parser = Box::new(UniversalFileParser::new(settings.ragged_row_policy));
        let row_validator = Box::new(DeviceRowValidator::new(
            settings.tag_column_prefix.clone(),
        ));
        Self::with_components(profiles, registry, settings, file_parser, row_validator)
    }

    /// 使用自定义解析器/校验器创建导入器
    pub fn with_components(
        profiles: P,
        registry: Arc<dyn RegistryClient>,
        settings: ImportSettings,
        file_parser: Box<dyn FileParser>,
        row_validator: Box<dyn RowValidator>,
    ) -> Self {
        Self {
            executor: ImportExecutor::new(registry.clone(), settings.dispatch),
            bulk_engine: BulkMutationEngine::new(registry.clone(), settings.dispatch),
            undo_store: UndoLogStore::new(
                settings.undo_retention_hours,
                settings.max_retained_runs,
            ),
            profiles,
            registry,
            settings,
            file_parser,
            row_validator,
        }
    }

    /// 从配置读取器加载设置后创建导入器
    pub async fn from_config<C>(
        profiles: P,
        registry: Arc<dyn RegistryClient>,
        config: &C,
    ) -> Result<Self, Box<dyn Error + Send + Sync>>
    where
        C: ImportConfigReader + ?Sized,
    {
        let settings = ImportSettings::load(config).await?;
        Ok(Self::new(profiles, registry, settings))
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    fn check_size(&self, upload: &Upload) -> ImportResult<()> {
        let size = upload.bytes.len();
        let limit = self.settings.max_upload_bytes;
        if size > limit {
            warn!(size, limit, "上传文件超过大小上限");
            return Err(ImportError::PayloadTooLarge { size, limit });
        }
        Ok(())
    }

    fn load_profile(&self, profile_id: &str) -> ImportResult<ImportProfile> {
        self.profiles.get(profile_id).map_err(|e| match e {
            RepositoryError::NotFound { .. } => ImportError::ProfileNotFound(profile_id.to_string()),
            other => ImportError::Repository(other),
        })
    }

    fn parse(&self, upload: &Upload) -> ImportResult<Vec<ParsedRow>> {
        let format = UniversalFileParser::resolve_format(upload)?;
        let rows = self.file_parser.parse(&upload.bytes, format)?;
        debug!(format = %format, rows = rows.len(), "文件解析完成");
        Ok(rows)
    }

    /// 拉取注册中心快照（每次导入一次）
    async fn fetch_snapshot(&self) -> ImportResult<RegistrySnapshot> {
        let call_timeout = self.settings.dispatch.call_timeout;
        let ids = match tokio::time::timeout(call_timeout, self.registry.list_device_ids()).await {
            Ok(Ok(ids)) => ids,
            Ok(Err(e)) => return Err(ImportError::RegistryUnavailable(e.to_string())),
            Err(_) => {
                return Err(ImportError::RegistryUnavailable(format!(
                    "调用超时 ({}ms)",
                    call_timeout.as_millis()
                )))
            }
        };
        debug!(registered = ids.len(), "注册中心快照获取完成");
        Ok(RegistrySnapshot::new(ids))
    }
}

#[async_trait]
impl<P> DeviceImporter for DeviceImporterImpl<P>
where
    P: ImportProfileStore,
{
    #[instrument(skip(self, upload, cancel), fields(profile_id = %request.profile_id))]
    async fn import_upload(
        &self,
        upload: Upload,
        request: &ImportRequest,
        cancel: &CancellationToken,
    ) -> ImportResult<ImportRunReport> {
        info!(
            file_name = upload.file_name.as_deref().unwrap_or("-"),
            size = upload.bytes.len(),
            "开始导入设备"
        );

        // === 阶段 0: 大小检查 + 规则集 ===
        self.check_size(&upload)?;
        let profile = self.load_profile(&request.profile_id)?;

        // === 阶段 1: 解析 ===
        let rows = self.parse(&upload)?;
        drop(upload);

        // === 阶段 2: 快照 + 校验 ===
        let snapshot = self.fetch_snapshot().await?;
        let verdicts = self.row_validator.validate(&rows, &profile, &snapshot);

        // === 阶段 3: 下发 ===
        let run = self
            .executor
            .execute(&verdicts, &profile.id, &request.target, cancel)
            .await;

        // === 阶段 4: 撤销日志 ===
        self.undo_store.purge_expired(Utc::now());
        self.undo_store.record(&run);

        let report = ImportRunReport::from(run);
        info!(
            run_id = %report.run_id,
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "设备导入完成"
        );
        Ok(report)
    }

    #[instrument(skip(self, upload, snapshot))]
    async fn validate_upload(
        &self,
        upload: &Upload,
        profile_id: &str,
        snapshot: &RegistrySnapshot,
    ) -> ImportResult<Vec<ValidationVerdict>> {
        self.check_size(upload)?;
        let profile = self.load_profile(profile_id)?;
        let rows = self.parse(upload)?;
        Ok(self.row_validator.validate(&rows, &profile, snapshot))
    }

    #[instrument(skip(self, cancel))]
    async fn undo(
        &self,
        run_id: &str,
        cancel: &CancellationToken,
    ) -> ImportResult<BulkOperationReport> {
        let entries = self
            .undo_store
            .entries(run_id, Utc::now())
            .ok_or_else(|| ImportError::RunNotFound(run_id.to_string()))?;

        info!(run_id = %run_id, entries = entries.len(), "开始撤销导入");
        let result = self.bulk_engine.undo_creations(&entries, cancel).await;
        Ok(BulkOperationReport::from(result))
    }
}
