// ==========================================
// LoRaWAN 设备管理 - 导入引擎配置快照
// ==========================================
// 职责: 一次性读取 ImportConfigReader，得到运行期不可变的配置
// ==========================================

use crate::config::config_manager::defaults;
use crate::config::import_config_trait::ImportConfigReader;
use crate::domain::types::RaggedRowPolicy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;

/// 导入/批量变更引擎配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSettings {
    /// 上传文件大小上限（字节）
    pub max_upload_bytes: usize,

    /// 参差行处理策略
    pub ragged_row_policy: RaggedRowPolicy,

    /// 标签列前缀
    pub tag_column_prefix: String,

    /// 调度参数
    pub dispatch: DispatchPolicy,

    /// 撤销日志保留时长（小时）
    pub undo_retention_hours: i64,

    /// 撤销日志最多保留的运行数
    pub max_retained_runs: usize,
}

/// 注册中心调用调度参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchPolicy {
    /// 并发调用上限
    pub max_in_flight: usize,

    /// 单次调用超时
    pub call_timeout: Duration,

    /// 熔断阈值（连续不可达/超时次数）
    pub unreachable_threshold: usize,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_in_flight: defaults::MAX_IN_FLIGHT,
            call_timeout: Duration::from_millis(defaults::CALL_TIMEOUT_MS),
            unreachable_threshold: defaults::UNREACHABLE_THRESHOLD,
        }
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
            ragged_row_policy: RaggedRowPolicy::default(),
            tag_column_prefix: defaults::TAG_COLUMN_PREFIX.to_string(),
            dispatch: DispatchPolicy::default(),
            undo_retention_hours: defaults::UNDO_RETENTION_HOURS,
            max_retained_runs: defaults::MAX_RETAINED_RUNS,
        }
    }
}

impl ImportSettings {
    /// 从配置读取器加载
    pub async fn load<C>(reader: &C) -> Result<Self, Box<dyn Error + Send + Sync>>
    where
        C: ImportConfigReader + ?Sized,
    {
        let settings = Self {
            max_upload_bytes: reader.get_max_upload_bytes().await?,
            ragged_row_policy: reader.get_ragged_row_policy().await?,
            tag_column_prefix: reader.get_tag_column_prefix().await?,
            dispatch: DispatchPolicy {
                max_in_flight: reader.get_max_in_flight().await?,
                call_timeout: Duration::from_millis(reader.get_call_timeout_ms().await?),
                unreachable_threshold: reader.get_unreachable_threshold().await?,
            },
            undo_retention_hours: reader.get_undo_retention_hours().await?,
            max_retained_runs: reader.get_max_retained_runs().await?,
        };

        tracing::debug!(settings = ?settings, "导入配置加载完成");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config_manager::{config_keys, ConfigManager};
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_load_from_config_manager() {
        let temp_file = NamedTempFile::new().unwrap();
        let manager = ConfigManager::new(temp_file.path().to_str().unwrap()).unwrap();
        manager
            .set_global_config_value(config_keys::CALL_TIMEOUT_MS, "250")
            .unwrap();
        manager
            .set_global_config_value(config_keys::UNDO_RETENTION_HOURS, "2")
            .unwrap();

        let settings = ImportSettings::load(&manager).await.unwrap();

        assert_eq!(settings.dispatch.call_timeout, Duration::from_millis(250));
        assert_eq!(settings.undo_retention_hours, 2);
        assert_eq!(settings.dispatch.max_in_flight, defaults::MAX_IN_FLIGHT);
        assert_eq!(settings.max_upload_bytes, defaults::MAX_UPLOAD_BYTES);
    }
}
