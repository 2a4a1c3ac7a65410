// ==========================================
// LoRaWAN 设备管理 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入/批量变更引擎所需的配置读取接口（不包含实现）
// 约束: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::RaggedRowPolicy;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 上传限制 =====

    /// 获取上传文件大小上限（字节）
    ///
    /// # 默认值
    /// - 10 MiB
    async fn get_max_upload_bytes(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;

    /// 获取参差行处理策略
    ///
    /// # 默认值
    /// - PAD_OR_TRUNCATE
    async fn get_ragged_row_policy(&self) -> Result<RaggedRowPolicy, Box<dyn Error + Send + Sync>>;

    /// 获取标签列前缀（如 tag_site → 标签 site）
    ///
    /// # 默认值
    /// - "tag_"
    async fn get_tag_column_prefix(&self) -> Result<String, Box<dyn Error + Send + Sync>>;

    // ===== 并发与超时 =====

    /// 获取注册中心并发调用上限
    ///
    /// # 默认值
    /// - 8
    async fn get_max_in_flight(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;

    /// 获取单次注册中心调用超时（毫秒）
    ///
    /// # 默认值
    /// - 10000
    async fn get_call_timeout_ms(&self) -> Result<u64, Box<dyn Error + Send + Sync>>;

    /// 获取熔断阈值（连续不可达/超时次数）
    ///
    /// # 默认值
    /// - 5
    async fn get_unreachable_threshold(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;

    // ===== 撤销日志保留 =====

    /// 获取撤销日志保留时长（小时）
    ///
    /// # 默认值
    /// - 24
    async fn get_undo_retention_hours(&self) -> Result<i64, Box<dyn Error + Send + Sync>>;

    /// 获取撤销日志最多保留的运行数
    ///
    /// # 默认值
    /// - 256
    async fn get_max_retained_runs(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;
}
