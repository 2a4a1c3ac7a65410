// ==========================================
// LoRaWAN 设备管理 - 核心库
// ==========================================
// 职责: 设备批量导入 / 批量变更 / 撤销
// 技术栈: Rust + SQLite + tokio
// 外部依赖: 设备注册中心（通过 RegistryClient 注入）
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 导入规则集
pub mod repository;

// 注册中心边界
pub mod registry;

// 引擎层 - 调度与批量变更
pub mod engine;

// 导入层 - 上传文件
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    FileFormat, OperationKind, RaggedRowPolicy, RegistryErrorKind, RowStatus, TagUpdateMode,
};

// 领域实体
pub use domain::{
    BulkOperationReport, BulkOperationResult, DeviceRecord, DeviceSpec, ImportProfile,
    ImportRequest, ImportRun, ImportRunReport, ImportTarget, OutcomeError, RowOutcome, TagSet,
    Upload, ValidationVerdict,
};

// 引擎
pub use engine::{BulkMutationEngine, Dispatcher};

// 导入
pub use importer::{DeviceImporter, DeviceImporterImpl, ImportError};

// 注册中心
pub use registry::{InMemoryRegistry, RegistryClient, RegistryError};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "LoRaWAN 设备管理";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
