// ==========================================
// LoRaWAN 设备管理 - 配置层
// ==========================================
// 职责: 导入/批量变更引擎配置，支持数据库覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod import_settings;

// 重导出核心配置管理器
pub use config_manager::{config_keys, defaults, ConfigManager};
pub use import_config_trait::ImportConfigReader;
pub use import_settings::{DispatchPolicy, ImportSettings};
