// ==========================================
// LoRaWAN 设备管理 - 导入层
// ==========================================
// 职责: 上传文件 → 注册中心设备，支持撤销
// 支持: Excel (.xlsx/.xls), 分隔文本 (CSV/TSV)
// ==========================================

// 模块声明
pub mod conflict_handler;
pub mod device_importer_impl;
pub mod device_importer_trait;
pub mod error;
pub mod file_parser;
pub mod import_executor;
pub mod row_validator;
pub mod undo_log;

// 重导出核心类型
pub use conflict_handler::ConflictHandler as ConflictHandlerImpl;
pub use device_importer_impl::DeviceImporterImpl;
pub use error::{ImportError, ImportResult};
pub use file_parser::{detect_delimiter, CsvParser, ExcelParser, UniversalFileParser};
pub use import_executor::ImportExecutor;
pub use row_validator::{column_key, DeviceRowValidator};
pub use undo_log::UndoLogStore;

// 重导出 Trait 接口
pub use device_importer_trait::{ConflictHandler, DeviceImporter, FileParser, RowValidator};
