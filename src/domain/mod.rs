// ==========================================
// LoRaWAN 设备管理 - 领域模型层
// ==========================================
// 职责: 定义设备、导入运行、行结果等领域实体与类型
// 约束: 不含数据访问逻辑，不含注册中心调用
// ==========================================

pub mod device;
pub mod import;
pub mod types;

// 重导出核心类型
pub use device::{DeviceRecord, DeviceSpec, ImportTarget, NormalizedDevice, TagSet};
pub use import::{
    normalize_tag_names, BulkOperationReport, BulkOperationResult, ImportProfile, ImportRequest,
    ImportRun, ImportRunReport, OutcomeError, OutcomeSummary, ParsedRow, RegistrySnapshot,
    RowError, RowErrorKind, RowOutcome, UndoAction, UndoEntry, Upload, ValidationVerdict,
};
pub use types::{
    FileFormat, OperationKind, RaggedRowPolicy, RegistryErrorKind, RowStatus, TagUpdateMode,
};
