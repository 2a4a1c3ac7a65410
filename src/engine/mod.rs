// ==========================================
// LoRaWAN 设备管理 - 引擎层
// ==========================================
// 职责: 注册中心调用调度、批量变更
// 红线: 行间相互独立，单行失败不回滚其他行
// ==========================================

pub mod bulk_mutation;
pub mod dispatcher;

// 重导出核心引擎
pub use bulk_mutation::BulkMutationEngine;
pub use dispatcher::{CallResult, DispatchReport, DispatchSlot, Dispatcher, HaltReason};
