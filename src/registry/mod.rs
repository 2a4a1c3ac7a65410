// ==========================================
// LoRaWAN 设备管理 - 注册中心边界
// ==========================================
// 职责: 注册中心客户端接口、错误类型、内存实现
// 说明: 鉴权凭据由外部预先注入，不在此处理
// ==========================================

pub mod client;
pub mod error;
pub mod memory;

pub use client::RegistryClient;
pub use error::{RegistryError, RegistryResult};
pub use memory::InMemoryRegistry;
