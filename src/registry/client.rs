// ==========================================
// LoRaWAN 设备管理 - 注册中心客户端 Trait
// ==========================================
// 职责: 定义注册中心（如 ChirpStack）设备接口（不包含实现）
// 说明: 客户端句柄在构造时注入各组件，便于替换测试替身
// ==========================================

use crate::domain::device::{DeviceRecord, DeviceSpec, TagSet};
use crate::registry::error::RegistryResult;
use async_trait::async_trait;
use std::collections::HashSet;

// ==========================================
// RegistryClient Trait
// ==========================================
// 用途: 导入执行器、批量变更引擎共用的注册中心接口
// 实现者: InMemoryRegistry（离线/测试），外部网络客户端
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// 创建设备
    ///
    /// # 返回
    /// - Ok(String): 注册中心分配的设备 ID
    /// - Err: Conflict / Invalid / Unreachable
    async fn create_device(&self, spec: &DeviceSpec) -> RegistryResult<String>;

    /// 删除设备
    ///
    /// # 说明
    /// - NotFound 由调用方视为成功（已删除）
    async fn delete_device(&self, device_id: &str) -> RegistryResult<()>;

    /// 读取设备
    ///
    /// # 返回
    /// - Err: NotFound / Unreachable
    async fn get_device(&self, device_id: &str) -> RegistryResult<DeviceRecord>;

    /// 迁移到其他应用
    ///
    /// # 返回
    /// - Err: NotFound / TargetInvalid / Unreachable
    async fn set_application(&self, device_id: &str, application_id: &str) -> RegistryResult<()>;

    /// 更换设备配置
    ///
    /// # 返回
    /// - Err: NotFound / TargetInvalid / Unreachable
    async fn set_profile(&self, device_id: &str, device_profile_id: &str) -> RegistryResult<()>;

    /// 写入完整标签集（覆盖原标签集）
    ///
    /// # 返回
    /// - Err: NotFound / Unreachable
    async fn set_tags(&self, device_id: &str, tags: &TagSet) -> RegistryResult<()>;

    /// 列出全部设备标识（每次导入调用一次，用于构建冲突快照）
    async fn list_device_ids(&self) -> RegistryResult<HashSet<String>>;
}
