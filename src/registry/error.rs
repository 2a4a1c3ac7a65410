// ==========================================
// LoRaWAN 设备管理 - 注册中心错误类型
// ==========================================
// 职责: 注册中心边界的带标签错误，调用方按变体区分
//       NotFound 与其他失败，不做错误消息字符串匹配
// 工具: thiserror 派生宏
// ==========================================

use crate::domain::types::RegistryErrorKind;
use std::time::Duration;
use thiserror::Error;

/// 注册中心错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("设备已存在: {0}")]
    Conflict(String),

    #[error("请求无效: {0}")]
    Invalid(String),

    #[error("设备不存在: {0}")]
    NotFound(String),

    #[error("目标无效: {0}")]
    TargetInvalid(String),

    #[error("调用超时 ({}ms)", .0.as_millis())]
    Timeout(Duration),

    #[error("注册中心不可达: {0}")]
    Unreachable(String),
}

impl RegistryError {
    pub fn kind(&self) -> RegistryErrorKind {
        match self {
            RegistryError::Conflict(_) => RegistryErrorKind::Conflict,
            RegistryError::Invalid(_) => RegistryErrorKind::Invalid,
            RegistryError::NotFound(_) => RegistryErrorKind::NotFound,
            RegistryError::TargetInvalid(_) => RegistryErrorKind::TargetInvalid,
            RegistryError::Timeout(_) => RegistryErrorKind::Timeout,
            RegistryError::Unreachable(_) => RegistryErrorKind::Unreachable,
        }
    }

    /// 是否属于上游整体故障（计入熔断的连续失败次数）
    pub fn is_upstream_failure(&self) -> bool {
        matches!(self, RegistryError::Timeout(_) | RegistryError::Unreachable(_))
    }
}

/// Result 类型别名
pub type RegistryResult<T> = Result<T, RegistryError>;
