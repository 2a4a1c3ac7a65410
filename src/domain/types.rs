// ==========================================
// LoRaWAN 设备管理 - 领域类型定义
// ==========================================
// 职责: 导入/批量变更共用的枚举类型
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 行结果状态 (Row Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowStatus {
    Succeeded, // 已写入注册中心
    Failed,    // 注册中心调用失败
    Skipped,   // 未下发（校验失败/取消/上游不可用）
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowStatus::Succeeded => write!(f, "SUCCEEDED"),
            RowStatus::Failed => write!(f, "FAILED"),
            RowStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

// ==========================================
// 批量操作类型 (Operation Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Delete,
    Migrate,
    ChangeProfile,
    UpdateTags,
    Undo, // 撤销导入（按撤销日志删除）
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Delete => write!(f, "DELETE"),
            OperationKind::Migrate => write!(f, "MIGRATE"),
            OperationKind::ChangeProfile => write!(f, "CHANGE_PROFILE"),
            OperationKind::UpdateTags => write!(f, "UPDATE_TAGS"),
            OperationKind::Undo => write!(f, "UNDO"),
        }
    }
}

// ==========================================
// 注册中心错误分类 (Registry Error Kind)
// ==========================================
// 行级失败原因，随 RowOutcome 一并返回调用方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryErrorKind {
    Conflict,
    Invalid,
    NotFound,
    TargetInvalid,
    Timeout,
    Unreachable,
}

impl fmt::Display for RegistryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryErrorKind::Conflict => write!(f, "CONFLICT"),
            RegistryErrorKind::Invalid => write!(f, "INVALID"),
            RegistryErrorKind::NotFound => write!(f, "NOT_FOUND"),
            RegistryErrorKind::TargetInvalid => write!(f, "TARGET_INVALID"),
            RegistryErrorKind::Timeout => write!(f, "TIMEOUT"),
            RegistryErrorKind::Unreachable => write!(f, "UNREACHABLE"),
        }
    }
}

// ==========================================
// 上传文件格式 (File Format)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileFormat {
    Delimited, // CSV / TSV / 分号分隔
    Xlsx,
    Xls,
}

impl FileFormat {
    /// 按扩展名推断格式（不区分大小写）
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "tsv" | "txt" => Some(FileFormat::Delimited),
            "xlsx" | "xlsm" => Some(FileFormat::Xlsx),
            "xls" => Some(FileFormat::Xls),
            _ => None,
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Delimited => write!(f, "DELIMITED"),
            FileFormat::Xlsx => write!(f, "XLSX"),
            FileFormat::Xls => write!(f, "XLS"),
        }
    }
}

// ==========================================
// 参差行处理策略 (Ragged Row Policy)
// ==========================================
// 序列化格式与 config_kv 中的取值一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaggedRowPolicy {
    /// 短行补空串，长行截断到表头列数
    #[default]
    PadOrTruncate,
    /// 列数与表头不一致即判定文件格式错误
    Reject,
}

impl RaggedRowPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PAD_OR_TRUNCATE" => Some(RaggedRowPolicy::PadOrTruncate),
            "REJECT" => Some(RaggedRowPolicy::Reject),
            _ => None,
        }
    }
}

impl fmt::Display for RaggedRowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaggedRowPolicy::PadOrTruncate => write!(f, "PAD_OR_TRUNCATE"),
            RaggedRowPolicy::Reject => write!(f, "REJECT"),
        }
    }
}

// ==========================================
// 标签更新方式 (Tag Update Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagUpdateMode {
    /// 按键覆盖，未提供的键保持不变
    #[default]
    Merge,
    /// 提供的标签集整体替换原标签集
    Replace,
}
