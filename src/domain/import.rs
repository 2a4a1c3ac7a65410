// ==========================================
// LoRaWAN 设备管理 - 导入/批量变更实体
// ==========================================
// 职责: 解析行、校验结论、行结果、导入运行、批量结果
// 约定: outcomes[i].row_index == i，与输入顺序一致
// ==========================================

use crate::domain::device::{ImportTarget, NormalizedDevice};
use crate::domain::types::{FileFormat, OperationKind, RegistryErrorKind, RowStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

// ==========================================
// ImportProfile - 导入规则集
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required_tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportProfile {
    /// 构造新规则集（标签名去空白，空名丢弃）
    pub fn new<I, S>(id: impl Into<String>, name: impl Into<String>, required_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            required_tags: normalize_tag_names(required_tags),
            created_at: now,
            updated_at: now,
        }
    }
}

/// 标签名规范化：TRIM + 小写，丢弃空名，去重
pub fn normalize_tag_names<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

// ==========================================
// Upload - 上传载荷
// ==========================================
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
    pub declared_format: Option<FileFormat>,
}

impl Upload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: None,
            bytes: bytes.into(),
            declared_format: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.declared_format = Some(format);
        self
    }
}

// ==========================================
// ImportRequest - 导入请求（规则集 + 目标）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub profile_id: String,
    pub target: ImportTarget,
}

impl ImportRequest {
    pub fn new(
        profile_id: impl Into<String>,
        application_id: impl Into<String>,
        device_profile_id: impl Into<String>,
    ) -> Self {
        Self {
            profile_id: profile_id.into(),
            target: ImportTarget {
                application_id: application_id.into(),
                device_profile_id: device_profile_id.into(),
            },
        }
    }
}

// ==========================================
// ParsedRow - 解析后的原始行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRow {
    pub index: usize,                    // 数据行序号（0 起，不含表头）
    pub fields: HashMap<String, String>, // 列名 → 原始值
}

// ==========================================
// RegistrySnapshot - 注册中心现有设备快照
// ==========================================
// 每次导入只拉取一次，校验期间只读
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    dev_euis: HashSet<String>,
}

impl RegistrySnapshot {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            dev_euis: ids
                .into_iter()
                .map(|id| id.as_ref().trim().to_ascii_uppercase())
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// 判断 devEui 是否已注册（大小写不敏感）
    pub fn contains(&self, dev_eui: &str) -> bool {
        self.dev_euis.contains(&dev_eui.to_ascii_uppercase())
    }

    pub fn len(&self) -> usize {
        self.dev_euis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dev_euis.is_empty()
    }
}

// ==========================================
// RowError - 行级校验错误
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowErrorKind {
    MissingField,      // 必填列缺失或为空
    InvalidHex,        // 含非十六进制字符
    InvalidLength,     // 十六进制长度不符
    MissingTag,        // 缺少规则集要求的标签
    AlreadyRegistered, // 注册中心已存在
    DuplicateInBatch,  // 同批次内重复
}

impl RowErrorKind {
    /// 结构性错误（存在时跳过注册中心冲突与批内重复检查）
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            RowErrorKind::MissingField | RowErrorKind::InvalidHex | RowErrorKind::InvalidLength
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub field: String,
    pub kind: RowErrorKind,
    pub message: String,
}

// ==========================================
// ValidationVerdict - 行校验结论
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    pub row_index: usize,
    pub valid: bool,
    pub normalized: Option<NormalizedDevice>,
    pub errors: Vec<RowError>,
}

impl ValidationVerdict {
    pub fn has_error(&self, kind: RowErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }
}

// ==========================================
// OutcomeError - 行结果错误
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeError {
    /// 校验未通过，未下发
    Validation { errors: Vec<RowError> },
    /// 注册中心调用失败
    Registry {
        kind: RegistryErrorKind,
        message: String,
    },
    /// 调用方取消，未下发
    Cancelled,
    /// 注册中心连续不可达，熔断后未下发
    UpstreamUnavailable,
}

// ==========================================
// RowOutcome - 行结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowOutcome {
    pub row_index: usize,
    pub status: RowStatus,
    pub registry_device_id: Option<String>,
    pub error: Option<OutcomeError>,
}

impl RowOutcome {
    pub fn succeeded(row_index: usize, registry_device_id: impl Into<String>) -> Self {
        Self {
            row_index,
            status: RowStatus::Succeeded,
            registry_device_id: Some(registry_device_id.into()),
            error: None,
        }
    }

    pub fn failed(
        row_index: usize,
        registry_device_id: Option<String>,
        kind: RegistryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            row_index,
            status: RowStatus::Failed,
            registry_device_id,
            error: Some(OutcomeError::Registry {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn skipped(row_index: usize, registry_device_id: Option<String>, error: OutcomeError) -> Self {
        Self {
            row_index,
            status: RowStatus::Skipped,
            registry_device_id,
            error: Some(error),
        }
    }

    /// 注册中心错误分类（仅 Failed 行有值）
    pub fn registry_error_kind(&self) -> Option<RegistryErrorKind> {
        match &self.error {
            Some(OutcomeError::Registry { kind, .. }) => Some(*kind),
            _ => None,
        }
    }
}

// ==========================================
// 撤销日志
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UndoAction {
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoEntry {
    pub registry_device_id: String,
    pub action: UndoAction,
}

// ==========================================
// ImportRun - 一次导入运行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRun {
    pub run_id: String,
    pub profile_id: String,
    pub created_at: DateTime<Utc>,
    pub outcomes: Vec<RowOutcome>,
    pub undo_log: Vec<UndoEntry>,
}

impl ImportRun {
    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary::from_outcomes(&self.outcomes)
    }
}

// ==========================================
// BulkOperationResult - 批量变更结果（不落库）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperationResult {
    pub operation_kind: OperationKind,
    pub outcomes: Vec<RowOutcome>,
}

impl BulkOperationResult {
    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary::from_outcomes(&self.outcomes)
    }
}

// ==========================================
// OutcomeSummary - 结果汇总
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl OutcomeSummary {
    pub fn from_outcomes(outcomes: &[RowOutcome]) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            match outcome.status {
                RowStatus::Succeeded => summary.succeeded += 1,
                RowStatus::Failed => summary.failed += 1,
                RowStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }
}

// ==========================================
// 返回调用方的报告载荷
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRunReport {
    pub run_id: String,
    pub profile_id: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub outcomes: Vec<RowOutcome>,
}

impl From<ImportRun> for ImportRunReport {
    fn from(run: ImportRun) -> Self {
        let summary = run.summary();
        Self {
            run_id: run.run_id,
            profile_id: run.profile_id,
            total: summary.total,
            succeeded: summary.succeeded,
            failed: summary.failed,
            skipped: summary.skipped,
            outcomes: run.outcomes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperationReport {
    pub operation_kind: OperationKind,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub outcomes: Vec<RowOutcome>,
}

impl From<BulkOperationResult> for BulkOperationReport {
    fn from(result: BulkOperationResult) -> Self {
        let summary = result.summary();
        Self {
            operation_kind: result.operation_kind,
            total: summary.total,
            succeeded: summary.succeeded,
            failed: summary.failed,
            skipped: summary.skipped,
            outcomes: result.outcomes,
        }
    }
}
