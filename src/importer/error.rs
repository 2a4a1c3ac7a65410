// ==========================================
// LoRaWAN 设备管理 - 导入模块错误类型
// ==========================================
// 说明: 本类型只承载“整次调用失败”的错误
//       （文件/规则集/撤销目标），行级错误进入 RowOutcome
// 工具: thiserror 派生宏
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 上传/文件格式错误（整次导入失败） =====
    #[error("上传文件过大: {size} 字节（上限 {limit} 字节）")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件编码错误: {0}（仅支持 UTF-8 文本）")]
    EncodingError(String),

    #[error("缺少表头行")]
    MissingHeader,

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("表头列重复: {first} 与 {second}")]
    DuplicateColumn { first: String, second: String },

    #[error("列数与表头不一致 (行 {row}): 期望 {expected} 列，实际 {actual} 列")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    // ===== 配置错误 =====
    #[error("导入规则集不存在: {0}")]
    ProfileNotFound(String),

    // ===== 注册中心 =====
    #[error("注册中心快照获取失败: {0}")]
    RegistryUnavailable(String),

    // ===== 撤销 =====
    #[error("导入运行不存在或已过期: {0}")]
    RunNotFound(String),

    // ===== 仓储 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ImportError {
    /// 是否为上传文件层面的格式错误
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ImportError::PayloadTooLarge { .. }
                | ImportError::UnsupportedFormat(_)
                | ImportError::EncodingError(_)
                | ImportError::MissingHeader
                | ImportError::CsvParseError(_)
                | ImportError::ExcelParseError(_)
                | ImportError::DuplicateColumn { .. }
                | ImportError::RaggedRow { .. }
        )
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::XlsxError>
impl From<calamine::XlsxError> for ImportError {
    fn from(err: calamine::XlsxError) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<calamine::XlsError>
impl From<calamine::XlsError> for ImportError {
    fn from(err: calamine::XlsError) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
