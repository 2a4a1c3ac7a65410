// ==========================================
// LoRaWAN 设备管理 - 设备导入 Trait
// ==========================================
// 职责: 定义导入管道各阶段接口（不包含实现）
// 管道: 解析 → 校验 → 下发 → 撤销日志
// ==========================================

use crate::domain::import::{
    BulkOperationReport, ImportProfile, ImportRequest, ImportRunReport, ParsedRow,
    RegistrySnapshot, Upload, ValidationVerdict,
};
use crate::domain::types::FileFormat;
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

// ==========================================
// DeviceImporter Trait
// ==========================================
// 用途: 设备导入主接口
// 实现者: DeviceImporterImpl
#[async_trait]
pub trait DeviceImporter: Send + Sync {
    /// 导入上传文件中的设备
    ///
    /// # 参数
    /// - upload: 上传载荷（字节 + 声明格式/文件名）
    /// - request: 规则集 ID 与目标应用/设备配置
    /// - cancel: 取消令牌（已下发的调用会完成，未下发行记为 Skipped）
    ///
    /// # 返回
    /// - Ok(ImportRunReport): 每行一个结果，顺序与文件一致
    /// - Err: 载荷过大、规则集不存在、文件格式错误、快照获取失败
    ///
    /// # 导入流程
    /// 1. 载荷大小检查
    /// 2. 读取规则集
    /// 3. 文件解析
    /// 4. 拉取注册中心快照（一次）
    /// 5. 行校验
    /// 6. 下发创建 + 记录撤销日志
    async fn import_upload(
        &self,
        upload: Upload,
        request: &ImportRequest,
        cancel: &CancellationToken,
    ) -> ImportResult<ImportRunReport>;

    /// 仅解析并校验（不调用注册中心）
    async fn validate_upload(
        &self,
        upload: &Upload,
        profile_id: &str,
        snapshot: &RegistrySnapshot,
    ) -> ImportResult<Vec<ValidationVerdict>>;

    /// 撤销一次导入：删除该次导入创建的全部设备
    ///
    /// # 返回
    /// - Err(ImportError::RunNotFound): run_id 未知或已过期
    async fn undo(&self, run_id: &str, cancel: &CancellationToken)
        -> ImportResult<BulkOperationReport>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口（阶段 0）
// 实现者: CsvParser, ExcelParser, UniversalFileParser
pub trait FileParser: Send + Sync {
    /// 解析文件字节为有序行记录
    ///
    /// # 返回
    /// - Ok(Vec<ParsedRow>): 行记录列表（不含表头）
    /// - Err: 编码错误、格式错误、缺少表头
    fn parse(&self, bytes: &[u8], format: FileFormat) -> ImportResult<Vec<ParsedRow>>;
}

// ==========================================
// RowValidator Trait
// ==========================================
// 用途: 行校验接口（阶段 1，纯函数，不访问注册中心）
// 实现者: DeviceRowValidator
pub trait RowValidator: Send + Sync {
    /// 校验全部行
    ///
    /// # 返回
    /// - 每行一个结论，verdicts[i].row_index == rows[i].index
    fn validate(
        &self,
        rows: &[ParsedRow],
        profile: &ImportProfile,
        snapshot: &RegistrySnapshot,
    ) -> Vec<ValidationVerdict>;
}

// ==========================================
// ConflictHandler Trait
// ==========================================
// 用途: 冲突检测接口
// 实现者: ConflictHandler
pub trait ConflictHandler: Send + Sync {
    /// 检测同批次内重复 devEui
    ///
    /// # 参数
    /// - candidates: (行号, 规范化 devEui)
    ///
    /// # 返回
    /// - Vec<(行号, devEui)>: 重复记录列表（不包括第一次出现）
    fn detect_duplicates(&self, candidates: &[(usize, String)]) -> Vec<(usize, String)>;

    /// 检测注册中心已存在的 devEui
    fn detect_registered(
        &self,
        candidates: &[(usize, String)],
        snapshot: &RegistrySnapshot,
    ) -> Vec<(usize, String)>;
}
