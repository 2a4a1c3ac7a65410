// ==========================================
// LoRaWAN 设备管理 - 文件解析器实现
// ==========================================
// 阶段 0: 上传字节 → 有序行记录
// 支持: 分隔文本 (逗号/分号/Tab) / Excel (.xlsx/.xls)
// ==========================================

use crate::domain::import::{ParsedRow, Upload};
use crate::domain::types::{FileFormat, RaggedRowPolicy};
use crate::importer::device_importer_trait::FileParser;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::row_validator::column_key;
use calamine::{Data, Range, Reader, Xls, Xlsx};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

/// 分隔符候选（顺序即平局时的优先级）
const DELIMITER_CANDIDATES: [u8; 3] = [b',', b';', b'\t'];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// 用首行推断分隔符：切分列数最多者胜出，平局取逗号
pub fn detect_delimiter(first_line: &str) -> u8 {
    let mut best = DELIMITER_CANDIDATES[0];
    let mut best_columns = 0;

    for candidate in DELIMITER_CANDIDATES {
        let columns = first_line.split(candidate as char).count();
        if columns > best_columns {
            best = candidate;
            best_columns = columns;
        }
    }

    best
}

/// 将表头 + 数据行整理为 ParsedRow
///
/// # 参数
/// - rows: (源文件行号, 单元格) 序列，第一个非空白记录为表头
/// - policy: 参差行处理策略
///
/// # 说明
/// - 单元格已 TRIM
/// - 完全空白的记录跳过（表头之前与之后均如此），不占用 index
/// - 规范化后同名的表头列视为格式错误
fn tabulate<I>(rows: I, policy: RaggedRowPolicy) -> ImportResult<Vec<ParsedRow>>
where
    I: Iterator<Item = (usize, Vec<String>)>,
{
    let mut rows = rows.filter(|(_, cells)| cells.iter().any(|v| !v.is_empty()));

    let (_, headers) = rows.next().ok_or(ImportError::MissingHeader)?;
    check_duplicate_columns(&headers)?;

    let width = headers.len();
    let mut parsed = Vec::new();

    for (source_line, mut cells) in rows {
        if cells.len() != width {
            match policy {
                RaggedRowPolicy::Reject => {
                    return Err(ImportError::RaggedRow {
                        row: source_line,
                        expected: width,
                        actual: cells.len(),
                    });
                }
                RaggedRowPolicy::PadOrTruncate => {
                    cells.resize(width, String::new());
                }
            }
        }

        let fields: HashMap<String, String> = headers.iter().cloned().zip(cells).collect();
        parsed.push(ParsedRow {
            index: parsed.len(),
            fields,
        });
    }

    Ok(parsed)
}

/// 表头列名按 column_key 规范化后不得重复（空列名不参与）
fn check_duplicate_columns(headers: &[String]) -> ImportResult<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for header in headers.iter().filter(|h| !h.is_empty()) {
        if let Some(first) = seen.insert(column_key(header), header) {
            return Err(ImportError::DuplicateColumn {
                first: first.to_string(),
                second: header.clone(),
            });
        }
    }
    Ok(())
}

/// 是否含分隔符与空白以外的内容
fn has_content(line: &str) -> bool {
    line.chars()
        .any(|c| !c.is_whitespace() && !DELIMITER_CANDIDATES.iter().any(|d| *d as char == c))
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser {
    ragged_policy: RaggedRowPolicy,
}

impl CsvParser {
    pub fn new(ragged_policy: RaggedRowPolicy) -> Self {
        Self { ragged_policy }
    }
}

impl FileParser for CsvParser {
    fn parse(&self, bytes: &[u8], _format: FileFormat) -> ImportResult<Vec<ParsedRow>> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let text =
            std::str::from_utf8(bytes).map_err(|e| ImportError::EncodingError(e.to_string()))?;

        let first_line = text
            .lines()
            .find(|line| has_content(line))
            .ok_or(ImportError::MissingHeader)?;
        let delimiter = detect_delimiter(first_line);
        tracing::debug!(delimiter = %(delimiter as char).escape_default(), "分隔符推断完成");

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致，由 ragged_policy 决定
            .delimiter(delimiter)
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        for (record_idx, result) in reader.records().enumerate() {
            let record = result?;
            let source_line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(record_idx + 1);
            let cells: Vec<String> = record.iter().map(|v| v.trim().to_string()).collect();
            rows.push((source_line, cells));
        }

        tabulate(rows.into_iter(), self.ragged_policy)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser {
    ragged_policy: RaggedRowPolicy,
}

impl ExcelParser {
    pub fn new(ragged_policy: RaggedRowPolicy) -> Self {
        Self { ragged_policy }
    }
}

impl FileParser for ExcelParser {
    fn parse(&self, bytes: &[u8], format: FileFormat) -> ImportResult<Vec<ParsedRow>> {
        let cursor = Cursor::new(bytes);

        // 读取第一个 sheet
        let range = match format {
            FileFormat::Xlsx => {
                let mut workbook: Xlsx<_> = Xlsx::new(cursor)?;
                let sheet_name = first_sheet_name(workbook.sheet_names())?;
                workbook.worksheet_range(&sheet_name)?
            }
            FileFormat::Xls => {
                let mut workbook: Xls<_> = Xls::new(cursor)?;
                let sheet_name = first_sheet_name(workbook.sheet_names())?;
                workbook.worksheet_range(&sheet_name)?
            }
            FileFormat::Delimited => {
                return Err(ImportError::UnsupportedFormat(format.to_string()));
            }
        };

        tabulate(range_rows(&range), self.ragged_policy)
    }
}

fn first_sheet_name(sheet_names: Vec<String>) -> ImportResult<String> {
    sheet_names
        .into_iter()
        .next()
        .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))
}

fn range_rows(range: &Range<Data>) -> impl Iterator<Item = (usize, Vec<String>)> + '_ {
    range.rows().enumerate().map(|(idx, row)| {
        let cells = row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();
        (idx + 1, cells)
    })
}

// ==========================================
// 通用文件解析器（按声明格式/扩展名/文件头选择）
// ==========================================
pub struct UniversalFileParser {
    csv: CsvParser,
    excel: ExcelParser,
}

impl UniversalFileParser {
    pub fn new(ragged_policy: RaggedRowPolicy) -> Self {
        Self {
            csv: CsvParser::new(ragged_policy),
            excel: ExcelParser::new(ragged_policy),
        }
    }

    /// 确定上传文件格式
    ///
    /// 优先级: 声明格式 → 文件扩展名 → 文件头魔数 → 分隔文本
    pub fn resolve_format(upload: &Upload) -> ImportResult<FileFormat> {
        if let Some(format) = upload.declared_format {
            return Ok(format);
        }

        if let Some(name) = &upload.file_name {
            if let Some(ext) = Path::new(name).extension().and_then(|e| e.to_str()) {
                return FileFormat::from_extension(ext)
                    .ok_or_else(|| ImportError::UnsupportedFormat(ext.to_string()));
            }
        }

        if upload.bytes.starts_with(ZIP_MAGIC) {
            Ok(FileFormat::Xlsx)
        } else if upload.bytes.starts_with(OLE2_MAGIC) {
            Ok(FileFormat::Xls)
        } else {
            Ok(FileFormat::Delimited)
        }
    }
}

impl FileParser for UniversalFileParser {
    fn parse(&self, bytes: &[u8], format: FileFormat) -> ImportResult<Vec<ParsedRow>> {
        match format {
            FileFormat::Delimited => self.csv.parse(bytes, format),
            FileFormat::Xlsx | FileFormat::Xls => self.excel.parse(bytes, format),
        }
    }
}
