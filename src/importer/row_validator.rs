// ==========================================
// LoRaWAN 设备管理 - 行校验器实现
// ==========================================
// 职责: 结构校验 / 规则集标签校验 / 注册中心冲突 / 批内重复
// 约束: 纯函数，不调用注册中心（只读快照）
// 规则: 行存在结构错误时，跳过冲突与重复检查
// ==========================================

use crate::domain::device::{NormalizedDevice, TagSet};
use crate::domain::import::{
    ImportProfile, ParsedRow, RegistrySnapshot, RowError, RowErrorKind, ValidationVerdict,
};
use crate::i18n::t_with_args;
use crate::importer::conflict_handler::ConflictHandler;
use crate::importer::device_importer_trait::{
    ConflictHandler as ConflictHandlerTrait, RowValidator,
};
use std::collections::HashMap;

// ===== 列名（规范化后） =====
const COL_DEV_EUI: &str = "deveui";
const COL_APP_KEY: &str = "appkey";
const COL_JOIN_EUI: &str = "joineui";
const COL_NWK_KEY: &str = "nwkkey";
const COL_NAME: &str = "name";
const COL_DESCRIPTION: &str = "description";

// ===== 十六进制长度 =====
const EUI_HEX_LEN: usize = 16;
const KEY_HEX_LEN: usize = 32;

/// 列名规范化：小写，忽略 `_` 与 `-`
pub fn column_key(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

pub struct DeviceRowValidator {
    tag_prefix: String,
    conflict_handler: Box<dyn ConflictHandlerTrait>,
}

impl DeviceRowValidator {
    pub fn new(tag_prefix: impl Into<String>) -> Self {
        Self::with_conflict_handler(tag_prefix, Box::new(ConflictHandler))
    }

    pub fn with_conflict_handler(
        tag_prefix: impl Into<String>,
        conflict_handler: Box<dyn ConflictHandlerTrait>,
    ) -> Self {
        Self {
            tag_prefix: tag_prefix.into().to_lowercase(),
            conflict_handler,
        }
    }

    /// 提取标签列（前缀与标签名均大小写不敏感，标签名统一小写）
    fn extract_tags(&self, row: &ParsedRow) -> TagSet {
        let mut tags = TagSet::new();
        for (column, value) in sorted_fields(row) {
            let column = column.trim().to_lowercase();
            let Some(tag_name) = column.strip_prefix(self.tag_prefix.as_str()) else {
                continue;
            };
            let tag_name = tag_name.trim();
            let value = value.trim();
            if !tag_name.is_empty() && !value.is_empty() {
                tags.entry(tag_name.to_string())
                    .or_insert_with(|| value.to_string());
            }
        }
        tags
    }

    /// 单行结构校验 + 规则集标签校验
    fn check_row(
        &self,
        row: &ParsedRow,
        profile: &ImportProfile,
    ) -> (Option<NormalizedDevice>, Vec<RowError>) {
        let mut columns: HashMap<String, &str> = HashMap::new();
        for (column, value) in sorted_fields(row) {
            columns.entry(column_key(column)).or_insert(value.trim());
        }
        let value_of = |key: &str| columns.get(key).copied().filter(|v| !v.is_empty());

        let mut errors = Vec::new();

        let dev_eui = check_hex(
            "devEui",
            value_of(COL_DEV_EUI),
            EUI_HEX_LEN,
            true,
            &mut errors,
        );
        let app_key = check_hex(
            "appKey",
            value_of(COL_APP_KEY),
            KEY_HEX_LEN,
            true,
            &mut errors,
        );
        let join_eui = check_hex(
            "joinEui",
            value_of(COL_JOIN_EUI),
            EUI_HEX_LEN,
            false,
            &mut errors,
        );
        let nwk_key = check_hex(
            "nwkKey",
            value_of(COL_NWK_KEY),
            KEY_HEX_LEN,
            false,
            &mut errors,
        );

        // 规则集必填标签
        let tags = self.extract_tags(row);
        for required in &profile.required_tags {
            if !tags.contains_key(required) {
                errors.push(RowError {
                    field: format!("{}{}", self.tag_prefix, required),
                    kind: RowErrorKind::MissingTag,
                    message: t_with_args("validation.missing_tag", &[("tag", required.as_str())]),
                });
            }
        }

        let normalized = match (dev_eui, app_key) {
            (Some(dev_eui), Some(app_key)) if !errors.iter().any(|e| e.kind.is_structural()) => {
                Some(NormalizedDevice {
                    dev_eui,
                    app_key,
                    join_eui,
                    nwk_key,
                    name: value_of(COL_NAME).map(str::to_string),
                    description: value_of(COL_DESCRIPTION).map(str::to_string),
                    tags,
                })
            }
            _ => None,
        };

        (normalized, errors)
    }
}

/// 按列名排序的字段（同一规范化列名出现多次时，排序靠前者生效）
fn sorted_fields(row: &ParsedRow) -> Vec<(&String, &String)> {
    let mut fields: Vec<_> = row.fields.iter().collect();
    fields.sort();
    fields
}

/// 十六进制字段校验（长度与字符分别报告），成功时返回大写值
fn check_hex(
    field: &str,
    value: Option<&str>,
    expected_len: usize,
    required: bool,
    errors: &mut Vec<RowError>,
) -> Option<String> {
    let value = match value {
        Some(v) => v,
        None => {
            if required {
                errors.push(RowError {
                    field: field.to_string(),
                    kind: RowErrorKind::MissingField,
                    message: t_with_args("validation.missing_field", &[("field", field)]),
                });
            }
            return None;
        }
    };

    let mut ok = true;
    let len = value.chars().count();

    if len != expected_len {
        let expected = expected_len.to_string();
        let actual = len.to_string();
        errors.push(RowError {
            field: field.to_string(),
            kind: RowErrorKind::InvalidLength,
            message: t_with_args(
                "validation.invalid_length",
                &[
                    ("field", field),
                    ("expected", expected.as_str()),
                    ("actual", actual.as_str()),
                ],
            ),
        });
        ok = false;
    }

    if !value.chars().all(|c| c.is_ascii_hexdigit()) {
        errors.push(RowError {
            field: field.to_string(),
            kind: RowErrorKind::InvalidHex,
            message: t_with_args(
                "validation.invalid_hex",
                &[("field", field), ("value", value)],
            ),
        });
        ok = false;
    }

    if !ok {
        return None;
    }

    Some(value.to_ascii_uppercase())
}

impl RowValidator for DeviceRowValidator {
    fn validate(
        &self,
        rows: &[ParsedRow],
        profile: &ImportProfile,
        snapshot: &RegistrySnapshot,
    ) -> Vec<ValidationVerdict> {
        let mut verdicts = Vec::with_capacity(rows.len());
        // (verdicts 下标, devEui)：仅结构合法的行参与语义检查
        let mut candidates = Vec::new();

        for (pos, row) in rows.iter().enumerate() {
            let (normalized, errors) = self.check_row(row, profile);
            if let Some(device) = &normalized {
                candidates.push((pos, device.dev_eui.clone()));
            }
            verdicts.push(ValidationVerdict {
                row_index: row.index,
                valid: false,
                normalized,
                errors,
            });
        }

        for (pos, dev_eui) in self.conflict_handler.detect_registered(&candidates, snapshot) {
            verdicts[pos].errors.push(RowError {
                field: "devEui".to_string(),
                kind: RowErrorKind::AlreadyRegistered,
                message: t_with_args("validation.already_registered", &[("dev_eui", dev_eui.as_str())]),
            });
        }

        for (pos, dev_eui) in self.conflict_handler.detect_duplicates(&candidates) {
            verdicts[pos].errors.push(RowError {
                field: "devEui".to_string(),
                kind: RowErrorKind::DuplicateInBatch,
                message: t_with_args("validation.duplicate_in_batch", &[("dev_eui", dev_eui.as_str())]),
            });
        }

        for verdict in &mut verdicts {
            verdict.valid = verdict.errors.is_empty();
        }

        let invalid = verdicts.iter().filter(|v| !v.valid).count();
        tracing::debug!(total = verdicts.len(), invalid, "行校验完成");

        verdicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEV_A: &str = "0011223344556677";
    const DEV_B: &str = "8899aabbccddeeff";
    const KEY: &str = "00112233445566778899aabbccddeeff";

    fn row(index: usize, pairs: &[(&str, &str)]) -> ParsedRow {
        ParsedRow {
            index,
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn validator() -> DeviceRowValidator {
        DeviceRowValidator::new("tag_")
    }

    fn open_profile() -> ImportProfile {
        ImportProfile::new("p", "无标签要求", Vec::<String>::new())
    }

    #[test]
    fn test_column_key() {
        assert_eq!(column_key("devEui"), "deveui");
        assert_eq!(column_key("DEV_EUI"), "deveui");
        assert_eq!(column_key(" dev-eui "), "deveui");
    }

    #[test]
    fn test_valid_row_is_normalized_to_uppercase() {
        let rows = vec![row(
            0,
            &[("dev_eui", DEV_B), ("AppKey", KEY), ("name", "meter-1"), ("tag_site", "north")],
        )];
        let verdicts = validator().validate(&rows, &open_profile(), &RegistrySnapshot::empty());

        assert!(verdicts[0].valid);
        let device = verdicts[0].normalized.as_ref().unwrap();
        assert_eq!(device.dev_eui, "8899AABBCCDDEEFF");
        assert_eq!(device.app_key, KEY.to_uppercase());
        assert_eq!(device.name.as_deref(), Some("meter-1"));
        assert_eq!(device.tags.get("site"), Some(&"north".to_string()));
    }

    #[test]
    fn test_structural_errors_are_all_reported() {
        let rows = vec![row(
            0,
            &[("devEui", "00112233445566ZZ"), ("appKey", "0011"), ("joinEui", "01")],
        )];
        let verdicts = validator().validate(&rows, &open_profile(), &RegistrySnapshot::empty());

        let v = &verdicts[0];
        assert!(!v.valid);
        assert!(v.normalized.is_none());
        assert!(v.has_error(RowErrorKind::InvalidHex));
        assert!(v.has_error(RowErrorKind::InvalidLength));
        assert_eq!(v.errors.len(), 3);
    }

    #[test]
    fn test_short_non_hex_id_reports_length_and_hex() {
        let rows = vec![row(0, &[("devEui", "BADEUI"), ("appKey", KEY)])];
        let verdicts = validator().validate(&rows, &open_profile(), &RegistrySnapshot::empty());

        let v = &verdicts[0];
        assert!(v.has_error(RowErrorKind::InvalidLength));
        assert!(v.has_error(RowErrorKind::InvalidHex));
        assert!(v.errors.iter().all(|e| e.field == "devEui"));
    }

    #[test]
    fn test_missing_fields() {
        let rows = vec![row(0, &[("devEui", ""), ("name", "x")])];
        let verdicts = validator().validate(&rows, &open_profile(), &RegistrySnapshot::empty());

        let missing: Vec<&str> = verdicts[0]
            .errors
            .iter()
            .filter(|e| e.kind == RowErrorKind::MissingField)
            .map(|e| e.field.as_str())
            .collect();
        assert_eq!(missing, vec!["devEui", "appKey"]);
    }

    #[test]
    fn test_required_tag_missing_or_empty() {
        let profile = ImportProfile::new("p", "站点", vec!["site", "floor"]);
        let rows = vec![row(
            0,
            &[("devEui", DEV_A), ("appKey", KEY), ("tag_site", "  "), ("TAG_floor", "3")],
        )];
        let verdicts = validator().validate(&rows, &profile, &RegistrySnapshot::empty());

        let v = &verdicts[0];
        assert!(!v.valid);
        assert_eq!(v.errors.len(), 1);
        assert_eq!(v.errors[0].kind, RowErrorKind::MissingTag);
        assert_eq!(v.errors[0].field, "tag_site");
    }

    #[test]
    fn test_tag_names_are_case_insensitive() {
        let profile = ImportProfile::new("p", "站点", vec!["Site"]);
        let rows = vec![row(
            0,
            &[("devEui", DEV_A), ("appKey", KEY), ("Tag_Site", "north"), ("TAG_FLOOR", "3")],
        )];
        let verdicts = validator().validate(&rows, &profile, &RegistrySnapshot::empty());

        assert!(verdicts[0].valid);
        let tags = &verdicts[0].normalized.as_ref().unwrap().tags;
        assert_eq!(tags.get("site"), Some(&"north".to_string()));
        assert_eq!(tags.get("floor"), Some(&"3".to_string()));
    }

    #[test]
    fn test_aliased_columns_give_stable_verdict() {
        let rows = vec![row(
            0,
            &[("devEui", DEV_A), ("dev_eui", "BADEUI"), ("appKey", KEY)],
        )];

        let first = validator().validate(&rows, &open_profile(), &RegistrySnapshot::empty());
        for _ in 0..50 {
            let again = validator().validate(&rows, &open_profile(), &RegistrySnapshot::empty());
            assert_eq!(again, first);
        }
        // "devEui" 排序在 "dev_eui" 之前
        assert!(first[0].valid);
    }

    #[test]
    fn test_registered_and_duplicate_rows() {
        let rows = vec![
            row(0, &[("devEui", DEV_A), ("appKey", KEY)]),
            row(1, &[("devEui", DEV_B), ("appKey", KEY)]),
            row(2, &[("devEui", &DEV_B.to_uppercase()), ("appKey", KEY)]),
        ];
        let snapshot = RegistrySnapshot::new(vec![DEV_A]);
        let verdicts = validator().validate(&rows, &open_profile(), &snapshot);

        assert!(verdicts[0].has_error(RowErrorKind::AlreadyRegistered));
        assert!(verdicts[1].valid);
        assert!(verdicts[2].has_error(RowErrorKind::DuplicateInBatch));
    }

    #[test]
    fn test_semantic_checks_skipped_on_structural_error() {
        let rows = vec![
            row(0, &[("devEui", DEV_A), ("appKey", "bad")]),
            row(1, &[("devEui", DEV_A), ("appKey", KEY)]),
        ];
        let snapshot = RegistrySnapshot::new(vec![DEV_A]);
        let verdicts = validator().validate(&rows, &open_profile(), &snapshot);

        assert!(!verdicts[0].has_error(RowErrorKind::AlreadyRegistered));
        assert!(!verdicts[0].has_error(RowErrorKind::DuplicateInBatch));
        // 第一行结构非法，不占用 devEui
        assert!(verdicts[1].has_error(RowErrorKind::AlreadyRegistered));
        assert!(!verdicts[1].has_error(RowErrorKind::DuplicateInBatch));
    }

    #[test]
    fn test_row_index_follows_input() {
        let rows = vec![
            row(0, &[("devEui", DEV_A), ("appKey", KEY)]),
            row(1, &[("devEui", "x")]),
        ];
        let verdicts = validator().validate(&rows, &open_profile(), &RegistrySnapshot::empty());
        let indexes: Vec<usize> = verdicts.iter().map(|v| v.row_index).collect();
        assert_eq!(indexes, vec![0, 1]);
    }
}
