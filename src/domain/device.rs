// ==========================================
// LoRaWAN 设备管理 - 设备实体
// ==========================================
// 职责: 注册中心变更所需的最小设备模型
// 说明: 仅包含 标识/应用/设备配置/标签/密钥，
//       注册中心自身的完整设备模型不在此定义
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 设备标签集（键有序，便于比较与序列化）
pub type TagSet = BTreeMap<String, String>;

// ==========================================
// NormalizedDevice - 校验通过后的规范化行数据
// ==========================================
// 十六进制字段统一为大写
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedDevice {
    pub dev_eui: String,              // 16 位十六进制
    pub app_key: String,              // 32 位十六进制
    pub join_eui: Option<String>,     // 16 位十六进制（可选）
    pub nwk_key: Option<String>,      // 32 位十六进制（可选）
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: TagSet,
}

impl NormalizedDevice {
    /// 组装创建设备请求（设备名缺省时使用 devEui）
    pub fn to_spec(&self, target: &ImportTarget) -> DeviceSpec {
        DeviceSpec {
            dev_eui: self.dev_eui.clone(),
            name: self.name.clone().unwrap_or_else(|| self.dev_eui.clone()),
            description: self.description.clone(),
            application_id: target.application_id.clone(),
            device_profile_id: target.device_profile_id.clone(),
            join_eui: self.join_eui.clone(),
            app_key: self.app_key.clone(),
            nwk_key: self.nwk_key.clone(),
            tags: self.tags.clone(),
        }
    }
}

// ==========================================
// ImportTarget - 导入目标（应用 + 设备配置）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTarget {
    pub application_id: String,
    pub device_profile_id: String,
}

// ==========================================
// DeviceSpec - 创建设备请求
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSpec {
    pub dev_eui: String,
    pub name: String,
    pub description: Option<String>,
    pub application_id: String,
    pub device_profile_id: String,
    pub join_eui: Option<String>,
    pub app_key: String,
    pub nwk_key: Option<String>,
    pub tags: TagSet,
}

// ==========================================
// DeviceRecord - 注册中心中的设备视图
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub dev_eui: String,
    pub name: String,
    pub application_id: String,
    pub device_profile_id: String,
    pub tags: TagSet,
}

impl From<&DeviceSpec> for DeviceRecord {
    fn from(spec: &DeviceSpec) -> Self {
        Self {
            dev_eui: spec.dev_eui.clone(),
            name: spec.name.clone(),
            application_id: spec.application_id.clone(),
            device_profile_id: spec.device_profile_id.clone(),
            tags: spec.tags.clone(),
        }
    }
}
