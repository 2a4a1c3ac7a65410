// ==========================================
// LoRaWAN 设备管理 - 冲突处理器实现
// ==========================================
// 职责: 检测同批次内重复 devEui / 注册中心已存在的 devEui
// 约定: 入参 devEui 已规范化为大写
// ==========================================

use crate::domain::import::RegistrySnapshot;
use crate::importer::device_importer_trait::ConflictHandler as ConflictHandlerTrait;
use std::collections::HashMap;

pub struct ConflictHandler;

impl ConflictHandlerTrait for ConflictHandler {
    /// 检测同批次内重复 devEui
    ///
    /// # 返回
    /// - Vec<(行号, devEui)>: 重复记录列表（不包括第一次出现）
    fn detect_duplicates(&self, candidates: &[(usize, String)]) -> Vec<(usize, String)> {
        let mut first_occurrence: HashMap<&str, usize> = HashMap::new();
        let mut duplicates = Vec::new();

        for (row_index, dev_eui) in candidates {
            if first_occurrence.contains_key(dev_eui.as_str()) {
                duplicates.push((*row_index, dev_eui.clone()));
            } else {
                first_occurrence.insert(dev_eui.as_str(), *row_index);
            }
        }

        duplicates
    }

    /// 检测注册中心已存在的 devEui（基于导入前拉取的快照）
    fn detect_registered(
        &self,
        candidates: &[(usize, String)],
        snapshot: &RegistrySnapshot,
    ) -> Vec<(usize, String)> {
        candidates
            .iter()
            .filter(|(_, dev_eui)| snapshot.contains(dev_eui))
            .cloned()
            .collect()
    }
}
