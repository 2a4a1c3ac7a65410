// ==========================================
// LoRaWAN 设备管理 - 内存注册中心
// ==========================================
// 职责: RegistryClient 的进程内实现
// 用途: 离线演练、集成测试的测试替身
// 约定: 设备 ID 即大写 devEui
// ==========================================

use crate::domain::device::{DeviceRecord, DeviceSpec, TagSet};
use crate::registry::client::RegistryClient;
use crate::registry::error::{RegistryError, RegistryResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct RegistryState {
    devices: HashMap<String, DeviceRecord>,
    applications: HashSet<String>,
    device_profiles: HashSet<String>,
}

// ==========================================
// InMemoryRegistry
// ==========================================
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: Mutex<RegistryState>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记可用应用
    pub fn with_application(self, application_id: impl Into<String>) -> Self {
        self.lock().applications.insert(application_id.into());
        self
    }

    /// 登记可用设备配置
    pub fn with_device_profile(self, device_profile_id: impl Into<String>) -> Self {
        self.lock().device_profiles.insert(device_profile_id.into());
        self
    }

    /// 预置设备（不校验应用/设备配置）
    pub fn insert_device(&self, record: DeviceRecord) {
        let key = normalize_id(&record.dev_eui);
        self.lock().devices.insert(key, record);
    }

    pub fn device(&self, device_id: &str) -> Option<DeviceRecord> {
        self.lock().devices.get(&normalize_id(device_id)).cloned()
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.lock().devices.contains_key(&normalize_id(device_id))
    }

    pub fn device_count(&self) -> usize {
        self.lock().devices.len()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn normalize_id(device_id: &str) -> String {
    device_id.trim().to_ascii_uppercase()
}

#[async_trait]
impl RegistryClient for InMemoryRegistry {
    async fn create_device(&self, spec: &DeviceSpec) -> RegistryResult<String> {
        let mut state = self.lock();

        if !state.applications.contains(&spec.application_id) {
            return Err(RegistryError::Invalid(format!(
                "未知应用: {}",
                spec.application_id
            )));
        }
        if !state.device_profiles.contains(&spec.device_profile_id) {
            return Err(RegistryError::Invalid(format!(
                "未知设备配置: {}",
                spec.device_profile_id
            )));
        }

        let key = normalize_id(&spec.dev_eui);
        if state.devices.contains_key(&key) {
            return Err(RegistryError::Conflict(key));
        }

        let mut record = DeviceRecord::from(spec);
        record.dev_eui = key.clone();
        state.devices.insert(key.clone(), record);
        Ok(key)
    }

    async fn delete_device(&self, device_id: &str) -> RegistryResult<()> {
        let key = normalize_id(device_id);
        match self.lock().devices.remove(&key) {
            Some(_) => Ok(()),
            None => Err(RegistryError::NotFound(key)),
        }
    }

    async fn get_device(&self, device_id: &str) -> RegistryResult<DeviceRecord> {
        let key = normalize_id(device_id);
        self.lock()
            .devices
            .get(&key)
            .cloned()
            .ok_or(RegistryError::NotFound(key))
    }

    async fn set_application(&self, device_id: &str, application_id: &str) -> RegistryResult<()> {
        let key = normalize_id(device_id);
        let mut state = self.lock();
        if !state.devices.contains_key(&key) {
            return Err(RegistryError::NotFound(key));
        }
        if !state.applications.contains(application_id) {
            return Err(RegistryError::TargetInvalid(format!("未知应用: {}", application_id)));
        }
        if let Some(device) = state.devices.get_mut(&key) {
            device.application_id = application_id.to_string();
        }
        Ok(())
    }

    async fn set_profile(&self, device_id: &str, device_profile_id: &str) -> RegistryResult<()> {
        let key = normalize_id(device_id);
        let mut state = self.lock();
        if !state.devices.contains_key(&key) {
            return Err(RegistryError::NotFound(key));
        }
        if !state.device_profiles.contains(device_profile_id) {
            return Err(RegistryError::TargetInvalid(format!(
                "未知设备配置: {}",
                device_profile_id
            )));
        }
        if let Some(device) = state.devices.get_mut(&key) {
            device.device_profile_id = device_profile_id.to_string();
        }
        Ok(())
    }

    async fn set_tags(&self, device_id: &str, tags: &TagSet) -> RegistryResult<()> {
        let key = normalize_id(device_id);
        match self.lock().devices.get_mut(&key) {
            Some(device) => {
                device.tags = tags.clone();
                Ok(())
            }
            None => Err(RegistryError::NotFound(key)),
        }
    }

    async fn list_device_ids(&self) -> RegistryResult<HashSet<String>> {
        Ok(self.lock().devices.keys().cloned().collect())
    }
}
