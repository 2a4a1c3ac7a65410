// ==========================================
// LoRaWAN 设备管理 - 批量变更引擎
// ==========================================
// 职责: 按设备 ID 列表批量 删除 / 迁移应用 / 更换设备配置 / 更新标签
// 约束:
// - 每个 ID 一个 RowOutcome，row_index = 列表位置
// - 行间独立，失败不回滚已成功的行
// - 删除时设备不存在视为成功
// ==========================================

use crate::config::DispatchPolicy;
use crate::domain::device::TagSet;
use crate::domain::import::{BulkOperationResult, UndoEntry};
use crate::domain::types::{OperationKind, TagUpdateMode};
use crate::engine::dispatcher::{CallResult, Dispatcher};
use crate::registry::{RegistryClient, RegistryError};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

pub struct BulkMutationEngine {
    registry: Arc<dyn RegistryClient>,
    dispatcher: Dispatcher,
}

impl BulkMutationEngine {
    pub fn new(registry: Arc<dyn RegistryClient>, policy: DispatchPolicy) -> Self {
        Self {
            registry,
            dispatcher: Dispatcher::new(policy),
        }
    }

    /// 批量删除（设备不存在视为成功）
    #[instrument(skip(self, device_ids, cancel), fields(count = device_ids.len()))]
    pub async fn delete(
        &self,
        device_ids: &[String],
        cancel: &CancellationToken,
    ) -> BulkOperationResult {
        self.delete_as(OperationKind::Delete, device_ids, cancel)
            .await
    }

    /// 撤销导入：按撤销日志删除创建过的设备
    #[instrument(skip(self, entries, cancel), fields(count = entries.len()))]
    pub async fn undo_creations(
        &self,
        entries: &[UndoEntry],
        cancel: &CancellationToken,
    ) -> BulkOperationResult {
        let device_ids: Vec<String> = entries
            .iter()
            .map(|e| e.registry_device_id.clone())
            .collect();
        self.delete_as(OperationKind::Undo, &device_ids, cancel)
            .await
    }

    async fn delete_as(
        &self,
        kind: OperationKind,
        device_ids: &[String],
        cancel: &CancellationToken,
    ) -> BulkOperationResult {
        self.run(kind, device_ids, cancel, |registry, device_id| async move {
            match registry.delete_device(&device_id).await {
                Ok(()) => Ok(device_id),
                Err(RegistryError::NotFound(_)) => {
                    tracing::debug!(device_id = %device_id, "设备已不存在，视为删除成功");
                    Ok(device_id)
                }
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// 批量迁移到其他应用
    #[instrument(skip(self, device_ids, cancel), fields(count = device_ids.len()))]
    pub async fn migrate(
        &self,
        device_ids: &[String],
        application_id: &str,
        cancel: &CancellationToken,
    ) -> BulkOperationResult {
        let application_id = Arc::new(application_id.to_string());
        self.run(
            OperationKind::Migrate,
            device_ids,
            cancel,
            move |registry, device_id| {
                let application_id = application_id.clone();
                async move {
                    registry
                        .set_application(&device_id, &application_id)
                        .await?;
                    Ok(device_id)
                }
            },
        )
        .await
    }

    /// 批量更换设备配置
    #[instrument(skip(self, device_ids, cancel), fields(count = device_ids.len()))]
    pub async fn change_profile(
        &self,
        device_ids: &[String],
        device_profile_id: &str,
        cancel: &CancellationToken,
    ) -> BulkOperationResult {
        let device_profile_id = Arc::new(device_profile_id.to_string());
        self.run(
            OperationKind::ChangeProfile,
            device_ids,
            cancel,
            move |registry, device_id| {
                let device_profile_id = device_profile_id.clone();
                async move {
                    registry
                        .set_profile(&device_id, &device_profile_id)
                        .await?;
                    Ok(device_id)
                }
            },
        )
        .await
    }

    /// 批量更新标签
    ///
    /// # 模式
    /// - Merge: 先读设备，提交的键覆盖原值，其余键保留
    /// - Replace: 提交的标签集整体替换
    #[instrument(skip(self, device_ids, tags, cancel), fields(count = device_ids.len()))]
    pub async fn update_tags(
        &self,
        device_ids: &[String],
        tags: &TagSet,
        mode: TagUpdateMode,
        cancel: &CancellationToken,
    ) -> BulkOperationResult {
        let tags = Arc::new(tags.clone());
        self.run(
            OperationKind::UpdateTags,
            device_ids,
            cancel,
            move |registry, device_id| {
                let tags = tags.clone();
                async move {
                    let next = match mode {
                        TagUpdateMode::Replace => (*tags).clone(),
                        TagUpdateMode::Merge => {
                            let mut current = registry.get_device(&device_id).await?.tags;
                            current.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
                            current
                        }
                    };
                    registry.set_tags(&device_id, &next).await?;
                    Ok(device_id)
                }
            },
        )
        .await
    }

    /// 公共执行流程：调度 → 槽位转行结果
    async fn run<F, Fut>(
        &self,
        kind: OperationKind,
        device_ids: &[String],
        cancel: &CancellationToken,
        call: F,
    ) -> BulkOperationResult
    where
        F: Fn(Arc<dyn RegistryClient>, String) -> Fut,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        tracing::info!(operation = %kind, total = device_ids.len(), "批量变更开始");

        let units: Vec<Option<String>> = device_ids.iter().cloned().map(Some).collect();
        let registry = self.registry.clone();
        let report = self
            .dispatcher
            .dispatch(units, cancel, |device_id| call(registry.clone(), device_id))
            .await;

        let halted = report.halted;
        let outcomes = report
            .slots
            .into_iter()
            .zip(device_ids)
            .enumerate()
            .filter_map(|(index, (slot, device_id))| {
                slot.into_outcome(index, Some(device_id.clone()), halted)
            })
            .collect();

        let result = BulkOperationResult {
            operation_kind: kind,
            outcomes,
        };
        let summary = result.summary();
        tracing::info!(
            operation = %kind,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "批量变更完成"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::device::DeviceRecord;
    use crate::domain::import::OutcomeError;
    use crate::domain::types::{RegistryErrorKind, RowStatus};
    use crate::registry::InMemoryRegistry;

    fn record(dev_eui: &str) -> DeviceRecord {
        DeviceRecord {
            dev_eui: dev_eui.to_string(),
            name: dev_eui.to_string(),
            application_id: "app-1".to_string(),
            device_profile_id: "dp-1".to_string(),
            tags: TagSet::from([("site".to_string(), "north".to_string())]),
        }
    }

    fn setup() -> (Arc<InMemoryRegistry>, BulkMutationEngine) {
        let registry = Arc::new(
            InMemoryRegistry::new()
                .with_application("app-1")
                .with_application("app-2")
                .with_device_profile("dp-1")
                .with_device_profile("dp-2"),
        );
        registry.insert_device(record("0000000000000001"));
        registry.insert_device(record("0000000000000002"));
        let engine = BulkMutationEngine::new(registry.clone(), DispatchPolicy::default());
        (registry, engine)
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_delete_missing_device_is_success() {
        let (registry, engine) = setup();
        let result = engine
            .delete(
                &ids(&["0000000000000001", "00000000000000FF"]),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.operation_kind, OperationKind::Delete);
        assert!(result
            .outcomes
            .iter()
            .all(|o| o.status == RowStatus::Succeeded));
        assert!(!registry.contains("0000000000000001"));
    }

    #[tokio::test]
    async fn test_migrate_taxonomy() {
        let (registry, engine) = setup();
        let result = engine
            .migrate(
                &ids(&["0000000000000001", "00000000000000FF"]),
                "app-2",
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.outcomes[0].status, RowStatus::Succeeded);
        assert_eq!(
            result.outcomes[1].registry_error_kind(),
            Some(RegistryErrorKind::NotFound)
        );
        assert_eq!(
            registry.device("0000000000000001").unwrap().application_id,
            "app-2"
        );

        let result = engine
            .migrate(&ids(&["0000000000000002"]), "ghost", &CancellationToken::new())
            .await;
        assert_eq!(
            result.outcomes[0].registry_error_kind(),
            Some(RegistryErrorKind::TargetInvalid)
        );
    }

    #[tokio::test]
    async fn test_update_tags_merge_and_replace() {
        let (registry, engine) = setup();
        let patch = TagSet::from([("floor".to_string(), "3".to_string())]);

        engine
            .update_tags(
                &ids(&["0000000000000001"]),
                &patch,
                TagUpdateMode::Merge,
                &CancellationToken::new(),
            )
            .await;
        let tags = registry.device("0000000000000001").unwrap().tags;
        assert_eq!(tags.get("site"), Some(&"north".to_string()));
        assert_eq!(tags.get("floor"), Some(&"3".to_string()));

        engine
            .update_tags(
                &ids(&["0000000000000002"]),
                &patch,
                TagUpdateMode::Replace,
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(registry.device("0000000000000002").unwrap().tags, patch);
    }

    #[tokio::test]
    async fn test_cancelled_rows_are_skipped() {
        let (_registry, engine) = setup();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = engine
            .change_profile(&ids(&["0000000000000001", "0000000000000002"]), "dp-2", &cancel)
            .await;

        assert_eq!(result.outcomes.len(), 2);
        assert!(result
            .outcomes
            .iter()
            .all(|o| o.error == Some(OutcomeError::Cancelled)));
        assert_eq!(result.summary().skipped, 2);
    }
}
