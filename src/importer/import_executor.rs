// ==========================================
// LoRaWAN 设备管理 - 导入执行器
// ==========================================
// 职责: 校验通过的行 → 注册中心创建设备；其余行 → Skipped
// 约束:
// - 单行失败不影响其他行，不回滚
// - 成功创建的设备写入撤销日志（仅此一种情况）
// - outcomes 顺序与 verdicts 一致
// ==========================================

use crate::config::DispatchPolicy;
use crate::domain::device::ImportTarget;
use crate::domain::import::{
    ImportRun, OutcomeError, RowOutcome, UndoAction, UndoEntry, ValidationVerdict,
};
use crate::domain::types::RowStatus;
use crate::engine::dispatcher::Dispatcher;
use crate::registry::RegistryClient;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct ImportExecutor {
    registry: Arc<dyn RegistryClient>,
    dispatcher: Dispatcher,
}

impl ImportExecutor {
    pub fn new(registry: Arc<dyn RegistryClient>, policy: DispatchPolicy) -> Self {
        Self {
            registry,
            dispatcher: Dispatcher::new(policy),
        }
    }

    /// 执行导入
    ///
    /// # 参数
    /// - verdicts: 行校验结论（顺序即输出顺序）
    /// - profile_id: 本次使用的规则集
    /// - target: 新设备归属的应用与设备配置
    /// - cancel: 取消令牌
    pub async fn execute(
        &self,
        verdicts: &[ValidationVerdict],
        profile_id: &str,
        target: &ImportTarget,
        cancel: &CancellationToken,
    ) -> ImportRun {
        let run_id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let units: Vec<_> = verdicts
            .iter()
            .map(|v| {
                v.normalized
                    .as_ref()
                    .filter(|_| v.valid)
                    .map(|device| device.to_spec(target))
            })
            .collect();
        let dispatchable = units.iter().filter(|u| u.is_some()).count();
        tracing::info!(
            run_id = %run_id,
            total = verdicts.len(),
            dispatchable,
            "导入执行开始"
        );

        let registry = self.registry.clone();
        let report = self
            .dispatcher
            .dispatch(units, cancel, |spec| {
                let registry = registry.clone();
                async move { registry.create_device(&spec).await }
            })
            .await;

        let halted = report.halted;
        let outcomes: Vec<RowOutcome> = report
            .slots
            .into_iter()
            .zip(verdicts)
            .enumerate()
            .map(|(index, (slot, verdict))| {
                slot.into_outcome(index, None, halted).unwrap_or_else(|| {
                    RowOutcome::skipped(
                        index,
                        None,
                        OutcomeError::Validation {
                            errors: verdict.errors.clone(),
                        },
                    )
                })
            })
            .collect();

        let undo_log: Vec<UndoEntry> = outcomes
            .iter()
            .filter(|o| o.status == RowStatus::Succeeded)
            .filter_map(|o| o.registry_device_id.clone())
            .map(|registry_device_id| UndoEntry {
                registry_device_id,
                action: UndoAction::Created,
            })
            .collect();

        let run = ImportRun {
            run_id,
            profile_id: profile_id.to_string(),
            created_at,
            outcomes,
            undo_log,
        };

        let summary = run.summary();
        tracing::info!(
            run_id = %run.run_id,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "导入执行完成"
        );
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::device::NormalizedDevice;
    use crate::domain::import::{RowError, RowErrorKind};
    use crate::domain::types::RegistryErrorKind;
    use crate::registry::InMemoryRegistry;

    fn valid(index: usize, dev_eui: &str) -> ValidationVerdict {
        ValidationVerdict {
            row_index: index,
            valid: true,
            normalized: Some(NormalizedDevice {
                dev_eui: dev_eui.to_string(),
                app_key: "00112233445566778899AABBCCDDEEFF".to_string(),
                join_eui: None,
                nwk_key: None,
                name: None,
                description: None,
                tags: Default::default(),
            }),
            errors: Vec::new(),
        }
    }

    fn invalid(index: usize) -> ValidationVerdict {
        ValidationVerdict {
            row_index: index,
            valid: false,
            normalized: None,
            errors: vec![RowError {
                field: "devEui".to_string(),
                kind: RowErrorKind::InvalidHex,
                message: "bad".to_string(),
            }],
        }
    }

    fn target() -> ImportTarget {
        ImportTarget {
            application_id: "app-1".to_string(),
            device_profile_id: "dp-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_execute_mixed_rows() {
        let registry = Arc::new(
            InMemoryRegistry::new()
                .with_application("app-1")
                .with_device_profile("dp-1"),
        );
        let executor = ImportExecutor::new(registry.clone(), DispatchPolicy::default());

        let verdicts = vec![
            valid(0, "0000000000000001"),
            invalid(1),
            valid(2, "0000000000000002"),
        ];
        let run = executor
            .execute(&verdicts, "p", &target(), &CancellationToken::new())
            .await;

        assert_eq!(run.outcomes.len(), 3);
        assert_eq!(run.outcomes[0].status, RowStatus::Succeeded);
        assert_eq!(run.outcomes[1].status, RowStatus::Skipped);
        assert!(matches!(
            run.outcomes[1].error,
            Some(OutcomeError::Validation { .. })
        ));
        assert_eq!(run.outcomes[2].status, RowStatus::Succeeded);
        assert_eq!(run.undo_log.len(), 2);
        assert_eq!(registry.device_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_target_fails_rows_without_undo_entries() {
        let registry = Arc::new(InMemoryRegistry::new());
        let executor = ImportExecutor::new(registry, DispatchPolicy::default());

        let run = executor
            .execute(
                &[valid(0, "0000000000000001")],
                "p",
                &target(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(run.outcomes[0].status, RowStatus::Failed);
        assert_eq!(
            run.outcomes[0].registry_error_kind(),
            Some(RegistryErrorKind::Invalid)
        );
        assert!(run.undo_log.is_empty());
    }
}
