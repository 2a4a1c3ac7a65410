// ==========================================
// 批量变更引擎集成测试
// ==========================================
// 测试目标: 删除 / 迁移 / 更换设备配置 / 更新标签 的行级隔离
// ==========================================

mod test_helpers;

use lorawan_admin::config::DispatchPolicy;
use lorawan_admin::domain::{
    BulkOperationReport, OperationKind, OutcomeError, RegistryErrorKind, RowStatus, TagSet,
    TagUpdateMode,
};
use lorawan_admin::engine::BulkMutationEngine;
use lorawan_admin::logging;
use lorawan_admin::registry::InMemoryRegistry;
use std::sync::Arc;
use test_helpers::{existing_device, seeded_registry, FaultPlan, FlakyRegistry};
use tokio_util::sync::CancellationToken;

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn registry_with(devices: &[&str]) -> Arc<InMemoryRegistry> {
    let registry = Arc::new(seeded_registry());
    for id in devices {
        registry.insert_device(existing_device(id));
    }
    registry
}

#[tokio::test]
async fn test_delete_treats_missing_device_as_deleted() {
    logging::init_test();

    let registry = registry_with(&["A", "C"]);
    let engine = BulkMutationEngine::new(registry.clone(), DispatchPolicy::default());

    let result = engine
        .delete(&ids(&["A", "B", "C"]), &CancellationToken::new())
        .await;

    let statuses: Vec<RowStatus> = result.outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![RowStatus::Succeeded, RowStatus::Succeeded, RowStatus::Succeeded]
    );
    assert_eq!(result.outcomes[1].registry_device_id.as_deref(), Some("B"));
    assert_eq!(registry.device_count(), 0);

    let report = BulkOperationReport::from(result);
    assert_eq!(report.operation_kind, OperationKind::Delete);
    assert_eq!((report.total, report.succeeded, report.failed), (3, 3, 0));
}

#[tokio::test]
async fn test_migrate_isolates_row_failures() {
    logging::init_test();

    let registry = registry_with(&["A", "C"]);
    let engine = BulkMutationEngine::new(registry.clone(), DispatchPolicy::default());

    let result = engine
        .migrate(&ids(&["A", "B", "C"]), "app-2", &CancellationToken::new())
        .await;

    assert_eq!(result.operation_kind, OperationKind::Migrate);
    assert_eq!(result.outcomes[0].status, RowStatus::Succeeded);
    assert_eq!(
        result.outcomes[1].registry_error_kind(),
        Some(RegistryErrorKind::NotFound)
    );
    assert_eq!(result.outcomes[2].status, RowStatus::Succeeded);
    assert_eq!(registry.device("C").unwrap().application_id, "app-2");
}

#[tokio::test]
async fn test_change_profile_to_unknown_profile_fails_each_row() {
    logging::init_test();

    let registry = registry_with(&["A", "B"]);
    let engine = BulkMutationEngine::new(registry.clone(), DispatchPolicy::default());

    let result = engine
        .change_profile(&ids(&["A", "B"]), "dp-missing", &CancellationToken::new())
        .await;
    assert!(result
        .outcomes
        .iter()
        .all(|o| o.registry_error_kind() == Some(RegistryErrorKind::TargetInvalid)));

    let result = engine
        .change_profile(&ids(&["A", "B"]), "dp-2", &CancellationToken::new())
        .await;
    assert_eq!(result.summary().succeeded, 2);
    assert_eq!(registry.device("B").unwrap().device_profile_id, "dp-2");
}

#[tokio::test]
async fn test_update_tags_merge_keeps_unrelated_keys() {
    logging::init_test();

    let registry = registry_with(&[]);
    let mut device = existing_device("A");
    device.tags = TagSet::from([
        ("site".to_string(), "north".to_string()),
        ("owner".to_string(), "ops".to_string()),
    ]);
    registry.insert_device(device);
    let engine = BulkMutationEngine::new(registry.clone(), DispatchPolicy::default());

    let patch = TagSet::from([("site".to_string(), "south".to_string())]);
    let result = engine
        .update_tags(
            &ids(&["A", "missing"]),
            &patch,
            TagUpdateMode::Merge,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.outcomes[0].status, RowStatus::Succeeded);
    assert_eq!(
        result.outcomes[1].registry_error_kind(),
        Some(RegistryErrorKind::NotFound)
    );
    let tags = registry.device("A").unwrap().tags;
    assert_eq!(tags.get("site"), Some(&"south".to_string()));
    assert_eq!(tags.get("owner"), Some(&"ops".to_string()));

    engine
        .update_tags(
            &ids(&["A"]),
            &patch,
            TagUpdateMode::Replace,
            &CancellationToken::new(),
        )
        .await;
    assert_eq!(registry.device("A").unwrap().tags, patch);
}

#[tokio::test]
async fn test_breaker_skips_remaining_identifiers() {
    logging::init_test();

    let inner = registry_with(&["A", "B", "C", "D", "E", "F", "G"]);
    let registry = Arc::new(FlakyRegistry::new(
        inner.clone(),
        FaultPlan {
            always_unreachable: true,
            ..FaultPlan::default()
        },
    ));
    let engine = BulkMutationEngine::new(
        registry.clone(),
        DispatchPolicy {
            max_in_flight: 1,
            unreachable_threshold: 3,
            ..DispatchPolicy::default()
        },
    );

    let result = engine
        .delete(
            &ids(&["A", "B", "C", "D", "E", "F", "G"]),
            &CancellationToken::new(),
        )
        .await;

    let summary = result.summary();
    assert_eq!((summary.failed, summary.skipped), (3, 4));
    assert_eq!(registry.call_count(), 3);
    assert_eq!(
        result.outcomes[6].error,
        Some(OutcomeError::UpstreamUnavailable)
    );
    assert_eq!(result.outcomes[6].registry_device_id.as_deref(), Some("G"));
    assert_eq!(inner.device_count(), 7);
}

#[tokio::test]
async fn test_empty_identifier_list() {
    logging::init_test();

    let engine = BulkMutationEngine::new(registry_with(&[]), DispatchPolicy::default());
    let result = engine.delete(&[], &CancellationToken::new()).await;
    assert!(result.outcomes.is_empty());
}
