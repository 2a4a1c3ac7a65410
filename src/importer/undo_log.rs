// ==========================================
// LoRaWAN 设备管理 - 撤销日志存储
// ==========================================
// 职责: 按 run_id 保存导入创建的设备，供撤销使用
// 策略:
// - 超过保留时长的运行视为不存在
// - 超过保留数量时淘汰最早的运行
// - 撤销后不删除条目（重复撤销幂等）
// ==========================================

use crate::domain::import::{ImportRun, UndoEntry};
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct RetainedRun {
    run_id: String,
    created_at: DateTime<Utc>,
    entries: Vec<UndoEntry>,
}

#[derive(Debug)]
pub struct UndoLogStore {
    retention: Duration,
    max_runs: usize,
    runs: Mutex<VecDeque<RetainedRun>>,
}

impl UndoLogStore {
    pub fn new(retention_hours: i64, max_runs: usize) -> Self {
        Self {
            retention: Duration::try_hours(retention_hours).unwrap_or(Duration::MAX),
            max_runs: max_runs.max(1),
            runs: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<RetainedRun>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(created_at) > self.retention
    }

    /// 记录一次导入运行的撤销日志（零创建的运行同样记录）
    pub fn record(&self, run: &ImportRun) {
        let mut runs = self.lock();
        runs.push_back(RetainedRun {
            run_id: run.run_id.clone(),
            created_at: run.created_at,
            entries: run.undo_log.clone(),
        });

        while runs.len() > self.max_runs {
            if let Some(evicted) = runs.pop_front() {
                tracing::debug!(run_id = %evicted.run_id, "撤销日志超出保留数量，淘汰最早运行");
            }
        }
    }

    /// 读取撤销日志
    ///
    /// # 返回
    /// - None: run_id 未知或已过期
    pub fn entries(&self, run_id: &str, now: DateTime<Utc>) -> Option<Vec<UndoEntry>> {
        self.lock()
            .iter()
            .find(|r| r.run_id == run_id)
            .filter(|r| !self.is_expired(r.created_at, now))
            .map(|r| r.entries.clone())
    }

    /// 清理过期运行，返回清理数量
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut runs = self.lock();
        let before = runs.len();
        runs.retain(|r| !self.is_expired(r.created_at, now));
        let purged = before - runs.len();
        if purged > 0 {
            tracing::debug!(purged, "已清理过期撤销日志");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::UndoAction;

    fn run(run_id: &str, created_at: DateTime<Utc>, ids: &[&str]) -> ImportRun {
        ImportRun {
            run_id: run_id.to_string(),
            profile_id: "p".to_string(),
            created_at,
            outcomes: Vec::new(),
            undo_log: ids
                .iter()
                .map(|id| UndoEntry {
                    registry_device_id: id.to_string(),
                    action: UndoAction::Created,
                })
                .collect(),
        }
    }

    #[test]
    fn test_record_and_read_entries() {
        let store = UndoLogStore::new(24, 10);
        let now = Utc::now();
        store.record(&run("r1", now, &["A", "B"]));
        store.record(&run("r2", now, &[]));

        let entries = store.entries("r1", now).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].registry_device_id, "B");
        // 零创建的运行同样可查
        assert_eq!(store.entries("r2", now), Some(Vec::new()));
        assert!(store.entries("ghost", now).is_none());
    }

    #[test]
    fn test_expired_run_is_unknown() {
        let store = UndoLogStore::new(24, 10);
        let created = Utc::now();
        store.record(&run("r1", created, &["A"]));

        let later = created + Duration::hours(25);
        assert!(store.entries("r1", created + Duration::hours(23)).is_some());
        assert!(store.entries("r1", later).is_none());
        assert_eq!(store.purge_expired(later), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_oldest_run_is_evicted() {
        let store = UndoLogStore::new(24, 2);
        let now = Utc::now();
        store.record(&run("r1", now, &["A"]));
        store.record(&run("r2", now, &["B"]));
        store.record(&run("r3", now, &["C"]));

        assert_eq!(store.len(), 2);
        assert!(store.entries("r1", now).is_none());
        assert!(store.entries("r3", now).is_some());
    }
}
