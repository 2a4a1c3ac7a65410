// ==========================================
// LoRaWAN 设备管理 - 注册中心调用调度器
// ==========================================
// 职责: 有界并发下发注册中心调用
// 约束:
// - 同时在途调用数 ≤ max_in_flight
// - 每次调用独立超时，超时不重试
// - 观察到取消后不再下发新调用，在途调用照常完成
// - 连续 unreachable_threshold 次 Unreachable/Timeout 后熔断
// - 结果按输入下标写入预分配槽位
// ==========================================

use crate::config::DispatchPolicy;
use crate::domain::import::{OutcomeError, RowOutcome};
use crate::domain::types::RegistryErrorKind;
use crate::registry::{RegistryError, RegistryResult};
use std::future::Future;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// 单个下发单元的调用结果（成功时为注册中心设备 ID）
pub type CallResult = RegistryResult<String>;

/// 槽位状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchSlot {
    /// 不参与下发（如校验未通过的行）
    Excluded,
    /// 因取消或熔断未下发
    NotDispatched,
    /// 已下发，调用尚未返回（仅调度过程中出现）
    InFlight,
    /// 调用完成
    Completed(CallResult),
    /// 调用任务异常终止（panic / 被中止）
    Aborted(String),
}

impl DispatchSlot {
    /// 槽位 → 行结果
    ///
    /// # 参数
    /// - target_id: 该行操作的注册中心设备 ID（导入创建前未知时为 None）
    ///
    /// # 返回
    /// - None: Excluded 槽位，由调用方自行填充
    pub fn into_outcome(
        self,
        row_index: usize,
        target_id: Option<String>,
        halted: Option<HaltReason>,
    ) -> Option<RowOutcome> {
        let outcome = match self {
            DispatchSlot::Excluded => return None,
            DispatchSlot::Completed(Ok(device_id)) => RowOutcome::succeeded(row_index, device_id),
            DispatchSlot::Completed(Err(e)) => {
                tracing::warn!(row_index, error = %e, "注册中心调用失败");
                RowOutcome::failed(row_index, target_id, e.kind(), e.to_string())
            }
            DispatchSlot::Aborted(message) => {
                RowOutcome::failed(row_index, target_id, RegistryErrorKind::Unreachable, message)
            }
            DispatchSlot::NotDispatched | DispatchSlot::InFlight => {
                let error = match halted {
                    Some(HaltReason::UpstreamUnavailable) => OutcomeError::UpstreamUnavailable,
                    _ => OutcomeError::Cancelled,
                };
                RowOutcome::skipped(row_index, target_id, error)
            }
        };
        Some(outcome)
    }
}

/// 调度停止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    Cancelled,
    UpstreamUnavailable,
}

#[derive(Debug)]
pub struct DispatchReport {
    pub slots: Vec<DispatchSlot>,
    pub halted: Option<HaltReason>,
}

impl DispatchReport {
    pub fn dispatched_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, DispatchSlot::Completed(_) | DispatchSlot::Aborted(_)))
            .count()
    }
}

// ==========================================
// 连续上游故障计数（熔断）
// ==========================================
struct UpstreamBreaker {
    threshold: usize,
    consecutive: usize,
}

impl UpstreamBreaker {
    fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: 0,
        }
    }

    /// 记录一次调用结果，返回是否触发熔断
    fn record(&mut self, result: &CallResult) -> bool {
        match result {
            Err(e) if e.is_upstream_failure() => self.consecutive += 1,
            _ => self.consecutive = 0,
        }
        self.consecutive >= self.threshold
    }
}

pub struct Dispatcher {
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self { policy }
    }

    /// 按输入顺序下发全部单元
    ///
    /// # 参数
    /// - units: 下发单元，None 表示该位置不参与下发
    /// - cancel: 取消令牌
    /// - call: 单元 → 注册中心调用
    ///
    /// # 返回
    /// - DispatchReport: slots.len() == units.len()
    pub async fn dispatch<T, F, Fut>(
        &self,
        units: Vec<Option<T>>,
        cancel: &CancellationToken,
        call: F,
    ) -> DispatchReport
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        let max_in_flight = self.policy.max_in_flight.max(1);
        let call_timeout = self.policy.call_timeout;
        let mut breaker = UpstreamBreaker::new(self.policy.unreachable_threshold);

        let mut slots: Vec<DispatchSlot> = units
            .iter()
            .map(|u| {
                if u.is_some() {
                    DispatchSlot::NotDispatched
                } else {
                    DispatchSlot::Excluded
                }
            })
            .collect();

        let mut pending = units
            .into_iter()
            .enumerate()
            .filter_map(|(index, unit)| unit.map(|u| (index, u)))
            .peekable();
        let mut join_set: JoinSet<(usize, CallResult)> = JoinSet::new();
        let mut halted: Option<HaltReason> = None;
        let mut join_errors: Vec<String> = Vec::new();

        loop {
            // 补足在途调用
            while halted.is_none() && join_set.len() < max_in_flight {
                if cancel.is_cancelled() {
                    tracing::warn!("收到取消请求，停止下发");
                    halted = Some(HaltReason::Cancelled);
                    break;
                }

                let Some((index, unit)) = pending.next() else {
                    break;
                };

                slots[index] = DispatchSlot::InFlight;
                let fut = call(unit);
                join_set.spawn(async move {
                    let result = match tokio::time::timeout(call_timeout, fut).await {
                        Ok(result) => result,
                        Err(_) => Err(RegistryError::Timeout(call_timeout)),
                    };
                    (index, result)
                });
            }

            if join_set.is_empty() && (halted.is_some() || pending.peek().is_none()) {
                break;
            }

            // 等待至少一个调用完成
            match join_set.join_next().await {
                Some(Ok((index, result))) => {
                    if breaker.record(&result) && halted.is_none() {
                        tracing::warn!(
                            threshold = breaker.threshold,
                            "注册中心连续不可达，熔断停止下发"
                        );
                        halted = Some(HaltReason::UpstreamUnavailable);
                    }
                    slots[index] = DispatchSlot::Completed(result);
                }
                Some(Err(e)) => {
                    // JoinError 不携带下标，结束后回填仍为 InFlight 的槽位
                    tracing::error!(error = %e, "下发任务异常终止");
                    join_errors.push(e.to_string());
                }
                None => {}
            }
        }

        if !join_errors.is_empty() {
            let message = join_errors.join("; ");
            for slot in slots.iter_mut() {
                if *slot == DispatchSlot::InFlight {
                    *slot = DispatchSlot::Aborted(message.clone());
                }
            }
        }

        DispatchReport { slots, halted }
    }
}
