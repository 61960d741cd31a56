//! 激活图轮询
//!
//! 激活图在推理完成后异步生成。每个在途推理对应一个可取消的轮询任务：
//!
//! ```text
//! Idle ──start──▶ Polling ──artifact──▶ Ready
//!                   │  ▲
//!                   └──┘ pending / transport error
//!                   │
//!                   ├──policy exhausted──▶ Failed
//!                   └──cancel──────────▶ Cancelled
//! ```
//!
//! 状态变化通过 `watch` 通道对外发布，任务结束时返回完整的状态记录。

use crate::client::StatusSource;
use neuro_core::{ArtifactData, NeuroError, PredictionRecord, Result, Session};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 轮询期间与界面共享的推理记录
pub type SharedRecord = Arc<RwLock<PredictionRecord>>;

/// 轮询状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PollState {
    Idle,
    Polling,
    Ready,
    Failed,
    Cancelled,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::Cancelled)
    }
}

/// 有界重试策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 首次请求前的等待时间
    pub interval: Duration,
    pub max_attempts: u32,
    /// 每次请求后等待时间的放大倍数，1.0 表示固定间隔
    pub backoff_multiplier: f64,
    pub max_interval: Duration,
    /// 整体截止时间，从轮询开始计算
    pub deadline: Option<Duration>,
}

impl RetryPolicy {
    /// 固定间隔、无截止时间
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            backoff_multiplier: 1.0,
            max_interval: interval,
            deadline: None,
        }
    }

    /// 单模态图像推理使用的策略
    pub fn image() -> Self {
        Self {
            interval: Duration::from_millis(3000),
            max_attempts: 100,
            backoff_multiplier: 1.0,
            max_interval: Duration::from_millis(3000),
            deadline: Some(Duration::from_secs(300)),
        }
    }

    /// 集成推理使用的策略
    pub fn ensemble() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_attempts: 150,
            backoff_multiplier: 1.0,
            max_interval: Duration::from_millis(2000),
            deadline: Some(Duration::from_secs(300)),
        }
    }

    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.backoff_multiplier = multiplier;
        self.max_interval = max_interval;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// 第 `attempt` 次请求（从 0 开始）前的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.max(1.0);
        let factor = multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let cap = self.max_interval.max(self.interval);
        let scaled = self.interval.as_nanos() as f64 * factor;

        if !scaled.is_finite() || scaled >= cap.as_nanos() as f64 {
            cap
        } else {
            Duration::from_nanos(scaled.round() as u64)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::image()
    }
}

/// 轮询结束时的结果
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub prediction_id: String,
    pub state: PollState,
    /// 依次进入的状态；每次状态求值都记录一条
    pub transitions: Vec<PollState>,
    pub attempts: u32,
    pub artifact: Option<ArtifactData>,
}

/// 单个推理的激活图轮询器
pub struct ArtifactPoller {
    prediction_id: String,
    source: Arc<dyn StatusSource>,
    session: Session,
    policy: RetryPolicy,
    record: Option<SharedRecord>,
}

impl ArtifactPoller {
    pub fn new(
        prediction_id: impl Into<String>,
        source: Arc<dyn StatusSource>,
        session: Session,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            prediction_id: prediction_id.into(),
            source,
            session,
            policy,
            record: None,
        }
    }

    /// 就绪时把产物合并进该记录
    pub fn with_record(mut self, record: SharedRecord) -> Self {
        self.record = Some(record);
        self
    }

    pub fn prediction_id(&self) -> &str {
        &self.prediction_id
    }

    /// 启动轮询任务
    pub fn spawn(self) -> PollerHandle {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(PollState::Idle);
        let prediction_id = self.prediction_id.clone();

        let task = tokio::spawn(self.run(cancel.clone(), state_tx));

        PollerHandle {
            prediction_id,
            cancel,
            state: state_rx,
            task,
        }
    }

    async fn run(self, cancel: CancellationToken, state_tx: watch::Sender<PollState>) -> PollOutcome {
        let mut run = PollRun {
            prediction_id: self.prediction_id.clone(),
            transitions: vec![PollState::Idle],
            attempts: 0,
            state_tx,
        };

        info!("Starting artifact polling for prediction {}", self.prediction_id);
        run.enter(PollState::Polling, false);

        let started = Instant::now();
        loop {
            if run.attempts >= self.policy.max_attempts {
                error!(
                    "Artifact polling for {} gave up after {} attempts",
                    self.prediction_id, run.attempts
                );
                return run.finish(PollState::Failed, None);
            }

            let delay = self.policy.delay_for(run.attempts);
            if let Some(deadline) = self.policy.deadline {
                if started.elapsed() + delay > deadline {
                    error!(
                        "Artifact polling for {} exceeded deadline of {:?}",
                        self.prediction_id, deadline
                    );
                    return run.finish(PollState::Failed, None);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return run.cancelled(),
                _ = tokio::time::sleep(delay) => {}
            }

            let response = tokio::select! {
                _ = cancel.cancelled() => return run.cancelled(),
                response = self.source.artifact_status(&self.session, &self.prediction_id) => response,
            };
            run.attempts += 1;

            match response {
                Ok(status) => match status.into_artifact() {
                    Some(artifact) => {
                        if !self.merge(&cancel, &artifact).await {
                            return run.cancelled();
                        }
                        info!(
                            "Artifact ready for prediction {} after {} attempts",
                            self.prediction_id, run.attempts
                        );
                        return run.finish(PollState::Ready, Some(artifact));
                    }
                    None => {
                        debug!("Artifact for {} still pending (attempt {})", self.prediction_id, run.attempts);
                        run.enter(PollState::Polling, true);
                    }
                },
                Err(e) => {
                    warn!("Artifact status request for {} failed: {}", self.prediction_id, e);
                    run.enter(PollState::Polling, true);
                }
            }
        }
    }

    /// 合并产物，取消后不再修改记录
    async fn merge(&self, cancel: &CancellationToken, artifact: &ArtifactData) -> bool {
        let Some(record) = &self.record else {
            return !cancel.is_cancelled();
        };

        let mut record = record.write().await;
        if cancel.is_cancelled() {
            return false;
        }
        record.merge_artifact(artifact.clone());
        true
    }
}

struct PollRun {
    prediction_id: String,
    transitions: Vec<PollState>,
    attempts: u32,
    state_tx: watch::Sender<PollState>,
}

impl PollRun {
    fn enter(&mut self, state: PollState, record: bool) {
        if record {
            self.transitions.push(state);
        }
        self.state_tx.send_replace(state);
    }

    fn finish(mut self, state: PollState, artifact: Option<ArtifactData>) -> PollOutcome {
        self.enter(state, true);
        PollOutcome {
            prediction_id: self.prediction_id,
            state,
            transitions: self.transitions,
            attempts: self.attempts,
            artifact,
        }
    }

    fn cancelled(self) -> PollOutcome {
        info!("Artifact polling for {} cancelled", self.prediction_id);
        self.finish(PollState::Cancelled, None)
    }
}

/// 运行中轮询任务的句柄
#[derive(Debug)]
pub struct PollerHandle {
    prediction_id: String,
    cancel: CancellationToken,
    state: watch::Receiver<PollState>,
    task: JoinHandle<PollOutcome>,
}

impl PollerHandle {
    pub fn prediction_id(&self) -> &str {
        &self.prediction_id
    }

    /// 当前状态
    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 等待任务结束
    pub async fn join(self) -> PollOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Artifact poller for {} aborted: {}", self.prediction_id, e);
                PollOutcome {
                    prediction_id: self.prediction_id,
                    state: PollState::Failed,
                    transitions: vec![PollState::Idle, PollState::Failed],
                    attempts: 0,
                    artifact: None,
                }
            }
        }
    }
}

/// 移除已结束任务的句柄，结果不再可通过 `join` 取回
fn prune_finished(pollers: &mut HashMap<String, PollerHandle>) {
    pollers.retain(|prediction_id, handle| {
        let finished = handle.is_finished();
        if finished {
            debug!("Releasing finished artifact poller for {}", prediction_id);
        }
        !finished
    });
}

/// 轮询任务注册表，每个推理最多一个活跃轮询
///
/// 已结束的任务在下一次 `start` 或 `active_count` 时释放。
#[derive(Debug, Default)]
pub struct PollerRegistry {
    pollers: Mutex<HashMap<String, PollerHandle>>,
}

impl PollerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启动并登记轮询任务
    pub async fn start(&self, poller: ArtifactPoller) -> Result<watch::Receiver<PollState>> {
        let mut pollers = self.pollers.lock().await;
        prune_finished(&mut pollers);

        if pollers.contains_key(poller.prediction_id()) {
            return Err(NeuroError::Validation(format!(
                "artifact poller already active for prediction {}",
                poller.prediction_id()
            )));
        }

        let handle = poller.spawn();
        let receiver = handle.subscribe();
        pollers.insert(handle.prediction_id().to_string(), handle);
        Ok(receiver)
    }

    pub async fn is_active(&self, prediction_id: &str) -> bool {
        self.pollers
            .lock()
            .await
            .get(prediction_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// 清理已结束的任务后返回剩余数量
    pub async fn active_count(&self) -> usize {
        let mut pollers = self.pollers.lock().await;
        prune_finished(&mut pollers);
        pollers.len()
    }

    pub async fn cancel(&self, prediction_id: &str) -> bool {
        match self.pollers.lock().await.get(prediction_id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn cancel_all(&self) {
        for handle in self.pollers.lock().await.values() {
            handle.cancel();
        }
    }

    /// 移出句柄并等待其结束
    pub async fn join(&self, prediction_id: &str) -> Option<PollOutcome> {
        let handle = self.pollers.lock().await.remove(prediction_id)?;
        Some(handle.join().await)
    }
}
