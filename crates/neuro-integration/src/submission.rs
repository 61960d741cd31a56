//! 推理提交流程
//!
//! 调用推理服务、校验结果、保存记录，符合条件时启动激活图轮询。

use crate::client::{PredictionRequest, Predictor, PredictorResponse, StatusSource};
use crate::poller::{ArtifactPoller, PollState, PollerRegistry, RetryPolicy, SharedRecord};
use crate::store::PredictionStore;
use chrono::Utc;
use neuro_analysis::resolve_ensemble_disease;
use neuro_core::{Disease, NeuroError, PredictionRecord, Result, Session};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

/// 各调用方的轮询策略
#[derive(Debug, Clone, PartialEq)]
pub struct PollingPolicies {
    pub image: RetryPolicy,
    pub ensemble: RetryPolicy,
}

impl Default for PollingPolicies {
    fn default() -> Self {
        Self {
            image: RetryPolicy::image(),
            ensemble: RetryPolicy::ensemble(),
        }
    }
}

/// 一次成功提交的结果
#[derive(Debug)]
pub struct Submission {
    pub record: SharedRecord,
    pub response: PredictorResponse,
    pub prediction_id: Option<String>,
    /// 启动了激活图轮询时的状态订阅
    pub poller: Option<watch::Receiver<PollState>>,
}

/// 推理服务编排
pub struct PredictionService {
    predictor: Arc<dyn Predictor>,
    status: Arc<dyn StatusSource>,
    store: Arc<dyn PredictionStore>,
    registry: Arc<PollerRegistry>,
    policies: PollingPolicies,
}

impl PredictionService {
    pub fn new(
        predictor: Arc<dyn Predictor>,
        status: Arc<dyn StatusSource>,
        store: Arc<dyn PredictionStore>,
    ) -> Self {
        Self {
            predictor,
            status,
            store,
            registry: Arc::new(PollerRegistry::new()),
            policies: PollingPolicies::default(),
        }
    }

    pub fn with_policies(mut self, policies: PollingPolicies) -> Self {
        self.policies = policies;
        self
    }

    pub fn registry(&self) -> &Arc<PollerRegistry> {
        &self.registry
    }

    /// 提交一次推理
    pub async fn submit(
        &self,
        session: &Session,
        patient_id: Uuid,
        request: PredictionRequest,
    ) -> Result<Submission> {
        let response = self.predictor.predict(session, &request).await?;
        let (disease, subtype, confidence) = interpret_response(&request, &response)?;

        let prediction_id = response.prediction_id();
        let mut record = PredictionRecord::new(
            Utc::now(),
            Some(disease.as_str().to_string()),
            request.modality.clone(),
            subtype,
            confidence,
        )?;
        if let Some(probabilities) = response.probabilities.clone() {
            record = record.with_probabilities(probabilities);
        }
        if let Some(id) = &prediction_id {
            record = record.with_artifact_ref(id.clone());
        }

        let saved = self.store.save_prediction(session, patient_id, record).await?;
        info!(
            "Saved {} prediction {} ({}, {:.2}) for patient {}",
            disease, saved.id, saved.raw_subtype, saved.confidence, patient_id
        );

        let record = Arc::new(RwLock::new(saved));
        let poller = match (&prediction_id, request.qualifies_for_artifact()) {
            (Some(id), true) => {
                let policy = if request.is_ensemble() {
                    self.policies.ensemble.clone()
                } else {
                    self.policies.image.clone()
                };
                let poller = ArtifactPoller::new(id.clone(), self.status.clone(), session.clone(), policy)
                    .with_record(record.clone());
                Some(self.registry.start(poller).await?)
            }
            (None, true) => {
                warn!("Prediction response has no prediction_id, artifact will not be polled");
                None
            }
            _ => None,
        };

        Ok(Submission {
            record,
            response,
            prediction_id,
            poller,
        })
    }
}

/// 从推理响应中取出疾病、亚型与置信度
///
/// 集成推理按获胜模型确定疾病，分数为百分制；帕金森模型的标签先映射为规范亚型。
pub fn interpret_response(
    request: &PredictionRequest,
    response: &PredictorResponse,
) -> Result<(Disease, String, f64)> {
    let subtype = response
        .predicted_class
        .as_deref()
        .filter(|class| !class.trim().is_empty())
        .ok_or_else(|| NeuroError::MissingPredictionData("predicted_class".to_string()))?;

    if request.is_ensemble() {
        let score = response
            .score
            .ok_or_else(|| NeuroError::MissingPredictionData("score".to_string()))?;
        let disease = resolve_ensemble_disease(response.predicted_disease.as_deref());
        return Ok((disease, subtype.to_string(), score / 100.0));
    }

    let confidence = response
        .confidence
        .ok_or_else(|| NeuroError::MissingPredictionData("confidence".to_string()))?;
    let disease = request
        .disease
        .ok_or_else(|| NeuroError::Validation(format!("no disease declared for {} prediction", request.modality)))?;

    let subtype = match (disease, subtype) {
        (Disease::Parkinson, "Parkinson") => "PD",
        (Disease::Parkinson, "Healthy") => "Control",
        (_, other) => other,
    };

    Ok((disease, subtype.to_string(), confidence))
}
