//! 推理服务客户端
//!
//! 推理服务与激活图状态端点的接口抽象，以及基于 reqwest 的 HTTP 实现：
//! - `POST {base}/api/ml/predict`：单模态推理（multipart: file, disease, modality）
//! - `POST {base}/api/ml/predict-ensemble`：集成推理（multipart: file）
//! - `GET {base}/api/ml/cam-status/{id}`：激活图生成状态

use async_trait::async_trait;
use neuro_core::{ArtifactData, Disease, Modality, NeuroError, RegionScore, Result, Session};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// 一次推理请求
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    /// 集成推理不需要声明疾病
    pub disease: Option<Disease>,
    pub modality: Modality,
}

impl PredictionRequest {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
        disease: Option<Disease>,
        modality: Modality,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
            disease,
            modality,
        }
    }

    pub fn is_ensemble(&self) -> bool {
        self.modality == Modality::Ensemble
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image")
    }

    /// 是否会生成激活图
    ///
    /// 集成推理总会生成；帕金森只有 MRI 图像生成；其他疾病只看文件类型。
    pub fn qualifies_for_artifact(&self) -> bool {
        if self.is_ensemble() {
            return true;
        }
        match self.disease {
            Some(Disease::Parkinson) => self.modality.is_mri() && self.is_image(),
            _ => self.is_image(),
        }
    }
}

/// 推理服务响应
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictorResponse {
    #[serde(default)]
    pub prediction_id: Option<serde_json::Value>,
    #[serde(default)]
    pub predicted_class: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub probabilities: Option<BTreeMap<String, f64>>,
    /// 集成推理获胜模型名
    #[serde(default)]
    pub predicted_disease: Option<String>,
    /// 集成推理分数（0-100）
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PredictorResponse {
    /// 推理编号，服务端可能返回字符串或数字
    pub fn prediction_id(&self) -> Option<String> {
        match self.prediction_id.as_ref()? {
            serde_json::Value::String(id) if !id.is_empty() => Some(id.clone()),
            serde_json::Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

/// 激活图状态响应，缺少 `gradcam_url` 表示仍在生成
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactStatus {
    #[serde(default)]
    pub gradcam_url: Option<String>,
    #[serde(default)]
    pub activation_score: Option<f64>,
    #[serde(default)]
    pub activation_zone: Option<String>,
    #[serde(default)]
    pub region_scores: Option<BTreeMap<String, RegionScore>>,
    /// 集成推理时得票最多的模型
    #[serde(default)]
    pub main_disease: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ArtifactStatus {
    pub fn pending() -> Self {
        Self {
            status: Some("pending".to_string()),
            ..Self::default()
        }
    }

    pub fn ready(url: impl Into<String>, activation_score: Option<f64>) -> Self {
        Self {
            gradcam_url: Some(url.into()),
            activation_score,
            ..Self::default()
        }
    }

    pub fn is_ready(&self) -> bool {
        self.gradcam_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    /// 已就绪时转换为可合并的产物
    pub fn into_artifact(self) -> Option<ArtifactData> {
        if !self.is_ready() {
            return None;
        }
        Some(ArtifactData {
            artifact_url: self.gradcam_url?,
            activation_score: self.activation_score,
            activation_zone: self.activation_zone,
            region_scores: self.region_scores,
        })
    }
}

/// 推理服务接口
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, session: &Session, request: &PredictionRequest) -> Result<PredictorResponse>;
}

/// 激活图状态查询接口
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn artifact_status(&self, session: &Session, prediction_id: &str) -> Result<ArtifactStatus>;
}

pub(crate) fn transport(err: reqwest::Error) -> NeuroError {
    NeuroError::Transport(err.to_string())
}

/// 基于 HTTP 的推理服务客户端
#[derive(Debug, Clone)]
pub struct HttpPredictor {
    base_url: String,
    client: reqwest::Client,
}

impl HttpPredictor {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn predict_url(&self, ensemble: bool) -> String {
        if ensemble {
            format!("{}/api/ml/predict-ensemble", self.base_url)
        } else {
            format!("{}/api/ml/predict", self.base_url)
        }
    }

    pub fn status_url(&self, prediction_id: &str) -> String {
        format!("{}/api/ml/cam-status/{}", self.base_url, prediction_id)
    }

    /// 添加认证头
    pub(crate) fn add_auth_headers(request: reqwest::RequestBuilder, session: &Session) -> reqwest::RequestBuilder {
        match session.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn build_form(request: &PredictionRequest) -> Result<reqwest::multipart::Form> {
        let part = reqwest::multipart::Part::bytes(request.bytes.clone())
            .file_name(request.file_name.clone())
            .mime_str(&request.content_type)
            .map_err(transport)?;

        let mut form = reqwest::multipart::Form::new().part("file", part);
        if !request.is_ensemble() {
            if let Some(disease) = request.disease {
                form = form.text("disease", disease.as_str());
            }
            form = form.text("modality", request.modality.as_str().to_string());
        }
        Ok(form)
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn predict(&self, session: &Session, request: &PredictionRequest) -> Result<PredictorResponse> {
        let url = self.predict_url(request.is_ensemble());
        info!("Submitting {} ({}) to {}", request.file_name, request.modality, url);

        let form = Self::build_form(request)?;
        let builder = Self::add_auth_headers(self.client.post(&url).multipart(form), session);

        let response = builder.send().await.map_err(transport)?;
        let status = response.status();
        let body: PredictorResponse = response.json().await.map_err(transport)?;

        if let Some(error) = &body.error {
            return Err(NeuroError::Predictor(error.clone()));
        }
        if !status.is_success() {
            return Err(NeuroError::Predictor(format!("prediction request failed: {}", status)));
        }

        debug!("Prediction response: {:?}", body);
        Ok(body)
    }
}

#[async_trait]
impl StatusSource for HttpPredictor {
    async fn artifact_status(&self, session: &Session, prediction_id: &str) -> Result<ArtifactStatus> {
        let url = self.status_url(prediction_id);
        let builder = Self::add_auth_headers(self.client.get(&url), session);

        let response = builder.send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(NeuroError::Transport(format!(
                "status request for {} failed: {}",
                prediction_id,
                response.status()
            )));
        }

        response.json().await.map_err(transport)
    }
}
