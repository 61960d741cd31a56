//! 核心数据模型定义

use crate::error::{NeuroError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// 阿尔茨海默病亚型，按病程由轻到重排列
pub const ALZHEIMER_SUBTYPES: [&str; 5] = ["CN", "EMCI", "MCI", "LMCI", "AD"];

/// 帕金森病亚型，按病程由轻到重排列
pub const PARKINSON_SUBTYPES: [&str; 4] = ["Control", "Prodromal", "SWEDD", "PD"];

/// 数据模态
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Modality {
    MriAxial,
    MriSagittal,
    Audio,
    Drawing,
    Ensemble,
    /// 未知模态，保留原始取值
    Other(String),
}

impl Modality {
    pub fn as_str(&self) -> &str {
        match self {
            Self::MriAxial => "mri_axial",
            Self::MriSagittal => "mri_sagittal",
            Self::Audio => "audio",
            Self::Drawing => "drawing",
            Self::Ensemble => "ensemble",
            Self::Other(raw) => raw,
        }
    }

    /// 报告中使用的显示名称
    pub fn display_name(&self) -> &str {
        match self {
            Self::MriAxial => "MRI Axial",
            Self::MriSagittal => "MRI Sagittal",
            Self::Audio => "Audio",
            Self::Drawing => "Drawing",
            Self::Ensemble => "Ensemble",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_mri(&self) -> bool {
        matches!(self, Self::MriAxial | Self::MriSagittal)
    }
}

impl From<&str> for Modality {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "mri_axial" => Self::MriAxial,
            "mri_sagittal" => Self::MriSagittal,
            "audio" => Self::Audio,
            "drawing" => Self::Drawing,
            "ensemble" => Self::Ensemble,
            _ => Self::Other(value.to_string()),
        }
    }
}

impl From<String> for Modality {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Modality> for String {
    fn from(value: Modality) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 疾病类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disease {
    Alzheimer,
    Parkinson,
}

impl Disease {
    /// 报告中疾病的固定顺序
    pub const ALL: [Disease; 2] = [Disease::Alzheimer, Disease::Parkinson];

    /// 该疾病的有序亚型集合
    pub fn subtypes(&self) -> &'static [&'static str] {
        match self {
            Self::Alzheimer => &ALZHEIMER_SUBTYPES,
            Self::Parkinson => &PARKINSON_SUBTYPES,
        }
    }

    /// 最健康（默认）亚型
    pub fn default_subtype(&self) -> &'static str {
        self.subtypes()[0]
    }

    /// 亚型在有序集合中的位置
    pub fn ordinal_of(&self, subtype: &str) -> Option<usize> {
        self.subtypes().iter().position(|s| *s == subtype)
    }

    /// 把任意字符串映射到集合中的静态亚型
    pub fn member(&self, subtype: &str) -> Option<&'static str> {
        self.subtypes().iter().copied().find(|s| *s == subtype)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alzheimer => "alzheimer",
            Self::Parkinson => "parkinson",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Alzheimer => "Alzheimer",
            Self::Parkinson => "Parkinson",
        }
    }

    /// 解析声明的疾病名称
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "alzheimer" => Some(Self::Alzheimer),
            "parkinson" => Some(Self::Parkinson),
            _ => None,
        }
    }
}

impl fmt::Display for Disease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 疾病解析结果
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ResolvedDisease {
    Known(Disease),
    Unknown,
    /// 上游声明的、无法识别的疾病名称
    Declared(String),
}

impl ResolvedDisease {
    pub fn disease(&self) -> Option<Disease> {
        match self {
            Self::Known(disease) => Some(*disease),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(disease) => disease.as_str(),
            Self::Unknown => "unknown",
            Self::Declared(raw) => raw,
        }
    }
}

impl fmt::Display for ResolvedDisease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个脑区的注意力统计
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionScore {
    pub average: f64,
    pub peak: f64,
}

/// 延迟生成的可视化产物（激活图）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactData {
    pub artifact_url: String,
    pub activation_score: Option<f64>,
    /// 激活最强的脑区名称
    #[serde(default)]
    pub activation_zone: Option<String>,
    #[serde(default)]
    pub region_scores: Option<BTreeMap<String, RegionScore>>,
}

/// 单次推理结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub disease: Option<String>,
    pub modality: Modality,
    #[serde(rename = "subtype", default)]
    pub raw_subtype: String,
    pub confidence: f64,
    #[serde(default)]
    pub probabilities: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub artifact_ref: Option<String>,
    #[serde(default)]
    pub artifact: Option<ArtifactData>,
}

impl PredictionRecord {
    /// 创建新的推理记录，置信度必须位于 [0, 1]
    pub fn new(
        timestamp: DateTime<Utc>,
        disease: Option<String>,
        modality: Modality,
        raw_subtype: impl Into<String>,
        confidence: f64,
    ) -> Result<Self> {
        let record = Self {
            id: Uuid::new_v4(),
            timestamp,
            disease,
            modality,
            raw_subtype: raw_subtype.into(),
            confidence,
            probabilities: None,
            artifact_ref: None,
            artifact: None,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn with_probabilities(mut self, probabilities: BTreeMap<String, f64>) -> Self {
        self.probabilities = Some(probabilities);
        self
    }

    pub fn with_artifact_ref(mut self, artifact_ref: impl Into<String>) -> Self {
        self.artifact_ref = Some(artifact_ref.into());
        self
    }

    /// 校验记录不变量
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(NeuroError::Validation(format!(
                "confidence {} outside [0, 1] for prediction {}",
                self.confidence, self.id
            )));
        }
        Ok(())
    }

    /// 合并延迟到达的产物；已有产物不会被撤销
    pub fn merge_artifact(&mut self, artifact: ArtifactData) {
        if artifact.artifact_url.is_empty() {
            return;
        }
        self.artifact = Some(artifact);
    }

    pub fn has_artifact(&self) -> bool {
        self.artifact.is_some()
    }

    /// 时间戳对应的日历日（UTC）
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// 规范化后的发现，仅在内存中派生
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalFinding {
    pub disease: Disease,
    pub subtype: &'static str,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub modality: Modality,
}

impl CanonicalFinding {
    pub fn ordinal(&self) -> usize {
        self.disease.ordinal_of(self.subtype).unwrap_or(0)
    }
}

/// 时间线上某一天的代表性发现
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub day: NaiveDate,
    pub ordinal: usize,
    pub subtype: &'static str,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// 患者信息
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub identifier: String,
    #[serde(default)]
    pub national_id: Option<String>,
    pub full_name: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub known_conditions: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub predictions: Vec<PredictionRecord>,
}

impl Patient {
    pub fn new(identifier: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            identifier: identifier.into(),
            national_id: None,
            full_name: full_name.into(),
            gender: None,
            date_of_birth: None,
            known_conditions: None,
            notes: None,
            predictions: Vec::new(),
        }
    }

    /// 按时间升序排列的推理记录（稳定排序）
    pub fn sorted_predictions(&self) -> Vec<&PredictionRecord> {
        let mut sorted: Vec<&PredictionRecord> = self.predictions.iter().collect();
        sorted.sort_by_key(|p| p.timestamp);
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_modality_wire_names() {
        assert_eq!(Modality::from("mri_axial"), Modality::MriAxial);
        assert_eq!(Modality::from(" Audio "), Modality::Audio);
        assert_eq!(Modality::from("pet"), Modality::Other("pet".to_string()));
        assert_eq!(String::from(Modality::Ensemble), "ensemble");
    }

    #[test]
    fn test_modality_serde() {
        let json = serde_json::to_string(&Modality::MriSagittal).unwrap();
        assert_eq!(json, "\"mri_sagittal\"");
        let back: Modality = serde_json::from_str("\"drawing\"").unwrap();
        assert_eq!(back, Modality::Drawing);
    }

    #[test]
    fn test_disease_ordinals() {
        assert_eq!(Disease::Alzheimer.ordinal_of("MCI"), Some(2));
        assert_eq!(Disease::Parkinson.ordinal_of("PD"), Some(3));
        assert_eq!(Disease::Parkinson.ordinal_of("AD"), None);
        assert_eq!(Disease::Alzheimer.default_subtype(), "CN");
        assert_eq!(Disease::Parkinson.default_subtype(), "Control");
    }

    #[test]
    fn test_prediction_confidence_bounds() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        assert!(PredictionRecord::new(ts, None, Modality::Audio, "healthy", 0.5).is_ok());
        assert!(PredictionRecord::new(ts, None, Modality::Audio, "healthy", 1.2).is_err());
        assert!(PredictionRecord::new(ts, None, Modality::Audio, "healthy", -0.1).is_err());
        assert!(PredictionRecord::new(ts, None, Modality::Audio, "healthy", f64::NAN).is_err());
    }

    #[test]
    fn test_merge_artifact_is_monotonic() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut record =
            PredictionRecord::new(ts, None, Modality::MriAxial, "MCI", 0.8).unwrap();
        record.merge_artifact(ArtifactData {
            artifact_url: "/static/cam.png".to_string(),
            activation_score: Some(0.6),
            activation_zone: None,
            region_scores: None,
        });
        record.merge_artifact(ArtifactData {
            artifact_url: String::new(),
            activation_score: None,
            activation_zone: None,
            region_scores: None,
        });
        assert_eq!(
            record.artifact.as_ref().map(|a| a.artifact_url.as_str()),
            Some("/static/cam.png")
        );
    }

    #[test]
    fn test_patient_json_shape() {
        let json = r#"{
            "id": "5f0c6b0e-2b1d-4c55-9d2e-0d9b0f1a2b3c",
            "identifier": "P-001",
            "fullName": "Jane Doe",
            "predictions": [{
                "id": "7a1c6b0e-2b1d-4c55-9d2e-0d9b0f1a2b3c",
                "timestamp": "2024-03-01T09:00:00Z",
                "disease": "alzheimer",
                "modality": "mri_axial",
                "subtype": "EMCI",
                "confidence": 0.82
            }]
        }"#;
        let patient: Patient = serde_json::from_str(json).unwrap();
        assert_eq!(patient.full_name, "Jane Doe");
        assert_eq!(patient.predictions[0].raw_subtype, "EMCI");
        assert_eq!(patient.predictions[0].modality, Modality::MriAxial);
    }
}
