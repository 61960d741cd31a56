//! 亚型与模态统计
//!
//! 报告解读部分使用的每亚型平均置信度、各模态平均置信度，以及
//! 置信度与激活强度的文字描述。

use crate::canonicalizer::canonicalize_record;
use chrono::{DateTime, Utc};
use neuro_core::utils::mean;
use neuro_core::{CanonicalFinding, Disease, Modality, PredictionRecord};
use serde::Serialize;

/// 某个亚型的汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtypeSummary {
    pub disease: Disease,
    pub subtype: &'static str,
    pub count: usize,
    pub mean_confidence: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// 所有记录的规范化发现（无法归入已知疾病的记录被跳过）
pub fn canonical_findings(records: &[PredictionRecord]) -> Vec<CanonicalFinding> {
    records.iter().filter_map(canonicalize_record).collect()
}

/// 按疾病有序亚型列表汇总，只包含实际出现过的亚型
pub fn summarize_subtypes(findings: &[CanonicalFinding], disease: Disease) -> Vec<SubtypeSummary> {
    disease
        .subtypes()
        .iter()
        .copied()
        .filter_map(|subtype| {
            let matches: Vec<&CanonicalFinding> = findings
                .iter()
                .filter(|f| f.disease == disease && f.subtype == subtype)
                .collect();

            let mean_confidence = mean(matches.iter().map(|f| f.confidence))?;
            let first_seen = matches.iter().map(|f| f.timestamp).min()?;
            let last_seen = matches.iter().map(|f| f.timestamp).max()?;

            Some(SubtypeSummary {
                disease,
                subtype,
                count: matches.len(),
                mean_confidence,
                first_seen,
                last_seen,
            })
        })
        .collect()
}

/// 某个模态全部记录的平均置信度
pub fn modality_mean_confidence(records: &[PredictionRecord], modality: &Modality) -> Option<f64> {
    mean(
        records
            .iter()
            .filter(|r| &r.modality == modality)
            .map(|r| r.confidence),
    )
}

/// 置信度等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ConfidenceLevel {
    Low,
    Moderate,
    High,
    VeryStrong,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.9 {
            Self::VeryStrong
        } else if confidence > 0.75 {
            Self::High
        } else if confidence > 0.5 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::VeryStrong => "very strong",
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
        }
    }
}

/// 激活图强度的解读
pub fn interpret_activation(activation_score: f64) -> &'static str {
    if activation_score > 0.7 {
        "High activation: clear region highlight typical for advanced stage."
    } else if activation_score > 0.4 {
        "Moderate activation: region highlight suggests mild to moderate pathology."
    } else {
        "Low activation: weak highlight, possible healthy pattern or early stage."
    }
}

/// 单个脑区注意力平均值的解读
pub fn interpret_region_attention(average: f64) -> &'static str {
    if average < 0.2 {
        "The model showed limited attention in this area."
    } else if average >= 0.4 {
        "This region played a significant role in the model's prediction."
    } else {
        "The model showed moderate attention in this area."
    }
}
