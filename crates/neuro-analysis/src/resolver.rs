//! 疾病类别解析
//!
//! 上游模型的输出词表隐含了疾病类别，声明字段可能过期或过于笼统，
//! 因此先按模态判断，再退回到声明字段。

use neuro_core::{Disease, Modality, PredictionRecord, ResolvedDisease};

/// 音频模型中指向帕金森病的标签
const PARKINSON_AUDIO_VOCABULARY: [&str; 3] = ["parkinson", "parkinsons", "pd"];

/// 音频模型中指向阿尔茨海默病（含健康对照）的标签
const ALZHEIMER_AUDIO_VOCABULARY: [&str; 4] = ["healthy", "alzheimer", "alzheimers", "ad"];

/// 疾病解析器
#[derive(Debug, Default, Clone, Copy)]
pub struct DiseaseResolver;

impl DiseaseResolver {
    pub fn new() -> Self {
        Self
    }

    /// 解析一条推理记录所属的疾病
    pub fn resolve(&self, record: &PredictionRecord) -> ResolvedDisease {
        self.resolve_parts(&record.modality, record.disease.as_deref(), &record.raw_subtype)
    }

    /// 按模态、声明疾病和原始标签解析疾病，对任意输入都有唯一结果
    pub fn resolve_parts(
        &self,
        modality: &Modality,
        declared: Option<&str>,
        raw_label: &str,
    ) -> ResolvedDisease {
        match modality {
            Modality::Audio => {
                let label = raw_label.trim().to_lowercase();
                if PARKINSON_AUDIO_VOCABULARY.contains(&label.as_str()) {
                    ResolvedDisease::Known(Disease::Parkinson)
                } else if ALZHEIMER_AUDIO_VOCABULARY.contains(&label.as_str()) {
                    ResolvedDisease::Known(Disease::Alzheimer)
                } else {
                    ResolvedDisease::Unknown
                }
            }
            Modality::Drawing => ResolvedDisease::Known(Disease::Parkinson),
            Modality::MriAxial | Modality::MriSagittal | Modality::Ensemble => {
                ResolvedDisease::Known(Disease::Alzheimer)
            }
            Modality::Other(_) => Self::declared(declared),
        }
    }

    fn declared(declared: Option<&str>) -> ResolvedDisease {
        match declared.map(str::trim).filter(|d| !d.is_empty()) {
            None => ResolvedDisease::Unknown,
            Some(label) => match Disease::from_label(label) {
                Some(disease) => ResolvedDisease::Known(disease),
                None => ResolvedDisease::Declared(label.to_string()),
            },
        }
    }
}

/// 解析推理记录所属的疾病
pub fn resolve_disease(record: &PredictionRecord) -> ResolvedDisease {
    DiseaseResolver.resolve(record)
}

/// 集成模型返回获胜模型名（如 "Alzheimer Axial"、"Parkinson"），据此确定保存时的疾病
pub fn resolve_ensemble_disease(predicted_disease: Option<&str>) -> Disease {
    match predicted_disease {
        Some(name) if name.to_lowercase().contains("parkinson") => Disease::Parkinson,
        _ => Disease::Alzheimer,
    }
}
