//! 推理记录存储
//!
//! 持久化后端只通过 [`PredictionStore`] 接触，内存实现供命令行和测试使用。

use async_trait::async_trait;
use neuro_core::{NeuroError, Patient, PredictionRecord, Result, Session};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// 推理记录存储接口
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// 保存一条推理记录并返回已保存的版本
    async fn save_prediction(
        &self,
        session: &Session,
        patient_id: Uuid,
        record: PredictionRecord,
    ) -> Result<PredictionRecord>;

    /// 加载患者及其全部推理记录
    async fn load_patient(&self, session: &Session, patient_id: Uuid) -> Result<Patient>;
}

/// 内存存储
#[derive(Debug, Default)]
pub struct InMemoryStore {
    patients: RwLock<HashMap<Uuid, Patient>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patients(patients: impl IntoIterator<Item = Patient>) -> Self {
        let patients = patients.into_iter().map(|p| (p.id, p)).collect();
        Self {
            patients: RwLock::new(patients),
        }
    }

    /// 从 JSON 导出的患者（单个对象或数组）构建
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let patients: Vec<Patient> = match value {
            serde_json::Value::Array(_) => serde_json::from_value(value)?,
            _ => vec![serde_json::from_value(value)?],
        };

        for patient in &patients {
            for record in &patient.predictions {
                record.validate()?;
            }
        }

        info!("Loaded {} patients into memory store", patients.len());
        Ok(Self::with_patients(patients))
    }

    pub async fn insert_patient(&self, patient: Patient) {
        self.patients.write().await.insert(patient.id, patient);
    }

    pub async fn find_by_identifier(&self, identifier: &str) -> Option<Patient> {
        self.patients
            .read()
            .await
            .values()
            .find(|p| p.identifier == identifier)
            .cloned()
    }

    pub async fn patient_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.patients.read().await.keys().copied().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl PredictionStore for InMemoryStore {
    async fn save_prediction(
        &self,
        session: &Session,
        patient_id: Uuid,
        record: PredictionRecord,
    ) -> Result<PredictionRecord> {
        record.validate()?;

        let mut patients = self.patients.write().await;
        let patient = patients
            .get_mut(&patient_id)
            .ok_or_else(|| NeuroError::NotFound(format!("patient {}", patient_id)))?;

        debug!(
            "Saving prediction {} for patient {} (user {:?})",
            record.id, patient.identifier, session.user_id
        );
        patient.predictions.push(record.clone());
        Ok(record)
    }

    async fn load_patient(&self, _session: &Session, patient_id: Uuid) -> Result<Patient> {
        self.patients
            .read()
            .await
            .get(&patient_id)
            .cloned()
            .ok_or_else(|| NeuroError::NotFound(format!("patient {}", patient_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use neuro_core::Modality;

    #[tokio::test]
    async fn test_save_and_load() {
        let patient = Patient::new("P-001", "Jane Doe");
        let id = patient.id;
        let store = InMemoryStore::with_patients([patient]);
        let session = Session::anonymous();

        let record = PredictionRecord::new(Utc::now(), Some("alzheimer".into()), Modality::MriAxial, "AD", 0.9)
            .unwrap();
        let saved = store.save_prediction(&session, id, record.clone()).await.unwrap();
        assert_eq!(saved, record);

        let loaded = store.load_patient(&session, id).await.unwrap();
        assert_eq!(loaded.predictions.len(), 1);
        assert_eq!(loaded.predictions[0].raw_subtype, "AD");
    }

    #[tokio::test]
    async fn test_unknown_patient() {
        let store = InMemoryStore::new();
        let session = Session::anonymous();
        let record = PredictionRecord::new(Utc::now(), None, Modality::Audio, "healthy", 0.5).unwrap();

        let err = store.save_prediction(&session, Uuid::new_v4(), record).await.unwrap_err();
        assert!(matches!(err, NeuroError::NotFound(_)));
        assert!(store.load_patient(&session, Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_from_json() {
        let json = r#"{
            "id": "7f1c2b7e-1d3a-4c5e-9f00-0a1b2c3d4e5f",
            "identifier": "P-042",
            "fullName": "John Smith",
            "predictions": [
                {
                    "id": "0b6c3f0e-2222-4c5e-9f00-0a1b2c3d4e5f",
                    "timestamp": "2024-03-01T09:00:00Z",
                    "disease": "alzheimer",
                    "modality": "mri_axial",
                    "subtype": "EMCI",
                    "confidence": 0.71
                }
            ]
        }"#;

        let store = InMemoryStore::from_json(json).unwrap();
        let patient = store.find_by_identifier("P-042").await.unwrap();
        assert_eq!(patient.full_name, "John Smith");
        assert_eq!(patient.predictions[0].modality, Modality::MriAxial);
        assert_eq!(store.patient_ids().await.len(), 1);

        let invalid = json.replace("0.71", "1.71");
        assert!(InMemoryStore::from_json(&invalid).is_err());
    }
}
