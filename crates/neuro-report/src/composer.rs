//! 报告组装
//!
//! 把患者信息和推理历史组装成块树。组装是纯函数：同样的输入和生成日期
//! 总得到同样的文档，对任何领域数据都不会失败。

use crate::document::{Align, Block, ReportDocument, Section, SectionKind, Table, TextStyle};
use crate::narrative::{
    disease_heading, no_predictions, subtype_narrative, CLINICAL_CONTEXT, CLINICAL_CONTEXT_HEADING, DISCLAIMER,
    DRAWING_ANALYSIS, HISTORY_HEADERS, HISTORY_HEADING, INTERPRETATION_HEADING, REPORT_TITLE, VOICE_ANALYSIS,
};
use chrono::NaiveDate;
use neuro_analysis::{
    canonical_findings, canonicalize, modality_mean_confidence, resolve_disease, summarize_subtypes, ConfidenceLevel,
};
use neuro_core::utils::{confidence_percent, format_day};
use neuro_core::{Disease, Modality, Patient, PredictionRecord};

/// 空字段占位符
pub const BLANK: &str = "—";

fn or_blank(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => BLANK.to_string(),
    }
}

/// 报告组装器
#[derive(Debug, Clone)]
pub struct ReportComposer {
    title: String,
    product_name: String,
}

impl Default for ReportComposer {
    fn default() -> Self {
        Self {
            title: REPORT_TITLE.to_string(),
            product_name: "NeuroPredict".to_string(),
        }
    }
}

impl ReportComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 自定义产品名，影响标题和生成说明
    pub fn with_product_name(mut self, product_name: impl Into<String>) -> Self {
        self.product_name = product_name.into();
        self.title = format!("{} - Medical Report", self.product_name);
        self
    }

    pub fn compose(&self, patient: &Patient, generated_on: NaiveDate) -> ReportDocument {
        let sections = vec![
            self.cover(patient),
            Self::patient_information(patient),
            Self::prediction_history(patient),
            Self::interpretation(&patient.predictions),
            Self::modality_narratives(&patient.predictions),
            self.clinical_context(generated_on),
        ];

        tracing::info!(
            "Composed report for patient {} with {} predictions",
            patient.identifier,
            patient.predictions.len()
        );

        ReportDocument {
            title: self.title.clone(),
            patient_identifier: patient.identifier.clone(),
            generated_on,
            sections,
        }
    }

    fn cover(&self, patient: &Patient) -> Section {
        let mut section = Section::new(SectionKind::Cover, false);
        section
            .push(Block::fixed(self.title.as_str(), TextStyle::Title, 40.0, Align::Center))
            .push(Block::fixed(
                format!("Patient: {}", patient.full_name),
                TextStyle::Subtitle,
                55.0,
                Align::Center,
            ))
            .push(Block::fixed(
                format!("Patient ID: {}", patient.identifier),
                TextStyle::Subtitle,
                63.0,
                Align::Center,
            ))
            .push(Block::fixed(DISCLAIMER, TextStyle::Body, 75.0, Align::Center));
        section
    }

    fn patient_information(patient: &Patient) -> Section {
        let mut table = Table::new(vec!["Field".to_string(), "Value".to_string()]).with_weights(vec![1.0, 3.0]);
        let rows = [
            ("Full Name", or_blank(Some(patient.full_name.as_str()))),
            ("National ID", or_blank(patient.national_id.as_deref())),
            ("Gender", or_blank(patient.gender.as_deref())),
            (
                "Date of Birth",
                patient.date_of_birth.map(format_day).unwrap_or_else(|| BLANK.to_string()),
            ),
            ("Patient ID", or_blank(Some(patient.identifier.as_str()))),
            ("Known Conditions", or_blank(patient.known_conditions.as_deref())),
            ("Notes", or_blank(patient.notes.as_deref())),
        ];
        for (field, value) in rows {
            table.push_row(vec![field.to_string(), value]);
        }

        let mut section = Section::new(SectionKind::PatientInformation, true);
        section
            .push(Block::flow("Patient Information", TextStyle::Heading))
            .push(Block::Gap(2.0))
            .push(Block::Table(table));
        section
    }

    fn history_row(record: &PredictionRecord) -> Vec<String> {
        let resolved = resolve_disease(record);
        let subtype = match (&record.modality, resolved.disease()) {
            (Modality::Audio, _) => BLANK.to_string(),
            (modality, Some(disease)) => canonicalize(modality, &record.raw_subtype, disease).to_string(),
            (_, None) => or_blank(Some(record.raw_subtype.as_str())),
        };

        vec![
            format_day(record.day()),
            resolved.as_str().to_uppercase(),
            subtype,
            record.modality.display_name().to_string(),
            format!("{}%", confidence_percent(record.confidence)),
        ]
    }

    fn prediction_history(patient: &Patient) -> Section {
        let mut section = Section::new(SectionKind::PredictionHistory, false);
        section.push(Block::Gap(6.0));

        let records = patient.sorted_predictions();
        if records.is_empty() {
            section
                .push(Block::flow(HISTORY_HEADING, TextStyle::Subheading))
                .push(Block::Gap(2.0))
                .push(Block::body("No predictions recorded."));
            return section;
        }

        let mut table = Table::new(HISTORY_HEADERS.iter().map(|h| h.to_string()).collect())
            .with_caption(HISTORY_HEADING)
            .with_weights(vec![1.2, 1.2, 1.0, 1.3, 1.0]);
        for record in records {
            table.push_row(Self::history_row(record));
        }
        section.push(Block::Table(table));
        section
    }

    fn interpretation(records: &[PredictionRecord]) -> Section {
        let findings = canonical_findings(records);

        let mut section = Section::new(SectionKind::Interpretation, true);
        section
            .push(Block::flow(INTERPRETATION_HEADING, TextStyle::Heading))
            .push(Block::Gap(3.0));

        for disease in Disease::ALL {
            section.push(Block::flow(disease_heading(disease), TextStyle::Subheading));

            let summaries = summarize_subtypes(&findings, disease);
            if summaries.is_empty() {
                section.push(Block::body(no_predictions(disease)));
            }
            for summary in summaries {
                section.push(Block::flow(summary.subtype, TextStyle::Strong));
                if let Some(narrative) = subtype_narrative(disease, summary.subtype) {
                    section.push(Block::body(narrative));
                }
                section.push(Block::body(format!(
                    "Average confidence: {}% ({}).",
                    confidence_percent(summary.mean_confidence),
                    ConfidenceLevel::from_confidence(summary.mean_confidence).describe()
                )));
                section.push(Block::Gap(2.0));
            }
            section.push(Block::Gap(3.0));
        }
        section
    }

    fn modality_narratives(records: &[PredictionRecord]) -> Section {
        let mut section = Section::new(SectionKind::ModalityNarratives, false);

        let blocks = [
            (Modality::Audio, VOICE_ANALYSIS, "audio"),
            (Modality::Drawing, DRAWING_ANALYSIS, "drawing"),
        ];
        for (modality, narrative, label) in blocks {
            match modality_mean_confidence(records, &modality) {
                Some(mean) => {
                    section.push(Block::body(format!(
                        "{}\nAverage {} confidence: {}%.",
                        narrative,
                        label,
                        confidence_percent(mean)
                    )));
                }
                None => {
                    section.push(Block::body(format!("No {} predictions available.", label)));
                }
            }
            section.push(Block::Gap(2.0));
        }
        section
    }

    fn clinical_context(&self, generated_on: NaiveDate) -> Section {
        let mut section = Section::new(SectionKind::ClinicalContext, true);
        section
            .push(Block::flow(CLINICAL_CONTEXT_HEADING, TextStyle::Heading))
            .push(Block::Gap(3.0))
            .push(Block::body(CLINICAL_CONTEXT))
            .push(Block::Footer {
                text: format!(
                    "Report generated by {} on {}",
                    self.product_name,
                    format_day(generated_on)
                ),
                style: TextStyle::Caption,
            });
        section
    }
}

/// 使用默认组装器生成报告
pub fn compose_report(patient: &Patient, generated_on: NaiveDate) -> ReportDocument {
    ReportComposer::new().compose(patient, generated_on)
}
