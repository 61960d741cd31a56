//! 报告固定文案

use neuro_core::Disease;

pub const REPORT_TITLE: &str = "NeuroPredict - Medical Report";

pub const DISCLAIMER: &str =
    "This confidential report provides an AI-assisted analysis to support clinical decision-making.";

pub const HISTORY_HEADING: &str = "Prediction History (AI Inference Summary)";

pub const HISTORY_HEADERS: [&str; 5] = ["Date", "Disease", "Subtype", "Modality", "Confidence"];

pub const INTERPRETATION_HEADING: &str = "AI Medical Interpretation";

pub const CLINICAL_CONTEXT_HEADING: &str = "Clinical Context and Guidance";

pub const CLINICAL_CONTEXT: &str = "This report provides an AI-based overview of the patient's neurocognitive status derived from imaging, audio, and handwriting analyses.
It should be interpreted by qualified specialists alongside neuropsychological exams and daily functional assessments.
This complements but does not replace full clinical evaluation.";

pub const VOICE_ANALYSIS: &str = "Voice Analysis:
Speech signal analyzed for tremor, monotone delivery, and reduced pitch variation.
Indicates possible hypokinetic dysarthria typical of Parkinson's.
Recommendation: Combine with a clinical speech exam, consider referral to speech-language pathology.";

pub const DRAWING_ANALYSIS: &str = "Drawing Analysis:
Handwriting and drawing speed assessed for tremor amplitude, micrographia, and motor slowing.
Indicative of Parkinsonian fine motor impairment.
Recommendation: Occupational therapy and fine motor skill exercises advised.";

/// 疾病段落标题
pub fn disease_heading(disease: Disease) -> String {
    format!("{} Disease:", disease.display_name())
}

/// 疾病没有任何发现时的占位文本
pub fn no_predictions(disease: Disease) -> String {
    format!("No {} predictions available.", disease.display_name())
}

/// 亚型的固定解读文本
pub fn subtype_narrative(disease: Disease, subtype: &str) -> Option<&'static str> {
    let text = match (disease, subtype) {
        (Disease::Alzheimer, "CN") => "Cognitively Normal: No signs of neurodegeneration. Hippocampal and cortical structures intact.
Symptoms: Normal memory and cognitive function.
Brain regions: No significant atrophy.
Proteins: Normal beta-amyloid and tau levels.
Recommendation: Routine annual cognitive screening, maintain healthy diet and exercise.
Care: No special care required.",
        (Disease::Alzheimer, "EMCI") => "Early Mild Cognitive Impairment: Early hippocampal shrinkage and subtle beta-amyloid buildup.
Symptoms: Mild short-term memory lapses, slight difficulty with complex tasks.
Brain regions: Hippocampus, entorhinal cortex.
Proteins: Slight decrease in soluble beta-amyloid, increased phosphorylated tau.
Recommendations: Repeat MRI in 12 months, consider CSF biomarker testing.
Care: Family support, lifestyle adjustment with Mediterranean diet and mental stimulation.",
        (Disease::Alzheimer, "MCI") => "Mild Cognitive Impairment: Clear short-term memory issues and some daily task challenges.
Symptoms: Frequent forgetfulness, misplaced items, occasional confusion.
Brain regions: Hippocampus, temporal cortex.
Proteins: Low CSF beta-amyloid, high total and phosphorylated tau.
Recommendations: PET Amyloid scan, neuropsychological testing.
Care: May need occasional assistance for daily planning, early caregiver education recommended.",
        (Disease::Alzheimer, "LMCI") => "Late Mild Cognitive Impairment: Advanced stage of MCI with significant daily memory and orientation problems.
Symptoms: Difficulty recognizing familiar people, misplacing objects, increased confusion.
Brain regions: Significant hippocampal atrophy, cortical thinning in temporal and parietal lobes.
Proteins: Widespread amyloid plaques and neurofibrillary tangles.
Recommendations: Prepare for assisted living, consider clinical trials for slowing progression.
Care: Daily support from family or professionals is advised.",
        (Disease::Alzheimer, "AD") => "Alzheimer's Dementia: Severe cognitive decline, functional dependence.
Symptoms: Profound memory loss, personality changes, difficulty with basic self-care.
Brain regions: Severe hippocampal and neocortical damage, enlarged ventricles.
Proteins: Heavy beta-amyloid plaque deposition and tau tangle accumulation, extensive synaptic loss.
Recommendations: Cholinesterase inhibitors (Donepezil), NMDA receptor antagonist (Memantine), palliative care planning.
Care: 24/7 supervision and comprehensive care planning.",
        (Disease::Parkinson, "Control") => "Healthy Control: No motor or non-motor Parkinsonian symptoms.
Brain regions: Substantia nigra normal.
Proteins: Normal alpha-synuclein levels.
Recommendation: No further follow-up needed unless new symptoms appear.
Care: None required.",
        (Disease::Parkinson, "Prodromal") => "Prodromal Parkinson's: Subtle early signs like loss of smell, constipation, or REM sleep disorder.
Brain regions: Early changes in olfactory bulb, lower brainstem.
Proteins: Initial alpha-synuclein misfolding may be present.
Recommendation: Annual neurological exams, possible DaTscan if motor symptoms arise.
Care: Encourage physical activity and healthy sleep patterns.",
        (Disease::Parkinson, "SWEDD") => "SWEDD (Scans Without Evidence of Dopaminergic Deficit): Clinical Parkinsonian signs but normal dopaminergic scan.
Possible misdiagnosis: consider essential tremor or drug-induced parkinsonism.
Brain regions: Normal substantia nigra.
Proteins: No significant alpha-synuclein pathology.
Recommendation: Refer to a movement disorder specialist, reassess diagnosis.
Care: Depends on alternate cause.",
        (Disease::Parkinson, "PD") => "Parkinson's Disease: Classic signs include resting tremor, muscle stiffness, slow movement, balance issues.
Brain regions: Neuronal loss in substantia nigra, reduced dopamine in basal ganglia.
Proteins: Accumulation of misfolded alpha-synuclein (Lewy bodies).
Recommendation: Start dopaminergic therapy (Levodopa), refer to physiotherapy, occupational therapy, and speech therapy.
Care: Daily support may be needed for mobility and activities of daily living.",
        _ => return None,
    };
    Some(text)
}

/// 邮件投递的固定主题
pub const EMAIL_SUBJECT: &str = "NeuroPredict - Patient Report";

/// 邮件投递的固定正文
pub const EMAIL_BODY: &str = "Hello,

Please find attached the NeuroPredict report for your patient.
This document includes AI-assisted analyses designed to support your diagnostic and research decisions.

Kindly ensure this report is reviewed in conjunction with clinical evaluations and other relevant medical data.

Best regards,
NeuroPredict Team
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subtype_has_narrative() {
        for disease in Disease::ALL {
            for subtype in disease.subtypes() {
                assert!(subtype_narrative(disease, subtype).is_some(), "{disease} {subtype}");
            }
        }
        assert!(subtype_narrative(Disease::Parkinson, "AD").is_none());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(no_predictions(Disease::Alzheimer), "No Alzheimer predictions available.");
        assert_eq!(disease_heading(Disease::Parkinson), "Parkinson Disease:");
    }
}
