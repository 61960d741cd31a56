//! 亚型规范化
//!
//! 将各模态分类器输出的标签映射到疾病的规范有序亚型集合。
//! 规则按顺序求值，首个命中的规则给出候选代码；候选代码不在
//! 疾病亚型集合内时回落到集合首元素（最健康）。

use crate::resolver::resolve_disease;
use neuro_core::utils::title_case;
use neuro_core::{CanonicalFinding, Disease, Modality, PredictionRecord};
use std::sync::OnceLock;

/// 已知的规范亚型代码，键为大写形式
const KNOWN_CODES: [(&str, &str); 9] = [
    ("CN", "CN"),
    ("EMCI", "EMCI"),
    ("MCI", "MCI"),
    ("LMCI", "LMCI"),
    ("AD", "AD"),
    ("CONTROL", "Control"),
    ("PRODROMAL", "Prodromal"),
    ("SWEDD", "SWEDD"),
    ("PD", "PD"),
];

/// 规则求值上下文
#[derive(Debug, Clone)]
pub struct LabelContext<'a> {
    pub modality: &'a Modality,
    pub disease: Disease,
    /// 去除首尾空白后的原始标签
    pub trimmed: &'a str,
    /// 去空白并转小写后的标签
    pub normalized: String,
}

impl<'a> LabelContext<'a> {
    pub fn new(modality: &'a Modality, raw_label: &'a str, disease: Disease) -> Self {
        let trimmed = raw_label.trim();
        Self {
            modality,
            disease,
            trimmed,
            normalized: trimmed.to_lowercase(),
        }
    }

    /// 音频与手绘模型使用跨模态同义词
    fn uses_synonyms(&self) -> bool {
        matches!(self.modality, Modality::Audio | Modality::Drawing)
    }
}

/// 规范化规则
#[derive(Debug, Clone, Copy)]
pub struct CanonicalRule {
    pub name: &'static str,
    pub matcher: fn(&LabelContext<'_>) -> Option<String>,
}

impl CanonicalRule {
    pub fn apply(&self, ctx: &LabelContext<'_>) -> Option<String> {
        (self.matcher)(ctx)
    }
}

fn healthy_synonym(ctx: &LabelContext<'_>) -> Option<String> {
    (ctx.uses_synonyms() && ctx.normalized == "healthy")
        .then(|| ctx.disease.default_subtype().to_string())
}

fn alzheimer_synonym(ctx: &LabelContext<'_>) -> Option<String> {
    (ctx.uses_synonyms() && ctx.normalized == "alzheimer").then(|| "AD".to_string())
}

fn parkinson_synonym(ctx: &LabelContext<'_>) -> Option<String> {
    (ctx.uses_synonyms() && ctx.normalized == "parkinson").then(|| "PD".to_string())
}

fn known_code(ctx: &LabelContext<'_>) -> Option<String> {
    let upper = ctx.trimmed.to_uppercase();
    KNOWN_CODES
        .iter()
        .find(|(key, _)| *key == upper)
        .map(|(_, code)| code.to_string())
}

fn title_cased(ctx: &LabelContext<'_>) -> Option<String> {
    Some(title_case(ctx.trimmed))
}

/// 亚型规范化器
#[derive(Debug, Clone)]
pub struct SubtypeCanonicalizer {
    rules: Vec<CanonicalRule>,
}

impl SubtypeCanonicalizer {
    /// 创建带默认规则表的规范化器
    pub fn new() -> Self {
        let rules = vec![
            CanonicalRule { name: "healthy_synonym", matcher: healthy_synonym },
            CanonicalRule { name: "alzheimer_synonym", matcher: alzheimer_synonym },
            CanonicalRule { name: "parkinson_synonym", matcher: parkinson_synonym },
            CanonicalRule { name: "known_code", matcher: known_code },
            CanonicalRule { name: "title_case", matcher: title_cased },
        ];

        Self { rules }
    }

    pub fn rules(&self) -> &[CanonicalRule] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&CanonicalRule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    /// 规范化并返回命中的规则名
    pub fn canonicalize_traced(
        &self,
        modality: &Modality,
        raw_label: &str,
        disease: Disease,
    ) -> (Option<&'static str>, &'static str) {
        let ctx = LabelContext::new(modality, raw_label, disease);

        let matched = self
            .rules
            .iter()
            .find_map(|rule| rule.apply(&ctx).map(|code| (rule.name, code)));

        match matched {
            Some((name, code)) => match disease.member(&code) {
                Some(subtype) => (Some(name), subtype),
                None => {
                    tracing::debug!(
                        "Label '{}' ({}) mapped to '{}' outside {} subtypes, using default",
                        raw_label, modality, code, disease
                    );
                    (Some(name), disease.default_subtype())
                }
            },
            None => (None, disease.default_subtype()),
        }
    }

    /// 规范化标签，结果一定属于该疾病的亚型集合
    pub fn canonicalize(&self, modality: &Modality, raw_label: &str, disease: Disease) -> &'static str {
        self.canonicalize_traced(modality, raw_label, disease).1
    }

    /// 对一条推理记录解析疾病并规范化亚型
    pub fn canonicalize_record(&self, record: &PredictionRecord) -> Option<CanonicalFinding> {
        let disease = resolve_disease(record).disease()?;
        Some(CanonicalFinding {
            disease,
            subtype: self.canonicalize(&record.modality, &record.raw_subtype, disease),
            confidence: record.confidence,
            timestamp: record.timestamp,
            modality: record.modality.clone(),
        })
    }
}

impl Default for SubtypeCanonicalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn shared() -> &'static SubtypeCanonicalizer {
    static CANONICALIZER: OnceLock<SubtypeCanonicalizer> = OnceLock::new();
    CANONICALIZER.get_or_init(SubtypeCanonicalizer::new)
}

/// 使用默认规则表规范化标签
pub fn canonicalize(modality: &Modality, raw_label: &str, disease: Disease) -> &'static str {
    shared().canonicalize(modality, raw_label, disease)
}

/// 使用默认规则表生成规范化发现
pub fn canonicalize_record(record: &PredictionRecord) -> Option<CanonicalFinding> {
    shared().canonicalize_record(record)
}
