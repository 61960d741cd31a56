//! # 推理结果分析模块
//!
//! 把异构分类器的推理记录整理成可展示的临床视图：
//! - 亚型规范化：跨模态标签统一到每种疾病的有序亚型集合
//! - 疾病解析：声明字段缺失或过期时按模态推断疾病
//! - 时间线聚合：按天去重、序数化并按时间排序
//! - 统计：每亚型与每模态的平均置信度及文字解读

pub mod canonicalizer;
pub mod resolver;
pub mod statistics;
pub mod timeline;

pub use canonicalizer::{canonicalize, canonicalize_record, CanonicalRule, LabelContext, SubtypeCanonicalizer};
pub use resolver::{resolve_disease, resolve_ensemble_disease, DiseaseResolver};
pub use statistics::{
    canonical_findings, interpret_activation, interpret_region_attention, modality_mean_confidence, summarize_subtypes,
    ConfidenceLevel, SubtypeSummary,
};
pub use timeline::{is_evidentiary, subtype_legend, LegendEntry, TimelineAggregator, TimelinePoints};
