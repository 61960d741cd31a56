//! 亚型时间线聚合
//!
//! 每位患者每种疾病每天只保留一个代表点（当天最晚的发现），
//! 亚型映射为有序集合中的序号，按日期升序输出。

use crate::canonicalizer::canonicalize;
use crate::resolver::resolve_disease;
use chrono::NaiveDate;
use neuro_core::{Disease, Modality, PredictionRecord, TimelinePoint};
use serde::Serialize;
use std::collections::btree_map::{self, BTreeMap};

/// 判断模态是否可作为该疾病的证据来源
pub fn is_evidentiary(disease: Disease, modality: &Modality) -> bool {
    match disease {
        Disease::Alzheimer => matches!(
            modality,
            Modality::MriAxial | Modality::MriSagittal | Modality::Ensemble | Modality::Audio
        ),
        Disease::Parkinson => matches!(
            modality,
            Modality::MriAxial
                | Modality::MriSagittal
                | Modality::Drawing
                | Modality::Audio
                | Modality::Ensemble
        ),
    }
}

/// 时间线聚合器
///
/// 不缓存任何结果，每次调用 [`TimelineAggregator::points`] 都从输入重新计算。
#[derive(Debug, Clone, Copy)]
pub struct TimelineAggregator<'a> {
    records: &'a [PredictionRecord],
    disease: Disease,
}

impl<'a> TimelineAggregator<'a> {
    pub fn new(records: &'a [PredictionRecord], disease: Disease) -> Self {
        Self { records, disease }
    }

    pub fn disease(&self) -> Disease {
        self.disease
    }

    /// 惰性的时间线序列，首次迭代时才分组
    pub fn points(&self) -> TimelinePoints<'a> {
        TimelinePoints {
            records: self.records,
            disease: self.disease,
            grouped: None,
        }
    }

    pub fn collect(&self) -> Vec<TimelinePoint> {
        self.points().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.points().next().is_none()
    }
}

/// 时间线迭代器
pub struct TimelinePoints<'a> {
    records: &'a [PredictionRecord],
    disease: Disease,
    grouped: Option<btree_map::IntoValues<NaiveDate, TimelinePoint>>,
}

impl Iterator for TimelinePoints<'_> {
    type Item = TimelinePoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.grouped.is_none() {
            self.grouped = Some(group_by_day(self.records, self.disease).into_values());
        }
        self.grouped.as_mut().and_then(Iterator::next)
    }
}

fn group_by_day(records: &[PredictionRecord], disease: Disease) -> BTreeMap<NaiveDate, TimelinePoint> {
    let mut by_day: BTreeMap<NaiveDate, TimelinePoint> = BTreeMap::new();

    for record in records {
        if resolve_disease(record).disease() != Some(disease) {
            continue;
        }
        if !is_evidentiary(disease, &record.modality) {
            continue;
        }

        let subtype = canonicalize(&record.modality, &record.raw_subtype, disease);
        let point = TimelinePoint {
            day: record.day(),
            ordinal: disease.ordinal_of(subtype).unwrap_or(0),
            subtype,
            confidence: record.confidence,
            timestamp: record.timestamp,
        };

        match by_day.entry(point.day) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(point);
            }
            btree_map::Entry::Occupied(mut slot) => {
                // 同一天时间相同则保留先出现的记录
                if point.timestamp > slot.get().timestamp {
                    slot.insert(point);
                }
            }
        }
    }

    tracing::debug!(
        "Aggregated {} records into {} {} timeline days",
        records.len(),
        by_day.len(),
        disease
    );
    by_day
}

/// 图表图例条目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub level: usize,
    pub code: &'static str,
    pub description: &'static str,
}

/// 某疾病亚型的图例，顺序与序号一致
pub fn subtype_legend(disease: Disease) -> Vec<LegendEntry> {
    let descriptions: &'static [&'static str] = match disease {
        Disease::Alzheimer => &[
            "Cognitively Normal",
            "Early Mild Cognitive Impairment",
            "Mild Cognitive Impairment",
            "Late Mild Cognitive Impairment",
            "Alzheimer's Disease",
        ],
        Disease::Parkinson => &[
            "Healthy",
            "Early signs",
            "Scan Without Evidence of Dopaminergic Deficit",
            "Parkinson's Disease",
        ],
    };

    disease
        .subtypes()
        .iter()
        .copied()
        .zip(descriptions.iter().copied())
        .enumerate()
        .map(|(level, (code, description))| LegendEntry {
            level,
            code,
            description,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn record(ts: DateTime<Utc>, modality: Modality, subtype: &str, confidence: f64) -> PredictionRecord {
        PredictionRecord::new(ts, Some("alzheimer".to_string()), modality, subtype, confidence).unwrap()
    }

    #[test]
    fn test_latest_finding_of_day_wins() {
        let records = vec![
            record(at(1, 9), Modality::MriAxial, "EMCI", 0.7),
            record(at(1, 17), Modality::MriAxial, "MCI", 0.8),
        ];
        let points = TimelineAggregator::new(&records, Disease::Alzheimer).collect();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].day, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(points[0].subtype, "MCI");
        assert_eq!(points[0].ordinal, 2);
        assert_eq!(points[0].confidence, 0.8);
    }

    #[test]
    fn test_later_record_wins_regardless_of_input_order() {
        let records = vec![
            record(at(1, 17), Modality::MriAxial, "MCI", 0.8),
            record(at(1, 9), Modality::MriAxial, "EMCI", 0.7),
        ];
        let points = TimelineAggregator::new(&records, Disease::Alzheimer).collect();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].subtype, "MCI");
    }

    #[test]
    fn test_timestamp_tie_keeps_first_seen() {
        let records = vec![
            record(at(2, 10), Modality::MriAxial, "LMCI", 0.6),
            record(at(2, 10), Modality::MriSagittal, "AD", 0.9),
        ];
        let points = TimelineAggregator::new(&records, Disease::Alzheimer).collect();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].subtype, "LMCI");
    }

    #[test]
    fn test_sorted_by_day_for_unsorted_input() {
        let records = vec![
            record(at(20, 8), Modality::MriAxial, "AD", 0.9),
            record(at(3, 8), Modality::MriAxial, "CN", 0.9),
            record(at(11, 8), Modality::Ensemble, "MCI", 0.9),
            record(at(3, 23), Modality::MriAxial, "EMCI", 0.9),
        ];
        let points = TimelineAggregator::new(&records, Disease::Alzheimer).collect();

        let days: Vec<u32> = points.iter().map(|p| chrono::Datelike::day(&p.day)).collect();
        assert_eq!(days, vec![3, 11, 20]);
        assert_eq!(
            points.iter().map(|p| p.ordinal).collect::<Vec<_>>(),
            vec![1, 2, 4]
        );
    }

    #[test]
    fn test_filters_by_resolved_disease() {
        let records = vec![
            record(at(1, 9), Modality::Drawing, "Parkinson", 0.9),
            record(at(2, 9), Modality::Audio, "healthy", 0.8),
            record(at(3, 9), Modality::Audio, "parkinson", 0.7),
            record(at(4, 9), Modality::MriAxial, "AD", 0.6),
        ];

        let alz = TimelineAggregator::new(&records, Disease::Alzheimer).collect();
        assert_eq!(alz.iter().map(|p| p.subtype).collect::<Vec<_>>(), vec!["CN", "AD"]);

        let park = TimelineAggregator::new(&records, Disease::Parkinson).collect();
        assert_eq!(park.iter().map(|p| p.subtype).collect::<Vec<_>>(), vec!["PD", "PD"]);
    }

    #[test]
    fn test_empty_input_yields_empty_sequence() {
        let aggregator = TimelineAggregator::new(&[], Disease::Parkinson);
        assert!(aggregator.is_empty());
        assert_eq!(aggregator.points().count(), 0);
    }

    #[test]
    fn test_points_are_restartable() {
        let records = vec![
            record(at(1, 9), Modality::MriAxial, "EMCI", 0.7),
            record(at(5, 9), Modality::MriAxial, "MCI", 0.7),
        ];
        let aggregator = TimelineAggregator::new(&records, Disease::Alzheimer);
        assert_eq!(aggregator.collect(), aggregator.collect());
        assert_eq!(aggregator.points().count(), 2);
    }

    #[test]
    fn test_no_duplicate_days() {
        let records: Vec<PredictionRecord> = (0..48)
            .map(|h| record(at(1 + h / 24, h % 24), Modality::MriAxial, "MCI", 0.5))
            .collect();
        let points = TimelineAggregator::new(&records, Disease::Alzheimer).collect();
        assert_eq!(points.len(), 2);
        assert!(points.windows(2).all(|w| w[0].day < w[1].day));
    }

    #[test]
    fn test_legend_matches_subtype_order() {
        let legend = subtype_legend(Disease::Parkinson);
        assert_eq!(legend.len(), 4);
        assert_eq!(legend[2].code, "SWEDD");
        assert_eq!(legend[2].level, 2);
    }
}
