//! 报告文档块树
//!
//! 组装阶段只产生块树，不涉及页面与坐标；分页由 [`crate::layout`] 单独完成。

use chrono::NaiveDate;
use serde::Serialize;

/// 文本样式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TextStyle {
    Title,
    Subtitle,
    Heading,
    Subheading,
    Body,
    Strong,
    Caption,
    PageNumber,
}

impl TextStyle {
    /// 字号（pt）
    pub fn font_size(&self) -> f32 {
        match self {
            Self::Title => 20.0,
            Self::Subtitle => 14.0,
            Self::Heading => 14.0,
            Self::Subheading => 12.0,
            Self::Body | Self::Strong => 10.0,
            Self::Caption | Self::PageNumber => 9.0,
        }
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, Self::Title | Self::Heading | Self::Subheading | Self::Strong)
    }

    pub fn is_italic(&self) -> bool {
        matches!(self, Self::PageNumber)
    }
}

/// 水平对齐
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// 表格，列宽为相对权重
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    /// 表格标题，排版时与表头、首行放在同一页
    pub caption: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub column_weights: Vec<f32>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        let column_weights = vec![1.0; headers.len()];
        Self {
            caption: None,
            headers,
            rows: Vec::new(),
            column_weights,
        }
    }

    pub fn with_weights(mut self, weights: Vec<f32>) -> Self {
        if weights.len() == self.headers.len() {
            self.column_weights = weights;
        }
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn columns(&self) -> usize {
        self.headers.len()
    }
}

/// 文档块
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Block {
    /// 固定位置文本，`y` 为距页面顶部的毫米数
    Fixed {
        text: String,
        style: TextStyle,
        y: f32,
        align: Align,
    },
    /// 流式文本，按内容宽度折行，`\n` 为硬换行
    Flow { text: String, style: TextStyle },
    /// 页脚文本，固定在当前页底部左侧
    Footer { text: String, style: TextStyle },
    /// 垂直留白（毫米）
    Gap(f32),
    Table(Table),
}

impl Block {
    pub fn flow(text: impl Into<String>, style: TextStyle) -> Self {
        Self::Flow {
            text: text.into(),
            style,
        }
    }

    pub fn body(text: impl Into<String>) -> Self {
        Self::flow(text, TextStyle::Body)
    }

    pub fn fixed(text: impl Into<String>, style: TextStyle, y: f32, align: Align) -> Self {
        Self::Fixed {
            text: text.into(),
            style,
            y,
            align,
        }
    }
}

/// 报告章节
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SectionKind {
    Cover,
    PatientInformation,
    PredictionHistory,
    Interpretation,
    ModalityNarratives,
    ClinicalContext,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub kind: SectionKind,
    /// 章节是否从新页开始
    pub starts_new_page: bool,
    pub blocks: Vec<Block>,
}

impl Section {
    pub fn new(kind: SectionKind, starts_new_page: bool) -> Self {
        Self {
            kind,
            starts_new_page,
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }

    /// 章节内全部文本，按块顺序拼接
    pub fn plain_text(&self) -> String {
        let mut out = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Fixed { text, .. } | Block::Flow { text, .. } | Block::Footer { text, .. } => {
                    out.push(text.clone())
                }
                Block::Gap(_) => {}
                Block::Table(table) => {
                    out.extend(table.caption.clone());
                    out.push(table.headers.join(" | "));
                    out.extend(table.rows.iter().map(|row| row.join(" | ")));
                }
            }
        }
        out.join("\n")
    }
}

/// 组装完成、尚未分页的报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDocument {
    pub title: String,
    pub patient_identifier: String,
    pub generated_on: NaiveDate,
    pub sections: Vec<Section>,
}

impl ReportDocument {
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    pub fn section_kinds(&self) -> Vec<SectionKind> {
        self.sections.iter().map(|s| s.kind).collect()
    }

    /// 导出文件名
    pub fn file_name(&self, extension: &str) -> String {
        let identifier: String = self
            .patient_identifier
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("Patient_{}_Report.{}", identifier, extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        let doc = ReportDocument {
            title: "t".into(),
            patient_identifier: "P/01 a".into(),
            generated_on: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            sections: vec![],
        };
        assert_eq!(doc.file_name("pdf"), "Patient_P_01_a_Report.pdf");
    }

    #[test]
    fn test_section_plain_text() {
        let mut table = Table::new(vec!["A".into(), "B".into()]);
        table.push_row(vec!["1".into(), "2".into()]);

        let mut section = Section::new(SectionKind::PredictionHistory, false);
        section.push(Block::body("History")).push(Block::Gap(2.0)).push(Block::Table(table));

        assert_eq!(section.plain_text(), "History\nA | B\n1 | 2");
    }

    #[test]
    fn test_caption_precedes_headers() {
        let mut table = Table::new(vec!["A".into()]).with_caption("History");
        table.push_row(vec!["1".into()]);

        let mut section = Section::new(SectionKind::PredictionHistory, false);
        section.push(Block::Table(table));
        assert_eq!(section.plain_text(), "History\nA\n1");
    }

    #[test]
    fn test_weights_must_match_columns() {
        let table = Table::new(vec!["A".into(), "B".into()]).with_weights(vec![1.0]);
        assert_eq!(table.column_weights, vec![1.0, 1.0]);
        assert_eq!(table.columns(), 2);
    }
}
