//! 渲染器
//!
//! 纯文本渲染用于预览和指纹计算；PDF 渲染使用 printpdf 的内置 Helvetica 字体。

use crate::document::{Align, TextStyle};
use crate::layout::{text_width, LaidOutDocument};
use neuro_core::{NeuroError, Result};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::BufWriter;

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Pdf,
    Text,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Text => "text/plain; charset=utf-8",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// 纯文本渲染，页之间用换页符分隔
pub fn render_text(document: &LaidOutDocument) -> String {
    document
        .pages
        .iter()
        .map(|page| page.lines().collect::<Vec<_>>().join("\n"))
        .collect::<Vec<_>>()
        .join("\n\u{000C}\n")
}

/// 排版结果的 SHA-256 指纹
pub fn fingerprint(document: &LaidOutDocument) -> String {
    let digest = Sha256::digest(render_text(document).as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn pdf_error(context: &str, err: impl fmt::Display) -> NeuroError {
    NeuroError::Render(format!("{}: {}", context, err))
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

impl Fonts {
    fn for_style(&self, style: TextStyle) -> &IndirectFontRef {
        if style.is_bold() {
            &self.bold
        } else if style.is_italic() {
            &self.italic
        } else {
            &self.regular
        }
    }
}

/// PDF 渲染
pub fn render_pdf(document: &LaidOutDocument) -> Result<Vec<u8>> {
    let setup = &document.setup;
    let width = Mm(setup.page_width);
    let height = Mm(setup.page_height);

    let (doc, first_page, first_layer) = PdfDocument::new(document.title.as_str(), width, height, "Layer 1");
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| pdf_error("PDF font error", e))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| pdf_error("PDF font error", e))?,
        italic: doc
            .add_builtin_font(BuiltinFont::HelveticaOblique)
            .map_err(|e| pdf_error("PDF font error", e))?,
    };

    for (index, page) in document.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) = doc.add_page(width, height, format!("Layer {}", index + 1));
            doc.get_page(page_index).get_layer(layer_index)
        };

        for item in &page.items {
            let x = match item.align {
                Align::Left => item.x,
                Align::Center => item.x - text_width(&item.text, item.style) / 2.0,
                Align::Right => item.x - text_width(&item.text, item.style),
            };
            // PDF 坐标原点在左下角
            let y = setup.page_height - item.y;
            layer.use_text(
                item.text.as_str(),
                item.style.font_size(),
                Mm(x),
                Mm(y),
                fonts.for_style(item.style),
            );
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf).map_err(|e| pdf_error("PDF save error", e))?;
    buf.into_inner().map_err(|e| pdf_error("PDF buffer error", e))
}

/// 按格式渲染
pub fn render(document: &LaidOutDocument, format: ReportFormat) -> Result<Vec<u8>> {
    match format {
        ReportFormat::Pdf => render_pdf(document),
        ReportFormat::Text => Ok(render_text(document).into_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Block, ReportDocument, Section, SectionKind};
    use crate::layout::{layout, PageSetup};
    use chrono::NaiveDate;

    fn laid_out(text: &str) -> LaidOutDocument {
        let mut section = Section::new(SectionKind::ClinicalContext, false);
        section.push(Block::fixed("Title", TextStyle::Title, 40.0, Align::Center));
        section.push(Block::body(text));
        let document = ReportDocument {
            title: "Render Test".into(),
            patient_identifier: "P-9".into(),
            generated_on: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            sections: vec![section],
        };
        layout(&document, &PageSetup::default()).unwrap()
    }

    #[test]
    fn test_render_text() {
        let text = render_text(&laid_out("hello world"));
        assert_eq!(text, "Title\nhello world\nPage 1 of 1");
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = fingerprint(&laid_out("same"));
        let b = fingerprint(&laid_out("same"));
        let c = fingerprint(&laid_out("different"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_render_pdf() {
        let bytes = render_pdf(&laid_out(&vec!["paragraph"; 150].join("\n"))).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_format_metadata() {
        assert_eq!(ReportFormat::Pdf.extension(), "pdf");
        assert_eq!(ReportFormat::Text.content_type(), "text/plain; charset=utf-8");
    }
}
