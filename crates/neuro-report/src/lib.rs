//! NeuroPredict 报告生成
//!
//! 流程分三步：
//! - [`composer`] 将患者记录组装为与页面无关的块树
//! - [`layout`] 对块树分页并计算坐标，相同输入产生相同排版
//! - [`render`] 输出 PDF 或纯文本，[`sink`] 负责写文件或邮件投递

pub mod composer;
pub mod document;
pub mod layout;
pub mod narrative;
pub mod render;
pub mod sink;

pub use composer::{compose_report, ReportComposer};
pub use document::{Align, Block, ReportDocument, Section, SectionKind, Table, TextStyle};
pub use layout::{layout, wrap_text, LaidOutDocument, Page, PageSetup, PlacedText};
pub use render::{fingerprint, render, render_pdf, render_text, ReportFormat};
pub use sink::{DeliveryTransport, DocumentSink, EmailMessage, EmailSink, FileSink, RenderedReport};
