//! 报告输出
//!
//! 渲染后的报告交给 [`DocumentSink`]：写入文件，或通过邮件投递。

use crate::document::ReportDocument;
use crate::layout::{layout, PageSetup};
use crate::narrative::{EMAIL_BODY, EMAIL_SUBJECT};
use crate::render::{fingerprint, render, ReportFormat};
use async_trait::async_trait;
use neuro_core::{NeuroError, Result, Session};
use std::path::{Path, PathBuf};
use tracing::info;

/// 渲染完成的报告
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedReport {
    pub file_name: String,
    pub format: ReportFormat,
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// 排版结果的 SHA-256 指纹
    pub fingerprint: String,
}

impl RenderedReport {
    /// 排版并渲染报告
    pub fn render(document: &ReportDocument, setup: &PageSetup, format: ReportFormat) -> Result<Self> {
        let laid_out = layout(document, setup)?;
        let bytes = render(&laid_out, format)?;

        Ok(Self {
            file_name: document.file_name(format.extension()),
            format,
            bytes,
            page_count: laid_out.page_count(),
            fingerprint: fingerprint(&laid_out),
        })
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// 报告输出接口
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn deliver(&self, session: &Session, report: &RenderedReport) -> Result<()>;
}

/// 写入目录的文件输出
#[derive(Debug, Clone)]
pub struct FileSink {
    directory: PathBuf,
}

impl FileSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, report: &RenderedReport) -> PathBuf {
        self.directory.join(&report.file_name)
    }
}

#[async_trait]
impl DocumentSink for FileSink {
    async fn deliver(&self, _session: &Session, report: &RenderedReport) -> Result<()> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.path_for(report);
        tokio::fs::write(&path, &report.bytes).await?;

        info!(
            "Report written to {} ({} pages, {} bytes)",
            path.display(),
            report.page_count,
            report.bytes.len()
        );
        Ok(())
    }
}

/// 待发送的邮件
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment_name: String,
}

impl EmailMessage {
    /// 报告邮件，主题与正文固定
    pub fn for_report(to: impl Into<String>, report: &RenderedReport) -> Self {
        Self {
            to: to.into(),
            subject: EMAIL_SUBJECT.to_string(),
            body: EMAIL_BODY.to_string(),
            attachment_name: report.file_name.clone(),
        }
    }
}

/// 邮件传输接口
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn send(&self, session: &Session, message: &EmailMessage, attachment: &RenderedReport) -> Result<()>;
}

/// 邮件投递输出
pub struct EmailSink<T> {
    recipient: String,
    transport: T,
}

impl<T: DeliveryTransport> EmailSink<T> {
    pub fn new(recipient: impl Into<String>, transport: T) -> Result<Self> {
        let recipient = recipient.into();
        let trimmed = recipient.trim();
        if trimmed.is_empty() || !trimmed.contains('@') {
            return Err(NeuroError::Validation(format!("invalid email address '{}'", recipient)));
        }
        Ok(Self {
            recipient: trimmed.to_string(),
            transport,
        })
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }
}

#[async_trait]
impl<T: DeliveryTransport> DocumentSink for EmailSink<T> {
    async fn deliver(&self, session: &Session, report: &RenderedReport) -> Result<()> {
        let message = EmailMessage::for_report(self.recipient.as_str(), report);
        self.transport.send(session, &message, report).await?;
        info!("Report {} sent to {}", report.file_name, self.recipient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::compose_report;
    use chrono::NaiveDate;
    use neuro_core::Patient;
    use std::sync::Mutex;

    fn report(format: ReportFormat) -> RenderedReport {
        let doc = compose_report(
            &Patient::new("P-55", "Sink Test"),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        );
        RenderedReport::render(&doc, &PageSetup::default(), format).unwrap()
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl<'a> DeliveryTransport for &'a RecordingTransport {
        async fn send(&self, _session: &Session, message: &EmailMessage, _attachment: &RenderedReport) -> Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    #[test]
    fn test_rendered_report_metadata() {
        let text = report(ReportFormat::Text);
        assert_eq!(text.file_name, "Patient_P-55_Report.txt");
        assert_eq!(text.page_count, 4);
        assert_eq!(text.content_type(), "text/plain; charset=utf-8");

        let pdf = report(ReportFormat::Pdf);
        assert_eq!(pdf.file_name, "Patient_P-55_Report.pdf");
        assert_eq!(pdf.fingerprint, text.fingerprint);
    }

    #[tokio::test]
    async fn test_file_sink_writes_report() {
        let dir = std::env::temp_dir().join(format!("neuro-report-{}", uuid::Uuid::new_v4()));
        let sink = FileSink::new(&dir);
        let report = report(ReportFormat::Text);

        sink.deliver(&Session::anonymous(), &report).await.unwrap();

        let written = tokio::fs::read(sink.path_for(&report)).await.unwrap();
        assert_eq!(written, report.bytes);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_email_sink_uses_fixed_subject() {
        let transport = RecordingTransport::default();
        let sink = EmailSink::new(" doctor@example.org ", &transport).unwrap();
        let report = report(ReportFormat::Pdf);

        sink.deliver(&Session::anonymous(), &report).await.unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "doctor@example.org");
        assert_eq!(sent[0].subject, "NeuroPredict - Patient Report");
        assert!(sent[0].body.starts_with("Hello,"));
        assert!(sent[0].body.contains("Best regards,\nNeuroPredict Team"));
        assert_eq!(sent[0].attachment_name, "Patient_P-55_Report.pdf");
    }

    #[test]
    fn test_email_sink_rejects_bad_address() {
        let transport = RecordingTransport::default();
        assert!(EmailSink::new("", &transport).is_err());
        assert!(EmailSink::new("not-an-address", &transport).is_err());
    }
}
