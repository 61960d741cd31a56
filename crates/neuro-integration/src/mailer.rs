//! 报告邮件投递
//!
//! `POST {base}/api/report/sendReport`，multipart 字段为 `email` 与 `pdf`。

use crate::client::{transport, HttpPredictor};
use async_trait::async_trait;
use neuro_core::{NeuroError, Result, Session};
use neuro_report::{DeliveryTransport, EmailMessage, RenderedReport};
use std::time::Duration;
use tracing::info;

/// 经由后端邮件接口投递报告
#[derive(Debug, Clone)]
pub struct HttpReportMailer {
    base_url: String,
    client: reqwest::Client,
}

impl HttpReportMailer {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn send_url(&self) -> String {
        format!("{}/api/report/sendReport", self.base_url)
    }

    fn build_form(message: &EmailMessage, report: &RenderedReport) -> Result<reqwest::multipart::Form> {
        let part = reqwest::multipart::Part::bytes(report.bytes.clone())
            .file_name(message.attachment_name.clone())
            .mime_str(report.content_type())
            .map_err(transport)?;

        Ok(reqwest::multipart::Form::new()
            .text("email", message.to.clone())
            .text("subject", message.subject.clone())
            .text("body", message.body.clone())
            .part("pdf", part))
    }
}

#[async_trait]
impl DeliveryTransport for HttpReportMailer {
    async fn send(&self, session: &Session, message: &EmailMessage, attachment: &RenderedReport) -> Result<()> {
        if !session.is_authenticated() {
            return Err(NeuroError::Sink("report delivery requires an authenticated session".into()));
        }

        let url = self.send_url();
        let form = Self::build_form(message, attachment)?;
        let builder = HttpPredictor::add_auth_headers(self.client.post(&url).multipart(form), session);

        let response = builder.send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(NeuroError::Sink(format!(
                "sending {} to {} failed: {}",
                message.attachment_name,
                message.to,
                response.status()
            )));
        }

        info!("Report mail accepted for {}", message.to);
        Ok(())
    }
}
