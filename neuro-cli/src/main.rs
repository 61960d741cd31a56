//! NeuroPredict 命令行工具

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use neuro_admin::{init_logging, ConfigManager};
use neuro_analysis::{
    interpret_activation, interpret_region_attention, subtype_legend, ConfidenceLevel, TimelineAggregator,
};
use neuro_core::utils::{confidence_percent, format_day};
use neuro_core::{Disease, Patient, Role, Session};
use neuro_integration::{ArtifactPoller, HttpPredictor, HttpReportMailer, InMemoryStore, PollState, PredictionStore};
use neuro_report::{DocumentSink, EmailSink, FileSink, RenderedReport, ReportComposer, ReportFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// NeuroPredict 命令行参数
#[derive(Parser, Debug)]
#[command(name = "neuro-cli")]
#[command(about = "NeuroPredict 推理结果分析、报告生成与激活图轮询工具")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// 日志级别，覆盖配置文件与 RUST_LOG
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 访问令牌
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 输出某疾病的亚型时间线
    Timeline {
        /// 患者 JSON 文件（单个对象或数组）
        patient_file: PathBuf,
        /// 疾病：alzheimer 或 parkinson
        #[arg(short, long)]
        disease: String,
        /// 文件包含多个患者时按编号选择
        #[arg(short, long)]
        patient: Option<String>,
    },
    /// 生成患者报告
    Report {
        patient_file: PathBuf,
        #[arg(short, long)]
        patient: Option<String>,
        /// 输出目录，默认使用配置中的 report.output_dir
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// 输出格式：pdf 或 text
        #[arg(short, long)]
        format: Option<String>,
        /// 报告日期（YYYY-MM-DD），默认今天
        #[arg(long)]
        date: Option<NaiveDate>,
        /// 同时通过邮件发送给该地址
        #[arg(long)]
        email: Option<String>,
    },
    /// 轮询激活图生成状态
    Poll {
        prediction_id: String,
        /// 使用集成推理的轮询间隔
        #[arg(long)]
        ensemble: bool,
    },
    /// 输出生效的配置
    Config {
        /// 点分路径，例如 poller.image_interval_ms
        #[arg(short, long)]
        key: Option<String>,
    },
}

fn build_session(token: Option<&str>) -> Session {
    match token {
        Some(token) => Session::new(Uuid::nil(), Role::Doctor, token),
        None => Session::anonymous(),
    }
}

async fn load_patient(path: &Path, identifier: Option<&str>, session: &Session) -> Result<Patient> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let store = InMemoryStore::from_json(&json).context("Failed to parse patient file")?;

    if let Some(identifier) = identifier {
        return store
            .find_by_identifier(identifier)
            .await
            .ok_or_else(|| anyhow!("Patient {} not found in {}", identifier, path.display()));
    }

    let ids = store.patient_ids().await;
    match ids.as_slice() {
        [id] => Ok(store.load_patient(session, *id).await?),
        [] => bail!("{} contains no patients", path.display()),
        _ => bail!("{} contains {} patients, select one with --patient", path.display(), ids.len()),
    }
}

fn parse_disease(label: &str) -> Result<Disease> {
    Disease::from_label(label).ok_or_else(|| anyhow!("Unknown disease '{}'", label))
}

fn parse_format(label: &str) -> Result<ReportFormat> {
    match label.trim().to_lowercase().as_str() {
        "pdf" => Ok(ReportFormat::Pdf),
        "text" | "txt" => Ok(ReportFormat::Text),
        other => bail!("Unknown report format '{}'", other),
    }
}

fn run_timeline(patient: &Patient, disease: Disease) -> Result<()> {
    println!("{} timeline for {}", disease.display_name(), patient.full_name);
    for entry in subtype_legend(disease) {
        println!("  {} = {} ({})", entry.level, entry.code, entry.description);
    }

    let aggregator = TimelineAggregator::new(&patient.predictions, disease);
    if aggregator.is_empty() {
        println!("No {} predictions available.", disease.display_name());
        return Ok(());
    }

    for point in aggregator.points() {
        println!(
            "{}  level {}  {:<6} {}% ({})",
            format_day(point.day),
            point.ordinal,
            point.subtype,
            confidence_percent(point.confidence),
            ConfidenceLevel::from_confidence(point.confidence).describe()
        );
    }
    Ok(())
}

async fn run_report(
    manager: &ConfigManager,
    session: &Session,
    patient: &Patient,
    out: Option<PathBuf>,
    format: Option<String>,
    date: Option<NaiveDate>,
    email: Option<String>,
) -> Result<()> {
    let config = manager.get_config().await;
    let format = match format {
        Some(label) => parse_format(&label)?,
        None => config.report.format,
    };
    let date = date.unwrap_or_else(|| Utc::now().date_naive());

    let document = ReportComposer::new()
        .with_product_name(config.report.product_name.as_str())
        .compose(patient, date);
    let report = RenderedReport::render(&document, &config.report.page, format)?;
    info!(
        "Rendered {} ({} pages, fingerprint {})",
        report.file_name, report.page_count, report.fingerprint
    );

    let sink = FileSink::new(out.unwrap_or_else(|| PathBuf::from(&config.report.output_dir)));
    sink.deliver(session, &report).await?;
    println!("{}", sink.path_for(&report).display());

    if let Some(email) = email {
        let mailer = HttpReportMailer::new(config.api.base_url.as_str(), config.api.timeout())?;
        EmailSink::new(email, mailer)?.deliver(session, &report).await?;
    }
    Ok(())
}

async fn run_poll(manager: &ConfigManager, session: Session, prediction_id: String, ensemble: bool) -> Result<()> {
    let config = manager.get_config().await;
    let policy = if ensemble {
        config.poller.ensemble_policy()
    } else {
        config.poller.image_policy()
    };
    let predictor = HttpPredictor::new(config.api.base_url.as_str(), config.api.timeout())?;

    let handle = ArtifactPoller::new(prediction_id.as_str(), Arc::new(predictor), session, policy).spawn();
    let mut state = handle.subscribe();

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow();
                info!("Poller for {} is {:?}", prediction_id, current);
                if current.is_terminal() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling poller for {}", prediction_id);
                handle.cancel();
                break;
            }
        }
    }

    let outcome = handle.join().await;
    println!("{}: {:?} after {} requests", outcome.prediction_id, outcome.state, outcome.attempts);

    if let Some(artifact) = outcome.artifact {
        println!("artifact: {}", artifact.artifact_url);
        if let Some(score) = artifact.activation_score {
            println!("activation {:.2}: {}", score, interpret_activation(score));
        }
        if let Some(zone) = &artifact.activation_zone {
            println!("strongest activation: {}", zone);
        }
        for (region, score) in artifact.region_scores.iter().flatten() {
            println!(
                "  {} (avg {:.2}, peak {:.2}): {}",
                region,
                score.average,
                score.peak,
                interpret_region_attention(score.average)
            );
        }
    }

    if outcome.state != PollState::Ready {
        bail!("Artifact for {} is not available ({:?})", prediction_id, outcome.state);
    }
    Ok(())
}

async fn run_config(manager: &ConfigManager, key: Option<String>) -> Result<()> {
    match key {
        Some(key) => {
            let value: serde_json::Value = manager.get_value(&key).await?;
            println!("{}", value);
        }
        None => {
            let config = manager.get_config().await;
            print!("{}", toml::to_string_pretty(&config).context("Failed to serialize configuration")?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let manager = ConfigManager::new(args.config.as_deref())?;
    let logging = manager.get_config().await.logging;
    init_logging(&logging, args.log_level.as_deref())?;
    info!("Configuration loaded from {}", manager.source());

    let session = build_session(args.token.as_deref());

    match args.command {
        Command::Timeline {
            patient_file,
            disease,
            patient,
        } => {
            let disease = parse_disease(&disease)?;
            let patient = load_patient(&patient_file, patient.as_deref(), &session).await?;
            run_timeline(&patient, disease)
        }
        Command::Report {
            patient_file,
            patient,
            out,
            format,
            date,
            email,
        } => {
            let patient = load_patient(&patient_file, patient.as_deref(), &session).await?;
            run_report(&manager, &session, &patient, out, format, date, email).await
        }
        Command::Poll {
            prediction_id,
            ensemble,
        } => run_poll(&manager, session, prediction_id, ensemble).await,
        Command::Config { key } => run_config(&manager, key).await,
    }
}
