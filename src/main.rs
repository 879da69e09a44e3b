//! maily - 数据管道运维命令行
//!
//! 子命令：etl / self-healing / backup / remediation；不带子命令时打印帮助。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};

use maily::config::{load_config, AppConfig};
use maily::core::executor::{ExecutionEngine, InferenceWork, RetryPolicy};
use maily::core::fault::{AlwaysSucceed, RandomFaults};
use maily::core::shutdown::{FinalStatusCleanup, ShutdownCoordinator, ShutdownManager};
use maily::llm::InferenceSelector;
use maily::observability::{self, sink_from_config, EventSink};
use maily::pipeline::{
    EtlPipeline, HealthMonitor, PipelineRestart, RecoveryChain, RemediationGenerator,
    SimulatedBackupStore, SimulatedSampler,
};

/// 演练中恢复 / 校验各自的成功概率
const DRILL_SUCCESS_PROBABILITY: f64 = 2.0 / 3.0;

/// Maily - pipeline operations for the orchestration core
#[derive(Parser, Debug)]
#[command(name = "maily")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    RUST_LOG                      Log filter (default: info)\n    MAILY__<SECTION>__<KEY>       Override any config key\n    MAILY_OBSERVABILITY_URL       Send observability events to this endpoint")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the ETL pipeline once
    Etl,
    /// Run the self-healing monitor until Ctrl+C / SIGTERM
    SelfHealing,
    /// Run one disaster-recovery drill (backup, restore, validate)
    Backup,
    /// Generate a remediation script for a sample error condition
    Remediation,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help().context("Failed to print help")?;
        println!();
        return Ok(());
    };

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let sink = sink_from_config(&cfg.observability);

    match command {
        Command::Etl => run_etl(sink).await,
        Command::SelfHealing => run_self_healing(&cfg, sink).await,
        Command::Backup => run_backup(sink).await,
        Command::Remediation => run_remediation(&cfg).await,
    }
}

fn simulated_selector(cfg: &AppConfig) -> Arc<InferenceSelector> {
    Arc::new(InferenceSelector::simulated(
        cfg.models.clone(),
        Arc::new(AlwaysSucceed),
    ))
}

async fn run_etl(sink: Arc<dyn EventSink>) -> anyhow::Result<()> {
    let loaded = EtlPipeline::sample(sink)
        .run()
        .await
        .context("ETL pipeline failed")?;
    println!("{}", serde_json::to_string_pretty(&loaded)?);
    Ok(())
}

async fn run_self_healing(cfg: &AppConfig, sink: Arc<dyn EventSink>) -> anyhow::Result<()> {
    let manager = Arc::new(ShutdownManager::new());
    manager.install_signal_handlers();

    let engine = Arc::new(ExecutionEngine::new(
        Arc::new(InferenceWork::new(simulated_selector(cfg))),
        RetryPolicy::from(&cfg.orchestration),
    ));
    let monitor = HealthMonitor::new(
        Arc::new(SimulatedSampler::default()),
        Arc::new(PipelineRestart::default().with_engine(engine)),
        Arc::clone(&sink),
        &cfg.health,
    );

    let stats = monitor.run(manager.token()).await;

    let mut coordinator = ShutdownCoordinator::new(Arc::clone(&manager))
        .with_timeout(Duration::from_secs(5));
    coordinator.register(FinalStatusCleanup::new(sink, "self-healing monitor"));
    coordinator.run_cleanup().await;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn run_backup(sink: Arc<dyn EventSink>) -> anyhow::Result<()> {
    let store = SimulatedBackupStore::new(
        Arc::new(RandomFaults::new(DRILL_SUCCESS_PROBABILITY)),
        Arc::new(RandomFaults::new(DRILL_SUCCESS_PROBABILITY)),
    )
    .with_step_delay(Duration::from_secs(1));
    let report = RecoveryChain::new(Arc::new(store), sink).run_drill().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_remediation(cfg: &AppConfig) -> anyhow::Result<()> {
    let script = RemediationGenerator::new(simulated_selector(cfg))
        .generate("SampleErrorCondition")
        .await;
    println!("Generated remediation script:\n{}", script);
    Ok(())
}
