//! # cvstudio-app
//!
//! CVSTUDIO 클라이언트 바이너리 진입점.
//! 설정 로드, 처리 서버 연결(실패 시 데모 모드), 배치 실행, 결과 내보내기.

mod chain;
mod export;
mod startup;

use anyhow::{anyhow, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use cvstudio_batch::events::DispatchEvent;
use cvstudio_batch::session::Session;
use cvstudio_core::config::AppConfig;
use cvstudio_core::config_manager::ConfigManager;
use cvstudio_core::models::dispatch::ImageOutcome;
use cvstudio_core::models::image::SourceFile;
use cvstudio_core::models::operation::OperationKind;
use cvstudio_core::models::params::OperationParams;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::chain::parse_chain;
use crate::startup::connect;

/// CVSTUDIO 배치 처리 클라이언트
///
/// OpenCV 처리 서버에 이미지 연산 체인을 일괄 적용
#[derive(Parser, Debug)]
#[command(name = "cvstudio")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 처리 서버 URL (기본: 설정 파일 값)
    #[arg(long, short = 's', global = true)]
    server: Option<String>,

    /// 서버 연결 없이 로컬 데모 연산만 사용
    #[arg(long, short = 'o', global = true)]
    offline: bool,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info", global = true)]
    log_level: String,

    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 연산 목록과 기본 파라미터 출력
    Operations,
    /// 처리 서버 헬스 체크
    Health,
    /// 이미지 배치 처리
    Run(RunArgs),
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// 연산 체인 (예: "rotate:angle=90+flip:flip_code=1")
    #[arg(long, short = 'c')]
    chain: String,

    /// 처리할 이미지 번호 (1부터, 생략 시 전체)
    #[arg(long = "select", value_delimiter = ',')]
    select: Vec<usize>,

    /// 결과 출력 디렉토리 (기본: 설정 파일 값)
    #[arg(long)]
    out: Option<PathBuf>,

    /// 입력 이미지 파일
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

/// 설정 로드 + CLI 오버라이드
fn load_config(args: &Args) -> AppConfig {
    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    let mut config = match manager {
        Ok(manager) => {
            info!("설정 파일: {}", manager.config_path().display());
            manager.get()
        }
        Err(e) => {
            warn!("설정 로드 실패, 기본값 사용: {e}");
            AppConfig::default_config()
        }
    };

    if let Some(ref server_url) = args.server {
        config.server.base_url = server_url.clone();
    }
    config
}

fn print_operations() {
    println!("{:<20} {:<12} {}", "ID", "CLASS", "PARAMETERS");
    for kind in OperationKind::all() {
        let class = if kind.is_exclusive() {
            "exclusive"
        } else {
            "composable"
        };
        let fields = OperationParams::default_for(kind)
            .form_fields()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        println!("{:<20} {:<12} {}", kind.id(), class, fields);
    }
}

async fn check_health(config: &AppConfig) -> Result<()> {
    use cvstudio_core::ports::operation_client::OperationClient;
    use cvstudio_network::http_client::HttpOperationClient;

    let client = HttpOperationClient::from_config(config)?;
    let health = client.health().await?;
    println!(
        "✅ {} — status: {}, OpenCV {}",
        client.base_url(),
        health.status,
        health.version
    );
    Ok(())
}

/// 진행 이벤트 출력 태스크
fn spawn_progress_printer(session: &Session) -> tokio::task::JoinHandle<()> {
    let mut rx = session.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(DispatchEvent::BatchStarted { total, chain_label }) => {
                    println!("▶ {chain_label} — 이미지 {total}개");
                }
                Ok(DispatchEvent::ImageFinished { name, outcome, .. }) => match outcome {
                    ImageOutcome::Succeeded { elapsed_ms, .. } => {
                        println!("  ✓ {name} ({elapsed_ms}ms)");
                    }
                    ImageOutcome::Failed { error, .. } => println!("  ✗ {name}: {error}"),
                    ImageOutcome::Skipped => println!("  - {name}: 건너뜀"),
                },
                Ok(DispatchEvent::BatchFinished(_)) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!("진행 이벤트 {n}개 누락"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn run_batch(config: &AppConfig, offline: bool, run: RunArgs) -> Result<()> {
    let steps = parse_chain(&run.chain)?;

    let connection = connect(config, offline).await?;
    info!("처리 모드: {}", connection.mode());
    let backend = connection.client.name();
    let mut session = Session::new(connection.client.clone(), &config.dispatch);

    for step in &steps {
        session.select_operation(step.kind);
        if !step.fields.is_empty() {
            session.set_param_fields(step.kind, &step.fields)?;
        }
    }

    let mut files = Vec::with_capacity(run.files.len());
    for path in &run.files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("파일 읽기 실패: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        files.push(SourceFile::new(name, bytes));
    }

    let report = session.load(files).await?;
    for failure in &report.failures {
        warn!("{failure}");
    }

    if run.select.is_empty() {
        session.select_all();
    } else {
        let ids = run
            .select
            .iter()
            .map(|index| {
                index
                    .checked_sub(1)
                    .and_then(|i| report.loaded.get(i))
                    .copied()
                    .ok_or_else(|| anyhow!("잘못된 이미지 번호: {index} (1..={})", report.loaded.len()))
            })
            .collect::<Result<Vec<_>>>()?;
        session.select_only(&ids)?;
    }

    let printer = spawn_progress_printer(&session);
    let summary = session.run_selected().await?;
    let _ = printer.await;

    println!("{summary}");

    let out_dir = run
        .out
        .unwrap_or_else(|| config.export.resolved_output_dir());
    let registry = session.registry();
    let outcome = {
        let registry = registry.read();
        export::export(
            &registry,
            &summary,
            backend,
            connection.connectivity.stats(),
            &out_dir,
            &config.export.report_file,
        )?
    };
    println!(
        "📁 {}개 파일 저장: {}",
        outcome.written.len(),
        out_dir.display()
    );

    if summary.failed() > 0 {
        return Err(anyhow!("{}개 이미지 처리 실패", summary.failed()));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "cvstudio={},cvstudio_app={},cvstudio_core={},cvstudio_vision={},cvstudio_network={},cvstudio_batch={}",
        args.log_level, args.log_level, args.log_level, args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    let config = load_config(&args);

    let result = match args.command {
        Command::Operations => {
            print_operations();
            Ok(())
        }
        Command::Health => check_health(&config).await,
        Command::Run(run) => run_batch(&config, args.offline, run).await,
    };

    if let Err(ref e) = result {
        error!("{e:#}");
    }
    result
}
