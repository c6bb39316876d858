use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use caserun::config::{ConfigLoader, RunMode};
use caserun::history::{self, HistorySink, HistoryStorage};
use caserun::loader::{CaseLoader, FileLoader};
use caserun::runner::{CaseRunner, ConsoleReporter, Coordinator, JsonReport, ReportBuilder};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 执行用例文件 (.json / .toml)
    Run(RunArgs),
    /// 查看最近的用例执行历史
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// 用例文件
    pub cases: PathBuf,

    /// 调度方式，覆盖配置文件
    #[arg(short, long, value_enum)]
    pub mode: Option<RunMode>,

    /// 线程池大小 (pooled)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// 环境名称，对应 [environments.<name>]
    #[arg(short, long)]
    pub env: Option<String>,

    /// 变量覆盖 key=value，可重复
    #[arg(long = "var", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// 配置文件路径，默认自动查找 caserun.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 把 JSON 报告写入该文件
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// 显示所有步骤的请求和响应
    #[arg(short, long)]
    pub verbose: bool,

    /// 不写入执行历史
    #[arg(long)]
    pub no_history: bool,
}

fn parse_var(s: &str) -> std::result::Result<(String, String), String> {
    ConfigLoader::parse_cli_var(s).ok_or_else(|| format!("expected key=value, got '{}'", s))
}

/// 执行一次运行，返回是否全部通过
pub fn run(args: RunArgs) -> Result<bool> {
    let mut config = ConfigLoader::load(args.config.as_deref())?;
    if let Some(mode) = args.mode {
        config.engine.mode = mode;
    }
    if let Some(workers) = args.workers {
        config.engine.workers = workers;
    }

    let constants = ConfigLoader::build_constants(&config, args.env.as_deref(), &args.vars)?;

    let cases = FileLoader::new(&args.cases)
        .load()
        .with_context(|| format!("Failed to load cases from {}", args.cases.display()))?;
    info!(cases = cases.len(), file = %args.cases.display(), "cases loaded");

    let runner = CaseRunner::from_config(&config, constants)?;
    let mut coordinator = Coordinator::new(runner);
    if !args.no_history {
        coordinator = coordinator.with_sink(HistorySink::default());
    }

    let run = coordinator.run(&cases, config.schedule())?;

    ConsoleReporter::new(args.verbose).build(&run)?;
    if let Some(path) = args.report {
        JsonReport::new(path).build(&run)?;
    }

    Ok(run.success())
}

pub fn show_history(limit: usize) -> Result<()> {
    history::list_history(&HistoryStorage::default(), limit)?;
    Ok(())
}
