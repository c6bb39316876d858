mod cli;

use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;

fn main() -> ExitCode {
    // 初始化日志系统
    caserun::logger::init_logger();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Run(args) => cli::run(args),
        Commands::History { limit } => cli::show_history(limit).map(|_| true),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}
