// apps/pt_cli/src/main.rs

//! PoroTrans 命令行界面
//!
//! - `run`: 一维土柱演示（脉冲或连续入流）
//! - `validate`: 解析并校验配置文件

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;

/// 多孔介质溶质输运命令行工具
#[derive(Parser)]
#[command(name = "pt_cli", version, about = "Advective-dispersive solute transport in porous media")]
struct Cli {
    /// 日志级别，无法识别时退回 info
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 一维土柱算例
    Run(commands::run::RunArgs),
    /// 只校验配置文件，不运行
    Validate(commands::validate::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level: Level = cli.log_level.parse().unwrap_or(Level::INFO);

    // 同时接管求解器库中 log 宏的输出
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}
