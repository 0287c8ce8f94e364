// apps/pt_cli/src/commands/validate.rs

//! 配置验证命令

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use pt_transport::config::MultiscaleModel;
use tracing::{error, info, warn};

use super::run::RunFile;

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Debug, Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn is_ok_strict(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== PoroTrans 配置验证 ===");
    let result = validate_file(&args.config)?;

    for msg in &result.warnings {
        warn!("{msg}");
    }
    for msg in &result.errors {
        error!("{msg}");
    }

    let passed = if args.strict {
        result.is_ok_strict()
    } else {
        result.is_ok()
    };
    if !passed {
        bail!(
            "验证失败: {} 个错误, {} 个警告",
            result.errors.len(),
            result.warnings.len()
        );
    }
    println!("✓ 配置有效 ({} 个警告)", result.warnings.len());
    Ok(())
}

fn validate_file(path: &Path) -> Result<ValidationResult> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
    let mut result = ValidationResult::default();

    let file: RunFile = match serde_json::from_str(&text) {
        Ok(file) => file,
        Err(err) => {
            result.add_error(format!("JSON 解析失败: {err}"));
            return Ok(result);
        }
    };
    check_run_file(&file, &mut result);
    Ok(result)
}

fn check_run_file(file: &RunFile, result: &mut ValidationResult) {
    let config = &file.transport;
    if let Err(err) = config.validate() {
        result.add_error(err.to_string());
    }

    if let Some(dispersion) = &config.dispersion {
        if !config.dispersion_active() {
            result.add_warning(format!(
                "已配置 {} 种弥散材料，但既无机械弥散也无有效分子扩散",
                dispersion.materials.len()
            ));
        }
    }
    for name in config
        .molecular_diffusion
        .aqueous
        .keys()
        .chain(config.molecular_diffusion.gaseous.keys())
    {
        if config.component_index(name).is_err() {
            result.add_warning(format!("分子扩散系数对应的组分 {name} 不存在"));
        }
    }
    if config.multiscale_model == MultiscaleModel::DualDiscontinuous && config.num_aqueous() == 0 {
        result.add_warning("双重孔隙模型只作用于液相组分，当前没有液相组分");
    }

    let scenario = &file.scenario;
    if scenario.cells == 0 {
        result.add_error("scenario.cells 必须为正");
    }
    if !(scenario.porosity > 0.0 && scenario.porosity <= 1.0) {
        result.add_error(format!("scenario.porosity 必须位于 (0, 1]，实际 {}", scenario.porosity));
    }
    if scenario.dt <= 0.0 {
        result.add_error("scenario.dt 必须为正");
    }
    if let Some(cell) = scenario.pulse_cell {
        if cell >= scenario.cells {
            result.add_error(format!("scenario.pulse_cell = {cell} 超出范围"));
        }
    }
    if scenario.pulse_cell.is_some() && scenario.inflow.is_some() {
        result.add_warning("同时给定了脉冲与入流");
    }
}
