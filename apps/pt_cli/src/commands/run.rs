// apps/pt_cli/src/commands/run.rs

//! 运行土柱算例
//!
//! 均匀一维土柱，左端入流。初始条件为单格脉冲，或给定入流浓度的连续注入。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Args;
use pt_transport::diagnostics::MassBalance;
use pt_transport::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// 运行参数
#[derive(Args)]
pub struct RunArgs {
    /// 配置文件路径（JSON）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 单元数
    #[arg(long)]
    pub cells: Option<usize>,

    /// 模拟结束时间 [s]
    #[arg(short = 't', long)]
    pub end_time: Option<f64>,

    /// 外部时间步长 [s]
    #[arg(long)]
    pub dt: Option<f64>,

    /// 入流浓度；给定时为连续注入
    #[arg(long)]
    pub inflow: Option<f64>,
}

/// 土柱算例参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnScenario {
    /// 单元数
    pub cells: usize,
    /// 土柱长度 [m]
    pub length: f64,
    /// 截面积 [m²]
    pub area: f64,
    /// 每个面上的达西通量 [m³/s]
    pub darcy_flux: f64,
    /// 孔隙度
    pub porosity: f64,
    /// 饱和度
    pub saturation: f64,
    /// 结束时间 [s]
    pub end_time: f64,
    /// 外部时间步长 [s]
    pub dt: f64,
    /// 入流浓度
    pub inflow: Option<f64>,
    /// 初始脉冲所在单元
    pub pulse_cell: Option<usize>,
}

impl Default for ColumnScenario {
    fn default() -> Self {
        Self {
            cells: 50,
            length: 1.0,
            area: 1.0,
            darcy_flux: 1e-3,
            porosity: 0.3,
            saturation: 1.0,
            end_time: 100.0,
            dt: 10.0,
            inflow: None,
            pulse_cell: Some(0),
        }
    }
}

/// 配置文件：输运配置加算例
#[derive(Debug, Clone, Deserialize)]
pub struct RunFile {
    /// 输运配置
    pub transport: TransportConfig,
    /// 算例
    #[serde(default)]
    pub scenario: ColumnScenario,
}

impl Default for RunFile {
    fn default() -> Self {
        Self {
            transport: TransportConfig::new(vec!["tracer".into()]),
            scenario: ColumnScenario::default(),
        }
    }
}

/// 读取配置文件
pub fn load_run_file(path: &Path) -> Result<RunFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
    let file: RunFile = serde_json::from_str(&text).context("配置文件解析失败")?;
    file.transport.validate().context("输运配置无效")?;
    Ok(file)
}

/// 算例结果
#[derive(Debug)]
pub struct ColumnResult {
    /// 各组分最终浓度
    pub concentrations: Vec<Vec<f64>>,
    /// 质量平衡
    pub balance: MassBalance,
    /// 外部步数
    pub steps: usize,
}

/// 运行土柱算例
pub fn simulate(file: &RunFile) -> Result<ColumnResult> {
    let scenario = &file.scenario;
    if scenario.dt <= 0.0 || scenario.end_time < 0.0 {
        bail!("时间参数无效: dt={}, end_time={}", scenario.dt, scenario.end_time);
    }

    let mesh = Arc::new(
        UnstructuredMesh::column_1d(scenario.cells, scenario.length, scenario.area)
            .context("生成土柱网格失败")?,
    );
    let comm: Arc<dyn Communicator> = Arc::new(SerialComm);
    let config = file.transport.clone();
    let ncomp = config.num_components();
    let num_aqueous = config.num_aqueous();

    let mut pk = TransportPk::new(config, mesh, Arc::clone(&comm))?;
    let mut state = FieldStore::new(comm);
    pk.setup(&mut state)?;

    state.fill_face_field(keys::DARCY_FLUX, scenario.darcy_flux)?;
    state.fill(keys::POROSITY, scenario.porosity)?;
    state.fill(keys::SATURATION_LIQUID, scenario.saturation)?;
    state.fill(keys::PREV_SATURATION_LIQUID, scenario.saturation)?;

    let mut initial = vec![0.0; scenario.cells];
    if let Some(cell) = scenario.pulse_cell {
        if cell >= scenario.cells {
            bail!("脉冲单元 {cell} 超出范围 (共 {} 个单元)", scenario.cells);
        }
        initial[cell] = 1.0;
    }
    for i in 0..ncomp {
        state.set_component(keys::TOTAL_COMPONENT_CONCENTRATION, i, &initial)?;
    }

    if let Some(value) = scenario.inflow {
        for i in 0..num_aqueous {
            pk.add_boundary(FunctionBoundary::constant("inlet", vec![0], i, value));
        }
    }

    pk.initialize(&mut state).context("初始化失败")?;

    let mut t = 0.0;
    let mut steps = 0;
    while t < scenario.end_time {
        let dt = scenario.dt.min(scenario.end_time - t).min(pk.get_dt(&mut state)?);
        state.set_time_window(t, t + dt);

        if pk.advance_step(t, t + dt, false, &mut state)? {
            bail!("t = {t} 处推进失败");
        }
        pk.commit_step(t, t + dt, &mut state)?;
        t += dt;
        steps += 1;
    }

    let tcc = state.values(keys::TOTAL_COMPONENT_CONCENTRATION)?;
    let concentrations = (0..ncomp)
        .map(|i| tcc.component(i)[..scenario.cells].to_vec())
        .collect();
    Ok(ColumnResult {
        concentrations,
        balance: pk.mass_balance(&state)?,
        steps,
    })
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== PoroTrans 土柱算例 ===");

    let mut file = match &args.config {
        Some(path) => load_run_file(path)?,
        None => RunFile::default(),
    };
    if let Some(cells) = args.cells {
        file.scenario.cells = cells;
    }
    if let Some(end_time) = args.end_time {
        file.scenario.end_time = end_time;
    }
    if let Some(dt) = args.dt {
        file.scenario.dt = dt;
    }
    if args.inflow.is_some() {
        file.scenario.inflow = args.inflow;
        file.scenario.pulse_cell = None;
    }

    let scenario = &file.scenario;
    info!(
        "{} 个单元, 长度 {} m, 通量 {} m³/s, 结束时间 {} s",
        scenario.cells, scenario.length, scenario.darcy_flux, scenario.end_time
    );

    let start = Instant::now();
    let result = simulate(&file)?;

    info!("=== 模拟完成 ===");
    info!("外部步数: {}", result.steps);
    info!("计算时间: {:.3} s", start.elapsed().as_secs_f64());
    for (name, values) in file.transport.component_names.iter().zip(&result.concentrations) {
        let formatted: Vec<String> = values.iter().map(|c| format!("{c:.4e}")).collect();
        println!("{name}: [{}]", formatted.join(", "));
    }
    for record in &result.balance.components {
        info!(
            "{}: 质量 {:.6e}, 初始 {:.6e}, 源 {:.6e}, 误差 {:.3e}",
            record.name,
            record.mass,
            record.initial_mass,
            record.source_mass,
            record.balance_error()
        );
    }
    Ok(())
}
