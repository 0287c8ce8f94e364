// crates/pt_transport/src/pk.rs

//! 输运过程驱动 [`TransportPk`]
//!
//! 外部驱动按以下顺序调用：
//!
//! ```text
//! new → setup(state) → [add_boundary / add_source] → initialize(state)
//!     → loop { stable_time_step / get_dt → advance_step → commit_step }
//! ```
//!
//! `advance_step` 不修改状态中的浓度场（裂隙与基质），结果保存在工作缓冲中，
//! 由 `commit_step` 写回。同一区间可以重复推进。

use std::sync::Arc;

use pt_foundation::{ensure, require, PtError};

use crate::advection::{create_scheme, AdvectionContext, AdvectionScheme};
use crate::boundary::{BoundaryFunction, BoundarySet};
use crate::comm::Communicator;
use crate::config::{MultiscaleModel, TransportConfig, Verbosity};
use crate::diagnostics::{
    check_local_bounds, check_non_negative, check_tracer_bounds, edp_bounds, local_edp_bounds,
    solute_extrema, solute_mass, ComponentMass, InternalChecks, MassBalance,
};
use crate::dispersion::{DispersionInputs, DispersionSolve};
use crate::error::{TransportError, TransportResult};
use crate::mesh::{face_dof_map, Ownership, TransportMesh};
use crate::multiscale::{ExchangeWaterContent, MultiscaleCoupling};
use crate::sources::{SourceSinkAccumulator, SourceSpec};
use crate::state::{keys, FieldLocation, FieldStore, MultiField};
use crate::subcycle::{interpolate_cell_vector, SaturationPath, SubcycleSchedule, SubcycleState};
use crate::timestep::{StableTimeStepEstimator, WaterContent, LARGE_TIME_STEP};
use crate::upwind::UpwindTopology;

const PK_NAME: &str = "transport";

/// 输运过程
#[derive(Debug)]
pub struct TransportPk {
    config: TransportConfig,
    mesh: Arc<dyn TransportMesh>,
    comm: Arc<dyn Communicator>,
    estimator: StableTimeStepEstimator,
    scheme: Option<Box<dyn AdvectionScheme>>,
    upwind: Option<UpwindTopology>,
    boundaries: BoundarySet,
    sources: SourceSinkAccumulator,
    dispersion: Option<DispersionSolve>,
    multiscale: Option<MultiscaleCoupling>,
    checks: InternalChecks,
    /// 工作缓冲，跨步保留
    tcc_tmp: MultiField,
    /// 基质浓度工作缓冲，单一孔隙模型下为空
    matrix_tmp: MultiField,
    dt_stable: f64,
    num_subcycles: usize,
    initial_mass: Vec<f64>,
    t_physics: f64,
    state: SubcycleState,
}

impl TransportPk {
    /// 创建；配置无效时返回错误
    pub fn new(
        config: TransportConfig,
        mesh: Arc<dyn TransportMesh>,
        comm: Arc<dyn Communicator>,
    ) -> TransportResult<Self> {
        config.validate()?;
        let ncomp = config.num_components();
        Ok(Self {
            estimator: StableTimeStepEstimator::from_config(&config),
            checks: InternalChecks::new(config.internal_tests),
            sources: SourceSinkAccumulator::new(ncomp),
            config,
            mesh,
            comm,
            scheme: None,
            upwind: None,
            boundaries: BoundarySet::new(),
            dispersion: None,
            multiscale: None,
            tcc_tmp: MultiField::new(ncomp, 0),
            matrix_tmp: MultiField::new(ncomp, 0),
            dt_stable: LARGE_TIME_STEP,
            num_subcycles: 0,
            initial_mass: vec![0.0; ncomp],
            t_physics: 0.0,
            state: SubcycleState::ComputeStableDt,
        })
    }

    /// 配置
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// 网格
    pub fn mesh(&self) -> &Arc<dyn TransportMesh> {
        &self.mesh
    }

    #[inline]
    fn verbose(&self, level: Verbosity) -> bool {
        self.config.verbosity >= level
    }

    // ------------------------------------------------------------
    // 生命周期
    // ------------------------------------------------------------

    /// 在状态中注册所需的场
    pub fn setup(&mut self, state: &mut FieldStore) -> TransportResult<()> {
        let mesh = self.mesh.as_ref();
        let n_all = mesh.num_cells(Ownership::All);
        let ncomp = self.config.num_components();

        state.require_cell_field(keys::TOTAL_COMPONENT_CONCENTRATION, PK_NAME, ncomp, n_all)?;
        state.require_face_field(keys::DARCY_FLUX, "flow", face_dof_map(mesh))?;
        state.require_cell_field(keys::POROSITY, "porosity", 1, n_all)?;
        state.require_cell_field(keys::SATURATION_LIQUID, "flow", 1, n_all)?;
        state.require_cell_field(keys::PREV_SATURATION_LIQUID, "flow", 1, n_all)?;

        if self.config.multiscale_model == MultiscaleModel::DualDiscontinuous {
            let nodes = MultiscaleCoupling::from_config(&self.config.multiscale.closure).num_matrix_nodes();
            state.require_cell_field(keys::TCC_MATRIX, PK_NAME, ncomp, n_all * nodes)?;
            state.require_cell_field(keys::POROSITY_MATRIX, "porosity", 1, n_all)?;
            state.require_cell_field(keys::SATURATION_LIQUID_MATRIX, "flow", 1, n_all)?;
            state.require_cell_field(keys::PREV_SATURATION_LIQUID_MATRIX, "flow", 1, n_all)?;
        }
        Ok(())
    }

    /// 初始化：补齐未初始化的场，选择格式，建立迎风拓扑
    ///
    /// 未初始化的孔隙度和饱和度取 1，浓度和通量取 0。
    pub fn initialize(&mut self, state: &mut FieldStore) -> TransportResult<()> {
        if let Some((t0, _)) = state.time_window() {
            self.t_physics = t0;
        }

        self.initialize_fields(state)?;

        let mesh = Arc::clone(&self.mesh);
        let n_all = mesh.num_cells(Ownership::All);

        let scheme = create_scheme(&self.config, mesh.topology_kind(), n_all)?;
        if self.verbose(Verbosity::Low) {
            log::info!(
                "输运格式: {} ({} 个组分, 其中液相 {})",
                scheme.name(),
                self.config.num_components(),
                self.config.num_aqueous()
            );
        }
        self.scheme = Some(scheme);

        self.dispersion = match &self.config.dispersion {
            Some(dispersion) if self.config.dispersion_active() => {
                Some(DispersionSolve::new(&self.config, dispersion, mesh.as_ref())?)
            }
            _ => None,
        };

        self.multiscale = match self.config.multiscale_model {
            MultiscaleModel::Single => None,
            MultiscaleModel::DualDiscontinuous => {
                Some(MultiscaleCoupling::from_config(&self.config.multiscale.closure))
            }
        };

        self.tcc_tmp = state.values(keys::TOTAL_COMPONENT_CONCENTRATION)?.clone();
        if self.multiscale.is_some() {
            self.matrix_tmp = state.values(keys::TCC_MATRIX)?.clone();
        }

        state.scatter(keys::DARCY_FLUX)?;
        let flux = state.face_flux(keys::DARCY_FLUX)?;
        let upwind = UpwindTopology::rebuild(mesh.as_ref(), &flux)?;

        self.boundaries.compute(self.t_physics)?;
        self.boundaries.check_faces(mesh.num_faces(Ownership::All))?;
        self.sources.check_cells(self.t_physics, n_all)?;
        for (name, f) in self.boundaries.outflow_faces(mesh.as_ref(), &upwind) {
            log::warn!("边界 {name} 定义在出流面 {f} 上，该值不参与对流计算");
        }
        self.upwind = Some(upwind);

        self.initial_mass = self.component_masses(state, state.values(keys::TOTAL_COMPONENT_CONCENTRATION)?)?;
        self.state = SubcycleState::ComputeStableDt;
        Ok(())
    }

    fn initialize_fields(&mut self, state: &mut FieldStore) -> TransportResult<()> {
        let mut defaults = vec![
            (keys::POROSITY, 1.0),
            (keys::SATURATION_LIQUID, 1.0),
            (keys::PREV_SATURATION_LIQUID, 1.0),
            (keys::TOTAL_COMPONENT_CONCENTRATION, 0.0),
            (keys::DARCY_FLUX, 0.0),
        ];
        if self.config.multiscale_model == MultiscaleModel::DualDiscontinuous {
            defaults.extend([
                (keys::TCC_MATRIX, 0.0),
                (keys::POROSITY_MATRIX, 1.0),
                (keys::SATURATION_LIQUID_MATRIX, 1.0),
                (keys::PREV_SATURATION_LIQUID_MATRIX, 1.0),
            ]);
        }

        for (key, value) in defaults {
            if !state.contains(key) {
                return Err(TransportError::missing_field(key));
            }
            if !state.is_initialized(key) {
                state.fill(key, value)?;
                if self.verbose(Verbosity::Medium) {
                    log::info!("场 {key} 未初始化，使用默认值 {value}");
                }
            }
        }

        for key in [
            keys::POROSITY,
            keys::SATURATION_LIQUID,
            keys::PREV_SATURATION_LIQUID,
            keys::TOTAL_COMPONENT_CONCENTRATION,
        ] {
            state.scatter(key)?;
        }
        Ok(())
    }

    fn ensure_initialized(&self) -> TransportResult<()> {
        if self.scheme.is_none() {
            return Err(TransportError::Lifecycle("initialize 之前不能推进".into()));
        }
        Ok(())
    }

    // ------------------------------------------------------------
    // 数据提供者
    // ------------------------------------------------------------

    /// 注册边界数据
    ///
    /// 面编号在每次计算边界值后检查，越界时 `initialize` 或 `advance_step` 返回错误。
    pub fn add_boundary(&mut self, boundary: impl BoundaryFunction + 'static) {
        self.boundaries.add(boundary);
    }

    /// 注册源
    pub fn add_source(&mut self, source: SourceSpec) -> TransportResult<()> {
        let n = self.config.num_components();
        ensure!(
            source.component < n,
            PtError::index_out_of_bounds("source component", source.component, n)
        );
        self.sources.add(source);
        Ok(())
    }

    /// 边界数据
    pub fn boundaries(&self) -> &BoundarySet {
        &self.boundaries
    }

    /// 源汇
    pub fn sources(&self) -> &SourceSinkAccumulator {
        &self.sources
    }

    // ------------------------------------------------------------
    // 时间步
    // ------------------------------------------------------------

    /// 稳定时间步
    ///
    /// 同步通量、重建迎风拓扑后估计。抽取源按状态时间窗口计入。
    pub fn stable_time_step(&mut self, state: &mut FieldStore) -> TransportResult<f64> {
        let (t0, t1) = state.time_window().unwrap_or((self.t_physics, self.t_physics));
        self.compute_stable_dt(state, t0, t1)
    }

    fn compute_stable_dt(&mut self, state: &mut FieldStore, t0: f64, t1: f64) -> TransportResult<f64> {
        let mesh = Arc::clone(&self.mesh);
        let n_all = mesh.num_cells(Ownership::All);

        state.scatter(keys::DARCY_FLUX)?;
        let flux = state.face_flux(keys::DARCY_FLUX)?;
        let upwind = UpwindTopology::rebuild(mesh.as_ref(), &flux)?;
        let extra = self.sources.producer_outflux(mesh.as_ref(), t0, t1, n_all)?;

        let water = WaterContent {
            porosity: state.values(keys::POROSITY)?.component(0),
            ws_prev: state.values(keys::PREV_SATURATION_LIQUID)?.component(0),
            ws: state.values(keys::SATURATION_LIQUID)?.component(0),
        };
        let step = self
            .estimator
            .compute(mesh.as_ref(), self.comm.as_ref(), &upwind, water, &extra);

        if self.verbose(Verbosity::High) {
            if let Some(c) = step.limiting_cell {
                log::debug!(
                    "稳定时间步 {:.6e} 由单元 {} (gid {}) 限制",
                    step.dt,
                    c,
                    mesh.cell_global_id(c)
                );
            }
        }

        self.upwind = Some(upwind);
        self.dt_stable = step.dt;
        Ok(step.dt)
    }

    /// 外部驱动可用的时间步
    ///
    /// 允许子循环时不限制；否则按当前通量和饱和度重新估计稳定步长。
    pub fn get_dt(&mut self, state: &mut FieldStore) -> TransportResult<f64> {
        if self.config.subcycling {
            return Ok(LARGE_TIME_STEP);
        }
        self.stable_time_step(state)
    }

    /// 最近一次估计的稳定步长
    pub fn last_stable_dt(&self) -> f64 {
        self.dt_stable
    }

    /// 上一次 `advance_step` 的子步数
    pub fn num_subcycles(&self) -> usize {
        self.num_subcycles
    }

    /// 子循环状态
    pub fn subcycle_state(&self) -> SubcycleState {
        self.state
    }

    // ------------------------------------------------------------
    // 推进
    // ------------------------------------------------------------

    /// 推进 `[t_old, t_new]`，返回是否失败
    ///
    /// 饱和度场定义在状态时间窗口上（缺省为 `[t_old, t_new]`），
    /// 稳定步长小于窗口长度时在子步之间线性插值。
    ///
    /// 每次推进都从状态中的浓度重新开始，因此重复推进同一区间不会累积。
    /// 本过程没有需要重建的内部状态，`reinit` 只记录日志，结果与 `false` 相同。
    pub fn advance_step(
        &mut self,
        t_old: f64,
        t_new: f64,
        reinit: bool,
        state: &mut FieldStore,
    ) -> TransportResult<bool> {
        self.ensure_initialized()?;
        if reinit {
            log::debug!("advance_step 请求 reinit，输运过程无需重建");
        }
        let mesh = Arc::clone(&self.mesh);
        let comm = Arc::clone(&self.comm);
        let n_owned = mesh.num_cells(Ownership::Owned);
        let num_aqueous = self.config.num_aqueous();
        let ncomp = self.config.num_components();
        let dt_mpc = t_new - t_old;

        let (w0, w1) = state.time_window().unwrap_or((t_old, t_new));
        let dt_window = w1 - w0;
        let dt_shift = t_old - w0;
        self.t_physics = t_old;

        // 1. 稳定时间步
        self.state = SubcycleState::ComputeStableDt;
        let dt_stable = self.compute_stable_dt(state, t_old, t_new)?;
        let interpolate = dt_stable < dt_window;

        let porosity = state.values(keys::POROSITY)?.component(0).to_vec();
        let ws_prev = state.values(keys::PREV_SATURATION_LIQUID)?.component(0).to_vec();
        let ws = state.values(keys::SATURATION_LIQUID)?.component(0).to_vec();
        let mut path = SaturationPath::new(&ws_prev, &ws, dt_shift, dt_window, interpolate);

        let matrix_water = match self.multiscale {
            Some(_) => {
                let phi_m = state.values(keys::POROSITY_MATRIX)?.component(0).to_vec();
                let wsm_prev = state.values(keys::PREV_SATURATION_LIQUID_MATRIX)?.component(0).to_vec();
                let wsm = state.values(keys::SATURATION_LIQUID_MATRIX)?.component(0).to_vec();
                Some((phi_m, wsm_prev, wsm))
            }
            None => None,
        };

        let mut tcc_prev = state.values(keys::TOTAL_COMPONENT_CONCENTRATION)?.clone();
        self.tcc_tmp.copy_from(&tcc_prev)?;
        if self.multiscale.is_some() {
            self.matrix_tmp.copy_from(state.values(keys::TCC_MATRIX)?)?;
        }

        // 2. 子循环
        let mut schedule = SubcycleSchedule::new(dt_mpc, dt_stable)?;
        self.state = schedule.state();
        for step in schedule.by_ref() {
            self.boundaries.compute(t_old + step.midpoint())?;
            self.boundaries.check_faces(mesh.num_faces(Ownership::All))?;
            path.advance(step.end());
            comm.scatter_to_ghosts(FieldLocation::Cell, &mut tcc_prev);

            let upwind = require!(
                self.upwind.as_ref(),
                TransportError::Lifecycle("迎风拓扑未建立".into())
            );
            let scheme = require!(
                self.scheme.as_mut(),
                TransportError::Lifecycle("对流格式未选择".into())
            );
            let ctx = AdvectionContext {
                mesh: mesh.as_ref(),
                comm: comm.as_ref(),
                upwind,
                porosity: &porosity,
                ws_start: path.start(),
                ws_end: path.end(),
                boundaries: &self.boundaries,
                num_aqueous,
                t_start: t_old + step.t_offset,
            };
            scheme.advance(&ctx, &mut self.sources, &tcc_prev, &mut self.tcc_tmp, step.dt)?;

            // 3. 裂隙-基质交换
            if let (Some(coupling), Some((phi_m, wsm_prev, wsm))) = (&self.multiscale, &matrix_water) {
                let fracture_start: Vec<f64> = (0..n_owned).map(|c| porosity[c] * path.start()[c]).collect();
                let fracture_end: Vec<f64> = (0..n_owned).map(|c| porosity[c] * path.end()[c]).collect();
                let matrix_start = matrix_water_content(
                    phi_m,
                    (wsm_prev.as_slice(), wsm.as_slice()),
                    step.t_offset + dt_shift,
                    dt_window,
                    interpolate,
                );
                let matrix_end = matrix_water_content(
                    phi_m,
                    (wsm_prev.as_slice(), wsm.as_slice()),
                    step.end() + dt_shift,
                    dt_window,
                    interpolate,
                );
                let wc = ExchangeWaterContent {
                    fracture_start: &fracture_start,
                    fracture_end: &fracture_end,
                    matrix_start: &matrix_start,
                    matrix_end: &matrix_end,
                    porosity_matrix: phi_m,
                };
                coupling.apply(
                    mesh.as_ref(),
                    &mut self.tcc_tmp,
                    &mut self.matrix_tmp,
                    num_aqueous,
                    wc,
                    step.dt,
                );
            }

            // 4. 内部检查
            if self.checks.enabled() {
                let tol = self.checks.tolerance();
                self.checks
                    .enforce(check_non_negative(mesh.as_ref(), &self.tcc_tmp, tol))?;
                if self.sources.is_empty() && self.multiscale.is_none() {
                    let result = if self.config.spatial_discretization_order == 1 {
                        let bounds =
                            local_edp_bounds(mesh.as_ref(), upwind, &tcc_prev, &self.boundaries, 0..num_aqueous);
                        check_local_bounds(mesh.as_ref(), &self.tcc_tmp, &bounds, 0..num_aqueous, tol)
                    } else {
                        let bounds = edp_bounds(&tcc_prev, &self.boundaries, 0..num_aqueous);
                        check_tracer_bounds(mesh.as_ref(), &self.tcc_tmp, &bounds, 0..num_aqueous, tol)
                    };
                    self.checks.enforce(result)?;
                }
            }

            if !step.is_final {
                self.state = SubcycleState::RotateBuffer;
                tcc_prev.copy_from(&self.tcc_tmp)?;
            }
            self.t_physics = t_old + step.end();
        }
        self.num_subcycles = schedule.num_cycles();
        self.state = schedule.state();

        // 5. 弥散/扩散
        if let Some(dispersion) = self.dispersion.as_mut() {
            let flux = state.face_flux(keys::DARCY_FLUX)?;
            let inputs = DispersionInputs {
                mesh: mesh.as_ref(),
                flux: &flux,
                porosity: &porosity,
                ws_prev: &ws_prev,
                ws: &ws,
            };
            let stats = dispersion.solve(
                inputs,
                &mut self.tcc_tmp,
                &mut self.sources,
                &self.boundaries,
                t_new,
                dt_mpc,
            )?;
            comm.scatter_to_ghosts(FieldLocation::Cell, &mut self.tcc_tmp);

            if self.config.verbosity >= Verbosity::Medium {
                log::info!(
                    "dispersion solver ({}) ||r||={:.6e} itrs={}",
                    dispersion.solver_name(),
                    stats.mean_residual(),
                    stats.mean_iterations()
                );
            }
        }

        // 6. 统计
        if self.verbose(Verbosity::Medium) {
            log::info!(
                "{} sub-cycles, dt_stable={:.6e} [sec]  dt_MPC={:.6e} [sec]",
                self.num_subcycles,
                dt_stable,
                dt_mpc
            );
            let extrema = solute_extrema(mesh.as_ref(), comm.as_ref(), &self.tcc_tmp, 0..ncomp);
            for (name, b) in self.config.component_names.iter().zip(&extrema) {
                log::info!("{name}: min={:.6e} max={:.6e}", b.min, b.max);
            }
        }

        Ok(false)
    }

    /// 把工作缓冲写回状态中的浓度场
    pub fn commit_step(&mut self, _t_old: f64, t_new: f64, state: &mut FieldStore) -> TransportResult<()> {
        let tcc = state.values_mut(keys::TOTAL_COMPONENT_CONCENTRATION)?;
        tcc.copy_from(&self.tcc_tmp)?;
        state.set_initialized(keys::TOTAL_COMPONENT_CONCENTRATION)?;
        state.scatter(keys::TOTAL_COMPONENT_CONCENTRATION)?;

        if self.multiscale.is_some() {
            state.values_mut(keys::TCC_MATRIX)?.copy_from(&self.matrix_tmp)?;
            state.set_initialized(keys::TCC_MATRIX)?;
        }
        self.t_physics = t_new;
        Ok(())
    }

    /// 工作缓冲（最近一次推进的结果）
    pub fn working_concentration(&self) -> &MultiField {
        &self.tcc_tmp
    }

    /// 基质浓度工作缓冲
    pub fn working_matrix_concentration(&self) -> &MultiField {
        &self.matrix_tmp
    }

    // ------------------------------------------------------------
    // 诊断
    // ------------------------------------------------------------

    fn component_masses(&self, state: &FieldStore, tcc: &MultiField) -> TransportResult<Vec<f64>> {
        let mesh = self.mesh.as_ref();
        let comm = self.comm.as_ref();
        let porosity = state.values(keys::POROSITY)?.component(0);
        let ws = state.values(keys::SATURATION_LIQUID)?.component(0);
        let num_aqueous = self.config.num_aqueous();

        Ok((0..tcc.num_vectors())
            .map(|i| {
                if i < num_aqueous {
                    solute_mass(mesh, comm, tcc.component(i), |c| porosity[c] * ws[c])
                } else {
                    solute_mass(mesh, comm, tcc.component(i), |c| porosity[c] * (1.0 - ws[c]))
                }
            })
            .collect())
    }

    /// 质量平衡：状态中的浓度与初始质量、源注入质量比较
    pub fn mass_balance(&self, state: &FieldStore) -> TransportResult<MassBalance> {
        let tcc = state.values(keys::TOTAL_COMPONENT_CONCENTRATION)?;
        let masses = self.component_masses(state, tcc)?;
        let components = self
            .config
            .component_names
            .iter()
            .enumerate()
            .map(|(i, name)| ComponentMass {
                name: name.clone(),
                mass: masses[i],
                initial_mass: self.initial_mass[i],
                source_mass: self.sources.exact_mass()[i],
            })
            .collect();
        Ok(MassBalance {
            time: self.t_physics,
            components,
        })
    }
}

/// 基质含水量 `φ_m ws_m` 在窗口内时刻 `t` 的值
///
/// 不插值时取窗口端点：`t > 0` 取当前饱和度，否则取上一时刻饱和度。
fn matrix_water_content(
    phi_m: &[f64],
    (ws_prev, ws): (&[f64], &[f64]),
    t: f64,
    dt_window: f64,
    interpolate: bool,
) -> Vec<f64> {
    let t = match (interpolate, t > 0.0) {
        (true, _) => t,
        (false, true) => dt_window,
        (false, false) => 0.0,
    };
    let mut sat = vec![0.0; ws.len()];
    interpolate_cell_vector(ws_prev, ws, t, dt_window, &mut sat);
    sat.iter().zip(phi_m).map(|(s, p)| s * p).collect()
}
