// crates/pt_transport/src/dispersion/mod.rs

//! 隐式弥散/扩散求解
//!
//! 每个外层时间区间调用一次，按组分求解
//! `acc_new V / dt c¹ − ∇·(D ∇c¹) = acc_old V / dt c⁰ + 源`。
//!
//! - 液相组分：`D = 机械弥散 + md τ_aq φ ws I`，累积项两侧均为 `φ ws`，
//!   边界为齐次 Neumann。扩散系数不变时沿用已装配的矩阵，只重建右端项。
//! - 气相组分：`D = md τ_gas φ (1 − ws) I`，累积项新值 `φ (1 − ws)`、旧值
//!   `φ (1 − ws_prev)`。完全饱和单元（`ws == 1`）新值取 1，这是已知的近似：
//!   没有源时这些单元的气相浓度被清零。边界由该组分的边界数据给出（Dirichlet）。

pub mod operator;
pub mod tensor;

use glam::DMat3;

use crate::boundary::BoundarySet;
use crate::config::{DispersionConfig, LinearSolverConfig, MolecularDiffusion, TransportConfig};
use crate::error::{ConfigError, TransportError, TransportResult};
use crate::mesh::{Ownership, TransportMesh};
use crate::numerics::linear_algebra::{DefaultSolverFactory, LinearSolver, LinearSolverFactory};
use crate::numerics::BoundaryValues;
use crate::sources::SourceSinkAccumulator;
use crate::state::{FaceFlux, MultiField};
use crate::upwind::TopologyKind;

pub use operator::DiffusionOperator;
pub use tensor::{cell_velocity, isotropic, mechanical_dispersion, MaterialMap};

/// 一次弥散求解所需的场（按单元索引，至少覆盖 owned 单元）
#[derive(Debug, Clone, Copy)]
pub struct DispersionInputs<'a> {
    /// 网格
    pub mesh: &'a dyn TransportMesh,
    /// 达西通量
    pub flux: &'a FaceFlux,
    /// 孔隙度
    pub porosity: &'a [f64],
    /// 区间起点饱和度
    pub ws_prev: &'a [f64],
    /// 区间终点饱和度
    pub ws: &'a [f64],
}

/// 求解统计
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DispersionStats {
    /// 残差之和
    pub residual: f64,
    /// 迭代次数之和
    pub iterations: usize,
    /// 求解的组分数
    pub num_solves: usize,
}

impl DispersionStats {
    /// 平均残差
    pub fn mean_residual(&self) -> f64 {
        if self.num_solves == 0 {
            0.0
        } else {
            self.residual / self.num_solves as f64
        }
    }

    /// 平均迭代次数
    pub fn mean_iterations(&self) -> usize {
        self.iterations.checked_div(self.num_solves).unwrap_or(0)
    }
}

/// 弥散/扩散求解器
#[derive(Debug)]
pub struct DispersionSolve {
    materials: MaterialMap,
    molecular: MolecularDiffusion,
    component_names: Vec<String>,
    num_aqueous: usize,
    solver_config: LinearSolverConfig,
    factory: Box<dyn LinearSolverFactory>,
    solver_name: String,
    tensors: Vec<DMat3>,
}

impl DispersionSolve {
    /// 创建求解器
    ///
    /// 非流形网格不支持弥散求解。
    pub fn new(
        config: &TransportConfig,
        dispersion: &DispersionConfig,
        mesh: &dyn TransportMesh,
    ) -> TransportResult<Self> {
        if mesh.topology_kind() == TopologyKind::NonManifold {
            return Err(ConfigError::invalid(
                "dispersion",
                TopologyKind::NonManifold.name(),
                "非流形网格不支持弥散求解",
            )
            .into());
        }
        let n = mesh.num_cells(Ownership::Owned);
        Ok(Self {
            materials: MaterialMap::new(dispersion, n),
            molecular: config.molecular_diffusion.clone(),
            component_names: config.component_names.clone(),
            num_aqueous: config.num_aqueous(),
            solver_config: config.dispersion_solver.clone(),
            factory: Box::new(DefaultSolverFactory),
            solver_name: config.dispersion_solver.name.clone(),
            tensors: vec![DMat3::ZERO; n],
        })
    }

    /// 替换线性求解器工厂
    pub fn with_factory(mut self, factory: Box<dyn LinearSolverFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// 最近一次使用的求解器名称
    pub fn solver_name(&self) -> &str {
        &self.solver_name
    }

    /// 求解全部组分，覆盖 `tcc` 的 owned 部分
    ///
    /// 气相源按 `[t_end − dt, t_end]` 上的速率计入，并提交到精确质量累计。
    pub fn solve(
        &mut self,
        inputs: DispersionInputs<'_>,
        tcc: &mut MultiField,
        sources: &mut SourceSinkAccumulator,
        boundaries: &BoundarySet,
        t_end: f64,
        dt: f64,
    ) -> TransportResult<DispersionStats> {
        let mesh = inputs.mesh;
        let n = mesh.num_cells(Ownership::Owned);
        let mut solver = self.factory.create(&self.solver_config.name, &self.solver_config)?;
        solver.set_make_one_iteration(true);
        self.solver_name = solver.name().to_string();

        let mut stats = DispersionStats::default();

        // 液相：机械弥散 + 分子扩散
        self.tensors.fill(DMat3::ZERO);
        if self.materials.has_mechanical_dispersion() {
            for c in 0..n {
                if let Some(material) = self.materials.material(c) {
                    let q = cell_velocity(mesh, inputs.flux, c);
                    self.tensors[c] = mechanical_dispersion(&material.model, q);
                }
            }
        }

        let liquid: Vec<f64> = (0..n).map(|c| inputs.porosity[c] * inputs.ws[c]).collect();
        let mut md_old = 0.0;
        let mut op: Option<DiffusionOperator> = None;
        for i in 0..self.num_aqueous {
            let md_new = self.molecular.value(&self.component_names[i]);
            let md_change = md_new - md_old;
            md_old = md_new;

            if md_change != 0.0 {
                for c in 0..n {
                    let tau = self.materials.material(c).map_or(0.0, |m| m.tau_aqueous);
                    self.tensors[c] += isotropic(md_change * tau * liquid[c]);
                }
                op = None;
            }

            let assembled = op.get_or_insert_with(|| {
                DiffusionOperator::assemble(mesh, &self.tensors, &BoundaryValues::new(), &liquid, dt)
            });
            let rhs = assembled.rhs(mesh, &liquid, tcc.component(i), dt);
            Self::solve_component(solver.as_mut(), assembled, &rhs, tcc, i, n, &mut stats)?;
        }

        // 气相：只有分子扩散
        self.tensors.fill(DMat3::ZERO);
        let gas_old: Vec<f64> = (0..n)
            .map(|c| inputs.porosity[c] * (1.0 - inputs.ws_prev[c]))
            .collect();
        let gas_new: Vec<f64> = (0..n)
            .map(|c| {
                // 完全饱和单元取 1 避免奇异行，是已知的近似处理
                if inputs.ws[c] == 1.0 {
                    1.0
                } else {
                    inputs.porosity[c] * (1.0 - inputs.ws[c])
                }
            })
            .collect();

        md_old = 0.0;
        for i in self.num_aqueous..tcc.num_vectors() {
            let md_new = self.molecular.value(&self.component_names[i]);
            let md_change = md_new - md_old;
            md_old = md_new;

            if md_change != 0.0 {
                for c in 0..n {
                    let tau = self.materials.material(c).map_or(0.0, |m| m.tau_gas);
                    let theta = inputs.porosity[c] * (1.0 - inputs.ws[c]);
                    self.tensors[c] += isotropic(md_change * tau * theta);
                }
            }

            let dirichlet = boundaries.values_for(i);
            let op = DiffusionOperator::assemble(mesh, &self.tensors, &dirichlet, &gas_new, dt);
            let mut rhs = op.rhs(mesh, &gas_old, tcc.component(i), dt);

            let mut added = MultiField::new(1, tcc.len());
            sources.apply(mesh, t_end, dt, &mut added, tcc, i..i + 1, 1.0)?;
            for (b, &m) in rhs.iter_mut().zip(added.component(0)) {
                *b += m / dt;
            }

            Self::solve_component(solver.as_mut(), &op, &rhs, tcc, i, n, &mut stats)?;
        }
        sources.commit(dt);

        Ok(stats)
    }

    fn solve_component(
        solver: &mut dyn LinearSolver,
        op: &DiffusionOperator,
        rhs: &[f64],
        tcc: &mut MultiField,
        component: usize,
        n: usize,
        stats: &mut DispersionStats,
    ) -> TransportResult<()> {
        let mut x = tcc.component(component)[..n].to_vec();
        let result = solver.apply_inverse(op.matrix(), rhs, &mut x);
        if result.code() < 0 {
            return Err(TransportError::linear_solver(solver.name(), result.code()));
        }

        stats.residual += solver.residual();
        stats.iterations += solver.num_iterations();
        stats.num_solves += 1;

        tcc.component_mut(component)[..n].copy_from_slice(&x);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::FunctionBoundary;
    use crate::config::{DispersionModel, MaterialProperties};
    use crate::mesh::UnstructuredMesh;
    use crate::numerics::linear_algebra::SolverErrorCategory;
    use crate::sources::{FunctionSource, SourceKind, SourceSpec};

    fn config(names: &[&str], num_aqueous: usize) -> TransportConfig {
        let mut config = TransportConfig::new(names.iter().map(|s| s.to_string()).collect())
            .with_num_aqueous(num_aqueous);
        config.molecular_diffusion.aqueous.insert("a".into(), 1e-3);
        config.molecular_diffusion.gaseous.insert("g".into(), 1e-2);
        config
    }

    fn material(model: DispersionModel) -> DispersionConfig {
        DispersionConfig {
            materials: vec![MaterialProperties {
                name: "soil".into(),
                model,
                tau_aqueous: 1.0,
                tau_gas: 1.0,
                cells: None,
            }],
        }
    }

    fn total(mesh: &dyn TransportMesh, c: &[f64], acc: f64) -> f64 {
        (0..c.len()).map(|i| mesh.cell_volume(i) * acc * c[i]).sum()
    }

    #[test]
    fn test_aqueous_conserves_mass_with_neumann() {
        let mesh = UnstructuredMesh::column_1d(11, 11.0, 1.0).unwrap();
        let cfg = config(&["a"], 1);
        let disp = material(DispersionModel::Bear {
            alpha_l: 0.5,
            alpha_t: 0.1,
        });
        let mut solve = DispersionSolve::new(&cfg, &disp, &mesh).unwrap();

        let flux = FaceFlux::uniform(vec![0.2; 12]);
        let phi = vec![0.4; 11];
        let ws = vec![0.5; 11];
        let mut tcc = MultiField::new(1, 11);
        tcc.set(0, 5, 1.0);
        let before = total(&mesh, tcc.component(0), 0.2);

        let inputs = DispersionInputs {
            mesh: &mesh,
            flux: &flux,
            porosity: &phi,
            ws_prev: &ws,
            ws: &ws,
        };
        let mut sources = SourceSinkAccumulator::new(1);
        let stats = solve
            .solve(inputs, &mut tcc, &mut sources, &BoundarySet::new(), 1.0, 1.0)
            .unwrap();

        let after = total(&mesh, tcc.component(0), 0.2);
        assert!((after - before).abs() < 1e-10);
        assert!(tcc.get(0, 5) < 1.0);
        assert!(tcc.get(0, 4) > 0.0 && tcc.get(0, 6) > 0.0);
        assert!((tcc.get(0, 4) - tcc.get(0, 6)).abs() < 1e-10);
        assert_eq!(stats.num_solves, 1);
        assert!(stats.iterations >= 1);
        assert_eq!(solve.solver_name(), "pcg");
    }

    #[test]
    fn test_gas_hack_in_saturated_cells() {
        let mesh = UnstructuredMesh::column_1d(4, 4.0, 1.0).unwrap();
        let cfg = config(&["a", "g"], 1);
        let mut disp = material(DispersionModel::None);
        disp.materials[0].tau_gas = 0.0;
        let mut solve = DispersionSolve::new(&cfg, &disp, &mesh).unwrap();

        let flux = FaceFlux::uniform(vec![0.0; 5]);
        let phi = vec![1.0; 4];
        let ws_prev = vec![1.0, 1.0, 0.5, 0.5];
        let ws = vec![1.0, 1.0, 0.5, 0.5];
        let mut tcc = MultiField::from_components(vec![vec![0.0; 4], vec![2.0; 4]]).unwrap();

        let inputs = DispersionInputs {
            mesh: &mesh,
            flux: &flux,
            porosity: &phi,
            ws_prev: &ws_prev,
            ws: &ws,
        };
        let mut sources = SourceSinkAccumulator::new(2);
        solve
            .solve(inputs, &mut tcc, &mut sources, &BoundarySet::new(), 1.0, 1.0)
            .unwrap();

        assert!(tcc.get(1, 0).abs() < 1e-10);
        assert!(tcc.get(1, 1).abs() < 1e-10);
        assert!((tcc.get(1, 2) - 2.0).abs() < 1e-10);
        assert!((tcc.get(1, 3) - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_gas_dirichlet_and_source() {
        let mesh = UnstructuredMesh::column_1d(4, 4.0, 1.0).unwrap();
        let cfg = config(&["a", "g"], 1);
        let disp = material(DispersionModel::None);
        let mut solve = DispersionSolve::new(&cfg, &disp, &mesh).unwrap();

        let flux = FaceFlux::uniform(vec![0.0; 5]);
        let phi = vec![1.0; 4];
        let ws = vec![0.5; 4];
        let mut tcc = MultiField::new(2, 4);

        let mut boundaries = BoundarySet::new();
        boundaries.add(FunctionBoundary::constant("left", vec![0], 1, 1.0));
        boundaries.compute(1.5).unwrap();
        let mut sources = SourceSinkAccumulator::new(2);
        sources.add(SourceSpec::new(
            1,
            SourceKind::Injector,
            FunctionSource::constant("well", vec![3], 0.1),
        ));

        let inputs = DispersionInputs {
            mesh: &mesh,
            flux: &flux,
            porosity: &phi,
            ws_prev: &ws,
            ws: &ws,
        };
        solve
            .solve(inputs, &mut tcc, &mut sources, &boundaries, 2.0, 1.0)
            .unwrap();

        assert!(tcc.get(1, 0) > tcc.get(1, 1));
        assert!(tcc.get(1, 3) > 0.0);
        assert!((sources.exact_mass()[1] - 0.1).abs() < 1e-12);
        assert!(tcc.component(0).iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_non_manifold_rejected() {
        let mesh = UnstructuredMesh::star_network(3, 2, 2.0).unwrap();
        let cfg = config(&["a"], 1);
        let err = DispersionSolve::new(&cfg, &material(DispersionModel::None), &mesh).unwrap_err();
        assert!(matches!(err, TransportError::Config(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_solver_failure_is_decoded() {
        let mesh = UnstructuredMesh::column_1d(20, 20.0, 1.0).unwrap();
        let mut cfg = config(&["a"], 1);
        cfg.dispersion_solver.max_iterations = 1;
        cfg.dispersion_solver.preconditioner = crate::config::PreconditionerKind::Identity;
        cfg.molecular_diffusion.aqueous.insert("a".into(), 100.0);
        let mut solve =
            DispersionSolve::new(&cfg, &material(DispersionModel::None), &mesh).unwrap();

        let flux = FaceFlux::uniform(vec![0.0; 21]);
        let ones = vec![1.0; 20];
        let mut tcc = MultiField::new(1, 20);
        tcc.set(0, 0, 1.0);
        let inputs = DispersionInputs {
            mesh: &mesh,
            flux: &flux,
            porosity: &ones,
            ws_prev: &ones,
            ws: &ones,
        };
        let mut sources = SourceSinkAccumulator::new(1);
        let err = solve
            .solve(inputs, &mut tcc, &mut sources, &BoundarySet::new(), 1.0, 1.0)
            .unwrap_err();
        match err {
            TransportError::LinearSolver { category, .. } => {
                assert_eq!(category, SolverErrorCategory::MaxIterations)
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
