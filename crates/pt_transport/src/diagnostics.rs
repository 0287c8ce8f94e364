// crates/pt_transport/src/diagnostics.rs

//! 质量平衡与极值检查
//!
//! - [`MassBalance`]: 各组分当前质量、初始质量与源注入的精确质量
//! - [`solute_extrema`]: 各组分全局极值
//! - [`edp_bounds`] / [`check_tracer_bounds`]: 极值递减性质（全局区间）
//! - [`local_edp_bounds`] / [`check_local_bounds`]: 一阶格式的逐单元区间
//! - [`check_non_negative`]: 非负性
//! - [`InternalChecks`]: 按配置决定违反时警告还是报错

use std::ops::Range;

use pt_foundation::Bounds;

use crate::boundary::BoundarySet;
use crate::comm::Communicator;
use crate::config::InternalTests;
use crate::error::{TransportError, TransportResult};
use crate::mesh::{Ownership, TransportMesh};
use crate::state::MultiField;
use crate::upwind::UpwindTopology;

/// 组分 `i` 在 owned 单元上的总质量 `Σ V θ c`（全局求和）
///
/// `theta` 为液相 `φ ws` 或气相 `φ (1 − ws)`。
pub fn solute_mass(
    mesh: &dyn TransportMesh,
    comm: &dyn Communicator,
    concentration: &[f64],
    theta: impl Fn(usize) -> f64,
) -> f64 {
    let n = mesh.num_cells(Ownership::Owned);
    let local: f64 = (0..n)
        .map(|c| mesh.cell_volume(c) * theta(c) * concentration[c])
        .sum();
    comm.sum_all(local)
}

/// 单个组分的质量记录
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentMass {
    /// 组分名
    pub name: String,
    /// 当前质量
    pub mass: f64,
    /// 初始化时的质量
    pub initial_mass: f64,
    /// 源项累计注入的精确质量
    pub source_mass: f64,
}

impl ComponentMass {
    /// 平衡误差 `mass − initial − source`
    pub fn balance_error(&self) -> f64 {
        self.mass - self.initial_mass - self.source_mass
    }
}

/// 质量平衡快照
///
/// 开边界上的对流通量不计入，只有闭合边界时平衡误差才应为零。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MassBalance {
    /// 快照时刻
    pub time: f64,
    /// 各组分记录
    pub components: Vec<ComponentMass>,
}

impl MassBalance {
    /// 按名称查找
    pub fn component(&self, name: &str) -> Option<&ComponentMass> {
        self.components.iter().find(|c| c.name == name)
    }

    /// 所有组分的相对平衡误差都小于 `tol`
    pub fn within_tolerance(&self, tol: f64) -> bool {
        self.components.iter().all(|c| {
            let scale = c.initial_mass.abs().max(c.source_mass.abs()).max(1e-10);
            c.balance_error().abs() / scale < tol
        })
    }
}

/// 各组分在 owned 单元上的全局极值
pub fn solute_extrema(
    mesh: &dyn TransportMesh,
    comm: &dyn Communicator,
    tcc: &MultiField,
    components: Range<usize>,
) -> Vec<Bounds> {
    let n = mesh.num_cells(Ownership::Owned);
    components
        .map(|i| {
            let local = tcc.bounds(i, n);
            Bounds {
                min: comm.min_all(local.min),
                max: comm.max_all(local.max),
            }
        })
        .collect()
}

/// 极值递减性质的允许区间：上一状态在全部单元（含 ghost）上的极值并上边界值
pub fn edp_bounds(tcc_prev: &MultiField, boundaries: &BoundarySet, components: Range<usize>) -> Vec<Bounds> {
    components
        .map(|i| {
            let mut bounds = tcc_prev.bounds(i, tcc_prev.len());
            for (_, k, value) in boundaries.iter() {
                if k == i {
                    bounds.include(value);
                }
            }
            bounds
        })
        .collect()
}

/// 一阶格式的逐单元允许区间
///
/// 单元 `c` 的区间由上一状态中 `c` 自身、流入 `c` 的迎风单元以及流入 `c`
/// 的边界值组成。返回 `bounds[j][c]`，`j` 对应组分 `components.start + j`。
pub fn local_edp_bounds(
    mesh: &dyn TransportMesh,
    upwind: &UpwindTopology,
    tcc_prev: &MultiField,
    boundaries: &BoundarySet,
    components: Range<usize>,
) -> Vec<Vec<Bounds>> {
    let n_all = mesh.num_cells(Ownership::All);
    components
        .map(|i| {
            let mut bounds: Vec<Bounds> = (0..n_all).map(|c| Bounds::point(tcc_prev.get(i, c))).collect();
            let inflow = boundaries.values_for(i);

            for (f, face) in upwind.iter() {
                let mut incoming = Bounds::empty();
                for entry in &face.upwind {
                    match entry.cell {
                        Some(u) => incoming.include(tcc_prev.get(i, u)),
                        None => {
                            if let Some(&value) = inflow.get(&f) {
                                incoming.include(value);
                            }
                        }
                    }
                }
                if face.upwind.is_empty() {
                    if let Some(&value) = inflow.get(&f) {
                        incoming.include(value);
                    }
                }
                if incoming.is_empty() {
                    continue;
                }
                for entry in &face.downwind {
                    if let Some(c) = entry.cell {
                        bounds[c].merge(incoming);
                    }
                }
            }
            bounds
        })
        .collect()
}

/// 检查 owned 单元是否落在 `bounds` 内
///
/// `bounds[j]` 对应组分 `components.start + j`。返回第一个违反的位置。
pub fn check_tracer_bounds(
    mesh: &dyn TransportMesh,
    tcc: &MultiField,
    bounds: &[Bounds],
    components: Range<usize>,
    tolerance: f64,
) -> TransportResult<()> {
    check_bounds_with(mesh, tcc, components, tolerance, |j, _| bounds[j])
}

/// 逐单元版本的 [`check_tracer_bounds`]，区间来自 [`local_edp_bounds`]
pub fn check_local_bounds(
    mesh: &dyn TransportMesh,
    tcc: &MultiField,
    bounds: &[Vec<Bounds>],
    components: Range<usize>,
    tolerance: f64,
) -> TransportResult<()> {
    check_bounds_with(mesh, tcc, components, tolerance, |j, c| bounds[j][c])
}

fn check_bounds_with(
    mesh: &dyn TransportMesh,
    tcc: &MultiField,
    components: Range<usize>,
    tolerance: f64,
    bound: impl Fn(usize, usize) -> Bounds,
) -> TransportResult<()> {
    let n = mesh.num_cells(Ownership::Owned);
    for (j, i) in components.enumerate() {
        for c in 0..n {
            let value = tcc.get(i, c);
            let b = bound(j, c);
            if !b.contains(value, tolerance) {
                return Err(TransportError::ExtremaViolation {
                    component: i,
                    cell: c,
                    value,
                    lower: b.min,
                    upper: b.max,
                });
            }
        }
    }
    Ok(())
}

/// 检查 owned 单元浓度非负（容差 `tolerance`）
pub fn check_non_negative(mesh: &dyn TransportMesh, tcc: &MultiField, tolerance: f64) -> TransportResult<()> {
    let n = mesh.num_cells(Ownership::Owned);
    for i in 0..tcc.num_vectors() {
        for c in 0..n {
            let value = tcc.get(i, c);
            if value < -tolerance {
                return Err(TransportError::NegativeConcentration {
                    component: i,
                    cell: c,
                    value,
                });
            }
        }
    }
    Ok(())
}

/// 内部自检
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalChecks {
    config: InternalTests,
}

impl InternalChecks {
    /// 创建
    pub fn new(config: InternalTests) -> Self {
        Self { config }
    }

    /// 是否启用
    #[inline]
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// 容差
    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.config.tolerance
    }

    /// 非致命模式下把违反降级为警告
    pub fn enforce(&self, result: TransportResult<()>) -> TransportResult<()> {
        match result {
            Err(err) if !self.config.fatal => {
                log::warn!("内部检查未通过: {err}");
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::FunctionBoundary;
    use crate::comm::SerialComm;
    use crate::mesh::UnstructuredMesh;
    use crate::state::FaceFlux;

    fn mesh() -> UnstructuredMesh {
        UnstructuredMesh::column_1d(4, 4.0, 2.0).unwrap()
    }

    #[test]
    fn test_solute_mass() {
        let mesh = mesh();
        let c = [1.0, 0.0, 2.0, 0.5];
        let mass = solute_mass(&mesh, &SerialComm, &c, |_| 0.5);
        assert!((mass - 3.5).abs() < 1e-14);
    }

    #[test]
    fn test_balance_error() {
        let record = ComponentMass {
            name: "tracer".into(),
            mass: 3.0,
            initial_mass: 1.0,
            source_mass: 2.0,
        };
        assert_eq!(record.balance_error(), 0.0);
        let balance = MassBalance {
            time: 1.0,
            components: vec![record],
        };
        assert!(balance.within_tolerance(1e-12));
        assert!(balance.component("tracer").is_some());
        assert!(balance.component("other").is_none());
    }

    #[test]
    fn test_extrema() {
        let mesh = mesh();
        let tcc = MultiField::from_components(vec![vec![0.5, 2.0, -1.0, 0.0]]).unwrap();
        let ext = solute_extrema(&mesh, &SerialComm, &tcc, 0..1);
        assert_eq!(ext[0].min, -1.0);
        assert_eq!(ext[0].max, 2.0);
    }

    #[test]
    fn test_edp_bounds_include_boundary_values() {
        let mesh = mesh();
        let prev = MultiField::from_components(vec![vec![0.2, 0.4, 0.4, 0.3]]).unwrap();
        let mut boundaries = BoundarySet::new();
        boundaries.add(FunctionBoundary::constant("inlet", vec![0], 0, 1.0));
        boundaries.compute(0.0).unwrap();

        let bounds = edp_bounds(&prev, &boundaries, 0..1);
        assert_eq!(bounds[0], Bounds { min: 0.2, max: 1.0 });

        let ok = MultiField::from_components(vec![vec![1.0, 0.3, 0.2, 0.25]]).unwrap();
        assert!(check_tracer_bounds(&mesh, &ok, &bounds, 0..1, 1e-12).is_ok());

        let bad = MultiField::from_components(vec![vec![1.0, 0.1, 0.2, 0.25]]).unwrap();
        match check_tracer_bounds(&mesh, &bad, &bounds, 0..1, 1e-12) {
            Err(TransportError::ExtremaViolation { cell, .. }) => assert_eq!(cell, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_local_bounds_follow_upwind_neighbours() {
        let mesh = mesh();
        let flux = FaceFlux::uniform(vec![1.0; 5]);
        let upwind = UpwindTopology::rebuild(&mesh, &flux).unwrap();
        let prev = MultiField::from_components(vec![vec![0.2, 0.8, 0.4, 0.3]]).unwrap();
        let mut boundaries = BoundarySet::new();
        boundaries.add(FunctionBoundary::constant("inlet", vec![0], 0, 1.0));
        boundaries.compute(0.0).unwrap();

        let bounds = local_edp_bounds(&mesh, &upwind, &prev, &boundaries, 0..1);
        assert_eq!(bounds[0][0], Bounds { min: 0.2, max: 1.0 });
        assert_eq!(bounds[0][1], Bounds { min: 0.2, max: 0.8 });
        assert_eq!(bounds[0][2], Bounds { min: 0.4, max: 0.8 });
        assert_eq!(bounds[0][3], Bounds { min: 0.3, max: 0.4 });

        let ok = MultiField::from_components(vec![vec![1.0, 0.5, 0.6, 0.35]]).unwrap();
        assert!(check_local_bounds(&mesh, &ok, &bounds, 0..1, 1e-12).is_ok());

        // 全局区间 [0.2, 1.0] 放过的局部过冲
        let overshoot = MultiField::from_components(vec![vec![1.0, 0.5, 0.6, 0.5]]).unwrap();
        let global = edp_bounds(&prev, &boundaries, 0..1);
        assert!(check_tracer_bounds(&mesh, &overshoot, &global, 0..1, 1e-12).is_ok());
        match check_local_bounds(&mesh, &overshoot, &bounds, 0..1, 1e-12) {
            Err(TransportError::ExtremaViolation { cell, upper, .. }) => {
                assert_eq!(cell, 3);
                assert_eq!(upper, 0.4);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_non_negative_and_enforce() {
        let mesh = mesh();
        let tcc = MultiField::from_components(vec![vec![0.0, -1e-12, 0.0, 0.0], vec![0.0, 0.0, -0.1, 0.0]])
            .unwrap();
        let result = check_non_negative(&mesh, &tcc, 1e-10);
        assert!(matches!(
            result,
            Err(TransportError::NegativeConcentration { component: 1, cell: 2, .. })
        ));

        let warn = InternalChecks::new(InternalTests {
            enabled: true,
            fatal: false,
            tolerance: 1e-10,
        });
        assert!(warn.enforce(check_non_negative(&mesh, &tcc, 1e-10)).is_ok());

        let fatal = InternalChecks::new(InternalTests {
            enabled: true,
            fatal: true,
            tolerance: 1e-10,
        });
        assert!(fatal.enforce(check_non_negative(&mesh, &tcc, 1e-10)).is_err());
    }
}
