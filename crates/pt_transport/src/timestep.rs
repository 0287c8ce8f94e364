// crates/pt_transport/src/timestep.rs

//! CFL 稳定时间步估计
//!
//! 对每个单元累加其作为迎风单元的外流量（再加上抽取源 `V × |rate|`），
//! owned 单元取 `dt_cell = V × φ × min(ws_prev, ws) / outflux`，
//! 全局取最小后：二阶空间格式减半，截断到调试上限，乘以 CFL 系数。
//! 处处无外流时返回哨兵值 [`LARGE_TIME_STEP`]（乘 CFL），不是错误。

use crate::comm::Communicator;
use crate::config::TransportConfig;
use crate::mesh::{Ownership, TransportMesh};
use crate::upwind::UpwindTopology;

/// 表示"无限制"的时间步
pub const LARGE_TIME_STEP: f64 = 1e99;

/// 单元含水量相关场
#[derive(Debug, Clone, Copy)]
pub struct WaterContent<'a> {
    /// 孔隙度
    pub porosity: &'a [f64],
    /// 窗口起点饱和度
    pub ws_prev: &'a [f64],
    /// 窗口终点饱和度
    pub ws: &'a [f64],
}

/// 稳定时间步估计结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StableStep {
    /// 最终时间步（已缩放）
    pub dt: f64,
    /// 本进程内达到最小值的单元（全局最小在本进程时）
    pub limiting_cell: Option<usize>,
}

/// 稳定时间步估计器
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StableTimeStepEstimator {
    cfl: f64,
    dt_debug: f64,
    spatial_order: u32,
}

impl StableTimeStepEstimator {
    /// 创建估计器
    pub fn new(cfl: f64, dt_debug: f64, spatial_order: u32) -> Self {
        Self {
            cfl,
            dt_debug,
            spatial_order,
        }
    }

    /// 从配置创建
    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(
            config.cfl,
            config.maximum_time_step,
            config.spatial_discretization_order,
        )
    }

    /// 计算稳定时间步
    ///
    /// `extra_outflux` 为按单元（ALL）的附加外流量，通常来自抽取源；可为空切片。
    pub fn compute(
        &self,
        mesh: &dyn TransportMesh,
        comm: &dyn Communicator,
        upwind: &UpwindTopology,
        water: WaterContent<'_>,
        extra_outflux: &[f64],
    ) -> StableStep {
        let n_all = mesh.num_cells(Ownership::All);
        let mut outflux = upwind.cell_outflux(n_all);
        for (total, extra) in outflux.iter_mut().zip(extra_outflux) {
            *total += extra;
        }

        let mut dt_local = LARGE_TIME_STEP;
        let mut cell_local = None;
        for (c, &out) in outflux
            .iter()
            .enumerate()
            .take(mesh.num_cells(Ownership::Owned))
        {
            if out > 0.0 {
                let ws_min = water.ws_prev[c].min(water.ws[c]);
                let dt_cell = mesh.cell_volume(c) * water.porosity[c] * ws_min / out;
                if dt_cell < dt_local {
                    dt_local = dt_cell;
                    cell_local = Some(c);
                }
            }
        }

        let mut dt = comm.min_all(dt_local);
        let limiting_cell = cell_local.filter(|_| dt_local <= dt);

        if self.spatial_order == 2 && dt < LARGE_TIME_STEP {
            dt /= 2.0;
        }
        dt = dt.min(self.dt_debug);

        StableStep {
            dt: dt * self.cfl,
            limiting_cell,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SerialComm;
    use crate::mesh::UnstructuredMesh;
    use crate::state::FaceFlux;

    fn estimate(mesh: &UnstructuredMesh, flux: f64, est: StableTimeStepEstimator) -> StableStep {
        let n = mesh.num_cells(Ownership::All);
        let nf = mesh.num_faces(Ownership::All);
        let upwind = UpwindTopology::rebuild(mesh, &FaceFlux::uniform(vec![flux; nf])).unwrap();
        let ones = vec![1.0; n];
        let water = WaterContent {
            porosity: &ones,
            ws_prev: &ones,
            ws: &ones,
        };
        est.compute(mesh, &SerialComm, &upwind, water, &[])
    }

    #[test]
    fn test_unit_column() {
        let mesh = UnstructuredMesh::column_1d(10, 10.0, 1.0).unwrap();
        let step = estimate(&mesh, 1.0, StableTimeStepEstimator::new(1.0, LARGE_TIME_STEP, 1));
        assert!((step.dt - 1.0).abs() < 1e-14);
        assert_eq!(step.limiting_cell, Some(0));
    }

    #[test]
    fn test_zero_flux_gives_sentinel() {
        let mesh = UnstructuredMesh::column_1d(4, 4.0, 1.0).unwrap();
        let step = estimate(&mesh, 0.0, StableTimeStepEstimator::new(0.5, LARGE_TIME_STEP, 2));
        assert_eq!(step.dt, LARGE_TIME_STEP * 0.5);
        assert_eq!(step.limiting_cell, None);
    }

    #[test]
    fn test_second_order_halves_and_cfl_scales() {
        let mesh = UnstructuredMesh::column_1d(4, 4.0, 1.0).unwrap();
        let step = estimate(&mesh, 1.0, StableTimeStepEstimator::new(0.8, LARGE_TIME_STEP, 2));
        assert!((step.dt - 0.4).abs() < 1e-14);
    }

    #[test]
    fn test_debug_ceiling() {
        let mesh = UnstructuredMesh::column_1d(4, 4.0, 1.0).unwrap();
        let step = estimate(&mesh, 1.0, StableTimeStepEstimator::new(1.0, 0.25, 1));
        assert!((step.dt - 0.25).abs() < 1e-14);
    }

    #[test]
    fn test_monotone_in_flux_and_volume() {
        let est = StableTimeStepEstimator::new(1.0, LARGE_TIME_STEP, 1);
        let mut mesh = UnstructuredMesh::column_1d(5, 5.0, 1.0).unwrap();
        let base = estimate(&mesh, 0.7, est).dt;
        let doubled = estimate(&mesh, 1.4, est).dt;
        assert!(doubled <= base);

        mesh.scale_volumes(0.5);
        let halved = estimate(&mesh, 0.7, est).dt;
        assert!(halved <= base);
    }

    #[test]
    fn test_extra_outflux_limits_step() {
        let mesh = UnstructuredMesh::column_1d(3, 3.0, 1.0).unwrap();
        let nf = mesh.num_faces(Ownership::All);
        let upwind = UpwindTopology::rebuild(&mesh, &FaceFlux::uniform(vec![1.0; nf])).unwrap();
        let ones = vec![1.0; 3];
        let water = WaterContent {
            porosity: &ones,
            ws_prev: &ones,
            ws: &ones,
        };
        let est = StableTimeStepEstimator::new(1.0, LARGE_TIME_STEP, 1);
        let step = est.compute(&mesh, &SerialComm, &upwind, water, &[0.0, 3.0, 0.0]);
        assert!((step.dt - 0.25).abs() < 1e-14);
        assert_eq!(step.limiting_cell, Some(1));
    }
}
