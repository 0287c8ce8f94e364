// crates/pt_transport/src/advection/mod.rs

//! 对流格式
//!
//! 显式守恒有限体积格式，在守恒量 `m = c × V × φ × ws` 上推进：
//!
//! - [`DonorUpwind`]: 一阶施主迎风（流形网格）
//! - [`DonorUpwindNonManifold`]: 一阶施主迎风，下游按通量比例分配（非流形网格）
//! - [`SecondOrderUpwind`]: 分片线性重构 + 显式 Runge-Kutta（流形网格，时间 1~4 阶）
//!
//! 格式在初始化时由 `(空间阶, 时间阶, 拓扑类别)` 选定，
//! 未实现的组合是配置错误。
//!
//! 只推进液相组分（`0..num_aqueous`），气相组分原样复制。

mod donor;
mod donor_nonmanifold;
mod runge_kutta;
mod second_order;

use std::fmt::Debug;

pub use donor::DonorUpwind;
pub use donor_nonmanifold::DonorUpwindNonManifold;
pub use runge_kutta::ButcherTableau;
pub use second_order::SecondOrderUpwind;

use pt_foundation::safe_div;

use crate::boundary::BoundarySet;
use crate::comm::Communicator;
use crate::config::TransportConfig;
use crate::error::{ConfigError, TransportResult};
use crate::mesh::{Ownership, TransportMesh};
use crate::sources::SourceSinkAccumulator;
use crate::state::MultiField;
use crate::upwind::{TopologyKind, UpwindTopology};

/// 一个子步内对流格式所需的只读数据
#[derive(Debug, Clone, Copy)]
pub struct AdvectionContext<'a> {
    /// 网格
    pub mesh: &'a dyn TransportMesh,
    /// 通信器
    pub comm: &'a dyn Communicator,
    /// 迎风拓扑
    pub upwind: &'a UpwindTopology,
    /// 孔隙度（ALL 单元）
    pub porosity: &'a [f64],
    /// 子步起点饱和度
    pub ws_start: &'a [f64],
    /// 子步终点饱和度
    pub ws_end: &'a [f64],
    /// 边界数据（已在子步中点计算）
    pub boundaries: &'a BoundarySet,
    /// 液相组分个数
    pub num_aqueous: usize,
    /// 子步起点时刻
    pub t_start: f64,
}

impl AdvectionContext<'_> {
    /// 单元 `c` 在饱和度 `ws` 下的 `V × φ × ws`
    #[inline]
    pub fn water_volume(&self, c: usize, ws: f64) -> f64 {
        self.mesh.cell_volume(c) * self.porosity[c] * ws
    }

    /// 把守恒量换算回浓度（owned 单元，按 `ws_end`）
    pub(crate) fn recover_concentration(&self, tcc_next: &mut MultiField) {
        let n_owned = self.mesh.num_cells(Ownership::Owned);
        for c in 0..n_owned {
            let vol_phi_ws = self.water_volume(c, self.ws_end[c]);
            for i in 0..self.num_aqueous {
                let mass = tcc_next.get(i, c);
                tcc_next.set(i, c, safe_div(mass, vol_phi_ws, 0.0));
            }
        }
    }
}

/// 对流格式
pub trait AdvectionScheme: Debug + Send {
    /// 名称
    fn name(&self) -> &'static str;

    /// 推进一个子步
    ///
    /// `tcc_prev` 的 ghost 值必须已经同步；结果写入 `tcc_next` 的 owned 单元。
    /// 源项的诊断速率在内部清零并按 `dt` 提交。
    fn advance(
        &mut self,
        ctx: &AdvectionContext<'_>,
        sources: &mut SourceSinkAccumulator,
        tcc_prev: &MultiField,
        tcc_next: &mut MultiField,
        dt: f64,
    ) -> TransportResult<()>;
}

/// 按配置与拓扑创建格式
pub fn create_scheme(
    config: &TransportConfig,
    kind: TopologyKind,
    num_cells_all: usize,
) -> Result<Box<dyn AdvectionScheme>, ConfigError> {
    let spatial = config.spatial_discretization_order;
    let temporal = config.temporal_discretization_order;
    match (spatial, temporal, kind) {
        (1, 1, TopologyKind::Manifold) => Ok(Box::new(DonorUpwind::new())),
        (1, 1, TopologyKind::NonManifold) => Ok(Box::new(DonorUpwindNonManifold::new())),
        (2, 1..=4, TopologyKind::Manifold) => {
            let tableau = ButcherTableau::for_order(temporal).ok_or(ConfigError::UnsupportedScheme {
                spatial,
                temporal,
                topology: kind.name(),
            })?;
            Ok(Box::new(SecondOrderUpwind::new(
                tableau,
                config.limiter,
                num_cells_all,
            )))
        }
        _ => Err(ConfigError::UnsupportedScheme {
            spatial,
            temporal,
            topology: kind.name(),
        }),
    }
}

/// 把气相组分从 `tcc_prev` 复制到 `tcc_next`
pub(crate) fn copy_passive_components(
    num_aqueous: usize,
    tcc_prev: &MultiField,
    tcc_next: &mut MultiField,
) {
    for i in num_aqueous..tcc_prev.num_vectors() {
        tcc_next.component_mut(i).copy_from_slice(tcc_prev.component(i));
    }
}

/// 按入流边界把 `dt × |u| × value` 加到 owned 下游单元
pub(crate) fn add_boundary_inflow(ctx: &AdvectionContext<'_>, tcc_next: &mut MultiField, dt: f64) {
    let n_owned = ctx.mesh.num_cells(Ownership::Owned);
    for (f, k, value) in ctx.boundaries.iter() {
        if k >= ctx.num_aqueous {
            continue;
        }
        let face = ctx.upwind.face(f);
        match ctx.upwind.kind() {
            TopologyKind::Manifold => {
                for (up, down) in face.upwind.iter().zip(&face.downwind) {
                    if up.cell.is_some() {
                        continue;
                    }
                    if let Some(c2) = down.cell.filter(|&c| c < n_owned) {
                        tcc_next.add(k, c2, dt * up.flux.abs() * value);
                    }
                }
            }
            TopologyKind::NonManifold => {
                if !face.upwind.is_empty() {
                    continue;
                }
                for entry in &face.downwind {
                    if let Some(c2) = entry.cell.filter(|&c| c < n_owned) {
                        tcc_next.add(k, c2, dt * entry.flux.abs() * value);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_selection() {
        let config = TransportConfig::new(vec!["a".into()]);
        let scheme = create_scheme(&config, TopologyKind::Manifold, 4).unwrap();
        assert_eq!(scheme.name(), "donor upwind");

        let scheme = create_scheme(&config, TopologyKind::NonManifold, 4).unwrap();
        assert_eq!(scheme.name(), "donor upwind (non-manifold)");

        let config = config.with_orders(2, 3);
        let scheme = create_scheme(&config, TopologyKind::Manifold, 4).unwrap();
        assert_eq!(scheme.name(), "second-order upwind");
    }

    #[test]
    fn test_unsupported_combinations() {
        let base = TransportConfig::new(vec!["a".into()]);

        let err = create_scheme(&base.clone().with_orders(1, 2), TopologyKind::Manifold, 4).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme { spatial: 1, temporal: 2, .. }));

        let err = create_scheme(&base.clone().with_orders(2, 1), TopologyKind::NonManifold, 4).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnsupportedScheme { topology: "non-manifold", .. }
        ));

        assert!(create_scheme(&base.with_orders(2, 5), TopologyKind::Manifold, 4).is_err());
    }
}
