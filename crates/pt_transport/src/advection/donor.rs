// crates/pt_transport/src/advection/donor.rs

//! 一阶施主迎风格式（流形网格）
//!
//! 每个面自由度把 `dt × |u| × c_upwind` 从迎风单元移到下游单元：
//!
//! | 迎风 | 下游 | 操作 |
//! |------|------|------|
//! | owned | owned | 迎风减，下游加 |
//! | owned | ghost/外部 | 迎风减 |
//! | ghost | owned | 下游加 |
//!
//! 跨分区的面由两侧进程各处理一次：迎风侧只减，下游侧只加。

use super::{add_boundary_inflow, copy_passive_components, AdvectionContext, AdvectionScheme};
use crate::error::TransportResult;
use crate::mesh::Ownership;
use crate::sources::SourceSinkAccumulator;
use crate::state::MultiField;

/// 施主迎风格式
#[derive(Debug, Clone, Copy, Default)]
pub struct DonorUpwind;

impl DonorUpwind {
    /// 创建
    pub fn new() -> Self {
        Self
    }
}

impl AdvectionScheme for DonorUpwind {
    fn name(&self) -> &'static str {
        "donor upwind"
    }

    fn advance(
        &mut self,
        ctx: &AdvectionContext<'_>,
        sources: &mut SourceSinkAccumulator,
        tcc_prev: &MultiField,
        tcc_next: &mut MultiField,
        dt: f64,
    ) -> TransportResult<()> {
        let n_owned = ctx.mesh.num_cells(Ownership::Owned);
        let num_advect = ctx.num_aqueous;
        sources.reset_rates();
        copy_passive_components(num_advect, tcc_prev, tcc_next);

        for c in 0..n_owned {
            let vol_phi_ws = ctx.water_volume(c, ctx.ws_start[c]);
            for i in 0..num_advect {
                tcc_next.set(i, c, tcc_prev.get(i, c) * vol_phi_ws);
            }
        }

        let owned = |c: Option<usize>| c.filter(|&c| c < n_owned);
        for (_, face) in ctx.upwind.iter() {
            for (up, down) in face.upwind.iter().zip(&face.downwind) {
                let Some(c1) = up.cell else {
                    continue;
                };
                let u = up.flux.abs();
                match (owned(Some(c1)), owned(down.cell)) {
                    (Some(c1), Some(c2)) => {
                        for i in 0..num_advect {
                            let tcc_flux = dt * u * tcc_prev.get(i, c1);
                            tcc_next.add(i, c1, -tcc_flux);
                            tcc_next.add(i, c2, tcc_flux);
                        }
                    }
                    (Some(c1), None) => {
                        for i in 0..num_advect {
                            tcc_next.add(i, c1, -dt * u * tcc_prev.get(i, c1));
                        }
                    }
                    (None, Some(c2)) => {
                        for i in 0..num_advect {
                            tcc_next.add(i, c2, dt * u * tcc_prev.get(i, c1));
                        }
                    }
                    (None, None) => {}
                }
            }
        }

        add_boundary_inflow(ctx, tcc_next, dt);

        if !sources.is_empty() {
            sources.apply(
                ctx.mesh,
                ctx.t_start + dt,
                dt,
                tcc_next,
                tcc_prev,
                0..num_advect,
                1.0,
            )?;
        }

        ctx.recover_concentration(tcc_next);
        sources.commit(dt);
        Ok(())
    }
}
