// crates/pt_transport/src/advection/second_order.rs

//! 二阶迎风格式
//!
//! 每个液相组分单独推进（组分索引显式传给泛函）：
//!
//! 1. 分片线性重构（最小二乘梯度 + 限制器），面值截断到面两侧单元的范围
//! 2. 泛函 `L(c)` 返回 owned 单元的守恒量变化率（含入流边界和源项）
//! 3. 显式 Runge-Kutta 在守恒量 `m = V φ ws c` 上积分，
//!    各级浓度按 `ws_start`、`ws_end` 之间线性插值的含水量换算
//!
//! 各级浓度与梯度在读取前同步 ghost。

use pt_foundation::safe_div;

use super::runge_kutta::ButcherTableau;
use super::{copy_passive_components, AdvectionContext, AdvectionScheme};
use crate::config::LimiterKind;
use crate::error::TransportResult;
use crate::mesh::Ownership;
use crate::numerics::gradient::BoundaryValues;
use crate::numerics::reconstruction::{face_bounds, LinearReconstruction};
use crate::sources::SourceSinkAccumulator;
use crate::state::{FieldLocation, MultiField};

/// 二阶迎风格式
#[derive(Debug)]
pub struct SecondOrderUpwind {
    tableau: ButcherTableau,
    reconstruction: LinearReconstruction,
    /// 当前级浓度（1 个分量 × ALL 单元）
    stage: MultiField,
    /// 各级变化率（每级 1 个分量 × ALL 单元）
    rates: Vec<MultiField>,
    mass0: Vec<f64>,
}

impl SecondOrderUpwind {
    /// 创建
    pub fn new(tableau: ButcherTableau, limiter: LimiterKind, num_cells_all: usize) -> Self {
        let rates = (0..tableau.stages())
            .map(|_| MultiField::new(1, num_cells_all))
            .collect();
        Self {
            tableau,
            reconstruction: LinearReconstruction::new(limiter, num_cells_all),
            stage: MultiField::new(1, num_cells_all),
            rates,
            mass0: Vec::new(),
        }
    }

    /// Runge-Kutta 表
    pub fn tableau(&self) -> &ButcherTableau {
        &self.tableau
    }

    /// 组分 `component` 在浓度 `self.stage` 下的守恒量变化率
    #[allow(clippy::too_many_arguments)]
    fn functional(
        reconstruction: &mut LinearReconstruction,
        ctx: &AdvectionContext<'_>,
        sources: &mut SourceSinkAccumulator,
        boundary: &BoundaryValues,
        component: usize,
        time: f64,
        weight: f64,
        stage: &MultiField,
        rate: &mut MultiField,
    ) -> TransportResult<()> {
        let mesh = ctx.mesh;
        let n_owned = mesh.num_cells(Ownership::Owned);
        let field = stage.component(0);
        reconstruction.compute(mesh, ctx.comm, field, boundary);

        rate.fill(0.0);
        let out = rate.component_mut(0);
        for (f, face) in ctx.upwind.iter() {
            let bounds = face_bounds(mesh, field, boundary, f);
            for (up, down) in face.upwind.iter().zip(&face.downwind) {
                let u = up.flux.abs();
                let value = match up.cell {
                    Some(c1) => reconstruction.face_value(mesh, field, c1, f, bounds),
                    None => match boundary.get(&f) {
                        Some(&bv) => bv,
                        None => continue,
                    },
                };
                let flux = u * value;
                if let Some(c1) = up.cell.filter(|&c| c < n_owned) {
                    out[c1] -= flux;
                }
                if let Some(c2) = down.cell.filter(|&c| c < n_owned) {
                    out[c2] += flux;
                }
            }
        }

        if !sources.is_empty() {
            sources.apply(
                mesh,
                time,
                1.0,
                rate,
                stage,
                component..component + 1,
                weight,
            )?;
        }
        Ok(())
    }
}

impl AdvectionScheme for SecondOrderUpwind {
    fn name(&self) -> &'static str {
        "second-order upwind"
    }

    fn advance(
        &mut self,
        ctx: &AdvectionContext<'_>,
        sources: &mut SourceSinkAccumulator,
        tcc_prev: &MultiField,
        tcc_next: &mut MultiField,
        dt: f64,
    ) -> TransportResult<()> {
        let mesh = ctx.mesh;
        let n_owned = mesh.num_cells(Ownership::Owned);
        sources.reset_rates();
        copy_passive_components(ctx.num_aqueous, tcc_prev, tcc_next);

        for i in 0..ctx.num_aqueous {
            let boundary = ctx.boundaries.values_for(i);

            self.mass0.clear();
            self.mass0.extend(
                (0..n_owned).map(|c| tcc_prev.get(i, c) * ctx.water_volume(c, ctx.ws_start[c])),
            );

            for s in 0..self.tableau.stages() {
                let c_s = self.tableau.c(s);
                if s == 0 {
                    self.stage.component_mut(0).copy_from_slice(tcc_prev.component(i));
                } else {
                    let a = self.tableau.a(s);
                    for c in 0..n_owned {
                        let increment: f64 = a
                            .iter()
                            .zip(&self.rates)
                            .map(|(a_sj, k_j)| a_sj * k_j.get(0, c))
                            .sum();
                        let mass = self.mass0[c] + dt * increment;
                        let ws = ctx.ws_start[c] + c_s * (ctx.ws_end[c] - ctx.ws_start[c]);
                        let vol = ctx.water_volume(c, ws);
                        self.stage.set(0, c, safe_div(mass, vol, 0.0));
                    }
                    ctx.comm.scatter_to_ghosts(FieldLocation::Cell, &mut self.stage);
                }

                Self::functional(
                    &mut self.reconstruction,
                    ctx,
                    sources,
                    &boundary,
                    i,
                    ctx.t_start + c_s * dt,
                    self.tableau.b(s),
                    &self.stage,
                    &mut self.rates[s],
                )?;
            }

            for c in 0..n_owned {
                let increment: f64 = (0..self.tableau.stages())
                    .map(|s| self.tableau.b(s) * self.rates[s].get(0, c))
                    .sum();
                tcc_next.set(i, c, self.mass0[c] + dt * increment);
            }
        }

        ctx.recover_concentration(tcc_next);
        sources.commit(dt);
        Ok(())
    }
}
