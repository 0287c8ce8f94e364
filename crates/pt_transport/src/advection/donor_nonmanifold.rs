// crates/pt_transport/src/advection/donor_nonmanifold.rs

//! 一阶施主迎风格式（非流形网格）
//!
//! 裂隙交汇面上可能有多个迎风和多个下游单元。每个迎风条目的外流量
//! `dt × |u_up| × c_up` 从其单元（owned 时）移除，再按
//! `|u_down| / Σ|u_down|` 分配给各 owned 下游单元。`Σ|u_down|` 下限为 1e-12。

use super::{add_boundary_inflow, copy_passive_components, AdvectionContext, AdvectionScheme};
use crate::error::TransportResult;
use crate::mesh::Ownership;
use crate::sources::SourceSinkAccumulator;
use crate::state::MultiField;

const MIN_DOWNWIND_FLUX: f64 = 1e-12;

/// 非流形施主迎风格式
#[derive(Debug, Clone, Copy, Default)]
pub struct DonorUpwindNonManifold;

impl DonorUpwindNonManifold {
    /// 创建
    pub fn new() -> Self {
        Self
    }
}

impl AdvectionScheme for DonorUpwindNonManifold {
    fn name(&self) -> &'static str {
        "donor upwind (non-manifold)"
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

        for (_, face) in ctx.upwind.iter() {
            let total_down: f64 = face
                .downwind
                .iter()
                .map(|e| e.flux.abs())
                .sum::<f64>()
                .max(MIN_DOWNWIND_FLUX);

            for up in &face.upwind {
                let Some(c1) = up.cell else {
                    continue;
                };
                let u1 = up.flux.abs();
                for i in 0..num_advect {
                    let tcc_flux = dt * u1 * tcc_prev.get(i, c1);
                    if c1 < n_owned {
                        tcc_next.add(i, c1, -tcc_flux);
                    }
                    for down in &face.downwind {
                        if let Some(c2) = down.cell.filter(|&c| c < n_owned) {
                            tcc_next.add(i, c2, tcc_flux * down.flux.abs() / total_down);
                        }
                    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{BoundarySet, FunctionBoundary};
    use crate::comm::SerialComm;
    use crate::mesh::{face_dof_map, TransportMesh, UnstructuredMesh};
    use crate::state::FaceFlux;
    use crate::upwind::UpwindTopology;

    /// 分支 0 流入交点，分支 1、2 各流出一半
    fn star_flux(mesh: &UnstructuredMesh) -> FaceFlux {
        let values = vec![
            2.0, -1.0, -1.0, // 交点：单元 0, 2, 4
            -2.0, 2.0, // 单元 0, 1
            -2.0, // 单元 1（入口）
            1.0, -1.0, // 单元 2, 3
            1.0, // 单元 3（出口）
            1.0, -1.0, // 单元 4, 5
            1.0, // 单元 5（出口）
        ];
        FaceFlux::new(face_dof_map(mesh), values).unwrap()
    }

    fn run(mesh: &UnstructuredMesh, boundaries: &BoundarySet, prev: &MultiField, dt: f64) -> MultiField {
        let n = mesh.num_cells(Ownership::All);
        let upwind = UpwindTopology::rebuild(mesh, &star_flux(mesh)).unwrap();
        let ones = vec![1.0; n];
        let ctx = AdvectionContext {
            mesh,
            comm: &SerialComm,
            upwind: &upwind,
            porosity: &ones,
            ws_start: &ones,
            ws_end: &ones,
            boundaries,
            num_aqueous: 1,
            t_start: 0.0,
        };
        let mut next = MultiField::new(1, n);
        let mut sources = SourceSinkAccumulator::new(1);
        DonorUpwindNonManifold::new()
            .advance(&ctx, &mut sources, prev, &mut next, dt)
            .unwrap();
        next
    }

    #[test]
    fn test_junction_splits_pro_rata() {
        let mesh = UnstructuredMesh::star_network(3, 2, 2.0).unwrap();
        let mut prev = MultiField::new(1, 6);
        prev.set(0, 0, 1.0);

        let next = run(&mesh, &BoundarySet::new(), &prev, 0.25);
        assert!((next.get(0, 0) - 0.5).abs() < 1e-14);
        assert!((next.get(0, 2) - 0.25).abs() < 1e-14);
        assert!((next.get(0, 4) - 0.25).abs() < 1e-14);
        let total: f64 = next.component(0).iter().sum();
        assert!((total - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_inlet_boundary() {
        let mesh = UnstructuredMesh::star_network(3, 2, 2.0).unwrap();
        let mut boundaries = BoundarySet::new();
        boundaries.add(FunctionBoundary::constant("inlet", vec![2], 0, 1.0));
        boundaries.compute(0.0).unwrap();

        let prev = MultiField::new(1, 6);
        let next = run(&mesh, &boundaries, &prev, 0.25);
        assert!((next.get(0, 1) - 0.5).abs() < 1e-14);
        assert_eq!(next.get(0, 0), 0.0);
    }
}
