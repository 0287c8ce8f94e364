// crates/pt_transport/src/numerics/reconstruction.rs

//! 分片线性重构
//!
//! 1. 最小二乘梯度（owned 单元）
//! 2. 限制：单元限制因子取各面投影限制因子的最小值
//! 3. 同步 ghost 梯度
//! 4. 线性外推到面形心，并截断到该面两侧单元值（或边界值）的范围
//!
//! ```text
//! c_f = clamp(c_i + α_i ∇c_i · (x_f - x_i), [min, max] of face cells)
//! ```

use glam::DVec3;
use pt_foundation::Bounds;

use super::gradient::{BoundaryValues, LeastSquaresGradient};
use super::limiter::{create_limiter, LimiterContext, SlopeLimiter};
use crate::comm::Communicator;
use crate::config::LimiterKind;
use crate::mesh::{Ownership, TransportMesh};
use crate::state::{FieldLocation, MultiField};

/// 分片线性重构器
#[derive(Debug)]
pub struct LinearReconstruction {
    gradient: LeastSquaresGradient,
    limiter: Box<dyn SlopeLimiter>,
    /// 限制后的梯度，3 个分量 × ALL 单元
    gradients: MultiField,
    owned: Vec<DVec3>,
    contexts: Vec<LimiterContext>,
}

impl LinearReconstruction {
    /// 创建
    pub fn new(limiter: LimiterKind, num_cells_all: usize) -> Self {
        Self {
            gradient: LeastSquaresGradient::new(),
            limiter: create_limiter(limiter),
            gradients: MultiField::new(3, num_cells_all),
            owned: Vec::new(),
            contexts: Vec::new(),
        }
    }

    /// 限制器名称
    pub fn limiter_name(&self) -> &'static str {
        self.limiter.name()
    }

    /// 计算限制后的梯度并同步 ghost
    ///
    /// `field` 的 ghost 值必须已经同步。
    pub fn compute(
        &mut self,
        mesh: &dyn TransportMesh,
        comm: &dyn Communicator,
        field: &[f64],
        boundary: &BoundaryValues,
    ) {
        let n_owned = mesh.num_cells(Ownership::Owned);
        self.owned.clear();
        self.owned.resize(n_owned, DVec3::ZERO);
        self.gradient.compute(mesh, field, boundary, &mut self.owned);

        for c in 0..n_owned {
            let alpha = self.cell_limiter(mesh, field, boundary, c);
            self.owned[c] *= alpha;
        }

        self.gradients.fill(0.0);
        for (c, g) in self.owned.iter().enumerate() {
            self.gradients.set(0, c, g.x);
            self.gradients.set(1, c, g.y);
            self.gradients.set(2, c, g.z);
        }
        comm.scatter_to_ghosts(FieldLocation::Cell, &mut self.gradients);
    }

    fn cell_limiter(
        &mut self,
        mesh: &dyn TransportMesh,
        field: &[f64],
        boundary: &BoundaryValues,
        c: usize,
    ) -> f64 {
        let grad = self.owned[c];
        let xc = mesh.cell_centroid(c);

        let mut bounds = Bounds::point(field[c]);
        let mut max_distance: f64 = 0.0;
        for &f in mesh.cell_faces(c) {
            bounds.merge(face_bounds(mesh, field, boundary, f));
            max_distance = max_distance.max((mesh.face_centroid(f) - xc).length());
        }

        self.contexts.clear();
        for &f in mesh.cell_faces(c) {
            self.contexts.push(LimiterContext::new(
                field[c],
                grad.dot(mesh.face_centroid(f) - xc),
                bounds.min,
                bounds.max,
                max_distance,
            ));
        }
        self.limiter.cell_limiter(&self.contexts)
    }

    /// 单元 `c` 的限制后梯度
    #[inline]
    pub fn gradient(&self, c: usize) -> DVec3 {
        DVec3::new(
            self.gradients.get(0, c),
            self.gradients.get(1, c),
            self.gradients.get(2, c),
        )
    }

    /// 单元 `c` 在面 `f` 上的重构值，截断到 `bounds`
    pub fn face_value(
        &self,
        mesh: &dyn TransportMesh,
        field: &[f64],
        c: usize,
        f: usize,
        bounds: Bounds,
    ) -> f64 {
        let r = mesh.face_centroid(f) - mesh.cell_centroid(c);
        bounds.clamp(field[c] + self.gradient(c).dot(r))
    }
}

/// 面两侧单元值（边界面含边界值）的范围
pub fn face_bounds(
    mesh: &dyn TransportMesh,
    field: &[f64],
    boundary: &BoundaryValues,
    f: usize,
) -> Bounds {
    let mut bounds: Bounds = mesh.face_cells(f).iter().map(|&k| field[k]).collect();
    if let Some(&bv) = boundary.get(&f) {
        bounds.include(bv);
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SerialComm;
    use crate::mesh::UnstructuredMesh;

    #[test]
    fn test_linear_profile_is_reproduced() {
        let mesh = UnstructuredMesh::column_1d(6, 6.0, 1.0).unwrap();
        let field: Vec<f64> = (0..6).map(|c| c as f64).collect();
        let mut rec = LinearReconstruction::new(LimiterKind::BarthJespersen, 6);
        rec.compute(&mesh, &SerialComm, &field, &BoundaryValues::new());

        // 内部单元梯度不受限制
        assert!((rec.gradient(2).x - 1.0).abs() < 1e-6);
        // 单元 2 在面 3（x = 3）上的值
        let b = face_bounds(&mesh, &field, &BoundaryValues::new(), 3);
        assert!((rec.face_value(&mesh, &field, 2, 3, b) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_extremum_is_flattened() {
        let mesh = UnstructuredMesh::column_1d(5, 5.0, 1.0).unwrap();
        let field = vec![0.0, 0.0, 1.0, 0.0, 0.0];
        let mut rec = LinearReconstruction::new(LimiterKind::BarthJespersen, 5);
        rec.compute(&mesh, &SerialComm, &field, &BoundaryValues::new());
        assert!(rec.gradient(2).length() < 1e-12);
        assert_eq!(rec.limiter_name(), "BarthJespersen");
    }

    #[test]
    fn test_face_values_stay_within_face_bounds() {
        let mesh = UnstructuredMesh::column_1d(5, 5.0, 1.0).unwrap();
        let field = vec![0.0, 0.1, 0.9, 1.0, 1.0];
        let mut rec = LinearReconstruction::new(LimiterKind::Unlimited, 5);
        rec.compute(&mesh, &SerialComm, &field, &BoundaryValues::new());
        for f in 1..5 {
            let b = face_bounds(&mesh, &field, &BoundaryValues::new(), f);
            for &c in mesh.face_cells(f) {
                let v = rec.face_value(&mesh, &field, c, f, b);
                assert!(b.contains(v, 1e-14));
            }
        }
    }
}
