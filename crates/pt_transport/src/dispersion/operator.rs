// crates/pt_transport/src/dispersion/operator.rs

//! 两点通量近似（TPFA）扩散算子
//!
//! 单侧传导率 `t_c = |A| (n̂ᵀ D_c n̂) / |d_c · n̂|`，`d_c` 为单元形心到面形心的向量；
//! 内部面取两侧调和平均。只装配 owned 单元之间的耦合，
//! 指向 ghost 单元的面不参与装配。
//!
//! 外边界：未给值的面为齐次 Neumann；给值的面为 Dirichlet，
//! 单侧传导率进入对角，`t_c × value` 进入右端项。

use glam::DMat3;

use crate::mesh::{Ownership, TransportMesh};
use crate::numerics::linear_algebra::{CsrBuilder, CsrMatrix};
use crate::numerics::BoundaryValues;

const MIN_DISTANCE: f64 = 1e-14;

/// 单元 `c` 到面 `f` 的单侧传导率
pub fn half_transmissibility(mesh: &dyn TransportMesh, tensor: &DMat3, c: usize, f: usize) -> f64 {
    let normal = mesh.face_normal(f).normalize_or_zero();
    let d = mesh.face_centroid(f) - mesh.cell_centroid(c);
    let dist = d.dot(normal).abs();
    if dist < MIN_DISTANCE {
        return 0.0;
    }
    let k = normal.dot(*tensor * normal);
    (mesh.face_area(f) * k / dist).max(0.0)
}

#[inline]
fn harmonic(t1: f64, t2: f64) -> f64 {
    let sum = t1 + t2;
    if sum > 0.0 {
        t1 * t2 / sum
    } else {
        0.0
    }
}

/// 装配好的扩散-累积算子
#[derive(Debug, Clone)]
pub struct DiffusionOperator {
    matrix: CsrMatrix,
    boundary_rhs: Vec<f64>,
}

impl DiffusionOperator {
    /// 装配 `A = diag(acc V / dt) + L(D)`
    ///
    /// `tensors` 与 `accumulation` 按 owned 单元索引。
    pub fn assemble(
        mesh: &dyn TransportMesh,
        tensors: &[DMat3],
        dirichlet: &BoundaryValues,
        accumulation: &[f64],
        dt: f64,
    ) -> Self {
        let n = mesh.num_cells(Ownership::Owned);
        let mut builder = CsrBuilder::new_square(n);
        let mut boundary_rhs = vec![0.0; n];

        for c in 0..n {
            builder.add(c, c, accumulation[c] * mesh.cell_volume(c) / dt);
        }

        for f in 0..mesh.num_faces(Ownership::All) {
            match *mesh.face_cells(f) {
                [c1, c2] => {
                    if !(mesh.is_owned_cell(c1) && mesh.is_owned_cell(c2)) {
                        continue;
                    }
                    let t = harmonic(
                        half_transmissibility(mesh, &tensors[c1], c1, f),
                        half_transmissibility(mesh, &tensors[c2], c2, f),
                    );
                    if t == 0.0 {
                        continue;
                    }
                    builder.add(c1, c1, t);
                    builder.add(c2, c2, t);
                    builder.add(c1, c2, -t);
                    builder.add(c2, c1, -t);
                }
                [c] if mesh.is_owned_cell(c) => {
                    if let Some(&value) = dirichlet.get(&f) {
                        let t = half_transmissibility(mesh, &tensors[c], c, f);
                        builder.add(c, c, t);
                        boundary_rhs[c] += t * value;
                    }
                }
                _ => {}
            }
        }

        Self {
            matrix: builder.build(),
            boundary_rhs,
        }
    }

    /// 系数矩阵
    #[inline]
    pub fn matrix(&self) -> &CsrMatrix {
        &self.matrix
    }

    /// Dirichlet 边界贡献的右端项
    #[inline]
    pub fn boundary_rhs(&self) -> &[f64] {
        &self.boundary_rhs
    }

    /// 右端项 `b = acc_old V / dt × c + 边界项`
    pub fn rhs(
        &self,
        mesh: &dyn TransportMesh,
        accumulation_old: &[f64],
        concentration: &[f64],
        dt: f64,
    ) -> Vec<f64> {
        self.boundary_rhs
            .iter()
            .enumerate()
            .map(|(c, &b)| b + accumulation_old[c] * mesh.cell_volume(c) / dt * concentration[c])
            .collect()
    }
}
