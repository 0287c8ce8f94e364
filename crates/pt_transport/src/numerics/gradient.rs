// crates/pt_transport/src/numerics/gradient.rs

//! 单元梯度
//!
//! 最小二乘梯度，距离平方反比加权：
//!
//! ```text
//! min Σ w_j (c_j - c_i - ∇c_i · r_ij)²,   w_j = 1 / |r_ij|²
//! ```
//!
//! 法方程为 3×3 对称矩阵。低维网格嵌入三维空间时矩阵秩亏，
//! 加上 `ε · tr(A) · I` 正则化后求解，缺失方向的分量为零。
//! 没有任何邻居点时回退到 Green-Gauss。
//!
//! 边界面只有给出边界值时才参与（以面形心作为邻居点）。

use std::collections::BTreeMap;

use glam::{DMat3, DVec3};

use crate::mesh::{Ownership, TransportMesh};

/// 面上的已知边界值（面编号 → 值）
pub type BoundaryValues = BTreeMap<usize, f64>;

/// 最小二乘梯度配置
#[derive(Debug, Clone, Copy)]
pub struct LeastSquaresConfig {
    /// 正则化系数 ε
    pub regularization: f64,
    /// 判断距离为零的阈值
    pub min_distance_sq: f64,
}

impl Default for LeastSquaresConfig {
    fn default() -> Self {
        Self {
            regularization: 1e-10,
            min_distance_sq: 1e-24,
        }
    }
}

/// 最小二乘梯度计算器
#[derive(Debug, Clone, Default)]
pub struct LeastSquaresGradient {
    config: LeastSquaresConfig,
}

impl LeastSquaresGradient {
    /// 创建
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用配置创建
    pub fn with_config(config: LeastSquaresConfig) -> Self {
        Self { config }
    }

    /// 计算全部 owned 单元的梯度；`out` 长度至少为 owned 单元数
    pub fn compute(
        &self,
        mesh: &dyn TransportMesh,
        field: &[f64],
        boundary: &BoundaryValues,
        out: &mut [DVec3],
    ) {
        let n_owned = mesh.num_cells(Ownership::Owned);
        for (c, grad) in out.iter_mut().enumerate().take(n_owned) {
            *grad = self
                .cell_gradient(mesh, field, boundary, c)
                .unwrap_or_else(|| green_gauss_gradient(mesh, field, boundary, c));
        }
    }

    /// 单个单元的最小二乘梯度；法方程退化时返回 `None`
    pub fn cell_gradient(
        &self,
        mesh: &dyn TransportMesh,
        field: &[f64],
        boundary: &BoundaryValues,
        c: usize,
    ) -> Option<DVec3> {
        let xc = mesh.cell_centroid(c);
        let value = field[c];

        let mut a = DMat3::ZERO;
        let mut b = DVec3::ZERO;
        let mut count = 0usize;

        let mut accumulate = |point: DVec3, other: f64| {
            let r = point - xc;
            let dist_sq = r.length_squared();
            if dist_sq < self.config.min_distance_sq {
                return;
            }
            let w = 1.0 / dist_sq;
            a += DMat3::from_cols(r * r.x, r * r.y, r * r.z) * w;
            b += r * (w * (other - value));
            count += 1;
        };

        for &f in mesh.cell_faces(c) {
            let cells = mesh.face_cells(f);
            if cells.len() == 1 {
                if let Some(&bv) = boundary.get(&f) {
                    accumulate(mesh.face_centroid(f), bv);
                }
                continue;
            }
            for &other in cells.iter().filter(|&&other| other != c) {
                accumulate(mesh.cell_centroid(other), field[other]);
            }
        }

        if count == 0 {
            return None;
        }

        let trace = a.x_axis.x + a.y_axis.y + a.z_axis.z;
        if !(trace > 0.0) {
            return None;
        }
        let regularized = a + DMat3::from_diagonal(DVec3::splat(self.config.regularization * trace));
        if regularized.determinant().abs() <= f64::MIN_POSITIVE {
            return None;
        }
        let grad = regularized.inverse() * b;
        grad.is_finite().then_some(grad)
    }
}

/// Green-Gauss 梯度：∇c ≈ (1/V) Σ_f c_f n_f
///
/// 内部面取相邻单元的算术平均，无边界值的边界面取单元自身值。
pub fn green_gauss_gradient(
    mesh: &dyn TransportMesh,
    field: &[f64],
    boundary: &BoundaryValues,
    c: usize,
) -> DVec3 {
    let volume = mesh.cell_volume(c);
    if volume <= 0.0 {
        return DVec3::ZERO;
    }

    let mut sum = DVec3::ZERO;
    for (&f, &dir) in mesh.cell_faces(c).iter().zip(mesh.cell_face_dirs(c)) {
        let cells = mesh.face_cells(f);
        let face_value = if cells.len() == 1 {
            boundary.get(&f).copied().unwrap_or(field[c])
        } else {
            cells.iter().map(|&k| field[k]).sum::<f64>() / cells.len() as f64
        };
        sum += mesh.face_normal(f) * (face_value * dir as f64);
    }
    sum / volume
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::UnstructuredMesh;

    fn linear_field(mesh: &UnstructuredMesh, slope: DVec3) -> Vec<f64> {
        (0..mesh.num_cells(Ownership::All))
            .map(|c| 2.0 + slope.dot(mesh.cell_centroid(c)))
            .collect()
    }

    #[test]
    fn test_linear_field_exact_in_2d() {
        let mesh = UnstructuredMesh::rectangle_2d(4, 3, 4.0, 3.0).unwrap();
        let slope = DVec3::new(0.5, -1.5, 0.0);
        let field = linear_field(&mesh, slope);
        let ls = LeastSquaresGradient::new();

        // 内部单元 (1,1)
        let g = ls.cell_gradient(&mesh, &field, &BoundaryValues::new(), 5).unwrap();
        assert!((g - slope).length() < 1e-6);
    }

    #[test]
    fn test_column_gradient_has_no_transverse_component() {
        let mesh = UnstructuredMesh::column_1d(5, 5.0, 1.0).unwrap();
        let field = linear_field(&mesh, DVec3::new(2.0, 0.0, 0.0));
        let mut out = vec![DVec3::ZERO; 5];
        LeastSquaresGradient::new().compute(&mesh, &field, &BoundaryValues::new(), &mut out);
        for g in &out {
            assert!((g.x - 2.0).abs() < 1e-6);
            assert!(g.y.abs() < 1e-12 && g.z.abs() < 1e-12);
        }
    }

    #[test]
    fn test_boundary_value_participates() {
        let mesh = UnstructuredMesh::column_1d(1, 1.0, 1.0).unwrap();
        let field = vec![1.0];
        let mut bc = BoundaryValues::new();
        bc.insert(0, 0.0);
        let g = LeastSquaresGradient::new()
            .cell_gradient(&mesh, &field, &bc, 0)
            .unwrap();
        assert!((g.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_isolated_cell_falls_back() {
        let mesh = UnstructuredMesh::column_1d(1, 1.0, 1.0).unwrap();
        let ls = LeastSquaresGradient::new();
        assert!(ls.cell_gradient(&mesh, &[3.0], &BoundaryValues::new(), 0).is_none());

        let mut out = vec![DVec3::ONE];
        ls.compute(&mesh, &[3.0], &BoundaryValues::new(), &mut out);
        assert!(out[0].length() < 1e-14);
    }

    #[test]
    fn test_green_gauss_linear_interior() {
        let mesh = UnstructuredMesh::rectangle_2d(3, 3, 3.0, 3.0).unwrap();
        let field = linear_field(&mesh, DVec3::new(1.0, 0.0, 0.0));
        let g = green_gauss_gradient(&mesh, &field, &BoundaryValues::new(), 4);
        assert!((g.x - 1.0).abs() < 1e-12);
        assert!(g.y.abs() < 1e-12);
    }
}
