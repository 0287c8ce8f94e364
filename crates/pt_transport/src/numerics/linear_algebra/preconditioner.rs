// crates/pt_transport/src/numerics/linear_algebra/preconditioner.rs

//! 预条件器
//!
//! 核心操作 `apply`: z = M⁻¹ r。
//!
//! - [`IdentityPreconditioner`]: 无预条件
//! - [`JacobiPreconditioner`]: 对角预条件

use super::csr::CsrMatrix;
use crate::config::PreconditionerKind;

/// 预条件器 trait
pub trait Preconditioner: Send + Sync {
    /// z = M⁻¹ r
    fn apply(&self, r: &[f64], z: &mut [f64]);

    /// 名称
    fn name(&self) -> &'static str;

    /// 矩阵值变化（结构不变）时更新
    fn update(&mut self, matrix: &CsrMatrix);
}

/// 按配置创建预条件器
pub fn create_preconditioner(kind: PreconditionerKind, matrix: &CsrMatrix) -> Box<dyn Preconditioner> {
    match kind {
        PreconditionerKind::Identity => Box::new(IdentityPreconditioner),
        PreconditionerKind::Jacobi => Box::new(JacobiPreconditioner::from_matrix(matrix)),
    }
}

/// 恒等预条件器：z = r
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPreconditioner;

impl Preconditioner for IdentityPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        z.copy_from_slice(r);
    }

    fn name(&self) -> &'static str {
        "Identity"
    }

    fn update(&mut self, _matrix: &CsrMatrix) {}
}

/// Jacobi 预条件器：M = diag(A)
///
/// 零对角元（或非常小）按 1 处理。
#[derive(Debug, Clone, Default)]
pub struct JacobiPreconditioner {
    inv_diag: Vec<f64>,
}

impl JacobiPreconditioner {
    /// 从矩阵创建
    pub fn from_matrix(matrix: &CsrMatrix) -> Self {
        let mut p = Self::default();
        p.update(matrix);
        p
    }

    /// 对角元倒数
    pub fn inv_diag(&self) -> &[f64] {
        &self.inv_diag
    }
}

impl Preconditioner for JacobiPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        for ((zi, &ri), &di) in z.iter_mut().zip(r).zip(&self.inv_diag) {
            *zi = ri * di;
        }
    }

    fn name(&self) -> &'static str {
        "Jacobi"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        self.inv_diag = matrix
            .extract_diagonal()
            .into_iter()
            .map(|d| if d.abs() > 1e-300 { 1.0 / d } else { 1.0 })
            .collect();
    }
}
