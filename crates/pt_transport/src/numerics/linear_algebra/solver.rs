// crates/pt_transport/src/numerics/linear_algebra/solver.rs

//! 迭代线性求解器服务
//!
//! 弥散求解通过 [`LinearSolverFactory`] 按名称创建求解器，
//! 再调用 [`LinearSolver::apply_inverse`]。状态码约定：
//!
//! | 码 | 含义 |
//! |----|------|
//! | 正 | 收敛 |
//! | -1 | 应用算子时发现非正定 |
//! | -2 | 应用逆时发现非正定 |
//! | -3 | 达到最大迭代次数 |
//! | -4 | 残差溢出 |

use std::fmt;

use serde::{Deserialize, Serialize};

use super::csr::CsrMatrix;
use super::preconditioner::create_preconditioner;
use super::vector_ops::{axpy, dot, norm2, residual_into, xpay};
use crate::config::{LinearSolverConfig, PreconditionerKind};
use crate::error::{ConfigError, TransportResult};

/// 收敛状态码
pub const LIN_SOLVER_CONVERGED: i32 = 1;
/// 应用算子时非正定
pub const LIN_SOLVER_NON_SPD_APPLY: i32 = -1;
/// 应用逆时非正定
pub const LIN_SOLVER_NON_SPD_APPLY_INVERSE: i32 = -2;
/// 达到最大迭代次数
pub const LIN_SOLVER_MAX_ITERATIONS: i32 = -3;
/// 残差溢出
pub const LIN_SOLVER_RESIDUAL_OVERFLOW: i32 = -4;

const OVERFLOW_FACTOR: f64 = 1e50;

// ============================================================================
// 配置与结果
// ============================================================================

/// 求解器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// 相对收敛容差（相对右端项范数）
    pub rtol: f64,
    /// 绝对收敛容差
    pub atol: f64,
    /// 最大迭代次数
    pub max_iter: usize,
    /// 至少迭代一次，不做迭代前的收敛检查
    pub make_one_iteration: bool,
    /// 逐次输出残差
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-14,
            max_iter: 1000,
            make_one_iteration: false,
            verbose: false,
        }
    }
}

impl SolverConfig {
    /// 创建配置
    pub fn new(rtol: f64, max_iter: usize) -> Self {
        Self {
            rtol,
            max_iter,
            ..Default::default()
        }
    }

    /// 设置绝对容差
    pub fn with_atol(mut self, atol: f64) -> Self {
        self.atol = atol;
        self
    }
}

impl From<&LinearSolverConfig> for SolverConfig {
    fn from(c: &LinearSolverConfig) -> Self {
        Self {
            rtol: c.rtol,
            atol: c.atol,
            max_iter: c.max_iterations,
            make_one_iteration: false,
            verbose: false,
        }
    }
}

/// 求解状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// 收敛
    Converged,
    /// 达到最大迭代次数
    MaxIterationsReached,
    /// 系统非对称正定
    NotSpd,
    /// 残差溢出
    ResidualOverflow,
}

impl SolverStatus {
    /// 状态码：成功为正，失败为负
    pub fn code(&self) -> i32 {
        match self {
            Self::Converged => LIN_SOLVER_CONVERGED,
            Self::MaxIterationsReached => LIN_SOLVER_MAX_ITERATIONS,
            Self::NotSpd => LIN_SOLVER_NON_SPD_APPLY_INVERSE,
            Self::ResidualOverflow => LIN_SOLVER_RESIDUAL_OVERFLOW,
        }
    }
}

/// 负状态码的解码类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverErrorCategory {
    /// 线性系统非对称正定
    NotSpd,
    /// 达到最大迭代次数
    MaxIterations,
    /// 残差溢出
    ResidualOverflow,
    /// 无法识别
    Unclassified,
}

impl SolverErrorCategory {
    /// 解码状态码
    pub fn decode(code: i32) -> Self {
        match code {
            LIN_SOLVER_NON_SPD_APPLY | LIN_SOLVER_NON_SPD_APPLY_INVERSE => Self::NotSpd,
            LIN_SOLVER_MAX_ITERATIONS => Self::MaxIterations,
            LIN_SOLVER_RESIDUAL_OVERFLOW => Self::ResidualOverflow,
            _ => Self::Unclassified,
        }
    }
}

impl fmt::Display for SolverErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotSpd => "线性系统不是对称正定的",
            Self::MaxIterations => "达到最大迭代次数",
            Self::ResidualOverflow => "残差溢出",
            Self::Unclassified => "无法恢复的求解器错误",
        };
        f.write_str(text)
    }
}

/// 求解结果
#[derive(Debug, Clone, PartialEq)]
pub struct SolverResult {
    /// 状态
    pub status: SolverStatus,
    /// 迭代次数
    pub iterations: usize,
    /// 最终残差范数
    pub residual_norm: f64,
    /// 初始残差范数
    pub initial_residual_norm: f64,
}

impl SolverResult {
    /// 是否收敛
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }

    /// 状态码
    pub fn code(&self) -> i32 {
        self.status.code()
    }
}

// ============================================================================
// 服务接口
// ============================================================================

/// 线性求解器
pub trait LinearSolver: Send {
    /// 名称
    fn name(&self) -> &str;

    /// 求解 A x = rhs，`x` 为初值并被覆盖
    fn apply_inverse(&mut self, matrix: &CsrMatrix, rhs: &[f64], x: &mut [f64]) -> SolverResult;

    /// 要求至少迭代一次
    fn set_make_one_iteration(&mut self, enabled: bool);

    /// 最近一次求解的残差
    fn residual(&self) -> f64;

    /// 最近一次求解的迭代次数
    fn num_iterations(&self) -> usize;
}

/// 按名称创建求解器
pub trait LinearSolverFactory: fmt::Debug + Send + Sync {
    /// 创建求解器
    fn create(&self, name: &str, config: &LinearSolverConfig) -> TransportResult<Box<dyn LinearSolver>>;
}

/// 内置求解器工厂：`pcg`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSolverFactory;

impl LinearSolverFactory for DefaultSolverFactory {
    fn create(&self, name: &str, config: &LinearSolverConfig) -> TransportResult<Box<dyn LinearSolver>> {
        match name {
            "pcg" | "cg" => Ok(Box::new(PcgSolver::new(
                SolverConfig::from(config),
                config.preconditioner,
            ))),
            other => Err(ConfigError::invalid("dispersion_solver.name", other, "未知的线性求解器").into()),
        }
    }
}

// ============================================================================
// PCG
// ============================================================================

/// 预条件共轭梯度法
#[derive(Debug, Clone)]
pub struct PcgSolver {
    config: SolverConfig,
    preconditioner: PreconditionerKind,
    r: Vec<f64>,
    z: Vec<f64>,
    p: Vec<f64>,
    ap: Vec<f64>,
    last_residual: f64,
    last_iterations: usize,
}

impl PcgSolver {
    /// 创建求解器
    pub fn new(config: SolverConfig, preconditioner: PreconditionerKind) -> Self {
        Self {
            config,
            preconditioner,
            r: Vec::new(),
            z: Vec::new(),
            p: Vec::new(),
            ap: Vec::new(),
            last_residual: 0.0,
            last_iterations: 0,
        }
    }

    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            self.r = vec![0.0; n];
            self.z = vec![0.0; n];
            self.p = vec![0.0; n];
            self.ap = vec![0.0; n];
        }
    }

    fn finish(&mut self, status: SolverStatus, iterations: usize, residual: f64, initial: f64) -> SolverResult {
        self.last_residual = residual;
        self.last_iterations = iterations;
        SolverResult {
            status,
            iterations,
            residual_norm: residual,
            initial_residual_norm: initial,
        }
    }
}

impl LinearSolver for PcgSolver {
    fn name(&self) -> &str {
        "pcg"
    }

    fn apply_inverse(&mut self, matrix: &CsrMatrix, rhs: &[f64], x: &mut [f64]) -> SolverResult {
        let n = rhs.len();
        self.ensure_workspace(n);
        let precond = create_preconditioner(self.preconditioner, matrix);

        // r = b - A x
        matrix.mul_vec(x, &mut self.ap);
        residual_into(rhs, &self.ap, &mut self.r);

        let initial_norm = norm2(&self.r);
        let b_norm = norm2(rhs);
        let tol = self.config.atol.max(self.config.rtol * b_norm);
        let overflow = OVERFLOW_FACTOR * initial_norm.max(1.0);

        if initial_norm == 0.0 || (!self.config.make_one_iteration && initial_norm < tol) {
            return self.finish(SolverStatus::Converged, 0, initial_norm, initial_norm);
        }
        if !initial_norm.is_finite() {
            return self.finish(SolverStatus::ResidualOverflow, 0, initial_norm, initial_norm);
        }

        precond.apply(&self.r, &mut self.z);
        self.p.copy_from_slice(&self.z);
        let mut rz = dot(&self.r, &self.z);
        let mut res_norm = initial_norm;

        for iter in 0..self.config.max_iter {
            matrix.mul_vec(&self.p, &mut self.ap);

            let pap = dot(&self.p, &self.ap);
            if !(pap > 0.0) {
                return self.finish(SolverStatus::NotSpd, iter, res_norm, initial_norm);
            }

            let alpha = rz / pap;
            axpy(alpha, &self.p, x);
            axpy(-alpha, &self.ap, &mut self.r);
            res_norm = norm2(&self.r);

            if self.config.verbose {
                log::trace!("PCG iter {}: residual = {:.6e}", iter + 1, res_norm);
            }

            if !res_norm.is_finite() || res_norm > overflow {
                return self.finish(SolverStatus::ResidualOverflow, iter + 1, res_norm, initial_norm);
            }
            if res_norm < tol {
                return self.finish(SolverStatus::Converged, iter + 1, res_norm, initial_norm);
            }

            precond.apply(&self.r, &mut self.z);
            let rz_new = dot(&self.r, &self.z);
            let beta = rz_new / rz;
            rz = rz_new;

            // p = z + beta p
            xpay(&self.z, beta, &mut self.p);
        }

        let iterations = self.config.max_iter;
        self.finish(SolverStatus::MaxIterationsReached, iterations, res_norm, initial_norm)
    }

    fn set_make_one_iteration(&mut self, enabled: bool) {
        self.config.make_one_iteration = enabled;
    }

    fn residual(&self) -> f64 {
        self.last_residual
    }

    fn num_iterations(&self) -> usize {
        self.last_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::linear_algebra::CsrBuilder;

    fn spd(n: usize) -> CsrMatrix {
        let mut b = CsrBuilder::new_square(n);
        for i in 0..n {
            b.add(i, i, 4.0);
            if i > 0 {
                b.add(i, i - 1, -1.0);
            }
            if i + 1 < n {
                b.add(i, i + 1, -1.0);
            }
        }
        b.build()
    }

    fn pcg() -> PcgSolver {
        PcgSolver::new(SolverConfig::new(1e-12, 100), PreconditionerKind::Jacobi)
    }

    #[test]
    fn test_pcg_solves_spd_system() {
        let a = spd(10);
        let x_exact: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let mut b = vec![0.0; 10];
        a.mul_vec(&x_exact, &mut b);

        let mut x = vec![0.0; 10];
        let mut solver = pcg();
        let result = solver.apply_inverse(&a, &b, &mut x);
        assert!(result.is_converged());
        assert!(result.code() > 0);
        for (xi, ei) in x.iter().zip(&x_exact) {
            assert!((xi - ei).abs() < 1e-9);
        }
        assert_eq!(solver.num_iterations(), result.iterations);
    }

    #[test]
    fn test_make_one_iteration() {
        let a = spd(3);
        let x_exact = [1.0, 2.0, 3.0];
        let mut b = vec![0.0; 3];
        a.mul_vec(&x_exact, &mut b);

        // 初值已满足宽松容差
        let mut x = vec![1.0, 2.0, 3.0 + 1e-10];
        let mut solver = PcgSolver::new(SolverConfig::new(1e-6, 100), PreconditionerKind::Identity);
        let result = solver.apply_inverse(&a, &b, &mut x.clone());
        assert_eq!(result.iterations, 0);

        solver.set_make_one_iteration(true);
        let result = solver.apply_inverse(&a, &b, &mut x);
        assert!(result.iterations >= 1);
        assert!(result.is_converged());
    }

    #[test]
    fn test_detects_indefinite_system() {
        let a = CsrMatrix::diagonal(&[-1.0, -2.0]);
        let mut x = vec![0.0; 2];
        let result = pcg().apply_inverse(&a, &[1.0, 1.0], &mut x);
        assert_eq!(result.status, SolverStatus::NotSpd);
        assert_eq!(SolverErrorCategory::decode(result.code()), SolverErrorCategory::NotSpd);
    }

    #[test]
    fn test_max_iterations() {
        let a = spd(50);
        let b = vec![1.0; 50];
        let mut x = vec![0.0; 50];
        let mut solver = PcgSolver::new(SolverConfig::new(1e-14, 2), PreconditionerKind::Identity);
        let result = solver.apply_inverse(&a, &b, &mut x);
        assert_eq!(result.status, SolverStatus::MaxIterationsReached);
        assert_eq!(result.code(), LIN_SOLVER_MAX_ITERATIONS);
    }

    #[test]
    fn test_decode_categories() {
        assert_eq!(SolverErrorCategory::decode(-1), SolverErrorCategory::NotSpd);
        assert_eq!(SolverErrorCategory::decode(-2), SolverErrorCategory::NotSpd);
        assert_eq!(SolverErrorCategory::decode(-3), SolverErrorCategory::MaxIterations);
        assert_eq!(SolverErrorCategory::decode(-4), SolverErrorCategory::ResidualOverflow);
        assert_eq!(SolverErrorCategory::decode(-17), SolverErrorCategory::Unclassified);
    }

    #[test]
    fn test_factory() {
        let config = LinearSolverConfig::default();
        assert_eq!(DefaultSolverFactory.create("pcg", &config).unwrap().name(), "pcg");
        assert!(DefaultSolverFactory.create("gmres", &config).is_err());
    }
}
