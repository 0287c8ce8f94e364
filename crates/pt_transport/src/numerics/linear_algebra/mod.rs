// crates/pt_transport/src/numerics/linear_algebra/mod.rs

//! 稀疏线性代数
//!
//! 隐式弥散求解所需的 CSR 矩阵、预条件器和迭代求解器。
//! 求解器以服务形式提供：[`LinearSolverFactory`] 按名称创建 [`LinearSolver`]。

pub mod csr;
pub mod preconditioner;
pub mod solver;
pub mod vector_ops;

pub use csr::{CsrBuilder, CsrMatrix, CsrPattern};
pub use preconditioner::{
    create_preconditioner, IdentityPreconditioner, JacobiPreconditioner, Preconditioner,
};
pub use solver::{
    DefaultSolverFactory, LinearSolver, LinearSolverFactory, PcgSolver, SolverConfig,
    SolverErrorCategory, SolverResult, SolverStatus,
};
pub use vector_ops::{axpy, dot, norm2, norm_inf, xpay};
