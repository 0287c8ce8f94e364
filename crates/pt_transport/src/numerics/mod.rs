// crates/pt_transport/src/numerics/mod.rs

//! 数值方法
//!
//! - [`gradient`]: 单元梯度（最小二乘，Green-Gauss 回退）
//! - [`limiter`]: 梯度限制器
//! - [`reconstruction`]: 分片线性重构
//! - [`linear_algebra`]: CSR 矩阵、预条件器与 PCG 求解器

pub mod gradient;
pub mod limiter;
pub mod linear_algebra;
pub mod reconstruction;

pub use gradient::{BoundaryValues, LeastSquaresGradient};
pub use limiter::{create_limiter, SlopeLimiter};
pub use reconstruction::LinearReconstruction;
