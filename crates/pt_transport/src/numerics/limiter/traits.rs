// crates/pt_transport/src/numerics/limiter/traits.rs

//! 限制器 trait 定义和上下文结构
//!
//! 限制因子 α ∈ [0, 1] 作用于线性重构：
//!
//! ```text
//! c_face = c_cell + α * (∇c · r)
//! ```
//!
//! 其中 r 是从单元形心到面形心的向量。

use std::fmt::Debug;

/// 限制器计算所需的上下文
#[derive(Debug, Clone, Copy)]
pub struct LimiterContext {
    /// 当前单元的值 c_i
    pub cell_value: f64,

    /// 梯度在某个面方向上的投影 (∇c · r_f)
    pub gradient: f64,

    /// 相邻单元（含自身）的最小值
    pub min_neighbor: f64,

    /// 相邻单元（含自身）的最大值
    pub max_neighbor: f64,

    /// 单元形心到最远面形心的距离
    pub max_distance: f64,
}

impl LimiterContext {
    /// 创建上下文
    #[inline]
    pub fn new(
        cell_value: f64,
        gradient: f64,
        min_neighbor: f64,
        max_neighbor: f64,
        max_distance: f64,
    ) -> Self {
        Self {
            cell_value,
            gradient,
            min_neighbor,
            max_neighbor,
            max_distance,
        }
    }

    /// Δ_max = c_max - c_i
    #[inline]
    pub fn delta_max(&self) -> f64 {
        self.max_neighbor - self.cell_value
    }

    /// Δ_min = c_min - c_i
    #[inline]
    pub fn delta_min(&self) -> f64 {
        self.min_neighbor - self.cell_value
    }

    /// 梯度投影是否接近零
    #[inline]
    pub fn is_gradient_zero(&self, eps: f64) -> bool {
        self.gradient.abs() < eps
    }
}

impl Default for LimiterContext {
    fn default() -> Self {
        Self {
            cell_value: 0.0,
            gradient: 0.0,
            min_neighbor: 0.0,
            max_neighbor: 0.0,
            max_distance: 1.0,
        }
    }
}

/// 梯度限制器
///
/// 保证 `c_min ≤ c_i + α * gradient ≤ c_max`。
pub trait SlopeLimiter: Debug + Send + Sync {
    /// 计算限制因子
    fn compute_limiter(&self, ctx: &LimiterContext) -> f64;

    /// 名称
    fn name(&self) -> &'static str;

    /// 单元的限制因子：对所有面投影取最小
    fn cell_limiter(&self, contexts: &[LimiterContext]) -> f64 {
        contexts
            .iter()
            .map(|ctx| self.compute_limiter(ctx))
            .fold(1.0, f64::min)
    }
}

/// 不限制
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLimiter;

impl SlopeLimiter for NoLimiter {
    #[inline]
    fn compute_limiter(&self, _ctx: &LimiterContext) -> f64 {
        1.0
    }

    fn name(&self) -> &'static str {
        "None"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_deltas() {
        let ctx = LimiterContext::new(1.0, 0.3, 0.5, 1.5, 0.1);
        assert!((ctx.delta_max() - 0.5).abs() < 1e-15);
        assert!((ctx.delta_min() + 0.5).abs() < 1e-15);
        assert!(!ctx.is_gradient_zero(1e-12));
        assert!(LimiterContext::default().is_gradient_zero(1e-12));
    }

    #[test]
    fn test_no_limiter() {
        let ctx = LimiterContext::new(1.0, 100.0, 0.0, 1.0, 1.0);
        assert_eq!(NoLimiter.compute_limiter(&ctx), 1.0);
        assert_eq!(NoLimiter.cell_limiter(&[ctx, ctx]), 1.0);
    }
}
