// crates/pt_transport/src/numerics/limiter/barth_jespersen.rs

//! Barth-Jespersen 限制器
//!
//! 严格保界：重构值不超过相邻单元的极值。
//!
//! ```text
//!       ⎧ min(1, Δ_max / δ_f)  δ_f > 0
//! α_f = ⎨ min(1, Δ_min / δ_f)  δ_f < 0
//!       ⎩ 1                    δ_f = 0
//! ```
//!
//! Barth, T.J. and Jespersen, D.C. (1989). "The design and application
//! of upwind schemes on unstructured meshes". AIAA Paper 89-0366.

use super::traits::{LimiterContext, SlopeLimiter};

/// Barth-Jespersen 限制器
#[derive(Debug, Clone, Copy)]
pub struct BarthJespersen {
    eps: f64,
}

impl Default for BarthJespersen {
    fn default() -> Self {
        Self { eps: 1e-12 }
    }
}

impl BarthJespersen {
    /// 判零容差 1e-12
    pub fn new() -> Self {
        Self::default()
    }

    /// 自定义判零容差
    pub fn with_tolerance(eps: f64) -> Self {
        Self { eps }
    }
}

impl SlopeLimiter for BarthJespersen {
    fn compute_limiter(&self, ctx: &LimiterContext) -> f64 {
        if ctx.is_gradient_zero(self.eps) {
            return 1.0;
        }
        // 沿梯度方向可用的余量，符号与梯度一致
        let room = if ctx.gradient > 0.0 {
            ctx.delta_max()
        } else {
            ctx.delta_min()
        };
        if room.abs() <= self.eps {
            // 单元本身就是局部极值
            return 0.0;
        }
        (room / ctx.gradient).clamp(0.0, 1.0)
    }

    fn name(&self) -> &'static str {
        "BarthJespersen"
    }
}
