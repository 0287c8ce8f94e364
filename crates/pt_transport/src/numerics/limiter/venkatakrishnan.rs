// crates/pt_transport/src/numerics/limiter/venkatakrishnan.rs

//! Venkatakrishnan 限制器
//!
//! 用光滑函数代替 Barth-Jespersen 的 min 运算，避免限制因子突变。
//! `ε² = (K h)³`，h 为单元特征尺度（取上下文中的 `max_distance`）。
//!
//! K 参数选择：
//! - 0.1-0.3: 强限制
//! - 0.3-1.0: 通用（默认 0.3）
//! - 1.0-5.0: 弱限制，适用于光滑解
//!
//! Venkatakrishnan, V. (1993). "On the accuracy of limiters and convergence
//! to steady state solutions". AIAA Paper 93-0880.

use super::traits::{LimiterContext, SlopeLimiter};

/// Venkatakrishnan 限制器
#[derive(Debug, Clone, Copy)]
pub struct Venkatakrishnan {
    k: f64,
    tol: f64,
}

impl Default for Venkatakrishnan {
    fn default() -> Self {
        Self::new(0.3)
    }
}

impl Venkatakrishnan {
    /// 创建限制器
    pub fn new(k: f64) -> Self {
        Self { k, tol: 1e-12 }
    }

    /// K 参数
    #[inline]
    pub fn k(&self) -> f64 {
        self.k
    }

    /// 尺度 h 对应的 ε²
    #[inline]
    pub fn eps_squared(&self, h: f64) -> f64 {
        let kh = self.k * h;
        kh * kh * kh
    }

    fn phi(&self, x: f64, y: f64, eps2: f64) -> f64 {
        let x2 = x * x;
        let y2 = y * y;
        let numerator = (y2 + eps2) * x + 2.0 * x2 * y;
        let denominator = y2 + 2.0 * x2 + x * y + eps2;
        if denominator.abs() < self.tol {
            1.0
        } else {
            numerator / denominator
        }
    }
}

impl SlopeLimiter for Venkatakrishnan {
    fn compute_limiter(&self, ctx: &LimiterContext) -> f64 {
        if ctx.is_gradient_zero(self.tol) {
            return 1.0;
        }

        let eps2 = self.eps_squared(ctx.max_distance);
        let delta = ctx.gradient;
        // phi(δ, Δ) / δ 为限制因子
        let alpha = if delta > 0.0 {
            let delta_max = ctx.delta_max();
            if delta_max < self.tol {
                return 0.0;
            }
            self.phi(delta, delta_max, eps2) / delta
        } else {
            let delta_min = ctx.delta_min();
            if delta_min > -self.tol {
                return 0.0;
            }
            self.phi(-delta, -delta_min, eps2) / -delta
        };
        alpha.clamp(0.0, 1.0)
    }

    fn name(&self) -> &'static str {
        "Venkatakrishnan"
    }
}
