// crates/pt_foundation/src/float.rs

//! 数值常量和浮点辅助函数

use serde::{Deserialize, Serialize};

// ============================================================================
// 数值常量
// ============================================================================

/// 浮点数相等性比较的默认容差
pub const DEFAULT_EPSILON: f64 = 1e-14;

/// 安全除法的最小分母阈值
pub const SAFE_DIV_EPSILON: f64 = 1e-14;

/// 迭代求解器的默认最大迭代次数
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// 迭代求解器的默认收敛容差
pub const DEFAULT_CONVERGENCE_TOL: f64 = 1e-12;

// ============================================================================
// 辅助函数
// ============================================================================

/// 安全除法，分母过小或结果非有限时返回 `fallback`
#[inline]
pub fn safe_div(a: f64, b: f64, fallback: f64) -> f64 {
    if b.abs() < SAFE_DIV_EPSILON {
        fallback
    } else {
        let result = a / b;
        if result.is_finite() {
            result
        } else {
            fallback
        }
    }
}

/// 混合容差比较：`|a - b| <= tol * max(1, |a|, |b|)`
#[inline]
pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    let scale = 1.0_f64.max(a.abs()).max(b.abs());
    (a - b).abs() <= tol * scale
}

// ============================================================================
// 区间
// ============================================================================

/// 闭区间 `[min, max]`，用于极值统计和有界性检查
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// 下界
    pub min: f64,
    /// 上界
    pub max: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

impl Bounds {
    /// 空区间（任何 `include` 都会覆盖它）
    pub const fn empty() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// 单点区间
    pub const fn point(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// 扩展区间以包含 `value`
    #[inline]
    pub fn include(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// 合并另一个区间
    #[inline]
    pub fn merge(&mut self, other: Bounds) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// `value` 是否落在放宽 `tol` 后的区间内
    #[inline]
    pub fn contains(&self, value: f64, tol: f64) -> bool {
        value >= self.min - tol && value <= self.max + tol
    }

    /// 把 `value` 截断到区间内
    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        if self.is_empty() {
            value
        } else {
            value.max(self.min).min(self.max)
        }
    }
}

impl FromIterator<f64> for Bounds {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut bounds = Bounds::empty();
        for v in iter {
            bounds.include(v);
        }
        bounds
    }
}
