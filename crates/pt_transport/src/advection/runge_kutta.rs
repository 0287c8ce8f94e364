// crates/pt_transport/src/advection/runge_kutta.rs

//! 显式 Runge-Kutta 表
//!
//! ```text
//! k_s   = L(t + c_s dt, u + dt Σ_{j<s} a_sj k_j)
//! u_new = u + dt Σ_s b_s k_s
//! ```
//!
//! | 阶 | 方法 | 级数 |
//! |----|------|------|
//! | 1 | 前向欧拉 | 1 |
//! | 2 | Heun（SSP-RK2） | 2 |
//! | 3 | TVD-RK3（Shu-Osher） | 3 |
//! | 4 | 经典 RK4 | 4 |

/// Butcher 表（严格下三角）
#[derive(Debug, Clone, PartialEq)]
pub struct ButcherTableau {
    name: &'static str,
    order: u32,
    a: Vec<Vec<f64>>,
    b: Vec<f64>,
    c: Vec<f64>,
}

impl ButcherTableau {
    /// 前向欧拉
    pub fn forward_euler() -> Self {
        Self {
            name: "forward Euler",
            order: 1,
            a: vec![vec![]],
            b: vec![1.0],
            c: vec![0.0],
        }
    }

    /// Heun 方法
    pub fn heun() -> Self {
        Self {
            name: "Heun",
            order: 2,
            a: vec![vec![], vec![1.0]],
            b: vec![0.5, 0.5],
            c: vec![0.0, 1.0],
        }
    }

    /// 三阶 TVD Runge-Kutta
    pub fn tvd_rk3() -> Self {
        Self {
            name: "TVD-RK3",
            order: 3,
            a: vec![vec![], vec![1.0], vec![0.25, 0.25]],
            b: vec![1.0 / 6.0, 1.0 / 6.0, 2.0 / 3.0],
            c: vec![0.0, 1.0, 0.5],
        }
    }

    /// 经典四阶 Runge-Kutta
    pub fn rk4() -> Self {
        Self {
            name: "RK4",
            order: 4,
            a: vec![vec![], vec![0.5], vec![0.0, 0.5], vec![0.0, 0.0, 1.0]],
            b: vec![1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
            c: vec![0.0, 0.5, 0.5, 1.0],
        }
    }

    /// 按时间精度阶选择
    pub fn for_order(order: u32) -> Option<Self> {
        match order {
            1 => Some(Self::forward_euler()),
            2 => Some(Self::heun()),
            3 => Some(Self::tvd_rk3()),
            4 => Some(Self::rk4()),
            _ => None,
        }
    }

    /// 名称
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 精度阶
    pub fn order(&self) -> u32 {
        self.order
    }

    /// 级数
    pub fn stages(&self) -> usize {
        self.b.len()
    }

    /// 第 `s` 级对前面各级的系数
    pub fn a(&self, s: usize) -> &[f64] {
        &self.a[s]
    }

    /// 权重
    pub fn b(&self, s: usize) -> f64 {
        self.b[s]
    }

    /// 第 `s` 级的时间系数
    pub fn c(&self, s: usize) -> f64 {
        self.c[s]
    }
}
