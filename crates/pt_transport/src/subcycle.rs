// crates/pt_transport/src/subcycle.rs

//! 子循环控制
//!
//! 用不超过稳定步长的若干子步覆盖一个外部（MPC）时间区间。
//! 步长序列规则（阈值保持不变，测试依赖于具体的步数序列）：
//!
//! ```text
//! dt_try = dt_mpc - dt_sum
//! tol    = 1e-14 * (dt_try + dt_stable)
//! dt_try >= 2 dt_stable       → dt_stable
//! dt_try >  dt_stable + tol   → dt_try / 2
//! 否则                         → dt_try（最后一步）
//! ```
//!
//! 饱和度在子步之间沿窗口线性插值，使用双缓冲保证
//! 第 k 步的起点值等于第 k-1 步的终点值。

use pt_foundation::PtError;

use crate::error::TransportResult;

/// 子循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubcycleState {
    /// 估计稳定步长
    ComputeStableDt,
    /// 执行子步
    Subcycle,
    /// 轮换浓度缓冲
    RotateBuffer,
    /// 完成
    Done,
}

/// 单个子步
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubStep {
    /// 子步序号（从 0 开始）
    pub index: usize,
    /// 步长
    pub dt: f64,
    /// 子步起点相对 `t_old` 的偏移
    pub t_offset: f64,
    /// 是否最后一步
    pub is_final: bool,
}

impl SubStep {
    /// 子步中点相对 `t_old` 的偏移
    #[inline]
    pub fn midpoint(&self) -> f64 {
        self.t_offset + 0.5 * self.dt
    }

    /// 子步终点相对 `t_old` 的偏移
    #[inline]
    pub fn end(&self) -> f64 {
        self.t_offset + self.dt
    }
}

/// 子步序列
///
/// ```
/// use pt_transport::subcycle::SubcycleSchedule;
///
/// let steps: Vec<f64> = SubcycleSchedule::new(1.0, 0.4).unwrap().map(|s| s.dt).collect();
/// assert_eq!(steps.len(), 3);
/// assert!((steps[0] - 0.4).abs() < 1e-14);
/// assert!((steps[1] - 0.3).abs() < 1e-14);
/// assert!((steps[2] - 0.3).abs() < 1e-14);
/// ```
#[derive(Debug, Clone)]
pub struct SubcycleSchedule {
    dt_mpc: f64,
    dt_stable: f64,
    dt_sum: f64,
    index: usize,
    state: SubcycleState,
}

impl SubcycleSchedule {
    /// 创建序列；稳定步长必须为正
    pub fn new(dt_mpc: f64, dt_stable: f64) -> TransportResult<Self> {
        if !(dt_stable > 0.0) {
            return Err(PtError::invalid_input(format!("稳定时间步必须为正，实际 {dt_stable}")).into());
        }
        if !(dt_mpc >= 0.0) || !dt_mpc.is_finite() {
            return Err(PtError::invalid_input(format!("时间区间无效: {dt_mpc}")).into());
        }
        Ok(Self {
            dt_mpc,
            dt_stable,
            dt_sum: 0.0,
            index: 0,
            state: SubcycleState::Subcycle,
        })
    }

    /// 当前状态
    pub fn state(&self) -> SubcycleState {
        self.state
    }

    /// 已覆盖的时间
    pub fn elapsed(&self) -> f64 {
        self.dt_sum
    }

    /// 已执行的子步数
    pub fn num_cycles(&self) -> usize {
        self.index
    }
}

impl Iterator for SubcycleSchedule {
    type Item = SubStep;

    fn next(&mut self) -> Option<SubStep> {
        if self.state == SubcycleState::Done {
            return None;
        }

        let dt_try = self.dt_mpc - self.dt_sum;
        let tol = 1e-14 * (dt_try + self.dt_stable);
        let (dt, is_final) = if dt_try >= 2.0 * self.dt_stable {
            (self.dt_stable, false)
        } else if dt_try > self.dt_stable + tol {
            (dt_try / 2.0, false)
        } else {
            (dt_try, true)
        };

        let step = SubStep {
            index: self.index,
            dt,
            t_offset: self.dt_sum,
            is_final,
        };
        self.dt_sum += dt;
        self.index += 1;
        self.state = if is_final {
            SubcycleState::Done
        } else {
            SubcycleState::RotateBuffer
        };
        Some(step)
    }
}

// ============================================================
// 饱和度插值
// ============================================================

/// 线性插值：`a = t / dt_window`，`out = (1 - a) v0 + a v1`
pub fn interpolate_cell_vector(v0: &[f64], v1: &[f64], t: f64, dt_window: f64, out: &mut [f64]) {
    let a = if dt_window > 0.0 { t / dt_window } else { 1.0 };
    for ((o, &a0), &a1) in out.iter_mut().zip(v0).zip(v1) {
        *o = (1.0 - a) * a0 + a * a1;
    }
}

/// 子步起止饱和度（双缓冲）
///
/// 窗口 `[t_w0, t_w1]` 上 `ws_prev`、`ws` 分别为起点和终点值。
/// `shift` 为 `t_old - t_w0`。
#[derive(Debug, Clone)]
pub struct SaturationPath {
    ws_prev: Vec<f64>,
    ws: Vec<f64>,
    buffers: [Vec<f64>; 2],
    start: usize,
    advanced: bool,
    shift: f64,
    dt_window: f64,
    interpolate: bool,
}

impl SaturationPath {
    /// 创建；`interpolate` 为假时起止值直接取 `ws_prev`、`ws`
    pub fn new(ws_prev: &[f64], ws: &[f64], shift: f64, dt_window: f64, interpolate: bool) -> Self {
        let mut first = vec![0.0; ws.len()];
        if interpolate {
            interpolate_cell_vector(ws_prev, ws, shift, dt_window, &mut first);
        } else {
            first.copy_from_slice(ws_prev);
        }
        Self {
            ws_prev: ws_prev.to_vec(),
            ws: ws.to_vec(),
            buffers: [first, ws.to_vec()],
            start: 0,
            advanced: false,
            shift,
            dt_window,
            interpolate,
        }
    }

    /// 推进到子步终点（相对 `t_old` 的偏移 `t_end`）
    ///
    /// 交换缓冲后把新的终点值插值到 `t_end + shift`。
    pub fn advance(&mut self, t_end: f64) {
        if !self.interpolate {
            return;
        }
        if self.advanced {
            self.start = 1 - self.start;
        }
        let end = 1 - self.start;
        interpolate_cell_vector(
            &self.ws_prev,
            &self.ws,
            t_end + self.shift,
            self.dt_window,
            &mut self.buffers[end],
        );
        self.advanced = true;
    }

    /// 子步起点饱和度
    pub fn start(&self) -> &[f64] {
        &self.buffers[self.start]
    }

    /// 子步终点饱和度
    pub fn end(&self) -> &[f64] {
        &self.buffers[1 - self.start]
    }

    /// 是否插值
    pub fn interpolates(&self) -> bool {
        self.interpolate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(dt_mpc: f64, dt_stable: f64) -> Vec<SubStep> {
        SubcycleSchedule::new(dt_mpc, dt_stable).unwrap().collect()
    }

    #[test]
    fn test_sum_is_exact_for_all_ratios() {
        for ratio in [0.1, 0.5, 1.0, 1.9, 2.0, 5.3] {
            for dt_mpc in [1.0, 3.7, 1e-3, 86400.0] {
                let steps = schedule(dt_mpc, ratio * dt_mpc);
                let sum: f64 = steps.iter().map(|s| s.dt).sum();
                assert!(
                    (sum - dt_mpc).abs() <= 1e-12 * dt_mpc,
                    "ratio {ratio}, interval {dt_mpc}: sum {sum}"
                );
                assert!(steps.last().unwrap().is_final);
                assert!(steps.iter().rev().skip(1).all(|s| !s.is_final));
                for s in &steps {
                    assert!(s.dt <= ratio * dt_mpc * (1.0 + 1e-12));
                }
            }
        }
    }

    #[test]
    fn test_large_stable_step_gives_single_step() {
        let steps = schedule(2.0, 5.0);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].dt, 2.0);
    }

    #[test]
    fn test_step_counts() {
        assert_eq!(schedule(1.0, 0.5).len(), 2);
        assert_eq!(schedule(1.0, 1.0).len(), 1);
        // 1.0 / 0.6：剩余 1.0 < 1.2 且 > 0.6，平分
        let steps = schedule(1.0, 0.6);
        assert_eq!(steps.len(), 2);
        assert!((steps[0].dt - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_offsets_are_cumulative() {
        let steps = schedule(1.0, 0.4);
        assert_eq!(steps[0].t_offset, 0.0);
        assert!((steps[1].t_offset - 0.4).abs() < 1e-15);
        assert!((steps[2].midpoint() - 0.85).abs() < 1e-14);
        assert!((steps[2].end() - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_rejects_non_positive_stable_step() {
        assert!(SubcycleSchedule::new(1.0, 0.0).is_err());
        assert!(SubcycleSchedule::new(1.0, -1.0).is_err());
    }

    #[test]
    fn test_saturation_path_is_continuous() {
        let ws_prev = vec![0.2, 0.4];
        let ws = vec![0.6, 0.8];
        let mut path = SaturationPath::new(&ws_prev, &ws, 0.0, 1.0, true);
        assert_eq!(path.start(), &[0.2, 0.4]);

        let mut previous_end: Option<Vec<f64>> = None;
        for step in schedule(1.0, 0.3) {
            path.advance(step.end());
            if let Some(prev) = previous_end.take() {
                assert_eq!(path.start(), prev.as_slice());
            }
            let expected = 0.2 + 0.4 * step.end();
            assert!((path.end()[0] - expected).abs() < 1e-14);
            previous_end = Some(path.end().to_vec());
        }
        assert!((path.end()[1] - 0.8).abs() < 1e-14);
    }

    #[test]
    fn test_saturation_path_without_interpolation() {
        let mut path = SaturationPath::new(&[0.5], &[1.0], 0.0, 1.0, false);
        path.advance(1.0);
        assert_eq!(path.start(), &[0.5]);
        assert_eq!(path.end(), &[1.0]);
    }

    #[test]
    fn test_interpolation_with_shift() {
        // 窗口 [0, 2]，t_old = 1
        let mut path = SaturationPath::new(&[0.0], &[1.0], 1.0, 2.0, true);
        assert!((path.start()[0] - 0.5).abs() < 1e-15);
        path.advance(1.0);
        assert!((path.end()[0] - 1.0).abs() < 1e-15);
    }
}
