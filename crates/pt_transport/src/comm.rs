// crates/pt_transport/src/comm.rs

//! 跨进程通信抽象
//!
//! 输运核心在每个进程内单线程运行，并行只发生在分区之间。
//! 所有"挂起点"都是集合通信：面循环之前的 ghost 同步，以及
//! 稳定时间步和诊断范数的全局规约。调用顺序固定为：
//!
//! ```text
//! 同步通量 → 重建迎风拓扑 → 计算 dt → 规约 dt → 推进
//! ```

use std::fmt::Debug;

use crate::state::{FieldLocation, MultiField};

/// 集合通信接口
///
/// 实现必须是阻塞的：返回时所有进程都已完成该集合操作。
pub trait Communicator: Debug + Send + Sync {
    /// 当前进程编号
    fn rank(&self) -> usize;

    /// 进程总数
    fn size(&self) -> usize;

    /// 全局最小值
    fn min_all(&self, local: f64) -> f64;

    /// 全局最大值
    fn max_all(&self, local: f64) -> f64;

    /// 全局求和
    fn sum_all(&self, local: f64) -> f64;

    /// 把 owned 实体的值复制到其它进程的 ghost 副本
    ///
    /// `field` 的每个分量长度为 ALL（owned + ghost）实体数。
    fn scatter_to_ghosts(&self, location: FieldLocation, field: &mut MultiField);

    /// 逐分量的全局最小值
    fn min_all_vec(&self, local: &[f64]) -> Vec<f64> {
        local.iter().map(|v| self.min_all(*v)).collect()
    }

    /// 逐分量的全局最大值
    fn max_all_vec(&self, local: &[f64]) -> Vec<f64> {
        local.iter().map(|v| self.max_all(*v)).collect()
    }

    /// 逐分量的全局求和
    fn sum_all_vec(&self, local: &[f64]) -> Vec<f64> {
        local.iter().map(|v| self.sum_all(*v)).collect()
    }
}

/// 单进程通信器：规约为恒等，没有 ghost
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    #[inline]
    fn min_all(&self, local: f64) -> f64 {
        local
    }

    #[inline]
    fn max_all(&self, local: f64) -> f64 {
        local
    }

    #[inline]
    fn sum_all(&self, local: f64) -> f64 {
        local
    }

    fn scatter_to_ghosts(&self, _location: FieldLocation, _field: &mut MultiField) {}
}
