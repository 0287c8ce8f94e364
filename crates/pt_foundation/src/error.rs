// crates/pt_foundation/src/error.rs

//! 基础错误
//!
//! 只描述与物理无关的失败：数据形状、索引、网格拓扑与查找。输运层在
//! `pt_transport::error` 中通过 `From<PtError>` 包装它们。
//!
//! ```
//! use pt_foundation::error::{PtError, PtResult};
//!
//! fn lookup(name: &str) -> PtResult<()> {
//!     Err(PtError::not_found(name))
//! }
//! assert!(lookup("porosity").is_err());
//! ```

use thiserror::Error;

/// 基础层结果
pub type PtResult<T> = Result<T, PtError>;

/// 基础层错误
#[allow(missing_docs)] // 字段名即含义
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PtError {
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 标量不在闭区间内，`NaN` 也归入此类
    #[error("{name} = {value} 不在 [{lo}, {hi}] 内")]
    OutOfRange {
        name: &'static str,
        value: f64,
        lo: f64,
        hi: f64,
    },

    /// 数组长度与单元数或分量数不一致
    #[error("{name} 长度为 {actual}，应为 {expected}")]
    SizeMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{kind} {index} 越界 (共 {count} 个)")]
    IndexOutOfBounds {
        kind: &'static str,
        index: usize,
        count: usize,
    },

    #[error("网格拓扑错误: {0}")]
    InvalidMesh(String),

    #[error("未找到: {0}")]
    NotFound(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

// 构造函数与变体一一对应
#[allow(missing_docs)]
impl PtError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn out_of_range(name: &'static str, value: f64, lo: f64, hi: f64) -> Self {
        Self::OutOfRange { name, value, lo, hi }
    }

    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch { name, expected, actual }
    }

    pub fn index_out_of_bounds(kind: &'static str, index: usize, count: usize) -> Self {
        Self::IndexOutOfBounds { kind, index, count }
    }

    pub fn invalid_mesh(message: impl Into<String>) -> Self {
        Self::InvalidMesh(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// 长度相等时返回 `Ok`
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> PtResult<()> {
        match expected == actual {
            true => Ok(()),
            false => Err(Self::size_mismatch(name, expected, actual)),
        }
    }

    /// `value` 位于 `[lo, hi]` 时返回 `Ok`
    #[inline]
    pub fn check_range(name: &'static str, value: f64, lo: f64, hi: f64) -> PtResult<()> {
        match (lo..=hi).contains(&value) {
            true => Ok(()),
            false => Err(Self::out_of_range(name, value, lo, hi)),
        }
    }

    #[inline]
    pub fn check_index(kind: &'static str, index: usize, count: usize) -> PtResult<()> {
        match index < count {
            true => Ok(()),
            false => Err(Self::index_out_of_bounds(kind, index, count)),
        }
    }
}

/// 条件为假时返回 `Err($err.into())`
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}

/// 取出 `Some` 中的值，`None` 时返回 `Err($err.into())`
#[macro_export]
macro_rules! require {
    ($opt:expr, $err:expr $(,)?) => {
        match $opt {
            Some(value) => value,
            None => return Err($err.into()),
        }
    };
}
