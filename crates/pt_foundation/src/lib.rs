// crates/pt_foundation/src/lib.rs

//! PoroTrans Foundation Layer
//!
//! 基础层，提供整个项目共享的错误类型与数值工具。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型和 `ensure!`/`require!` 宏
//! - [`float`]: 数值常量、安全除法和区间类型
//!
//! # 示例
//!
//! ```
//! use pt_foundation::error::{PtError, PtResult};
//! use pt_foundation::float::safe_div;
//!
//! fn ratio(a: f64, b: f64) -> PtResult<f64> {
//!     pt_foundation::ensure!(b >= 0.0, PtError::invalid_input("分母不能为负"));
//!     Ok(safe_div(a, b, 0.0))
//! }
//!
//! assert_eq!(ratio(1.0, 2.0).unwrap(), 0.5);
//! assert!(ratio(1.0, -2.0).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod float;

// 重导出常用类型
pub use error::{PtError, PtResult};
pub use float::{approx_eq, safe_div, Bounds};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{PtError, PtResult};
    pub use crate::float::{approx_eq, safe_div, Bounds};
    pub use crate::{ensure, require};
}
