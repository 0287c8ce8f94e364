// crates/pt_transport/src/numerics/limiter/mod.rs

//! # 梯度限制器
//!
//! - [`SlopeLimiter`]: 限制器 trait
//! - [`NoLimiter`]: 不限制
//! - [`BarthJespersen`]: 严格保界
//! - [`Venkatakrishnan`]: 光滑
//!
//! | 限制器 | 耗散性 | 光滑性 |
//! |--------|--------|--------|
//! | Barth-Jespersen | 中等 | 不光滑 |
//! | Venkatakrishnan | 低 | 光滑 |

mod barth_jespersen;
mod traits;
mod venkatakrishnan;

pub use barth_jespersen::BarthJespersen;
pub use traits::{LimiterContext, NoLimiter, SlopeLimiter};
pub use venkatakrishnan::Venkatakrishnan;

use crate::config::LimiterKind;

/// 根据配置创建限制器
pub fn create_limiter(kind: LimiterKind) -> Box<dyn SlopeLimiter> {
    match kind {
        LimiterKind::BarthJespersen => Box::new(BarthJespersen::new()),
        LimiterKind::Venkatakrishnan { k } => Box::new(Venkatakrishnan::new(k)),
        LimiterKind::Unlimited => Box::new(NoLimiter),
    }
}
