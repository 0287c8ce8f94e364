// crates/pt_transport/src/error.rs

//! 输运求解错误类型
//!
//! 错误分三类向上传播：
//!
//! - 配置错误（[`ConfigError`]）：在 `setup`/`initialize` 阶段检测，致命
//! - 线性求解错误：隐式弥散求解返回负状态码，解码为类别后致命
//! - 物理一致性错误：极值递减性质检查，默认只警告，可配置为致命
//!
//! 退化输入（零外流、零下游通量）由数值保护处理，不产生错误。

use pt_foundation::PtError;
use thiserror::Error;

use crate::numerics::linear_algebra::SolverErrorCategory;

/// 输运结果类型
pub type TransportResult<T> = Result<T, TransportError>;

/// 配置错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 缺少必需的配置项
    #[error("缺少必需的配置项: {key}")]
    Missing {
        /// 配置键名
        key: String,
    },

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    Invalid {
        /// 配置键名
        key: String,
        /// 配置值
        value: String,
        /// 无效原因说明
        reason: String,
    },

    /// 未实现的离散组合
    #[error("未实现的离散组合: 空间 {spatial} 阶 + 时间 {temporal} 阶 ({topology})")]
    UnsupportedScheme {
        /// 空间离散阶数
        spatial: u32,
        /// 时间离散阶数
        temporal: u32,
        /// 拓扑类别
        topology: &'static str,
    },

    /// 未知组分
    #[error("未知组分: {name}")]
    UnknownComponent {
        /// 组分名
        name: String,
    },

    /// JSON 解析失败
    #[error("配置解析失败: {0}")]
    Parse(String),
}

impl ConfigError {
    /// 缺少配置
    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing { key: key.into() }
    }

    /// 配置值无效
    pub fn invalid(
        key: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::Invalid {
            key: key.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// 输运求解错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 基础层错误
    #[error(transparent)]
    Foundation(#[from] PtError),

    /// 场不存在
    #[error("状态中缺少场: {key}")]
    MissingField {
        /// 场键名
        key: String,
    },

    /// 场的所有者冲突
    #[error("场 {key} 已由 {owner} 注册，{requester} 不能以不同布局重复注册")]
    FieldConflict {
        /// 场键名
        key: String,
        /// 已有所有者
        owner: String,
        /// 请求者
        requester: String,
    },

    /// 线性求解失败
    #[error("弥散求解器 {solver} 失败 (code={code}): {category}")]
    LinearSolver {
        /// 求解器名称
        solver: String,
        /// 错误类别
        category: SolverErrorCategory,
        /// 原始状态码
        code: i32,
    },

    /// 违反极值递减性质
    #[error("组分 {component} 在单元 {cell} 违反极值递减性质: {value:.6e} 不在 [{lower:.6e}, {upper:.6e}] 内")]
    ExtremaViolation {
        /// 组分索引
        component: usize,
        /// 单元索引
        cell: usize,
        /// 更新后的值
        value: f64,
        /// 允许下界
        lower: f64,
        /// 允许上界
        upper: f64,
    },

    /// 浓度为负
    #[error("组分 {component} 出现负浓度 {value:.6e} (单元 {cell})")]
    NegativeConcentration {
        /// 组分索引
        component: usize,
        /// 单元索引
        cell: usize,
        /// 最小值
        value: f64,
    },

    /// 外部数据提供者失败
    #[error("数据提供者 {name} 失败: {message}")]
    Provider {
        /// 提供者名称
        name: String,
        /// 错误信息
        message: String,
    },

    /// 生命周期使用错误
    #[error("调用顺序错误: {0}")]
    Lifecycle(String),
}

impl TransportError {
    /// 场不存在
    pub fn missing_field(key: impl Into<String>) -> Self {
        Self::MissingField { key: key.into() }
    }

    /// 数据提供者失败
    pub fn provider(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            name: name.into(),
            message: message.into(),
        }
    }

    /// 由求解器负状态码构造
    pub fn linear_solver(solver: impl Into<String>, code: i32) -> Self {
        Self::LinearSolver {
            solver: solver.into(),
            category: SolverErrorCategory::decode(code),
            code,
        }
    }

    /// 是否为配置错误
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
