// crates/pt_transport/src/config.rs

//! 输运求解配置
//!
//! 单一配置结构 [`TransportConfig`]，默认值只在这里定义一次。
//! 可以通过 serde 从 JSON 加载：
//!
//! ```json
//! {
//!   "component_names": ["Tc-99", "CO2(g)"],
//!   "num_aqueous": 1,
//!   "cfl": 0.9,
//!   "spatial_discretization_order": 2,
//!   "temporal_discretization_order": 2
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::timestep::LARGE_TIME_STEP;

// ============================================================
// 默认值
// ============================================================

fn default_true() -> bool {
    true
}

fn default_domain_name() -> String {
    "domain".to_string()
}

fn default_cfl() -> f64 {
    1.0
}

fn default_order() -> u32 {
    1
}

fn default_max_time_step() -> f64 {
    LARGE_TIME_STEP
}

fn default_venkatakrishnan_k() -> f64 {
    0.3
}

fn default_solver_name() -> String {
    "pcg".to_string()
}

fn default_solver_rtol() -> f64 {
    1e-12
}

fn default_solver_atol() -> f64 {
    1e-30
}

fn default_solver_max_iterations() -> usize {
    1000
}

fn default_tests_tolerance() -> f64 {
    1e-8
}

// ============================================================
// 枚举
// ============================================================

/// 输出详细程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// 不输出
    None,
    /// 只输出警告
    #[default]
    Low,
    /// 子循环统计、求解器统计、溶质极值
    Medium,
    /// 限制时间步的单元
    High,
    /// 全部
    Extreme,
}

/// 多尺度孔隙模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiscaleModel {
    /// 单一连续介质
    #[default]
    Single,
    /// 裂隙 + 不连续基质的双重连续介质
    DualDiscontinuous,
}

/// 梯度限制器
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LimiterKind {
    /// Barth-Jespersen（严格保界）
    BarthJespersen,
    /// Venkatakrishnan（光滑）
    Venkatakrishnan {
        /// K 参数
        #[serde(default = "default_venkatakrishnan_k")]
        k: f64,
    },
    /// 不限制
    Unlimited,
}

impl Default for LimiterKind {
    fn default() -> Self {
        Self::BarthJespersen
    }
}

/// 机械弥散模型
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispersionModel {
    /// 无机械弥散
    #[default]
    None,
    /// 各向同性：D = α |v| I
    Scalar {
        /// 弥散度 [m]
        alpha: f64,
    },
    /// Bear 模型：纵向/横向弥散度
    Bear {
        /// 纵向弥散度 [m]
        alpha_l: f64,
        /// 横向弥散度 [m]
        alpha_t: f64,
    },
    /// Burnett-Frind 模型：区分水平/垂直横向弥散度
    BurnettFrind {
        /// 纵向弥散度 [m]
        alpha_l: f64,
        /// 水平横向弥散度 [m]
        alpha_th: f64,
        /// 垂直横向弥散度 [m]
        alpha_tv: f64,
    },
}

impl DispersionModel {
    /// 是否产生机械弥散
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::None)
    }

    fn dispersivities(&self) -> Vec<f64> {
        match *self {
            Self::None => Vec::new(),
            Self::Scalar { alpha } => vec![alpha],
            Self::Bear { alpha_l, alpha_t } => vec![alpha_l, alpha_t],
            Self::BurnettFrind {
                alpha_l,
                alpha_th,
                alpha_tv,
            } => vec![alpha_l, alpha_th, alpha_tv],
        }
    }
}

/// 基质侧闭合模型
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatrixClosure {
    /// 单节点一阶传质
    DualPorosity {
        /// 传质系数 [1/s]
        mass_transfer_coefficient: f64,
    },
    /// 多节点一维基质扩散
    GeneralizedDualPorosity {
        /// 基质节点数
        num_nodes: usize,
        /// 基质块半厚度 [m]
        matrix_depth: f64,
        /// 基质曲折度
        tortuosity: f64,
        /// 分子扩散系数 [m²/s]
        molecular_diffusion: f64,
    },
}

impl Default for MatrixClosure {
    fn default() -> Self {
        Self::DualPorosity {
            mass_transfer_coefficient: 0.0,
        }
    }
}

// ============================================================
// 子配置
// ============================================================

/// 一种材料的弥散/扩散参数
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MaterialProperties {
    /// 材料名
    #[serde(default)]
    pub name: String,
    /// 机械弥散模型
    #[serde(default)]
    pub model: DispersionModel,
    /// 液相曲折度
    #[serde(default)]
    pub tau_aqueous: f64,
    /// 气相曲折度
    #[serde(default)]
    pub tau_gas: f64,
    /// 适用单元（本地索引）；为空表示全部单元
    #[serde(default)]
    pub cells: Option<Vec<usize>>,
}

/// 弥散配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DispersionConfig {
    /// 材料列表，后出现的材料覆盖先出现的
    #[serde(default)]
    pub materials: Vec<MaterialProperties>,
}

impl DispersionConfig {
    /// 是否存在机械弥散
    pub fn has_mechanical_dispersion(&self) -> bool {
        self.materials.iter().any(|m| m.model.is_active())
    }

    /// 所有材料曲折度之和
    pub fn total_tortuosity(&self) -> f64 {
        self.materials
            .iter()
            .map(|m| m.tau_aqueous + m.tau_gas)
            .sum()
    }
}

/// 分子扩散系数（按组分名）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MolecularDiffusion {
    /// 液相组分扩散系数 [m²/s]
    #[serde(default)]
    pub aqueous: BTreeMap<String, f64>,
    /// 气相组分扩散系数 [m²/s]
    #[serde(default)]
    pub gaseous: BTreeMap<String, f64>,
}

impl MolecularDiffusion {
    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.aqueous.is_empty() && self.gaseous.is_empty()
    }

    /// 查找组分的扩散系数，未配置返回 0
    pub fn value(&self, name: &str) -> f64 {
        self.aqueous
            .get(name)
            .or_else(|| self.gaseous.get(name))
            .copied()
            .unwrap_or(0.0)
    }
}

/// 预条件器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreconditionerKind {
    /// 单位预条件
    Identity,
    /// Jacobi 对角预条件
    #[default]
    Jacobi,
}

/// 弥散线性求解器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSolverConfig {
    /// 求解器名称
    #[serde(default = "default_solver_name")]
    pub name: String,
    /// 预条件器
    #[serde(default)]
    pub preconditioner: PreconditionerKind,
    /// 相对残差容差
    #[serde(default = "default_solver_rtol")]
    pub rtol: f64,
    /// 绝对残差容差
    #[serde(default = "default_solver_atol")]
    pub atol: f64,
    /// 最大迭代次数
    #[serde(default = "default_solver_max_iterations")]
    pub max_iterations: usize,
}

impl Default for LinearSolverConfig {
    fn default() -> Self {
        Self {
            name: default_solver_name(),
            preconditioner: PreconditionerKind::default(),
            rtol: default_solver_rtol(),
            atol: default_solver_atol(),
            max_iterations: default_solver_max_iterations(),
        }
    }
}

/// 双重孔隙配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MultiscaleConfig {
    /// 基质闭合模型
    #[serde(default)]
    pub closure: MatrixClosure,
}

/// 内部自检
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InternalTests {
    /// 每个子步后检查极值递减性质与非负性
    #[serde(default)]
    pub enabled: bool,
    /// 违反时返回错误而不是警告
    #[serde(default)]
    pub fatal: bool,
    /// 越界容差
    #[serde(default = "default_tests_tolerance")]
    pub tolerance: f64,
}

impl Default for InternalTests {
    fn default() -> Self {
        Self {
            enabled: false,
            fatal: false,
            tolerance: default_tests_tolerance(),
        }
    }
}

// ============================================================
// 主配置
// ============================================================

/// 输运求解配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// 组分名称（必需）；前 `num_aqueous` 个为液相组分
    #[serde(default)]
    pub component_names: Vec<String>,
    /// 液相组分个数，缺省时全部为液相
    #[serde(default)]
    pub num_aqueous: Option<usize>,
    /// 是否允许子循环
    #[serde(default = "default_true")]
    pub subcycling: bool,
    /// 计算域名称
    #[serde(default = "default_domain_name")]
    pub domain_name: String,
    /// CFL 安全系数 (0, 1]
    #[serde(default = "default_cfl")]
    pub cfl: f64,
    /// 空间离散阶数 (1 或 2)
    #[serde(default = "default_order")]
    pub spatial_discretization_order: u32,
    /// 时间离散阶数 (1..=4)
    #[serde(default = "default_order")]
    pub temporal_discretization_order: u32,
    /// 调试用时间步上限
    #[serde(default = "default_max_time_step")]
    pub maximum_time_step: f64,
    /// 二阶重构的梯度限制器
    #[serde(default)]
    pub limiter: LimiterKind,
    /// 弥散/扩散材料参数
    #[serde(default, alias = "dispersion_model")]
    pub dispersion: Option<DispersionConfig>,
    /// 分子扩散系数
    #[serde(default)]
    pub molecular_diffusion: MolecularDiffusion,
    /// 弥散线性求解器
    #[serde(default)]
    pub dispersion_solver: LinearSolverConfig,
    /// 多尺度孔隙模型
    #[serde(default)]
    pub multiscale_model: MultiscaleModel,
    /// 双重孔隙参数
    #[serde(default)]
    pub multiscale: MultiscaleConfig,
    /// 内部自检
    #[serde(default)]
    pub internal_tests: InternalTests,
    /// 输出详细程度
    #[serde(default)]
    pub verbosity: Verbosity,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl TransportConfig {
    /// 以默认参数创建配置
    pub fn new(component_names: Vec<String>) -> Self {
        Self {
            component_names,
            num_aqueous: None,
            subcycling: true,
            domain_name: default_domain_name(),
            cfl: default_cfl(),
            spatial_discretization_order: default_order(),
            temporal_discretization_order: default_order(),
            maximum_time_step: default_max_time_step(),
            limiter: LimiterKind::default(),
            dispersion: None,
            molecular_diffusion: MolecularDiffusion::default(),
            dispersion_solver: LinearSolverConfig::default(),
            multiscale_model: MultiscaleModel::default(),
            multiscale: MultiscaleConfig::default(),
            internal_tests: InternalTests::default(),
            verbosity: Verbosity::default(),
        }
    }

    /// 从 JSON 字符串解析并校验
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 设置 CFL 系数
    pub fn with_cfl(mut self, cfl: f64) -> Self {
        self.cfl = cfl;
        self
    }

    /// 设置离散阶数
    pub fn with_orders(mut self, spatial: u32, temporal: u32) -> Self {
        self.spatial_discretization_order = spatial;
        self.temporal_discretization_order = temporal;
        self
    }

    /// 设置液相组分个数
    pub fn with_num_aqueous(mut self, num_aqueous: usize) -> Self {
        self.num_aqueous = Some(num_aqueous);
        self
    }

    /// 设置弥散参数
    pub fn with_dispersion(mut self, dispersion: DispersionConfig) -> Self {
        self.dispersion = Some(dispersion);
        self
    }

    /// 组分总数
    pub fn num_components(&self) -> usize {
        self.component_names.len()
    }

    /// 液相组分个数
    pub fn num_aqueous(&self) -> usize {
        self.num_aqueous.unwrap_or(self.component_names.len())
    }

    /// 气相组分个数
    pub fn num_gaseous(&self) -> usize {
        self.num_components() - self.num_aqueous()
    }

    /// 按名称查找组分索引
    pub fn component_index(&self, name: &str) -> Result<usize, ConfigError> {
        self.component_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ConfigError::UnknownComponent {
                name: name.to_string(),
            })
    }

    /// 是否需要隐式弥散/扩散求解
    pub fn dispersion_active(&self) -> bool {
        match &self.dispersion {
            Some(d) => {
                let diffusion = !self.molecular_diffusion.is_empty() && d.total_tortuosity() > 0.0;
                d.has_mechanical_dispersion() || diffusion
            }
            None => false,
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.component_names.is_empty() {
            return Err(ConfigError::missing("component_names"));
        }

        let mut seen = BTreeSet::new();
        for name in &self.component_names {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::invalid("component_names", name, "组分名重复"));
            }
        }

        if let Some(n) = self.num_aqueous {
            if n > self.component_names.len() {
                return Err(ConfigError::invalid(
                    "num_aqueous",
                    n,
                    format!("不能超过组分总数 {}", self.component_names.len()),
                ));
            }
        }

        if !(self.cfl > 0.0 && self.cfl <= 1.0) {
            return Err(ConfigError::invalid("cfl", self.cfl, "必须位于 (0, 1]"));
        }

        if !(self.maximum_time_step > 0.0) {
            return Err(ConfigError::invalid(
                "maximum_time_step",
                self.maximum_time_step,
                "必须为正",
            ));
        }

        let spatial = self.spatial_discretization_order;
        let temporal = self.temporal_discretization_order;
        let supported = matches!((spatial, temporal), (1, 1) | (2, 1..=4));
        if !supported {
            return Err(ConfigError::UnsupportedScheme {
                spatial,
                temporal,
                topology: "any",
            });
        }

        if let LimiterKind::Venkatakrishnan { k } = self.limiter {
            if !(k > 0.0) {
                return Err(ConfigError::invalid("limiter.k", k, "必须为正"));
            }
        }

        if let Some(dispersion) = &self.dispersion {
            for material in &dispersion.materials {
                if material.model.dispersivities().iter().any(|a| *a < 0.0) {
                    return Err(ConfigError::invalid(
                        "dispersion.materials.model",
                        &material.name,
                        "弥散度不能为负",
                    ));
                }
                if material.tau_aqueous < 0.0 || material.tau_gas < 0.0 {
                    return Err(ConfigError::invalid(
                        "dispersion.materials.tau",
                        &material.name,
                        "曲折度不能为负",
                    ));
                }
            }
        }

        for (name, value) in self
            .molecular_diffusion
            .aqueous
            .iter()
            .chain(self.molecular_diffusion.gaseous.iter())
        {
            self.component_index(name)?;
            if *value < 0.0 {
                return Err(ConfigError::invalid("molecular_diffusion", name, "扩散系数不能为负"));
            }
        }

        if self.dispersion_solver.max_iterations == 0 {
            return Err(ConfigError::invalid("dispersion_solver.max_iterations", 0, "必须为正"));
        }

        if self.multiscale_model == MultiscaleModel::DualDiscontinuous {
            match self.multiscale.closure {
                MatrixClosure::DualPorosity {
                    mass_transfer_coefficient,
                } if mass_transfer_coefficient < 0.0 => {
                    return Err(ConfigError::invalid(
                        "multiscale.closure.mass_transfer_coefficient",
                        mass_transfer_coefficient,
                        "不能为负",
                    ));
                }
                MatrixClosure::GeneralizedDualPorosity {
                    num_nodes,
                    matrix_depth,
                    ..
                } if num_nodes == 0 || !(matrix_depth > 0.0) => {
                    return Err(ConfigError::invalid(
                        "multiscale.closure",
                        format!("num_nodes={num_nodes}, matrix_depth={matrix_depth}"),
                        "节点数与基质厚度必须为正",
                    ));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::new(vec!["A".into()]);
        assert!(config.subcycling);
        assert_eq!(config.domain_name, "domain");
        assert_eq!(config.cfl, 1.0);
        assert_eq!(config.multiscale_model, MultiscaleModel::Single);
        assert!(config.dispersion.is_none());
        assert_eq!(config.maximum_time_step, LARGE_TIME_STEP);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_component_names() {
        let err = TransportConfig::from_json_str("{}").unwrap_err();
        assert_eq!(err, ConfigError::missing("component_names"));
    }

    #[test]
    fn test_json_defaults_match_new() {
        let parsed = TransportConfig::from_json_str(r#"{"component_names": ["A", "B"]}"#).unwrap();
        assert_eq!(parsed, TransportConfig::new(vec!["A".into(), "B".into()]));
        assert_eq!(parsed.num_aqueous(), 2);
        assert_eq!(parsed.num_gaseous(), 0);
    }

    #[test]
    fn test_json_full() {
        let text = r#"{
            "component_names": ["Tc-99", "CO2(g)"],
            "num_aqueous": 1,
            "subcycling": false,
            "cfl": 0.5,
            "spatial_discretization_order": 2,
            "temporal_discretization_order": 3,
            "limiter": {"type": "venkatakrishnan"},
            "dispersion_model": {
                "materials": [{"name": "soil", "model": {"type": "bear", "alpha_l": 0.1, "alpha_t": 0.01},
                               "tau_aqueous": 0.5, "tau_gas": 0.3}]
            },
            "molecular_diffusion": {"aqueous": {"Tc-99": 1e-9}, "gaseous": {"CO2(g)": 1e-5}},
            "multiscale_model": "dual_discontinuous",
            "multiscale": {"closure": {"type": "dual_porosity", "mass_transfer_coefficient": 1e-3}},
            "verbosity": "high"
        }"#;
        let config = TransportConfig::from_json_str(text).unwrap();
        assert_eq!(config.num_aqueous(), 1);
        assert_eq!(config.num_gaseous(), 1);
        assert!(!config.subcycling);
        assert_eq!(config.limiter, LimiterKind::Venkatakrishnan { k: 0.3 });
        assert!(config.dispersion_active());
        assert_eq!(config.molecular_diffusion.value("CO2(g)"), 1e-5);
        assert_eq!(config.molecular_diffusion.value("unknown"), 0.0);
        assert_eq!(config.multiscale_model, MultiscaleModel::DualDiscontinuous);
        assert!(config.verbosity >= Verbosity::Medium);
    }

    #[test]
    fn test_unsupported_scheme() {
        let config = TransportConfig::new(vec!["A".into()]).with_orders(1, 2);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedScheme { spatial: 1, temporal: 2, .. })
        ));

        let config = TransportConfig::new(vec!["A".into()]).with_orders(3, 1);
        assert!(config.validate().is_err());

        let config = TransportConfig::new(vec!["A".into()]).with_orders(2, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let base = TransportConfig::new(vec!["A".into()]);
        assert!(base.clone().with_cfl(0.0).validate().is_err());
        assert!(base.clone().with_cfl(1.2).validate().is_err());
        assert!(base.clone().with_num_aqueous(2).validate().is_err());

        let duplicated = TransportConfig::new(vec!["A".into(), "A".into()]);
        assert!(duplicated.validate().is_err());

        let mut unknown = base.clone();
        unknown.molecular_diffusion.aqueous.insert("B".into(), 1e-9);
        assert_eq!(
            unknown.validate(),
            Err(ConfigError::UnknownComponent { name: "B".into() })
        );
    }

    #[test]
    fn test_dispersion_activity() {
        let mut config = TransportConfig::new(vec!["A".into()]);
        assert!(!config.dispersion_active());

        // 只有扩散系数而曲折度为零时不激活
        config.molecular_diffusion.aqueous.insert("A".into(), 1e-9);
        config.dispersion = Some(DispersionConfig {
            materials: vec![MaterialProperties::default()],
        });
        assert!(!config.dispersion_active());

        config.dispersion.as_mut().unwrap().materials[0].tau_aqueous = 1.0;
        assert!(config.dispersion_active());
    }
}
