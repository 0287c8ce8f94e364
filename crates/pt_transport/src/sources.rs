// crates/pt_transport/src/sources.rs

//! 源汇项
//!
//! 每个源作用于一个组分，在区间 `[t - dtp, t]` 上给出按单元的体积速率，
//! 按类别换算为守恒量增量：
//!
//! | 类别 | 单元值 |
//! |------|--------|
//! | 抽取 (`Producer`) | `V × rate × c_prior` |
//! | 注入 (`Injector`) | `V × rate × unit_factor` |
//! | 域耦合 (`DomainCoupling`) | `rate`（不乘体积） |
//!
//! 增量为 `dtp × value`；同时按权重累计诊断速率，
//! [`SourceSinkAccumulator::commit`] 把它乘以步长计入精确质量。

use std::fmt;
use std::ops::Range;

use pt_foundation::PtError;

use crate::error::TransportResult;
use crate::mesh::{Ownership, TransportMesh};
use crate::state::MultiField;

/// 源的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// 抽取井，速率乘以当前浓度
    Producer,
    /// 注入井，给定浓度速率
    Injector,
    /// 来自其他计算域的耦合项，速率已是守恒量
    DomainCoupling,
}

/// 源数据提供者
pub trait SourceFunction: Send + Sync {
    /// 名称
    fn name(&self) -> &str;

    /// 计算区间 `[t0, t1]` 上的速率
    fn compute(&mut self, t0: f64, t1: f64) -> TransportResult<()>;

    /// 最近一次计算的结果：(单元, 速率)
    fn values(&self) -> &[(usize, f64)];
}

/// 时间函数型源
///
/// 区间内取中点时刻的速率；所有单元速率相同。
pub struct FunctionSource {
    name: String,
    cells: Vec<usize>,
    rate: Box<dyn Fn(f64) -> f64 + Send + Sync>,
    values: Vec<(usize, f64)>,
}

impl FunctionSource {
    /// 创建
    pub fn new(
        name: impl Into<String>,
        cells: Vec<usize>,
        rate: impl Fn(f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            cells,
            rate: Box::new(rate),
            values: Vec::new(),
        }
    }

    /// 常速率源
    pub fn constant(name: impl Into<String>, cells: Vec<usize>, rate: f64) -> Self {
        Self::new(name, cells, move |_| rate)
    }
}

impl fmt::Debug for FunctionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSource")
            .field("name", &self.name)
            .field("cells", &self.cells)
            .finish_non_exhaustive()
    }
}

impl SourceFunction for FunctionSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&mut self, t0: f64, t1: f64) -> TransportResult<()> {
        let rate = (self.rate)(0.5 * (t0 + t1));
        self.values.clear();
        self.values.extend(self.cells.iter().map(|&c| (c, rate)));
        Ok(())
    }

    fn values(&self) -> &[(usize, f64)] {
        &self.values
    }
}

/// 一个已注册的源
pub struct SourceSpec {
    /// 组分索引
    pub component: usize,
    /// 类别
    pub kind: SourceKind,
    /// 注入源的单位换算系数
    pub unit_factor: f64,
    /// 数据提供者
    pub function: Box<dyn SourceFunction>,
}

impl SourceSpec {
    /// 创建，单位换算系数为 1
    pub fn new(component: usize, kind: SourceKind, function: impl SourceFunction + 'static) -> Self {
        Self {
            component,
            kind,
            unit_factor: 1.0,
            function: Box::new(function),
        }
    }

    /// 设置单位换算系数
    pub fn with_unit_factor(mut self, factor: f64) -> Self {
        self.unit_factor = factor;
        self
    }
}

impl fmt::Debug for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSpec")
            .field("name", &self.function.name())
            .field("component", &self.component)
            .field("kind", &self.kind)
            .field("unit_factor", &self.unit_factor)
            .finish()
    }
}

/// 源汇累加器
#[derive(Debug, Default)]
pub struct SourceSinkAccumulator {
    sources: Vec<SourceSpec>,
    /// 当前子步内各组分的源速率（守恒量/时间）
    rate_totals: Vec<f64>,
    /// 各组分累计注入的精确质量
    exact_mass: Vec<f64>,
}

impl SourceSinkAccumulator {
    /// 创建
    pub fn new(num_components: usize) -> Self {
        Self {
            sources: Vec::new(),
            rate_totals: vec![0.0; num_components],
            exact_mass: vec![0.0; num_components],
        }
    }

    /// 注册源
    pub fn add(&mut self, spec: SourceSpec) {
        self.sources.push(spec);
    }

    /// 源个数
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// 是否没有源
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// 已注册的源
    pub fn sources(&self) -> &[SourceSpec] {
        &self.sources
    }

    /// 清零子步内的诊断速率
    pub fn reset_rates(&mut self) {
        self.rate_totals.fill(0.0);
    }

    /// 累加源项
    ///
    /// `target` 与 `prior` 只有一个分量时视为单组分向量（RK 泛函按组分调用）。
    /// 只处理组分落在 `components` 内的源。
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &mut self,
        mesh: &dyn TransportMesh,
        time: f64,
        dtp: f64,
        target: &mut MultiField,
        prior: &MultiField,
        components: Range<usize>,
        weight: f64,
    ) -> TransportResult<()> {
        let t0 = time - dtp;
        for spec in &mut self.sources {
            let i = spec.component;
            if !components.contains(&i) {
                continue;
            }
            let imap = if target.num_vectors() == 1 { 0 } else { i };
            let pmap = if prior.num_vectors() == 1 { 0 } else { i };

            spec.function.compute(t0, time)?;
            let n_all = mesh.num_cells(Ownership::All);
            for &(c, rate) in spec.function.values() {
                PtError::check_index("source cell", c, n_all)?;
                let value = match spec.kind {
                    SourceKind::Producer => mesh.cell_volume(c) * rate * prior.get(pmap, c),
                    SourceKind::Injector => mesh.cell_volume(c) * rate * spec.unit_factor,
                    SourceKind::DomainCoupling => rate,
                };
                target.add(imap, c, dtp * value);
                self.rate_totals[i] += weight * value;
            }
        }
        Ok(())
    }

    /// 把诊断速率乘以步长计入精确质量，然后清零速率
    pub fn commit(&mut self, dt: f64) {
        for (mass, rate) in self.exact_mass.iter_mut().zip(&self.rate_totals) {
            *mass += rate * dt;
        }
        self.reset_rates();
    }

    /// 抽取源在 `[t0, t1]` 上的附加外流量 `V × |rate|`（按单元）
    pub fn producer_outflux(
        &mut self,
        mesh: &dyn TransportMesh,
        t0: f64,
        t1: f64,
        num_cells: usize,
    ) -> TransportResult<Vec<f64>> {
        let mut outflux = vec![0.0; num_cells];
        for spec in &mut self.sources {
            if spec.kind != SourceKind::Producer {
                continue;
            }
            spec.function.compute(t0, t1)?;
            for &(c, rate) in spec.function.values() {
                PtError::check_index("source cell", c, num_cells)?;
                outflux[c] += mesh.cell_volume(c) * rate.abs();
            }
        }
        Ok(outflux)
    }

    /// 在时刻 `t` 计算全部源，检查单元编号都小于 `num_cells`
    pub fn check_cells(&mut self, t: f64, num_cells: usize) -> TransportResult<()> {
        for spec in &mut self.sources {
            spec.function.compute(t, t)?;
            for &(c, _) in spec.function.values() {
                PtError::check_index("source cell", c, num_cells)?;
            }
        }
        Ok(())
    }

    /// 各组分累计注入的精确质量
    pub fn exact_mass(&self) -> &[f64] {
        &self.exact_mass
    }

    /// 当前子步的诊断速率
    pub fn rate_totals(&self) -> &[f64] {
        &self.rate_totals
    }
}
