// crates/pt_transport/src/boundary.rs

//! 边界数据
//!
//! 边界提供者给出一组面及每个面上若干组分的 Dirichlet 值。
//! 每个子步在子步中点重新计算一次。
//!
//! 对流只使用入流面上的值；弥散求解中气相组分把它们作为 Dirichlet 条件。

use std::fmt;

use pt_foundation::PtError;

use crate::error::TransportResult;
use crate::mesh::TransportMesh;
use crate::numerics::gradient::BoundaryValues;
use crate::upwind::UpwindTopology;

/// 边界数据提供者
pub trait BoundaryFunction: Send + Sync {
    /// 名称
    fn name(&self) -> &str;

    /// 作用的组分索引，与 `values` 中每个面的值一一对应
    fn component_indices(&self) -> &[usize];

    /// 计算 `[t0, t1]` 上的边界值
    fn compute(&mut self, t0: f64, t1: f64) -> TransportResult<()>;

    /// 最近一次计算的结果：(面, 各组分值)
    fn values(&self) -> &[(usize, Vec<f64>)];
}

/// 时间函数型边界：每个组分一个 `f(t)`，所有面取相同值
pub struct FunctionBoundary {
    name: String,
    faces: Vec<usize>,
    components: Vec<usize>,
    value: Box<dyn Fn(usize, f64) -> f64 + Send + Sync>,
    values: Vec<(usize, Vec<f64>)>,
}

impl FunctionBoundary {
    /// 创建；`value(component, t)` 给出组分在时刻 `t` 的边界值
    pub fn new(
        name: impl Into<String>,
        faces: Vec<usize>,
        components: Vec<usize>,
        value: impl Fn(usize, f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            faces,
            components,
            value: Box::new(value),
            values: Vec::new(),
        }
    }

    /// 常值边界
    pub fn constant(name: impl Into<String>, faces: Vec<usize>, component: usize, value: f64) -> Self {
        Self::new(name, faces, vec![component], move |_, _| value)
    }
}

impl fmt::Debug for FunctionBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionBoundary")
            .field("name", &self.name)
            .field("faces", &self.faces)
            .field("components", &self.components)
            .finish_non_exhaustive()
    }
}

impl BoundaryFunction for FunctionBoundary {
    fn name(&self) -> &str {
        &self.name
    }

    fn component_indices(&self) -> &[usize] {
        &self.components
    }

    fn compute(&mut self, t0: f64, t1: f64) -> TransportResult<()> {
        let t = 0.5 * (t0 + t1);
        let row: Vec<f64> = self.components.iter().map(|&k| (self.value)(k, t)).collect();
        self.values.clear();
        self.values.extend(self.faces.iter().map(|&f| (f, row.clone())));
        Ok(())
    }

    fn values(&self) -> &[(usize, Vec<f64>)] {
        &self.values
    }
}

/// 已注册的边界提供者集合
#[derive(Default)]
pub struct BoundarySet {
    functions: Vec<Box<dyn BoundaryFunction>>,
}

impl fmt::Debug for BoundarySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.functions.iter().map(|b| b.name()))
            .finish()
    }
}

impl BoundarySet {
    /// 创建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册
    pub fn add(&mut self, function: impl BoundaryFunction + 'static) {
        self.functions.push(Box::new(function));
    }

    /// 个数
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// 在时刻 `t` 计算全部边界
    pub fn compute(&mut self, t: f64) -> TransportResult<()> {
        for function in &mut self.functions {
            function.compute(t, t)?;
        }
        Ok(())
    }

    /// 检查最近一次计算出的面编号都小于 `num_faces`
    pub fn check_faces(&self, num_faces: usize) -> TransportResult<()> {
        for function in &self.functions {
            for (f, _) in function.values() {
                PtError::check_index("boundary face", *f, num_faces)?;
            }
        }
        Ok(())
    }

    /// 遍历 (面, 组分, 值)
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.functions.iter().flat_map(|function| {
            let components = function.component_indices();
            function.values().iter().flat_map(move |(f, row)| {
                components
                    .iter()
                    .zip(row)
                    .map(move |(&k, &v)| (*f, k, v))
            })
        })
    }

    /// 组分 `component` 的边界值；同一面被多次指定时后者覆盖前者
    pub fn values_for(&self, component: usize) -> BoundaryValues {
        self.iter()
            .filter(|&(_, k, _)| k == component)
            .map(|(f, _, v)| (f, v))
            .collect()
    }

    /// 找出定义在出流面上的边界，返回 (提供者名称, 面)
    ///
    /// 出流面上的值不会进入对流计算。
    pub fn outflow_faces(&self, mesh: &dyn TransportMesh, upwind: &UpwindTopology) -> Vec<(String, usize)> {
        let mut found = Vec::new();
        for function in &self.functions {
            for (f, _) in function.values() {
                let face = upwind.face(*f);
                let interior_upwind = face
                    .upwind
                    .iter()
                    .any(|e| e.cell.is_some() && e.flux > 0.0);
                if mesh.is_boundary_face(*f) && interior_upwind {
                    found.push((function.name().to_string(), *f));
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Ownership, UnstructuredMesh};
    use crate::state::FaceFlux;

    #[test]
    fn test_constant_boundary() {
        let mut set = BoundarySet::new();
        set.add(FunctionBoundary::constant("inlet", vec![0], 1, 2.5));
        set.compute(0.0).unwrap();

        let v = set.values_for(1);
        assert_eq!(v.get(&0), Some(&2.5));
        assert!(set.values_for(0).is_empty());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_time_dependent_multi_component() {
        let mut b = FunctionBoundary::new("ramp", vec![0, 3], vec![0, 2], |k, t| k as f64 + t);
        b.compute(1.0, 3.0).unwrap();
        assert_eq!(b.values().len(), 2);
        assert_eq!(b.values()[1], (3, vec![2.0, 4.0]));
    }

    #[test]
    fn test_later_boundary_overrides() {
        let mut set = BoundarySet::new();
        set.add(FunctionBoundary::constant("a", vec![0], 0, 1.0));
        set.add(FunctionBoundary::constant("b", vec![0], 0, 2.0));
        set.compute(0.0).unwrap();
        assert_eq!(set.values_for(0).get(&0), Some(&2.0));
    }

    #[test]
    fn test_outflow_face_detection() {
        let mesh = UnstructuredMesh::column_1d(3, 3.0, 1.0).unwrap();
        let nf = mesh.num_faces(Ownership::All);
        let upwind = UpwindTopology::rebuild(&mesh, &FaceFlux::uniform(vec![1.0; nf])).unwrap();

        let mut set = BoundarySet::new();
        set.add(FunctionBoundary::constant("inlet", vec![0], 0, 1.0));
        set.add(FunctionBoundary::constant("outlet", vec![3], 0, 1.0));
        set.compute(0.0).unwrap();

        assert_eq!(set.outflow_faces(&mesh, &upwind), vec![("outlet".to_string(), 3)]);
    }

    #[test]
    fn test_face_ids_checked_against_mesh() {
        let mut set = BoundarySet::new();
        set.add(FunctionBoundary::constant("inlet", vec![0, 4], 0, 1.0));
        set.compute(0.0).unwrap();
        assert!(set.check_faces(5).is_ok());
        assert!(set.check_faces(4).is_err());
    }
}
