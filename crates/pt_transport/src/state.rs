// crates/pt_transport/src/state.rs

//! 场存储
//!
//! 以字符串键存取单元/面场，每个场按分量存储，覆盖 ALL（owned + ghost）实体。
//! 通量场可以每个面有多个自由度，由 [`FaceDofMap`] 给出偏移与个数。
//!
//! ghost 副本只有在显式调用 [`FieldStore::scatter`] 之后才与所有者一致。

use std::collections::BTreeMap;
use std::sync::Arc;

use pt_foundation::{Bounds, PtError, PtResult};
use serde::{Deserialize, Serialize};

use crate::comm::Communicator;
use crate::error::{TransportError, TransportResult};

/// 常用场键名
pub mod keys {
    /// 总组分浓度（组分 × 单元）
    pub const TOTAL_COMPONENT_CONCENTRATION: &str = "total_component_concentration";
    /// 达西通量（面自由度）
    pub const DARCY_FLUX: &str = "darcy_flux";
    /// 孔隙度
    pub const POROSITY: &str = "porosity";
    /// 外层区间末的液相饱和度
    pub const SATURATION_LIQUID: &str = "saturation_liquid";
    /// 外层区间初的液相饱和度
    pub const PREV_SATURATION_LIQUID: &str = "prev_saturation_liquid";
    /// 基质浓度（组分 × 节点，按单元展开）
    pub const TCC_MATRIX: &str = "total_component_concentration_matrix";
    /// 基质孔隙度
    pub const POROSITY_MATRIX: &str = "porosity_matrix";
    /// 外层区间末的基质饱和度
    pub const SATURATION_LIQUID_MATRIX: &str = "saturation_liquid_matrix";
    /// 外层区间初的基质饱和度
    pub const PREV_SATURATION_LIQUID_MATRIX: &str = "prev_saturation_liquid_matrix";
}

/// 场所在的网格实体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldLocation {
    /// 单元
    Cell,
    /// 面
    Face,
}

// ============================================================
// 多分量场
// ============================================================

/// 多分量场：`num_vectors` 个分量，每个分量 `len` 个值
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MultiField {
    num_vectors: usize,
    len: usize,
    data: Vec<f64>,
}

impl MultiField {
    /// 全零场
    pub fn new(num_vectors: usize, len: usize) -> Self {
        Self::filled(num_vectors, len, 0.0)
    }

    /// 常值场
    pub fn filled(num_vectors: usize, len: usize, value: f64) -> Self {
        Self {
            num_vectors,
            len,
            data: vec![value; num_vectors * len],
        }
    }

    /// 从分量列表构造，要求各分量等长
    pub fn from_components(components: Vec<Vec<f64>>) -> PtResult<Self> {
        let num_vectors = components.len();
        let len = components.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(num_vectors * len);
        for component in components {
            PtError::check_size("MultiField component", len, component.len())?;
            data.extend(component);
        }
        Ok(Self {
            num_vectors,
            len,
            data,
        })
    }

    /// 分量个数
    #[inline]
    pub fn num_vectors(&self) -> usize {
        self.num_vectors
    }

    /// 每个分量的长度
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 第 `i` 个分量
    #[inline]
    pub fn component(&self, i: usize) -> &[f64] {
        &self.data[i * self.len..(i + 1) * self.len]
    }

    /// 第 `i` 个分量（可变）
    #[inline]
    pub fn component_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.len..(i + 1) * self.len]
    }

    /// 读取 (分量, 实体)
    #[inline]
    pub fn get(&self, i: usize, entity: usize) -> f64 {
        self.data[i * self.len + entity]
    }

    /// 写入 (分量, 实体)
    #[inline]
    pub fn set(&mut self, i: usize, entity: usize, value: f64) {
        self.data[i * self.len + entity] = value;
    }

    /// 累加到 (分量, 实体)
    #[inline]
    pub fn add(&mut self, i: usize, entity: usize, value: f64) {
        self.data[i * self.len + entity] += value;
    }

    /// 全部数据
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// 全部数据（可变）
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// 填充常值
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// 从同形状的场复制
    pub fn copy_from(&mut self, other: &MultiField) -> PtResult<()> {
        PtError::check_size("MultiField vectors", self.num_vectors, other.num_vectors)?;
        PtError::check_size("MultiField length", self.len, other.len)?;
        self.data.copy_from_slice(&other.data);
        Ok(())
    }

    /// 分量 `i` 在前 `n` 个实体上的极值
    pub fn bounds(&self, i: usize, n: usize) -> Bounds {
        self.component(i)[..n].iter().copied().collect()
    }
}

// ============================================================
// 面自由度映射与通量
// ============================================================

/// 面自由度映射：面 `f` 的自由度为 `first(f)..first(f) + size(f)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceDofMap {
    offsets: Vec<usize>,
}

impl FaceDofMap {
    /// 每个面一个自由度
    pub fn uniform(num_faces: usize) -> Self {
        Self {
            offsets: (0..=num_faces).collect(),
        }
    }

    /// 按每个面的自由度个数构造
    pub fn from_sizes(sizes: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(sizes.len() + 1);
        let mut acc = 0;
        offsets.push(0);
        for &size in sizes {
            acc += size;
            offsets.push(acc);
        }
        Self { offsets }
    }

    /// 面数
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.offsets.len() - 1
    }

    /// 面 `f` 的第一个自由度
    #[inline]
    pub fn first(&self, f: usize) -> usize {
        self.offsets[f]
    }

    /// 面 `f` 的自由度个数
    #[inline]
    pub fn size(&self, f: usize) -> usize {
        self.offsets[f + 1] - self.offsets[f]
    }

    /// 自由度总数
    #[inline]
    pub fn total(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }
}

/// 面通量：按 [`FaceDofMap`] 排布的有符号体积流量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceFlux {
    dofs: FaceDofMap,
    values: Vec<f64>,
}

impl FaceFlux {
    /// 构造并检查长度
    pub fn new(dofs: FaceDofMap, values: Vec<f64>) -> PtResult<Self> {
        PtError::check_size("darcy_flux", dofs.total(), values.len())?;
        Ok(Self { dofs, values })
    }

    /// 每面一个自由度
    pub fn uniform(values: Vec<f64>) -> Self {
        Self {
            dofs: FaceDofMap::uniform(values.len()),
            values,
        }
    }

    /// 自由度映射
    #[inline]
    pub fn dofs(&self) -> &FaceDofMap {
        &self.dofs
    }

    /// 全部通量值
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// 面 `f` 第 `k` 个自由度的通量
    #[inline]
    pub fn value(&self, f: usize, k: usize) -> f64 {
        self.values[self.dofs.first(f) + k]
    }

    /// 所有通量乘以常数
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.values {
            *v *= factor;
        }
    }
}

// ============================================================
// 场与场存储
// ============================================================

/// 一个已注册的场
#[derive(Debug, Clone)]
pub struct Field {
    /// 所在实体
    pub location: FieldLocation,
    /// 数据
    pub values: MultiField,
    /// 面自由度映射（仅面场）
    pub dof_map: Option<FaceDofMap>,
    /// 注册者
    pub owner: String,
    /// 是否已初始化
    pub initialized: bool,
}

/// 键值场存储，带 ghost 同步
#[derive(Debug)]
pub struct FieldStore {
    comm: Arc<dyn Communicator>,
    fields: BTreeMap<String, Field>,
    window: Option<(f64, f64)>,
}

impl FieldStore {
    /// 创建空存储
    pub fn new(comm: Arc<dyn Communicator>) -> Self {
        Self {
            comm,
            fields: BTreeMap::new(),
            window: None,
        }
    }

    /// 通信器
    pub fn comm(&self) -> &Arc<dyn Communicator> {
        &self.comm
    }

    /// 注册单元场；已存在且布局一致时直接返回
    pub fn require_cell_field(
        &mut self,
        key: &str,
        owner: &str,
        num_vectors: usize,
        num_cells: usize,
    ) -> TransportResult<()> {
        self.require(key, owner, FieldLocation::Cell, MultiField::new(num_vectors, num_cells), None)
    }

    /// 注册面场
    pub fn require_face_field(
        &mut self,
        key: &str,
        owner: &str,
        dofs: FaceDofMap,
    ) -> TransportResult<()> {
        let values = MultiField::new(1, dofs.total());
        self.require(key, owner, FieldLocation::Face, values, Some(dofs))
    }

    fn require(
        &mut self,
        key: &str,
        owner: &str,
        location: FieldLocation,
        values: MultiField,
        dof_map: Option<FaceDofMap>,
    ) -> TransportResult<()> {
        if let Some(existing) = self.fields.get(key) {
            let same = existing.location == location
                && existing.values.num_vectors() == values.num_vectors()
                && existing.values.len() == values.len();
            if same {
                return Ok(());
            }
            return Err(TransportError::FieldConflict {
                key: key.to_string(),
                owner: existing.owner.clone(),
                requester: owner.to_string(),
            });
        }
        self.fields.insert(
            key.to_string(),
            Field {
                location,
                values,
                dof_map,
                owner: owner.to_string(),
                initialized: false,
            },
        );
        Ok(())
    }

    /// 是否存在场
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// 取场
    pub fn field(&self, key: &str) -> TransportResult<&Field> {
        self.fields
            .get(key)
            .ok_or_else(|| TransportError::missing_field(key))
    }

    /// 取场（可变）
    pub fn field_mut(&mut self, key: &str) -> TransportResult<&mut Field> {
        self.fields
            .get_mut(key)
            .ok_or_else(|| TransportError::missing_field(key))
    }

    /// 只读数据
    pub fn values(&self, key: &str) -> TransportResult<&MultiField> {
        Ok(&self.field(key)?.values)
    }

    /// 可写数据
    pub fn values_mut(&mut self, key: &str) -> TransportResult<&mut MultiField> {
        Ok(&mut self.field_mut(key)?.values)
    }

    /// 场是否已初始化
    pub fn is_initialized(&self, key: &str) -> bool {
        self.fields.get(key).is_some_and(|f| f.initialized)
    }

    /// 标记已初始化
    pub fn set_initialized(&mut self, key: &str) -> TransportResult<()> {
        self.field_mut(key)?.initialized = true;
        Ok(())
    }

    /// 填充常值并标记已初始化
    pub fn fill(&mut self, key: &str, value: f64) -> TransportResult<()> {
        let field = self.field_mut(key)?;
        field.values.fill(value);
        field.initialized = true;
        Ok(())
    }

    /// 面场填充常值
    pub fn fill_face_field(&mut self, key: &str, value: f64) -> TransportResult<()> {
        self.fill(key, value)
    }

    /// 写入一个分量并标记已初始化
    pub fn set_component(&mut self, key: &str, i: usize, data: &[f64]) -> TransportResult<()> {
        let field = self.field_mut(key)?;
        PtError::check_index("component", i, field.values.num_vectors())?;
        PtError::check_size("component data", field.values.len(), data.len())?;
        field.values.component_mut(i).copy_from_slice(data);
        field.initialized = true;
        Ok(())
    }

    /// 读取通量场
    pub fn face_flux(&self, key: &str) -> TransportResult<FaceFlux> {
        let field = self.field(key)?;
        let dofs = field
            .dof_map
            .clone()
            .unwrap_or_else(|| FaceDofMap::uniform(field.values.len()));
        Ok(FaceFlux::new(dofs, field.values.component(0).to_vec())?)
    }

    /// 写入通量场（同时替换自由度映射）
    pub fn set_face_flux(&mut self, key: &str, flux: &FaceFlux) -> TransportResult<()> {
        let field = self.field_mut(key)?;
        field.values = MultiField::from_components(vec![flux.values().to_vec()])?;
        field.dof_map = Some(flux.dofs().clone());
        field.initialized = true;
        Ok(())
    }

    /// 同步 ghost 副本
    pub fn scatter(&mut self, key: &str) -> TransportResult<()> {
        let comm = Arc::clone(&self.comm);
        let field = self.field_mut(key)?;
        comm.scatter_to_ghosts(field.location, &mut field.values);
        Ok(())
    }

    /// 设置饱和度场对应的时间窗口 `[t_prev, t]`
    pub fn set_time_window(&mut self, t_start: f64, t_end: f64) {
        self.window = Some((t_start, t_end));
    }

    /// 饱和度场对应的时间窗口
    pub fn time_window(&self) -> Option<(f64, f64)> {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SerialComm;

    fn store() -> FieldStore {
        FieldStore::new(Arc::new(SerialComm))
    }

    #[test]
    fn test_multifield_layout() {
        let mut field = MultiField::new(2, 3);
        field.set(1, 2, 5.0);
        field.add(1, 2, 1.0);
        assert_eq!(field.get(1, 2), 6.0);
        assert_eq!(field.component(0), &[0.0, 0.0, 0.0]);
        assert_eq!(field.component(1), &[0.0, 0.0, 6.0]);
        assert_eq!(field.bounds(1, 3).max, 6.0);
    }

    #[test]
    fn test_from_components_checks_length() {
        assert!(MultiField::from_components(vec![vec![1.0, 2.0], vec![3.0]]).is_err());
        let field = MultiField::from_components(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(field.get(1, 0), 3.0);
    }

    #[test]
    fn test_face_dof_map() {
        let dofs = FaceDofMap::from_sizes(&[1, 2, 1]);
        assert_eq!(dofs.num_faces(), 3);
        assert_eq!(dofs.first(1), 1);
        assert_eq!(dofs.size(1), 2);
        assert_eq!(dofs.first(2), 3);
        assert_eq!(dofs.total(), 4);
        assert_eq!(FaceDofMap::uniform(4).total(), 4);
    }

    #[test]
    fn test_face_flux_length_checked() {
        let dofs = FaceDofMap::from_sizes(&[1, 2]);
        assert!(FaceFlux::new(dofs.clone(), vec![1.0, 2.0]).is_err());
        let flux = FaceFlux::new(dofs, vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(flux.value(1, 1), 3.0);
    }

    #[test]
    fn test_require_and_conflict() {
        let mut s = store();
        s.require_cell_field(keys::POROSITY, "flow", 1, 4).unwrap();
        // 相同布局重复注册没问题
        s.require_cell_field(keys::POROSITY, "transport", 1, 4).unwrap();
        let err = s.require_cell_field(keys::POROSITY, "transport", 2, 4).unwrap_err();
        assert!(matches!(err, TransportError::FieldConflict { .. }));
    }

    #[test]
    fn test_initialization_flags() {
        let mut s = store();
        s.require_cell_field(keys::SATURATION_LIQUID, "flow", 1, 3).unwrap();
        assert!(!s.is_initialized(keys::SATURATION_LIQUID));
        s.fill(keys::SATURATION_LIQUID, 0.5).unwrap();
        assert!(s.is_initialized(keys::SATURATION_LIQUID));
        assert!(!s.is_initialized("missing"));
        assert!(matches!(
            s.values("missing"),
            Err(TransportError::MissingField { .. })
        ));
    }

    #[test]
    fn test_face_flux_round_trip() {
        let mut s = store();
        s.require_face_field(keys::DARCY_FLUX, "flow", FaceDofMap::uniform(3))
            .unwrap();
        let flux = FaceFlux::new(FaceDofMap::from_sizes(&[1, 1, 2]), vec![1.0, -1.0, 0.5, 0.25])
            .unwrap();
        s.set_face_flux(keys::DARCY_FLUX, &flux).unwrap();
        assert_eq!(s.face_flux(keys::DARCY_FLUX).unwrap(), flux);
    }
}
