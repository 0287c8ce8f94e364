// crates/pt_transport/src/mesh/mod.rs

//! 网格抽象
//!
//! 输运只通过 [`TransportMesh`] 访问网格：按 owned/ALL 分类的实体数、
//! 带方向符号的单元-面邻接、体积、面积、法向、形心以及用于打破对称的全局编号。
//!
//! 约定：
//! - 本地单元/面编号中 owned 实体排在前面，ghost 实体在后
//! - `face_normal(f)` 是面积加权法向，方向固定
//! - `cell_face_dirs(c)[k] = +1` 表示该法向指向单元 `c` 外部
//! - 非流形面（多于两个单元）上每个单元各有一个通量自由度，方向符号均为 +1

mod generators;
mod partition;
mod unstructured;

use std::fmt::Debug;

use glam::DVec3;

pub use partition::PartitionMap;
pub use unstructured::{MeshBuilder, UnstructuredMesh};

use crate::state::FaceDofMap;
use crate::upwind::TopologyKind;

/// 实体所属类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// 本进程拥有
    Owned,
    /// owned + ghost
    All,
}

/// 输运所需的网格拓扑与几何服务
pub trait TransportMesh: Debug + Send + Sync {
    /// 空间维数
    fn space_dimension(&self) -> usize;

    /// 流形（拓扑）维数
    fn manifold_dimension(&self) -> usize;

    /// 单元数
    fn num_cells(&self, kind: Ownership) -> usize;

    /// 面数
    fn num_faces(&self, kind: Ownership) -> usize;

    /// 单元体积
    fn cell_volume(&self, c: usize) -> f64;

    /// 单元形心
    fn cell_centroid(&self, c: usize) -> DVec3;

    /// 面形心
    fn face_centroid(&self, f: usize) -> DVec3;

    /// 面积
    fn face_area(&self, f: usize) -> f64;

    /// 面积加权法向
    fn face_normal(&self, f: usize) -> DVec3;

    /// 单元的面
    fn cell_faces(&self, c: usize) -> &[usize];

    /// 与 `cell_faces` 对应的方向符号 (±1)
    fn cell_face_dirs(&self, c: usize) -> &[i32];

    /// 面的相邻单元（本地编号）
    fn face_cells(&self, f: usize) -> &[usize];

    /// 单元全局编号
    fn cell_global_id(&self, c: usize) -> u64;

    /// 面全局编号
    fn face_global_id(&self, f: usize) -> u64;

    /// 拓扑类别：空间维数大于流形维数时为非流形
    fn topology_kind(&self) -> TopologyKind {
        if self.space_dimension() > self.manifold_dimension() {
            TopologyKind::NonManifold
        } else {
            TopologyKind::Manifold
        }
    }

    /// 单元 `c` 是否为 owned
    #[inline]
    fn is_owned_cell(&self, c: usize) -> bool {
        c < self.num_cells(Ownership::Owned)
    }

    /// 是否为外边界面
    #[inline]
    fn is_boundary_face(&self, f: usize) -> bool {
        self.face_cells(f).len() == 1
    }

    /// 面 `f` 上单元 `c` 的通量自由度位置
    ///
    /// 按全局编号排序：全局编号较小的单元位于位置 0。
    /// 各分区据此得到相同的分配，无需额外通信。
    fn dof_position(&self, f: usize, c: usize) -> usize {
        let gid = self.cell_global_id(c);
        self.face_cells(f)
            .iter()
            .filter(|&&other| self.cell_global_id(other) < gid)
            .count()
    }
}

/// 网格的默认通量自由度映射
///
/// 流形网格每面一个自由度；非流形网格每个相邻单元各一个。
pub fn face_dof_map(mesh: &dyn TransportMesh) -> FaceDofMap {
    let n_faces = mesh.num_faces(Ownership::All);
    match mesh.topology_kind() {
        TopologyKind::Manifold => FaceDofMap::uniform(n_faces),
        TopologyKind::NonManifold => {
            let sizes: Vec<usize> = (0..n_faces).map(|f| mesh.face_cells(f).len()).collect();
            FaceDofMap::from_sizes(&sizes)
        }
    }
}
