// crates/pt_transport/src/mesh/partition.rs

//! 按单元划分的分区视图
//!
//! 从全局网格和一组 owned 单元构造本地网格：owned 单元在前（保持给定顺序），
//! 随后是一层 ghost 单元。本地面为所有与 owned 单元相邻的面，
//! 面归相邻单元中全局编号最小者所在的分区所有。全局编号与方向符号保持不变。

use std::collections::BTreeSet;

use pt_foundation::{PtError, PtResult};

use super::{MeshBuilder, Ownership, TransportMesh, UnstructuredMesh};
use crate::state::{FaceDofMap, FaceFlux};

/// 本地实体到全局实体的映射
#[derive(Debug, Clone)]
pub struct PartitionMap {
    cells: Vec<usize>,
    faces: Vec<usize>,
    num_owned_cells: usize,
    num_owned_faces: usize,
}

impl PartitionMap {
    /// 构造本地网格与映射
    pub fn build(
        global: &UnstructuredMesh,
        owned: &[usize],
    ) -> PtResult<(UnstructuredMesh, PartitionMap)> {
        let n_global = global.num_cells(Ownership::All);
        let mut local_of: Vec<Option<usize>> = vec![None; n_global];
        let mut cells = Vec::with_capacity(owned.len());

        for &g in owned {
            PtError::check_index("Cell", g, n_global)?;
            if local_of[g].is_some() {
                return Err(PtError::invalid_input(format!("单元 {g} 重复出现在分区中")));
            }
            local_of[g] = Some(cells.len());
            cells.push(g);
        }
        let num_owned_cells = cells.len();

        let touching: BTreeSet<usize> = cells
            .iter()
            .flat_map(|&g| global.cell_faces(g).iter().copied())
            .collect();

        for &f in &touching {
            for &g in global.face_cells(f) {
                if local_of[g].is_none() {
                    local_of[g] = Some(cells.len());
                    cells.push(g);
                }
            }
        }

        let is_owned_face = |f: usize| {
            global
                .face_cells(f)
                .iter()
                .min_by_key(|&&g| global.cell_global_id(g))
                .and_then(|&g| local_of[g])
                .is_some_and(|c| c < num_owned_cells)
        };
        let (mut faces, ghost_faces): (Vec<usize>, Vec<usize>) =
            touching.iter().copied().partition(|&f| is_owned_face(f));
        let num_owned_faces = faces.len();
        faces.extend(ghost_faces);

        let mut b = MeshBuilder::new(global.space_dimension(), global.manifold_dimension());
        for &g in &cells {
            b.add_cell_with_gid(
                global.cell_volume(g),
                global.cell_centroid(g),
                global.cell_global_id(g),
            );
        }
        for &f in &faces {
            let mut adjacent = Vec::with_capacity(global.face_cells(f).len());
            for &g in global.face_cells(f) {
                let local = local_of[g]
                    .ok_or_else(|| PtError::internal(format!("面 {f} 的单元 {g} 未进入分区")))?;
                adjacent.push((local, face_dir(global, g, f)?));
            }
            b.add_face_with_gid(
                global.face_centroid(f),
                global.face_area(f),
                global.face_normal(f),
                &adjacent,
                global.face_global_id(f),
            );
        }
        b.owned_counts(num_owned_cells, num_owned_faces);

        let map = PartitionMap {
            cells,
            faces,
            num_owned_cells,
            num_owned_faces,
        };
        Ok((b.build()?, map))
    }

    /// 本地单元对应的全局单元
    #[inline]
    pub fn global_cell(&self, c: usize) -> usize {
        self.cells[c]
    }

    /// 本地面对应的全局面
    #[inline]
    pub fn global_face(&self, f: usize) -> usize {
        self.faces[f]
    }

    /// owned 单元数
    pub fn num_owned_cells(&self) -> usize {
        self.num_owned_cells
    }

    /// owned 面数
    pub fn num_owned_faces(&self) -> usize {
        self.num_owned_faces
    }

    /// 把全局单元数据截取到本地（含 ghost）
    pub fn restrict_cells(&self, global: &[f64]) -> Vec<f64> {
        self.cells.iter().map(|&g| global[g]).collect()
    }

    /// 把全局通量截取到本地，保留每个面的自由度块
    pub fn restrict_flux(&self, global: &FaceFlux) -> PtResult<FaceFlux> {
        let dofs = global.dofs();
        let sizes: Vec<usize> = self.faces.iter().map(|&f| dofs.size(f)).collect();
        let mut values = Vec::with_capacity(sizes.iter().sum());
        for &f in &self.faces {
            let first = dofs.first(f);
            values.extend_from_slice(&global.values()[first..first + dofs.size(f)]);
        }
        FaceFlux::new(FaceDofMap::from_sizes(&sizes), values)
    }
}

fn face_dir(mesh: &UnstructuredMesh, c: usize, f: usize) -> PtResult<i32> {
    mesh.cell_faces(c)
        .iter()
        .position(|&x| x == f)
        .map(|k| mesh.cell_face_dirs(c)[k])
        .ok_or_else(|| PtError::invalid_mesh(format!("单元 {c} 不含面 {f}")))
}
