// crates/pt_transport/src/mesh/unstructured.rs

//! 显式存储拓扑与几何的非结构网格

use glam::DVec3;
use pt_foundation::{PtError, PtResult};

use super::{Ownership, TransportMesh};

/// 非结构多面体网格
///
/// 所有拓扑与几何量在构建时算好并存储，查询为 O(1)。
#[derive(Debug, Clone)]
pub struct UnstructuredMesh {
    pub(crate) space_dim: usize,
    pub(crate) manifold_dim: usize,
    pub(crate) num_owned_cells: usize,
    pub(crate) num_owned_faces: usize,

    pub(crate) cell_volumes: Vec<f64>,
    pub(crate) cell_centroids: Vec<DVec3>,
    pub(crate) cell_gids: Vec<u64>,
    pub(crate) cell_faces: Vec<Vec<usize>>,
    pub(crate) cell_dirs: Vec<Vec<i32>>,

    pub(crate) face_centroids: Vec<DVec3>,
    pub(crate) face_areas: Vec<f64>,
    pub(crate) face_normals: Vec<DVec3>,
    pub(crate) face_cells: Vec<Vec<usize>>,
    pub(crate) face_gids: Vec<u64>,
}

impl UnstructuredMesh {
    /// 所有单元体积乘以 `factor`
    pub fn scale_volumes(&mut self, factor: f64) {
        for v in &mut self.cell_volumes {
            *v *= factor;
        }
    }

    /// 修改单个单元体积
    pub fn set_cell_volume(&mut self, c: usize, volume: f64) -> PtResult<()> {
        PtError::check_index("Cell", c, self.cell_volumes.len())?;
        self.cell_volumes[c] = volume;
        Ok(())
    }
}

impl TransportMesh for UnstructuredMesh {
    fn space_dimension(&self) -> usize {
        self.space_dim
    }

    fn manifold_dimension(&self) -> usize {
        self.manifold_dim
    }

    fn num_cells(&self, kind: Ownership) -> usize {
        match kind {
            Ownership::Owned => self.num_owned_cells,
            Ownership::All => self.cell_volumes.len(),
        }
    }

    fn num_faces(&self, kind: Ownership) -> usize {
        match kind {
            Ownership::Owned => self.num_owned_faces,
            Ownership::All => self.face_areas.len(),
        }
    }

    #[inline]
    fn cell_volume(&self, c: usize) -> f64 {
        self.cell_volumes[c]
    }

    #[inline]
    fn cell_centroid(&self, c: usize) -> DVec3 {
        self.cell_centroids[c]
    }

    #[inline]
    fn face_centroid(&self, f: usize) -> DVec3 {
        self.face_centroids[f]
    }

    #[inline]
    fn face_area(&self, f: usize) -> f64 {
        self.face_areas[f]
    }

    #[inline]
    fn face_normal(&self, f: usize) -> DVec3 {
        self.face_normals[f]
    }

    #[inline]
    fn cell_faces(&self, c: usize) -> &[usize] {
        &self.cell_faces[c]
    }

    #[inline]
    fn cell_face_dirs(&self, c: usize) -> &[i32] {
        &self.cell_dirs[c]
    }

    #[inline]
    fn face_cells(&self, f: usize) -> &[usize] {
        &self.face_cells[f]
    }

    #[inline]
    fn cell_global_id(&self, c: usize) -> u64 {
        self.cell_gids[c]
    }

    #[inline]
    fn face_global_id(&self, f: usize) -> u64 {
        self.face_gids[f]
    }
}

// ============================================================
// 构建器
// ============================================================

#[derive(Debug, Clone)]
struct CellSpec {
    volume: f64,
    centroid: DVec3,
    gid: Option<u64>,
}

#[derive(Debug, Clone)]
struct FaceSpec {
    centroid: DVec3,
    area: f64,
    normal: DVec3,
    cells: Vec<(usize, i32)>,
    gid: Option<u64>,
}

/// 非结构网格构建器
///
/// ```
/// use glam::DVec3;
/// use pt_transport::mesh::{MeshBuilder, Ownership, TransportMesh};
///
/// let mut b = MeshBuilder::new(3, 3);
/// let c0 = b.add_cell(1.0, DVec3::new(0.5, 0.0, 0.0));
/// let c1 = b.add_cell(1.0, DVec3::new(1.5, 0.0, 0.0));
/// b.add_face(DVec3::new(1.0, 0.0, 0.0), 1.0, DVec3::X, &[(c0, 1), (c1, -1)]);
/// let mesh = b.build().unwrap();
/// assert_eq!(mesh.num_cells(Ownership::All), 2);
/// assert_eq!(mesh.cell_faces(c1), &[0]);
/// ```
#[derive(Debug, Clone)]
pub struct MeshBuilder {
    space_dim: usize,
    manifold_dim: usize,
    cells: Vec<CellSpec>,
    faces: Vec<FaceSpec>,
    num_owned_cells: Option<usize>,
    num_owned_faces: Option<usize>,
}

impl MeshBuilder {
    /// 创建构建器
    pub fn new(space_dim: usize, manifold_dim: usize) -> Self {
        Self {
            space_dim,
            manifold_dim,
            cells: Vec::new(),
            faces: Vec::new(),
            num_owned_cells: None,
            num_owned_faces: None,
        }
    }

    /// 添加单元，返回本地编号；全局编号默认等于本地编号
    pub fn add_cell(&mut self, volume: f64, centroid: DVec3) -> usize {
        self.cells.push(CellSpec {
            volume,
            centroid,
            gid: None,
        });
        self.cells.len() - 1
    }

    /// 添加带全局编号的单元
    pub fn add_cell_with_gid(&mut self, volume: f64, centroid: DVec3, gid: u64) -> usize {
        self.cells.push(CellSpec {
            volume,
            centroid,
            gid: Some(gid),
        });
        self.cells.len() - 1
    }

    /// 添加面
    ///
    /// `normal` 只取方向，长度按 `area` 重新缩放；`cells` 为 (单元, 方向符号)。
    pub fn add_face(
        &mut self,
        centroid: DVec3,
        area: f64,
        normal: DVec3,
        cells: &[(usize, i32)],
    ) -> usize {
        self.faces.push(FaceSpec {
            centroid,
            area,
            normal,
            cells: cells.to_vec(),
            gid: None,
        });
        self.faces.len() - 1
    }

    /// 添加带全局编号的面
    pub fn add_face_with_gid(
        &mut self,
        centroid: DVec3,
        area: f64,
        normal: DVec3,
        cells: &[(usize, i32)],
        gid: u64,
    ) -> usize {
        let f = self.add_face(centroid, area, normal, cells);
        self.faces[f].gid = Some(gid);
        f
    }

    /// 设置 owned 单元与面的个数（默认全部 owned）
    pub fn owned_counts(&mut self, cells: usize, faces: usize) -> &mut Self {
        self.num_owned_cells = Some(cells);
        self.num_owned_faces = Some(faces);
        self
    }

    /// 校验并构建网格
    pub fn build(self) -> PtResult<UnstructuredMesh> {
        let n_cells = self.cells.len();
        let n_faces = self.faces.len();
        let num_owned_cells = self.num_owned_cells.unwrap_or(n_cells);
        let num_owned_faces = self.num_owned_faces.unwrap_or(n_faces);

        if num_owned_cells > n_cells || num_owned_faces > n_faces {
            return Err(PtError::invalid_mesh(format!(
                "owned 数 ({num_owned_cells}, {num_owned_faces}) 超过实体总数 ({n_cells}, {n_faces})"
            )));
        }

        for (c, cell) in self.cells.iter().enumerate() {
            if !(cell.volume >= 0.0 && cell.volume.is_finite()) {
                return Err(PtError::invalid_mesh(format!(
                    "单元 {c} 体积无效: {}",
                    cell.volume
                )));
            }
        }

        let mut cell_faces = vec![Vec::new(); n_cells];
        let mut cell_dirs = vec![Vec::new(); n_cells];
        let mut face_cells = Vec::with_capacity(n_faces);
        let mut face_normals = Vec::with_capacity(n_faces);

        for (f, face) in self.faces.iter().enumerate() {
            if face.cells.is_empty() {
                return Err(PtError::invalid_mesh(format!("面 {f} 没有相邻单元")));
            }
            let length = face.normal.length();
            if !(length > 0.0) || !(face.area >= 0.0) {
                return Err(PtError::invalid_mesh(format!("面 {f} 法向或面积无效")));
            }
            face_normals.push(face.normal / length * face.area);

            let mut cells = Vec::with_capacity(face.cells.len());
            for &(c, dir) in &face.cells {
                PtError::check_index("Cell", c, n_cells)?;
                if dir != 1 && dir != -1 {
                    return Err(PtError::invalid_mesh(format!(
                        "面 {f} 上单元 {c} 的方向符号必须为 ±1，实际 {dir}"
                    )));
                }
                if cells.contains(&c) {
                    return Err(PtError::invalid_mesh(format!("面 {f} 重复引用单元 {c}")));
                }
                cells.push(c);
                cell_faces[c].push(f);
                cell_dirs[c].push(dir);
            }
            face_cells.push(cells);
        }

        Ok(UnstructuredMesh {
            space_dim: self.space_dim,
            manifold_dim: self.manifold_dim,
            num_owned_cells,
            num_owned_faces,
            cell_gids: self
                .cells
                .iter()
                .enumerate()
                .map(|(c, s)| s.gid.unwrap_or(c as u64))
                .collect(),
            cell_volumes: self.cells.iter().map(|s| s.volume).collect(),
            cell_centroids: self.cells.iter().map(|s| s.centroid).collect(),
            cell_faces,
            cell_dirs,
            face_gids: self
                .faces
                .iter()
                .enumerate()
                .map(|(f, s)| s.gid.unwrap_or(f as u64))
                .collect(),
            face_centroids: self.faces.iter().map(|s| s.centroid).collect(),
            face_areas: self.faces.iter().map(|s| s.area).collect(),
            face_normals,
            face_cells,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_bad_dirs() {
        let mut b = MeshBuilder::new(3, 3);
        let c = b.add_cell(1.0, DVec3::ZERO);
        b.add_face(DVec3::X, 1.0, DVec3::X, &[(c, 2)]);
        assert!(b.build().is_err());
    }

    #[test]
    fn test_builder_rejects_unknown_cell() {
        let mut b = MeshBuilder::new(3, 3);
        b.add_cell(1.0, DVec3::ZERO);
        b.add_face(DVec3::X, 1.0, DVec3::X, &[(3, 1)]);
        assert!(b.build().is_err());
    }

    #[test]
    fn test_builder_rejects_negative_volume() {
        let mut b = MeshBuilder::new(3, 3);
        b.add_cell(-1.0, DVec3::ZERO);
        assert!(b.build().is_err());
    }

    #[test]
    fn test_normals_are_area_weighted() {
        let mut b = MeshBuilder::new(3, 3);
        let c = b.add_cell(1.0, DVec3::ZERO);
        b.add_face(DVec3::X, 4.0, DVec3::new(2.0, 0.0, 0.0), &[(c, 1)]);
        let mesh = b.build().unwrap();
        assert_eq!(mesh.face_normal(0), DVec3::new(4.0, 0.0, 0.0));
        assert!(mesh.is_boundary_face(0));
    }

    #[test]
    fn test_owned_counts_and_gids() {
        let mut b = MeshBuilder::new(3, 3);
        let c0 = b.add_cell_with_gid(1.0, DVec3::ZERO, 42);
        let c1 = b.add_cell_with_gid(1.0, DVec3::X, 7);
        b.add_face(DVec3::X * 0.5, 1.0, DVec3::X, &[(c0, 1), (c1, -1)]);
        b.owned_counts(1, 1);
        let mesh = b.build().unwrap();
        assert_eq!(mesh.num_cells(Ownership::Owned), 1);
        assert_eq!(mesh.num_cells(Ownership::All), 2);
        assert!(mesh.is_owned_cell(0));
        assert!(!mesh.is_owned_cell(1));
        // 全局编号 7 < 42，c1 位于位置 0
        assert_eq!(mesh.dof_position(0, c1), 0);
        assert_eq!(mesh.dof_position(0, c0), 1);
    }
}
