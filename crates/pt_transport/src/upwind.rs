// crates/pt_transport/src/upwind.rs

//! 迎风拓扑
//!
//! 对每个面、每个通量自由度判定上游（迎风）与下游单元。
//! 单元 `c` 在面 `f` 上的判据为 `flux[dof] × dir`：
//!
//! - 正：`c` 为该自由度的迎风单元
//! - 负：`c` 为下游单元
//! - 恰为零：`dir > 0` 时视为迎风，否则为下游
//!
//! 流形网格每个自由度恰有一个迎风和一个下游条目，外部一侧为 `None`；
//! 双自由度面上单元的位置由全局编号决定（见 [`TransportMesh::dof_position`]）。
//! 非流形网格每个相邻单元各贡献一个带符号条目，条目按单元全局编号排序，
//! 保证各分区得到相同的顺序。
//!
//! 迎风条目保存 `+|u|`，下游条目保存 `-|u|`。

use pt_foundation::PtError;
use smallvec::SmallVec;

use crate::error::{TransportError, TransportResult};
use crate::mesh::{Ownership, TransportMesh};
use crate::state::FaceFlux;

/// 网格拓扑类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopologyKind {
    /// 每面 1~2 个单元
    Manifold,
    /// 裂隙交汇等，每面任意多个单元
    NonManifold,
}

impl TopologyKind {
    /// 名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Manifold => "manifold",
            Self::NonManifold => "non-manifold",
        }
    }
}

/// 迎风/下游条目
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpwindEntry {
    /// 单元本地编号，`None` 表示外部
    pub cell: Option<usize>,
    /// 带符号通量：迎风为正，下游为负
    pub flux: f64,
}

impl UpwindEntry {
    const EXTERIOR: Self = Self {
        cell: None,
        flux: 0.0,
    };
}

/// 单个面的迎风信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceUpwind {
    /// 迎风条目
    pub upwind: SmallVec<[UpwindEntry; 2]>,
    /// 下游条目
    pub downwind: SmallVec<[UpwindEntry; 2]>,
}

/// 全部面的迎风拓扑
#[derive(Debug, Clone)]
pub struct UpwindTopology {
    kind: TopologyKind,
    faces: Vec<FaceUpwind>,
}

impl UpwindTopology {
    /// 由网格与通量重建
    pub fn rebuild(mesh: &dyn TransportMesh, flux: &FaceFlux) -> TransportResult<Self> {
        let kind = mesh.topology_kind();
        check_layout(mesh, flux, kind)?;

        let faces = match kind {
            TopologyKind::Manifold => build_manifold(mesh, flux),
            TopologyKind::NonManifold => build_non_manifold(mesh, flux),
        };
        Ok(Self { kind, faces })
    }

    /// 拓扑类别
    #[inline]
    pub fn kind(&self) -> TopologyKind {
        self.kind
    }

    /// 面数
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// 面 `f` 的迎风信息
    #[inline]
    pub fn face(&self, f: usize) -> &FaceUpwind {
        &self.faces[f]
    }

    /// 按面遍历
    pub fn iter(&self) -> impl Iterator<Item = (usize, &FaceUpwind)> {
        self.faces.iter().enumerate()
    }

    /// 每个单元作为迎风单元的外流量之和
    pub fn cell_outflux(&self, num_cells: usize) -> Vec<f64> {
        let mut outflux = vec![0.0; num_cells];
        for face in &self.faces {
            for entry in &face.upwind {
                if let Some(c) = entry.cell {
                    outflux[c] += entry.flux.abs();
                }
            }
        }
        outflux
    }
}

fn check_layout(
    mesh: &dyn TransportMesh,
    flux: &FaceFlux,
    kind: TopologyKind,
) -> TransportResult<()> {
    let n_faces = mesh.num_faces(Ownership::All);
    let dofs = flux.dofs();
    PtError::check_size("darcy_flux faces", n_faces, dofs.num_faces())?;

    for f in 0..n_faces {
        let size = dofs.size(f);
        let n_cells = mesh.face_cells(f).len();
        let ok = match kind {
            TopologyKind::Manifold => size == 1 || (size == 2 && n_cells <= 2),
            TopologyKind::NonManifold => size == n_cells,
        };
        if !ok {
            return Err(TransportError::Foundation(PtError::invalid_mesh(format!(
                "面 {f} 有 {n_cells} 个单元却有 {size} 个通量自由度 ({})",
                kind.name()
            ))));
        }
    }
    Ok(())
}

fn build_manifold(mesh: &dyn TransportMesh, flux: &FaceFlux) -> Vec<FaceUpwind> {
    let dofs = flux.dofs();
    let n_faces = mesh.num_faces(Ownership::All);

    let mut faces: Vec<FaceUpwind> = (0..n_faces)
        .map(|f| {
            let size = dofs.size(f);
            FaceUpwind {
                upwind: SmallVec::from_elem(UpwindEntry::EXTERIOR, size),
                downwind: SmallVec::from_elem(UpwindEntry::EXTERIOR, size),
            }
        })
        .collect();

    for c in 0..mesh.num_cells(Ownership::All) {
        for (&f, &dir) in mesh.cell_faces(c).iter().zip(mesh.cell_face_dirs(c)) {
            let k = if dofs.size(f) == 2 {
                mesh.dof_position(f, c)
            } else {
                0
            };
            let tmp = flux.value(f, k) * dir as f64;
            let magnitude = tmp.abs();
            let is_upwind = tmp > 0.0 || (tmp == 0.0 && dir > 0);

            let face = &mut faces[f];
            if is_upwind {
                face.upwind[k] = UpwindEntry {
                    cell: Some(c),
                    flux: magnitude,
                };
                face.downwind[k].flux = -magnitude;
            } else {
                face.downwind[k] = UpwindEntry {
                    cell: Some(c),
                    flux: -magnitude,
                };
                face.upwind[k].flux = magnitude;
            }
        }
    }
    faces
}

fn build_non_manifold(mesh: &dyn TransportMesh, flux: &FaceFlux) -> Vec<FaceUpwind> {
    let n_faces = mesh.num_faces(Ownership::All);
    let mut faces = vec![FaceUpwind::default(); n_faces];

    for c in 0..mesh.num_cells(Ownership::All) {
        for (&f, &dir) in mesh.cell_faces(c).iter().zip(mesh.cell_face_dirs(c)) {
            let k = mesh.dof_position(f, c);
            let tmp = flux.value(f, k) * dir as f64;
            let entry = UpwindEntry {
                cell: Some(c),
                flux: tmp,
            };
            if tmp > 0.0 || (tmp == 0.0 && dir > 0) {
                faces[f].upwind.push(UpwindEntry {
                    flux: tmp.abs(),
                    ..entry
                });
            } else {
                faces[f].downwind.push(UpwindEntry {
                    flux: -tmp.abs(),
                    ..entry
                });
            }
        }
    }

    let gid = |e: &UpwindEntry| e.cell.map(|c| mesh.cell_global_id(c));
    for face in &mut faces {
        face.upwind.sort_by_key(gid);
        face.downwind.sort_by_key(gid);
    }
    faces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{face_dof_map, UnstructuredMesh};
    use crate::state::FaceDofMap;

    #[test]
    fn test_column_rightward_flow() {
        let mesh = UnstructuredMesh::column_1d(3, 3.0, 1.0).unwrap();
        let flux = FaceFlux::uniform(vec![1.0; 4]);
        let topo = UpwindTopology::rebuild(&mesh, &flux).unwrap();

        // 入口面：外部迎风，单元 0 下游
        assert_eq!(topo.face(0).upwind[0].cell, None);
        assert_eq!(topo.face(0).upwind[0].flux, 1.0);
        assert_eq!(topo.face(0).downwind[0].cell, Some(0));
        assert_eq!(topo.face(0).downwind[0].flux, -1.0);

        assert_eq!(topo.face(1).upwind[0].cell, Some(0));
        assert_eq!(topo.face(1).downwind[0].cell, Some(1));

        // 出口面：单元 2 迎风，外部下游
        assert_eq!(topo.face(3).upwind[0].cell, Some(2));
        assert_eq!(topo.face(3).downwind[0].cell, None);
        assert_eq!(topo.cell_outflux(3), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_zero_flux_tie_break_by_dir() {
        let mesh = UnstructuredMesh::column_1d(2, 2.0, 1.0).unwrap();
        let flux = FaceFlux::uniform(vec![0.0; 3]);
        let topo = UpwindTopology::rebuild(&mesh, &flux).unwrap();
        // 内部面：单元 0 方向 +1 为迎风，单元 1 方向 -1 为下游
        assert_eq!(topo.face(1).upwind[0].cell, Some(0));
        assert_eq!(topo.face(1).downwind[0].cell, Some(1));
        assert_eq!(topo.cell_outflux(2), vec![0.0, 0.0]);
    }

    #[test]
    fn test_two_dof_face_positions_by_gid() {
        let mesh = UnstructuredMesh::column_1d(2, 2.0, 1.0).unwrap();
        let dofs = FaceDofMap::from_sizes(&[1, 2, 1]);
        // 面 1 的自由度 0 属于单元 0（外流 +x），自由度 1 属于单元 1
        let flux = FaceFlux::new(dofs, vec![1.0, 1.0, 1.0, 1.0]).unwrap();
        let topo = UpwindTopology::rebuild(&mesh, &flux).unwrap();
        let face = topo.face(1);
        assert_eq!(face.upwind[0].cell, Some(0));
        assert_eq!(face.downwind[0].cell, None);
        assert_eq!(face.upwind[1].cell, None);
        assert_eq!(face.downwind[1].cell, Some(1));
    }

    #[test]
    fn test_non_manifold_junction() {
        let mesh = UnstructuredMesh::star_network(3, 1, 1.0).unwrap();
        let dofs = face_dof_map(&mesh);
        // 交点：单元 0 外流 2，单元 1、2 各流入 1
        let mut values = vec![0.0; dofs.total()];
        values[dofs.first(0)] = 2.0;
        values[dofs.first(0) + 1] = -1.0;
        values[dofs.first(0) + 2] = -1.0;
        let flux = FaceFlux::new(dofs, values).unwrap();
        let topo = UpwindTopology::rebuild(&mesh, &flux).unwrap();

        let junction = topo.face(0);
        assert_eq!(junction.upwind.len(), 1);
        assert_eq!(junction.upwind[0].cell, Some(0));
        assert_eq!(junction.downwind.len(), 2);
        assert_eq!(junction.downwind[0].cell, Some(1));
        assert_eq!(junction.downwind[1].flux, -1.0);
    }

    #[test]
    fn test_rejects_mismatched_layout() {
        let mesh = UnstructuredMesh::star_network(3, 1, 1.0).unwrap();
        let flux = FaceFlux::uniform(vec![1.0; mesh.num_faces(Ownership::All)]);
        assert!(UpwindTopology::rebuild(&mesh, &flux).is_err());
    }
}
