// crates/pt_transport/src/mesh/generators.rs

//! 简单结构化网格生成
//!
//! 只用于测试与命令行演示：
//!
//! - [`UnstructuredMesh::column_1d`]: 一维柱（三维空间中的一排六面体）
//! - [`UnstructuredMesh::rectangle_2d`]: 二维矩形网格（单位厚度）
//! - [`UnstructuredMesh::star_network`]: 一维裂隙星形网络（非流形交点）

use std::f64::consts::PI;

use glam::DVec3;
use pt_foundation::{PtError, PtResult};

use super::{MeshBuilder, UnstructuredMesh};

fn check_positive(name: &str, value: f64) -> PtResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(PtError::invalid_input(format!("{name} 必须为正数，实际 {value}")))
    }
}

fn check_count(name: &str, n: usize) -> PtResult<()> {
    if n == 0 {
        return Err(PtError::invalid_input(format!("{name} 不能为 0")));
    }
    Ok(())
}

impl UnstructuredMesh {
    /// 沿 x 方向的一维柱
    ///
    /// 面 `i` 位于 `x = i·dx`，法向 +x；左侧单元方向 +1，右侧 -1。
    /// 共 `n + 1` 个面，两端为边界面。
    ///
    /// # 参数
    ///
    /// - `n`: 单元数
    /// - `length`: 柱长
    /// - `area`: 截面积
    pub fn column_1d(n: usize, length: f64, area: f64) -> PtResult<Self> {
        check_count("单元数", n)?;
        check_positive("柱长", length)?;
        check_positive("截面积", area)?;

        let dx = length / n as f64;
        let mut b = MeshBuilder::new(3, 3);
        for i in 0..n {
            b.add_cell(dx * area, DVec3::new((i as f64 + 0.5) * dx, 0.0, 0.0));
        }

        for i in 0..=n {
            let centroid = DVec3::new(i as f64 * dx, 0.0, 0.0);
            let mut cells = Vec::with_capacity(2);
            if i > 0 {
                cells.push((i - 1, 1));
            }
            if i < n {
                cells.push((i, -1));
            }
            b.add_face(centroid, area, DVec3::X, &cells);
        }

        b.build()
    }

    /// 二维矩形网格，单位厚度
    ///
    /// 单元编号 `i + nx·j`；先排 x 向面（法向 +x），再排 y 向面（法向 +y）。
    pub fn rectangle_2d(nx: usize, ny: usize, lx: f64, ly: f64) -> PtResult<Self> {
        check_count("nx", nx)?;
        check_count("ny", ny)?;
        check_positive("lx", lx)?;
        check_positive("ly", ly)?;

        let dx = lx / nx as f64;
        let dy = ly / ny as f64;
        let cell = |i: usize, j: usize| i + nx * j;

        let mut b = MeshBuilder::new(2, 2);
        for j in 0..ny {
            for i in 0..nx {
                let centroid = DVec3::new((i as f64 + 0.5) * dx, (j as f64 + 0.5) * dy, 0.0);
                b.add_cell(dx * dy, centroid);
            }
        }

        // x 向面
        for j in 0..ny {
            for i in 0..=nx {
                let centroid = DVec3::new(i as f64 * dx, (j as f64 + 0.5) * dy, 0.0);
                let mut cells = Vec::with_capacity(2);
                if i > 0 {
                    cells.push((cell(i - 1, j), 1));
                }
                if i < nx {
                    cells.push((cell(i, j), -1));
                }
                b.add_face(centroid, dy, DVec3::X, &cells);
            }
        }

        // y 向面
        for j in 0..=ny {
            for i in 0..nx {
                let centroid = DVec3::new((i as f64 + 0.5) * dx, j as f64 * dy, 0.0);
                let mut cells = Vec::with_capacity(2);
                if j > 0 {
                    cells.push((cell(i, j - 1), 1));
                }
                if j < ny {
                    cells.push((cell(i, j), -1));
                }
                b.add_face(centroid, dx, DVec3::Y, &cells);
            }
        }

        b.build()
    }

    /// 平面内的一维裂隙星形网络
    ///
    /// `branches` 条等长分支从原点出发，每条 `cells_per_branch` 个单元，
    /// 截面积为 1。空间维数 2，流形维数 1。所有方向符号均为 +1，
    /// 每个面上每个相邻单元各有一个通量自由度，其值为该单元的外流量。
    /// 分支 `b` 的第 `k` 个单元编号为 `b·cells_per_branch + k`，
    /// 面 0 为交点。
    pub fn star_network(branches: usize, cells_per_branch: usize, length: f64) -> PtResult<Self> {
        if branches < 2 {
            return Err(PtError::invalid_input("星形网络至少需要 2 条分支"));
        }
        check_count("每支单元数", cells_per_branch)?;
        check_positive("分支长度", length)?;

        let dx = length / cells_per_branch as f64;
        let directions: Vec<DVec3> = (0..branches)
            .map(|k| {
                let theta = 2.0 * PI * k as f64 / branches as f64;
                DVec3::new(theta.cos(), theta.sin(), 0.0)
            })
            .collect();

        let mut b = MeshBuilder::new(2, 1);
        for dir in &directions {
            for k in 0..cells_per_branch {
                b.add_cell(dx, *dir * ((k as f64 + 0.5) * dx));
            }
        }
        let cell = |branch: usize, k: usize| branch * cells_per_branch + k;

        let junction: Vec<(usize, i32)> = (0..branches).map(|br| (cell(br, 0), 1)).collect();
        b.add_face(DVec3::ZERO, 1.0, -directions[0], &junction);

        for (br, dir) in directions.iter().enumerate() {
            for k in 1..=cells_per_branch {
                let centroid = *dir * (k as f64 * dx);
                let mut cells = Vec::with_capacity(2);
                cells.push((cell(br, k - 1), 1));
                if k < cells_per_branch {
                    cells.push((cell(br, k), 1));
                }
                b.add_face(centroid, 1.0, *dir, &cells);
            }
        }

        b.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{face_dof_map, Ownership, TransportMesh};
    use crate::upwind::TopologyKind;

    #[test]
    fn test_column_layout() {
        let mesh = UnstructuredMesh::column_1d(4, 4.0, 2.0).unwrap();
        assert_eq!(mesh.num_cells(Ownership::All), 4);
        assert_eq!(mesh.num_faces(Ownership::All), 5);
        assert!((mesh.cell_volume(0) - 2.0).abs() < 1e-14);
        assert!(mesh.is_boundary_face(0));
        assert!(mesh.is_boundary_face(4));
        assert_eq!(mesh.face_cells(2), &[1, 2]);
        assert_eq!(mesh.cell_faces(1), &[1, 2]);
        assert_eq!(mesh.cell_face_dirs(1), &[-1, 1]);
        assert_eq!(mesh.topology_kind(), TopologyKind::Manifold);
    }

    #[test]
    fn test_column_rejects_zero_cells() {
        assert!(UnstructuredMesh::column_1d(0, 1.0, 1.0).is_err());
        assert!(UnstructuredMesh::column_1d(3, -1.0, 1.0).is_err());
    }

    #[test]
    fn test_rectangle_counts() {
        let mesh = UnstructuredMesh::rectangle_2d(3, 2, 3.0, 2.0).unwrap();
        assert_eq!(mesh.num_cells(Ownership::All), 6);
        // x 向 4·2 + y 向 3·3
        assert_eq!(mesh.num_faces(Ownership::All), 17);
        for c in 0..6 {
            assert_eq!(mesh.cell_faces(c).len(), 4);
        }
    }

    #[test]
    fn test_star_network_is_non_manifold() {
        let mesh = UnstructuredMesh::star_network(3, 2, 2.0).unwrap();
        assert_eq!(mesh.topology_kind(), TopologyKind::NonManifold);
        assert_eq!(mesh.face_cells(0), &[0, 2, 4]);
        let dofs = face_dof_map(&mesh);
        assert_eq!(dofs.size(0), 3);
        assert_eq!(dofs.size(1), 2);
        assert_eq!(dofs.total(), 3 + 3 * (2 + 1));
    }
}
