// crates/pt_transport/src/dispersion/tensor.rs

//! 弥散/扩散张量
//!
//! 机械弥散以达西速度 `q` 表示（已含 φ·ws 因子）：
//!
//! - Scalar: `D = α |q| I`
//! - Bear: `D = α_T |q| I + (α_L − α_T) q qᵀ / |q|`
//! - Burnett-Frind: 水平/垂直横向弥散度分开，z 轴为垂直方向
//!
//! 分子扩散为各向同性：`md × τ × θ × I`，θ 为液相 `φ ws` 或气相 `φ (1 − ws)`。

use glam::{DMat3, DVec3};

use crate::config::{DispersionConfig, DispersionModel, MaterialProperties};
use crate::mesh::TransportMesh;
use crate::state::FaceFlux;

/// 速度模长下限，低于此值不产生机械弥散
const MIN_SPEED: f64 = 1e-30;

/// 单元 `c` 在面 `f` 上对应的通量
#[inline]
pub(crate) fn cell_face_flux(mesh: &dyn TransportMesh, flux: &FaceFlux, f: usize, c: usize) -> f64 {
    let size = flux.dofs().size(f);
    let k = if size > 1 {
        mesh.dof_position(f, c).min(size - 1)
    } else {
        0
    };
    flux.value(f, k)
}

/// 单元达西速度重构：`v = (1/V) Σ_f q_f dir_f (x_f − x_c)`
pub fn cell_velocity(mesh: &dyn TransportMesh, flux: &FaceFlux, c: usize) -> DVec3 {
    let xc = mesh.cell_centroid(c);
    let mut v = DVec3::ZERO;
    for (&f, &dir) in mesh.cell_faces(c).iter().zip(mesh.cell_face_dirs(c)) {
        let q = cell_face_flux(mesh, flux, f, c) * f64::from(dir);
        v += q * (mesh.face_centroid(f) - xc);
    }
    let volume = mesh.cell_volume(c);
    if volume > 0.0 {
        v / volume
    } else {
        DVec3::ZERO
    }
}

/// 机械弥散张量
pub fn mechanical_dispersion(model: &DispersionModel, q: DVec3) -> DMat3 {
    let speed = q.length();
    if speed < MIN_SPEED {
        return DMat3::ZERO;
    }
    match *model {
        DispersionModel::None => DMat3::ZERO,
        DispersionModel::Scalar { alpha } => DMat3::from_diagonal(DVec3::splat(alpha * speed)),
        DispersionModel::Bear { alpha_l, alpha_t } => {
            let qq = outer(q, q) * ((alpha_l - alpha_t) / speed);
            DMat3::from_diagonal(DVec3::splat(alpha_t * speed)) + qq
        }
        DispersionModel::BurnettFrind {
            alpha_l,
            alpha_th,
            alpha_tv,
        } => {
            let (x2, y2, z2) = (q.x * q.x, q.y * q.y, q.z * q.z);
            let dxx = alpha_l * x2 + alpha_th * y2 + alpha_tv * z2;
            let dyy = alpha_th * x2 + alpha_l * y2 + alpha_tv * z2;
            let dzz = alpha_tv * (x2 + y2) + alpha_l * z2;
            let dxy = (alpha_l - alpha_th) * q.x * q.y;
            let dxz = (alpha_l - alpha_tv) * q.x * q.z;
            let dyz = (alpha_l - alpha_tv) * q.y * q.z;
            DMat3::from_cols(
                DVec3::new(dxx, dxy, dxz),
                DVec3::new(dxy, dyy, dyz),
                DVec3::new(dxz, dyz, dzz),
            ) * (1.0 / speed)
        }
    }
}

/// 各向同性扩散张量 `value × I`
#[inline]
pub fn isotropic(value: f64) -> DMat3 {
    DMat3::from_diagonal(DVec3::splat(value))
}

#[inline]
fn outer(a: DVec3, b: DVec3) -> DMat3 {
    DMat3::from_cols(a * b.x, a * b.y, a * b.z)
}

/// 单元到材料的映射
///
/// 未指定单元的材料覆盖全部单元；后出现的材料覆盖先出现的。
#[derive(Debug, Clone, Default)]
pub struct MaterialMap {
    materials: Vec<MaterialProperties>,
    cell_material: Vec<Option<usize>>,
}

impl MaterialMap {
    /// 按配置建立映射
    pub fn new(config: &DispersionConfig, num_cells: usize) -> Self {
        let mut cell_material = vec![None; num_cells];
        for (m, material) in config.materials.iter().enumerate() {
            match &material.cells {
                Some(cells) => {
                    for &c in cells.iter().filter(|&&c| c < num_cells) {
                        cell_material[c] = Some(m);
                    }
                }
                None => cell_material.fill(Some(m)),
            }
        }
        Self {
            materials: config.materials.clone(),
            cell_material,
        }
    }

    /// 单元 `c` 的材料
    #[inline]
    pub fn material(&self, c: usize) -> Option<&MaterialProperties> {
        self.cell_material
            .get(c)
            .copied()
            .flatten()
            .map(|m| &self.materials[m])
    }

    /// 是否存在机械弥散
    pub fn has_mechanical_dispersion(&self) -> bool {
        self.materials.iter().any(|m| m.model.is_active())
    }
}
