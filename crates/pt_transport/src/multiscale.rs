// crates/pt_transport/src/multiscale.rs

//! 双重孔隙（裂隙-基质）溶质交换
//!
//! 每个子步在对流之后调用一次，只作用于液相组分。
//! 对每个 owned 单元：
//!
//! 1. 子区间 `[t1, t2]` 端点上的裂隙含水量 `φ ws` 和基质含水量 `φ_m ws_m`
//! 2. 液相交换通量 `q = (wc_m(t2) − wc_m(t1)) / dt`，正值表示裂隙流向基质
//! 3. 闭合模型隐式更新基质浓度并返回溶质通量 `J`
//! 4. 裂隙浓度 `c_f −= dt J / wc_f(t2)`
//!
//! 裂隙与基质的总溶质 `wc_f(t2) c_f + Σ wc_m c_m` 守恒。

use std::fmt::Debug;

use crate::config::MatrixClosure;
use crate::mesh::{Ownership, TransportMesh};
use crate::state::MultiField;

/// 子区间端点上的含水量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterContentPair {
    /// 起点 t1
    pub start: f64,
    /// 终点 t2
    pub end: f64,
}

impl WaterContentPair {
    /// 创建
    #[inline]
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// 基质侧闭合模型
pub trait MultiscalePorosity: Debug + Send + Sync {
    /// 模型名称
    fn name(&self) -> &'static str;

    /// 每个单元的基质节点数
    fn num_matrix_nodes(&self) -> usize;

    /// 隐式更新基质浓度 `tcc_m`，返回裂隙流向基质的溶质通量
    ///
    /// `flux_liquid` 为液相交换通量，`phi` 为基质孔隙度。
    fn compute_solute_flux(
        &self,
        flux_liquid: f64,
        tcc_f: f64,
        tcc_m: &mut [f64],
        dt: f64,
        wcf: WaterContentPair,
        wcm: WaterContentPair,
        phi: f64,
    ) -> f64;
}

/// 按配置创建闭合模型
pub fn create_closure(closure: &MatrixClosure) -> Box<dyn MultiscalePorosity> {
    match *closure {
        MatrixClosure::DualPorosity {
            mass_transfer_coefficient,
        } => Box::new(DualPorosity::new(mass_transfer_coefficient)),
        MatrixClosure::GeneralizedDualPorosity {
            num_nodes,
            matrix_depth,
            tortuosity,
            molecular_diffusion,
        } => Box::new(GeneralizedDualPorosity::new(
            num_nodes,
            matrix_depth,
            tortuosity,
            molecular_diffusion,
        )),
    }
}

// ============================================================
// 单节点模型
// ============================================================

/// 一阶传质双重孔隙模型
///
/// `J = α (c_f − c_m) + q⁺ c_f − q⁻ c_m`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualPorosity {
    alpha: f64,
}

impl DualPorosity {
    /// 创建，`alpha` 为传质系数
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }
}

impl MultiscalePorosity for DualPorosity {
    fn name(&self) -> &'static str {
        "dual porosity"
    }

    fn num_matrix_nodes(&self) -> usize {
        1
    }

    fn compute_solute_flux(
        &self,
        flux_liquid: f64,
        tcc_f: f64,
        tcc_m: &mut [f64],
        dt: f64,
        _wcf: WaterContentPair,
        wcm: WaterContentPair,
        _phi: f64,
    ) -> f64 {
        let q_in = flux_liquid.max(0.0);
        let q_out = (-flux_liquid).max(0.0);
        let gain = self.alpha + q_in;
        let loss = self.alpha + q_out;

        let denom = wcm.end + dt * loss;
        if denom > 0.0 {
            tcc_m[0] = (wcm.start * tcc_m[0] + dt * gain * tcc_f) / denom;
        }
        gain * tcc_f - loss * tcc_m[0]
    }
}

// ============================================================
// 多节点模型
// ============================================================

/// 广义双重孔隙模型：基质块内一维扩散
///
/// 基质块半厚度 `L` 均分为 `N` 个节点，裂隙位于 `x = 0`，块中心为零通量边界。
/// 节点间传导率 `g = md τ φ / (h L)`，`h = L / N`；裂隙到首节点为 `2g`。
/// 每个节点储量取 `wc_m / N`。`N = 1` 时退化为传质系数 `2 md τ φ / L²` 的单节点模型。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneralizedDualPorosity {
    num_nodes: usize,
    depth: f64,
    tortuosity: f64,
    molecular_diffusion: f64,
}

impl GeneralizedDualPorosity {
    /// 创建
    pub fn new(num_nodes: usize, depth: f64, tortuosity: f64, molecular_diffusion: f64) -> Self {
        Self {
            num_nodes: num_nodes.max(1),
            depth,
            tortuosity,
            molecular_diffusion,
        }
    }

    fn conductance(&self, phi: f64) -> f64 {
        let h = self.depth / self.num_nodes as f64;
        let denom = h * self.depth;
        if denom > 0.0 {
            self.molecular_diffusion * self.tortuosity * phi / denom
        } else {
            0.0
        }
    }
}

impl MultiscalePorosity for GeneralizedDualPorosity {
    fn name(&self) -> &'static str {
        "generalized dual porosity"
    }

    fn num_matrix_nodes(&self) -> usize {
        self.num_nodes
    }

    fn compute_solute_flux(
        &self,
        flux_liquid: f64,
        tcc_f: f64,
        tcc_m: &mut [f64],
        dt: f64,
        _wcf: WaterContentPair,
        wcm: WaterContentPair,
        phi: f64,
    ) -> f64 {
        let n = self.num_nodes;
        let g = self.conductance(phi);
        let g0 = 2.0 * g;
        let q_in = flux_liquid.max(0.0);
        let q_out = (-flux_liquid).max(0.0);
        let w0 = wcm.start / n as f64;
        let w1 = wcm.end / n as f64;

        let mut lower = vec![0.0; n];
        let mut diag = vec![0.0; n];
        let mut upper = vec![0.0; n];
        let mut rhs = vec![0.0; n];

        for i in 0..n {
            diag[i] = w1;
            rhs[i] = w0 * tcc_m[i];
            if i > 0 {
                lower[i] = -dt * g;
                diag[i] += dt * g;
            }
            if i + 1 < n {
                upper[i] = -dt * g;
                diag[i] += dt * g;
            }
        }
        diag[0] += dt * (g0 + q_out);
        rhs[0] += dt * (g0 + q_in) * tcc_f;

        if let Some(solution) = solve_tridiagonal(&lower, &diag, &upper, &rhs) {
            tcc_m[..n].copy_from_slice(&solution);
        }
        (g0 + q_in) * tcc_f - (g0 + q_out) * tcc_m[0]
    }
}

/// Thomas 算法求解三对角方程组，主元为零时返回 `None`
fn solve_tridiagonal(lower: &[f64], diag: &[f64], upper: &[f64], rhs: &[f64]) -> Option<Vec<f64>> {
    let n = diag.len();
    let mut c = vec![0.0; n];
    let mut d = vec![0.0; n];

    let mut pivot = diag[0];
    if pivot.abs() < 1e-300 {
        return None;
    }
    c[0] = upper[0] / pivot;
    d[0] = rhs[0] / pivot;
    for i in 1..n {
        pivot = diag[i] - lower[i] * c[i - 1];
        if pivot.abs() < 1e-300 {
            return None;
        }
        c[i] = upper[i] / pivot;
        d[i] = (rhs[i] - lower[i] * d[i - 1]) / pivot;
    }

    let mut x = d;
    for i in (0..n - 1).rev() {
        x[i] -= c[i] * x[i + 1];
    }
    Some(x)
}

// ============================================================
// 单元循环
// ============================================================

/// 一个子区间的含水量（按单元）
#[derive(Debug, Clone, Copy)]
pub struct ExchangeWaterContent<'a> {
    /// 裂隙 `φ ws` 在 t1
    pub fracture_start: &'a [f64],
    /// 裂隙 `φ ws` 在 t2
    pub fracture_end: &'a [f64],
    /// 基质 `φ_m ws_m` 在 t1
    pub matrix_start: &'a [f64],
    /// 基质 `φ_m ws_m` 在 t2
    pub matrix_end: &'a [f64],
    /// 基质孔隙度
    pub porosity_matrix: &'a [f64],
}

/// 裂隙-基质交换
#[derive(Debug)]
pub struct MultiscaleCoupling {
    closure: Box<dyn MultiscalePorosity>,
}

impl MultiscaleCoupling {
    /// 创建
    pub fn new(closure: Box<dyn MultiscalePorosity>) -> Self {
        Self { closure }
    }

    /// 按配置创建
    pub fn from_config(closure: &MatrixClosure) -> Self {
        Self::new(create_closure(closure))
    }

    /// 闭合模型
    pub fn closure(&self) -> &dyn MultiscalePorosity {
        self.closure.as_ref()
    }

    /// 每个单元的基质节点数
    pub fn num_matrix_nodes(&self) -> usize {
        self.closure.num_matrix_nodes()
    }

    /// 对 owned 单元的前 `num_aqueous` 个组分执行交换
    ///
    /// `tcc_matrix` 的第 `i` 个分量按 `c × N + k` 存放单元 `c` 的第 `k` 个节点。
    pub fn apply(
        &self,
        mesh: &dyn TransportMesh,
        tcc: &mut MultiField,
        tcc_matrix: &mut MultiField,
        num_aqueous: usize,
        wc: ExchangeWaterContent<'_>,
        dt: f64,
    ) {
        if dt <= 0.0 {
            return;
        }
        let nodes = self.num_matrix_nodes();
        let n = mesh.num_cells(Ownership::Owned);

        for c in 0..n {
            let wcf = WaterContentPair::new(wc.fracture_start[c], wc.fracture_end[c]);
            let wcm = WaterContentPair::new(wc.matrix_start[c], wc.matrix_end[c]);
            let flux_liquid = (wcm.end - wcm.start) / dt;

            for i in 0..num_aqueous {
                let tcc_f = tcc.get(i, c);
                let matrix = &mut tcc_matrix.component_mut(i)[c * nodes..(c + 1) * nodes];
                let flux = self.closure.compute_solute_flux(
                    flux_liquid,
                    tcc_f,
                    matrix,
                    dt,
                    wcf,
                    wcm,
                    wc.porosity_matrix[c],
                );
                if wcf.end > 0.0 {
                    tcc.set(i, c, tcc_f - dt * flux / wcf.end);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::UnstructuredMesh;

    fn pair(a: f64, b: f64) -> WaterContentPair {
        WaterContentPair::new(a, b)
    }

    #[test]
    fn test_dual_porosity_conserves_solute() {
        let model = DualPorosity::new(0.3);
        let wcf = pair(0.2, 0.2);
        let wcm = pair(0.1, 0.15);
        let dt = 0.5;
        let q = (wcm.end - wcm.start) / dt;
        let mut cm = [0.2];
        let cf = 1.0;

        let j = model.compute_solute_flux(q, cf, &mut cm, dt, wcf, wcm, 0.3);
        let cf_new = cf - dt * j / wcf.end;

        let before = wcf.end * cf + wcm.start * 0.2;
        let after = wcf.end * cf_new + wcm.end * cm[0];
        assert!((before - after).abs() < 1e-14);
        assert!(j > 0.0);
        assert!(cm[0] > 0.2 && cm[0] < cf);
    }

    #[test]
    fn test_dual_porosity_equilibrium_has_no_flux() {
        let model = DualPorosity::new(2.0);
        let mut cm = [0.7];
        let j = model.compute_solute_flux(0.0, 0.7, &mut cm, 1.0, pair(0.3, 0.3), pair(0.1, 0.1), 0.2);
        assert!(j.abs() < 1e-14);
        assert!((cm[0] - 0.7).abs() < 1e-14);
    }

    #[test]
    fn test_single_node_generalized_matches_dual() {
        let gdpm = GeneralizedDualPorosity::new(1, 0.5, 0.8, 0.01);
        let alpha = 2.0 * 0.01 * 0.8 * 0.25 / (0.5 * 0.5);
        let dpm = DualPorosity::new(alpha);

        let (wcf, wcm) = (pair(0.3, 0.3), pair(0.1, 0.12));
        let mut a = [0.1];
        let mut b = [0.1];
        let ja = gdpm.compute_solute_flux(0.04, 1.0, &mut a, 0.5, wcf, wcm, 0.25);
        let jb = dpm.compute_solute_flux(0.04, 1.0, &mut b, 0.5, wcf, wcm, 0.25);
        assert!((ja - jb).abs() < 1e-12);
        assert!((a[0] - b[0]).abs() < 1e-12);
    }

    #[test]
    fn test_generalized_profile_and_conservation() {
        let model = GeneralizedDualPorosity::new(4, 1.0, 1.0, 0.1);
        let wcm = pair(0.2, 0.2);
        let mut cm = [0.0; 4];
        let dt = 1.0;

        let j = model.compute_solute_flux(0.0, 1.0, &mut cm, dt, pair(0.3, 0.3), wcm, 0.2);
        let stored: f64 = cm.iter().map(|c| c * wcm.end / 4.0).sum();
        assert!((stored - dt * j).abs() < 1e-14);
        assert!(cm.windows(2).all(|w| w[0] > w[1]));
        assert!(cm.iter().all(|&c| c > 0.0 && c < 1.0));
    }

    #[test]
    fn test_tridiagonal() {
        let x = solve_tridiagonal(&[0.0, -1.0, -1.0], &[2.0, 2.0, 2.0], &[-1.0, -1.0, 0.0], &[1.0, 0.0, 1.0])
            .unwrap();
        for (xi, expected) in x.iter().zip([1.0, 1.0, 1.0]) {
            assert!((xi - expected).abs() < 1e-14);
        }
        assert!(solve_tridiagonal(&[0.0], &[0.0], &[0.0], &[1.0]).is_none());
    }

    #[test]
    fn test_coupling_over_cells() {
        let mesh = UnstructuredMesh::column_1d(3, 3.0, 1.0).unwrap();
        let coupling = MultiscaleCoupling::from_config(&MatrixClosure::DualPorosity {
            mass_transfer_coefficient: 1.0,
        });
        assert_eq!(coupling.num_matrix_nodes(), 1);
        assert_eq!(coupling.closure().name(), "dual porosity");

        let mut tcc = MultiField::from_components(vec![vec![1.0, 0.0, 0.5], vec![3.0; 3]]).unwrap();
        let mut matrix = MultiField::new(2, 3);
        let wf = [0.25; 3];
        let wm = [0.1; 3];
        let phi_m = [0.1; 3];
        let wc = ExchangeWaterContent {
            fracture_start: &wf,
            fracture_end: &wf,
            matrix_start: &wm,
            matrix_end: &wm,
            porosity_matrix: &phi_m,
        };
        coupling.apply(&mesh, &mut tcc, &mut matrix, 1, wc, 0.1);

        for c in 0..3 {
            let total = 0.25 * tcc.get(0, c) + 0.1 * matrix.get(0, c);
            let initial = [0.25, 0.0, 0.125][c];
            assert!((total - initial).abs() < 1e-14);
        }
        assert!(tcc.get(0, 0) < 1.0);
        assert_eq!(tcc.get(0, 1), 0.0);
        // 气相组分不参与交换
        assert_eq!(tcc.component(1), &[3.0; 3]);
        assert_eq!(matrix.component(1), &[0.0; 3]);
    }
}
