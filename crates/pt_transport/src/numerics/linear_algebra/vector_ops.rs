// crates/pt_transport/src/numerics/linear_algebra/vector_ops.rs

//! 向量运算（BLAS Level 1 风格）
//!
//! - [`dot`]: 点积 x·y
//! - [`norm2`]: 二范数 ||x||₂
//! - [`axpy`]: y = α*x + y
//! - [`xpay`]: y = x + α*y

/// 点积 x·y
#[inline]
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    x.iter().zip(y.iter()).map(|(&xi, &yi)| xi * yi).sum()
}

/// 二范数 ||x||₂
#[inline]
pub fn norm2(x: &[f64]) -> f64 {
    dot(x, x).sqrt()
}

/// 无穷范数 ||x||∞
#[inline]
pub fn norm_inf(x: &[f64]) -> f64 {
    x.iter().map(|&v| v.abs()).fold(0.0, f64::max)
}

/// AXPY: y = α*x + y
#[inline]
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// XPAY: y = x + α*y
#[inline]
pub fn xpay(x: &[f64], alpha: f64, y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi = xi + alpha * *yi;
    }
}

/// 残差 r = b - A x 的计算辅助：r = b - ax
#[inline]
pub fn residual_into(b: &[f64], ax: &[f64], r: &mut [f64]) {
    for ((ri, &bi), &axi) in r.iter_mut().zip(b).zip(ax) {
        *ri = bi - axi;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_and_norms() {
        let x = [1.0, 2.0, 3.0];
        let y = [4.0, 5.0, 6.0];
        assert_eq!(dot(&x, &y), 32.0);
        assert!((norm2(&x) - 14.0_f64.sqrt()).abs() < 1e-15);
        assert_eq!(norm_inf(&[-7.0, 2.0]), 7.0);
    }

    #[test]
    fn test_axpy_xpay() {
        let x = [1.0, 2.0];
        let mut y = [1.0, 1.0];
        axpy(2.0, &x, &mut y);
        assert_eq!(y, [3.0, 5.0]);
        xpay(&x, 0.5, &mut y);
        assert_eq!(y, [2.5, 4.5]);
    }

    #[test]
    fn test_residual_into() {
        let mut r = [0.0; 2];
        residual_into(&[1.0, 2.0], &[0.5, 3.0], &mut r);
        assert_eq!(r, [0.5, -1.0]);
    }
}
