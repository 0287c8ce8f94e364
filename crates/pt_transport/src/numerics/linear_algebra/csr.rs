// crates/pt_transport/src/numerics/linear_algebra/csr.rs

//! 压缩稀疏行（CSR）矩阵
//!
//! 三个数组存储：
//! - `row_ptr`: 行指针，长度 n_rows + 1
//! - `col_idx`: 列索引（每行内有序）
//! - `values`: 非零元值
//!
//! 稀疏模式与值分离，同一网格上的弥散算子可复用模式。
//!
//! ```
//! use pt_transport::numerics::linear_algebra::CsrBuilder;
//!
//! let mut builder = CsrBuilder::new_square(3);
//! builder.set(0, 0, 4.0);
//! builder.set(0, 1, -1.0);
//! builder.set(1, 0, -1.0);
//! builder.set(1, 1, 4.0);
//! builder.set(2, 2, 4.0);
//! let matrix = builder.build();
//!
//! let mut y = vec![0.0; 3];
//! matrix.mul_vec(&[1.0, 2.0, 3.0], &mut y);
//! assert_eq!(y, vec![2.0, 7.0, 12.0]);
//! ```

use std::collections::BTreeMap;

// =============================================================================
// 稀疏模式
// =============================================================================

/// CSR 稀疏模式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrPattern {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
}

impl CsrPattern {
    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// 列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// 第 row 行的列索引
    #[inline]
    pub fn row_indices(&self, row: usize) -> &[usize] {
        &self.col_idx[self.row_ptr[row]..self.row_ptr[row + 1]]
    }

    /// 查找 (row, col) 对应的值索引
    pub fn find_index(&self, row: usize, col: usize) -> Option<usize> {
        let start = self.row_ptr[row];
        self.row_indices(row)
            .binary_search(&col)
            .ok()
            .map(|local| start + local)
    }
}

// =============================================================================
// CSR 矩阵
// =============================================================================

/// CSR 格式稀疏矩阵
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    pattern: CsrPattern,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// 对角矩阵
    pub fn diagonal(diag: &[f64]) -> Self {
        let mut builder = CsrBuilder::new_square(diag.len());
        for (i, &v) in diag.iter().enumerate() {
            builder.set(i, i, v);
        }
        builder.build()
    }

    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.pattern.n_rows
    }

    /// 列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.pattern.n_cols
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 稀疏模式
    #[inline]
    pub fn pattern(&self) -> &CsrPattern {
        &self.pattern
    }

    /// 值
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// (row, col) 的值，不存在返回 0
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.pattern
            .find_index(row, col)
            .map_or(0.0, |idx| self.values[idx])
    }

    /// 累加到已存在的 (row, col)，位置不存在返回 false
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) -> bool {
        match self.pattern.find_index(row, col) {
            Some(idx) => {
                self.values[idx] += value;
                true
            }
            None => false,
        }
    }

    /// 第 row 行的 (列, 值)
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.pattern.row_ptr[row]..self.pattern.row_ptr[row + 1];
        self.pattern.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// 对角元
    #[inline]
    pub fn diagonal_value(&self, row: usize) -> Option<f64> {
        self.pattern.find_index(row, row).map(|idx| self.values[idx])
    }

    /// 对角线向量
    pub fn extract_diagonal(&self) -> Vec<f64> {
        (0..self.n_rows())
            .map(|i| self.diagonal_value(i).unwrap_or(0.0))
            .collect()
    }

    /// y = A x
    ///
    /// # Panics
    /// 向量长度与矩阵维数不一致时
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        for (row, out) in y.iter_mut().enumerate() {
            *out = self.row(row).map(|(col, v)| v * x[col]).sum();
        }
    }

    /// 是否对称
    pub fn is_symmetric(&self, tol: f64) -> bool {
        if self.n_rows() != self.n_cols() {
            return false;
        }
        (0..self.n_rows()).all(|row| {
            self.row(row)
                .all(|(col, v)| (v - self.get(col, row)).abs() <= tol)
        })
    }

    /// 清零所有值（保留模式）
    pub fn clear_values(&mut self) {
        self.values.fill(0.0);
    }
}

// =============================================================================
// 构建器
// =============================================================================

/// CSR 矩阵构建器，每行一个有序映射
#[derive(Debug, Clone)]
pub struct CsrBuilder {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<BTreeMap<usize, f64>>,
}

impl CsrBuilder {
    /// 方阵构建器
    #[inline]
    pub fn new_square(n: usize) -> Self {
        Self::new(n, n)
    }

    /// 构建器
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            rows: vec![BTreeMap::new(); n_rows],
        }
    }

    /// 设置 (row, col)（覆盖）
    ///
    /// # Panics
    /// 索引越界时
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        assert!(row < self.n_rows && col < self.n_cols, "索引越界");
        self.rows[row].insert(col, value);
    }

    /// 累加到 (row, col)
    ///
    /// # Panics
    /// 索引越界时
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        assert!(row < self.n_rows && col < self.n_cols, "索引越界");
        *self.rows[row].entry(col).or_insert(0.0) += value;
    }

    /// (row, col) 当前值
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row].get(&col).copied().unwrap_or(0.0)
    }

    /// 当前非零元数量
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    /// 构建矩阵
    pub fn build(self) -> CsrMatrix {
        let nnz = self.nnz();
        let mut row_ptr = Vec::with_capacity(self.n_rows + 1);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);

        row_ptr.push(0);
        for row in self.rows {
            for (col, v) in row {
                col_idx.push(col);
                values.push(v);
            }
            row_ptr.push(col_idx.len());
        }

        CsrMatrix {
            pattern: CsrPattern {
                n_rows: self.n_rows,
                n_cols: self.n_cols,
                row_ptr,
                col_idx,
            },
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laplacian(n: usize) -> CsrMatrix {
        let mut b = CsrBuilder::new_square(n);
        for i in 0..n {
            b.add(i, i, 2.0);
            if i > 0 {
                b.add(i, i - 1, -1.0);
            }
            if i + 1 < n {
                b.add(i, i + 1, -1.0);
            }
        }
        b.build()
    }

    #[test]
    fn test_builder_accumulates() {
        let mut b = CsrBuilder::new_square(2);
        b.add(0, 0, 1.0);
        b.add(0, 0, 2.5);
        b.set(1, 0, -1.0);
        assert_eq!(b.get(0, 0), 3.5);
        assert_eq!(b.nnz(), 2);
        let m = b.build();
        assert_eq!(m.get(0, 0), 3.5);
        assert_eq!(m.get(0, 1), 0.0);
        assert_eq!(m.get(1, 0), -1.0);
    }

    #[test]
    fn test_pattern_lookup() {
        let m = laplacian(4);
        assert_eq!(m.nnz(), 10);
        assert_eq!(m.pattern().row_indices(1), &[0, 1, 2]);
        assert_eq!(m.pattern().find_index(0, 3), None);
        assert!(m.is_symmetric(0.0));
        assert_eq!(m.extract_diagonal(), vec![2.0; 4]);
    }

    #[test]
    fn test_add_to_existing_entry_only() {
        let mut m = laplacian(3);
        assert!(m.add(1, 1, 1.0));
        assert!(!m.add(0, 2, 1.0));
        assert_eq!(m.get(1, 1), 3.0);
        m.clear_values();
        assert_eq!(m.get(1, 1), 0.0);
    }

    #[test]
    fn test_diagonal_matrix() {
        let m = CsrMatrix::diagonal(&[1.0, 2.0]);
        let mut y = vec![0.0; 2];
        m.mul_vec(&[3.0, 4.0], &mut y);
        assert_eq!(y, vec![3.0, 8.0]);
    }
}
