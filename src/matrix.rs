use itertools::Itertools;

/// Boolean sparse matrix. Only `true` entries are stored, as sorted
/// column lists per row, so every operation below is a merge or a merge
/// of merges. `nnz` is the exact count of stored entries; the closure
/// kernels use its monotone growth as their termination witness and
/// never compare matrices elementwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseBool {
    nrows: usize,
    ncols: usize,
    rows: Vec<Vec<u32>>,
}

impl SparseBool {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        SparseBool {
            nrows,
            ncols,
            rows: vec![Vec::new(); nrows],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut matrix = SparseBool::new(n, n);
        for i in 0..n {
            matrix.rows[i].push(i as u32);
        }
        matrix
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.rows[row].binary_search(&(col as u32)).is_ok()
    }

    pub fn set(&mut self, row: usize, col: usize) {
        assert!(row < self.nrows && col < self.ncols, "entry out of shape");
        let col = col as u32;
        if let Err(position) = self.rows[row].binary_search(&col) {
            self.rows[row].insert(position, col);
        }
    }

    fn row(&self, row: usize) -> &[u32] {
        &self.rows[row]
    }

    /// Elementwise OR.
    pub fn or(&self, other: &SparseBool) -> SparseBool {
        assert_eq!(
            (self.nrows, self.ncols),
            (other.nrows, other.ncols),
            "or of differently shaped matrices"
        );
        let rows = self
            .rows
            .iter()
            .zip(&other.rows)
            .map(|(left, right)| left.iter().merge(right.iter()).dedup().copied().collect())
            .collect();
        SparseBool {
            nrows: self.nrows,
            ncols: self.ncols,
            rows,
        }
    }

    /// Entries of `self` that are not entries of `other`.
    pub fn difference(&self, other: &SparseBool) -> SparseBool {
        assert_eq!(
            (self.nrows, self.ncols),
            (other.nrows, other.ncols),
            "difference of differently shaped matrices"
        );
        let rows = self
            .rows
            .iter()
            .zip(&other.rows)
            .map(|(left, right)| {
                left.iter()
                    .filter(|col| right.binary_search(col).is_err())
                    .copied()
                    .collect()
            })
            .collect();
        SparseBool {
            nrows: self.nrows,
            ncols: self.ncols,
            rows,
        }
    }

    /// Boolean matrix product: OR of ANDs. Row `i` of the result is the
    /// union of the `other` rows selected by row `i` of `self`.
    pub fn matmul(&self, other: &SparseBool) -> SparseBool {
        assert_eq!(self.ncols, other.nrows, "matmul shape mismatch");
        let rows = self
            .rows
            .iter()
            .map(|cols| {
                cols.iter()
                    .map(|&mid| other.row(mid as usize).iter().copied())
                    .kmerge()
                    .dedup()
                    .collect()
            })
            .collect();
        SparseBool {
            nrows: self.nrows,
            ncols: other.ncols,
            rows,
        }
    }

    /// Kronecker product: entry `(i,j)` of `self` stamps a copy of
    /// `other` into block `(i,j)` of the result.
    pub fn kronecker(&self, other: &SparseBool) -> SparseBool {
        let nrows = self.nrows * other.nrows;
        let ncols = self.ncols * other.ncols;
        let mut rows = vec![Vec::new(); nrows];
        for (block_row, cols) in self.rows.iter().enumerate() {
            if cols.is_empty() {
                continue;
            }
            for (inner_row, inner_cols) in other.rows.iter().enumerate() {
                if inner_cols.is_empty() {
                    continue;
                }
                let target = &mut rows[block_row * other.nrows + inner_row];
                for &block_col in cols {
                    let base = block_col as usize * other.ncols;
                    target.extend(inner_cols.iter().map(|&c| (base + c as usize) as u32));
                }
            }
        }
        SparseBool { nrows, ncols, rows }
    }

    /// Block-diagonal sum `[[self, 0], [0, other]]`.
    pub fn block_diag(&self, other: &SparseBool) -> SparseBool {
        let mut rows = Vec::with_capacity(self.nrows + other.nrows);
        rows.extend(self.rows.iter().cloned());
        let offset = self.ncols as u32;
        rows.extend(
            other
                .rows
                .iter()
                .map(|cols| cols.iter().map(|&c| c + offset).collect()),
        );
        SparseBool {
            nrows: self.nrows + other.nrows,
            ncols: self.ncols + other.ncols,
            rows,
        }
    }

    /// Non-zero entries in row-major order.
    pub fn iter_nonzero(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(row, cols)| cols.iter().map(move |&col| (row, col as usize)))
    }

    /// Non-zero columns of one row.
    pub fn iter_row(&self, row: usize) -> impl Iterator<Item = usize> + '_ {
        self.rows[row].iter().map(|&col| col as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_entries(nrows: usize, ncols: usize, entries: &[(usize, usize)]) -> SparseBool {
        let mut matrix = SparseBool::new(nrows, ncols);
        for &(i, j) in entries {
            matrix.set(i, j);
        }
        matrix
    }

    #[test]
    fn set_is_idempotent() {
        let mut matrix = SparseBool::new(2, 2);
        matrix.set(0, 1);
        matrix.set(0, 1);
        assert_eq!(matrix.nnz(), 1);
        assert!(matrix.get(0, 1));
        assert!(!matrix.get(1, 0));
    }

    #[test]
    fn or_is_elementwise_union() {
        let a = from_entries(2, 2, &[(0, 0), (1, 1)]);
        let b = from_entries(2, 2, &[(0, 1), (1, 1)]);
        let c = a.or(&b);
        assert_eq!(
            c.iter_nonzero().collect::<Vec<_>>(),
            vec![(0, 0), (0, 1), (1, 1)]
        );
    }

    #[test]
    fn matmul_is_boolean_product() {
        // path 0 -> 1 -> 2 composed with itself reaches 0 -> 2
        let step = from_entries(3, 3, &[(0, 1), (1, 2)]);
        let two_steps = step.matmul(&step);
        assert_eq!(two_steps.iter_nonzero().collect::<Vec<_>>(), vec![(0, 2)]);
    }

    #[test]
    fn matmul_merges_rows() {
        let a = from_entries(1, 2, &[(0, 0), (0, 1)]);
        let b = from_entries(2, 3, &[(0, 0), (0, 2), (1, 1), (1, 2)]);
        let c = a.matmul(&b);
        assert_eq!(
            c.iter_nonzero().collect::<Vec<_>>(),
            vec![(0, 0), (0, 1), (0, 2)]
        );
    }

    #[test]
    fn kronecker_of_identities() {
        let product = SparseBool::identity(2).kronecker(&SparseBool::identity(3));
        assert_eq!(product.nrows(), 6);
        assert_eq!(product.nnz(), 6);
        for i in 0..6 {
            assert!(product.get(i, i));
        }
    }

    #[test]
    fn kronecker_places_blocks() {
        let a = from_entries(2, 2, &[(0, 1)]);
        let b = from_entries(2, 2, &[(1, 0)]);
        let product = a.kronecker(&b);
        // block (0,1) of the 4x4 result carries b's single entry
        assert_eq!(product.iter_nonzero().collect::<Vec<_>>(), vec![(1, 2)]);
    }

    #[test]
    fn block_diag_keeps_halves_apart() {
        let a = from_entries(1, 1, &[(0, 0)]);
        let b = from_entries(2, 2, &[(0, 1)]);
        let sum = a.block_diag(&b);
        assert_eq!(sum.nrows(), 3);
        assert_eq!(sum.iter_nonzero().collect::<Vec<_>>(), vec![(0, 0), (1, 2)]);
    }

    #[test]
    fn difference_removes_shared_entries() {
        let a = from_entries(2, 2, &[(0, 0), (0, 1), (1, 0)]);
        let b = from_entries(2, 2, &[(0, 1)]);
        let d = a.difference(&b);
        assert_eq!(d.iter_nonzero().collect::<Vec<_>>(), vec![(0, 0), (1, 0)]);
    }
}
