#![forbid(unsafe_code)]

pub mod generate;
mod scalar;

pub use scalar::{Precision, Real};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Uplo {
    Upper,
    Lower,
}

impl Uplo {
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            Self::Upper => 'U',
            Self::Lower => 'L',
        }
    }
}

/// Row layout of a general band.
///
/// `Factor` reserves `kl` extra leading rows so an LU factorization with
/// partial pivoting has room for its fill-in (`ldab = 2*kl + ku + 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandLayout {
    Factor,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageKind {
    Dense,
    Banded {
        kl: usize,
        ku: usize,
        layout: BandLayout,
    },
    SymmetricBand {
        kd: usize,
        uplo: Uplo,
    },
    Packed {
        uplo: Uplo,
    },
    /// `[sub-diagonal (n-1) | diagonal (n) | super-diagonal (n-1)]`.
    Tridiagonal,
}

impl StorageKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::Banded { .. } => "banded",
            Self::SymmetricBand { .. } => "symmetric_band",
            Self::Packed { .. } => "packed",
            Self::Tridiagonal => "tridiagonal",
        }
    }
}

#[must_use]
pub fn band_leading_dimension(kl: usize, ku: usize, layout: BandLayout) -> usize {
    match layout {
        BandLayout::Factor => 2 * kl + ku + 1,
        BandLayout::Plain => kl + ku + 1,
    }
}

#[must_use]
pub fn packed_len(n: usize) -> usize {
    n * (n + 1) / 2
}

/// Column-major offset of `(i, j)` inside packed triangular storage.
#[must_use]
pub fn packed_index(uplo: Uplo, n: usize, i: usize, j: usize) -> usize {
    match uplo {
        Uplo::Upper => i + j * (j + 1) / 2,
        Uplo::Lower => i + j * (2 * n - j - 1) / 2,
    }
}

/// A numeric array plus the shape metadata describing how to read it.
///
/// The storage kind is chosen at construction and has no setter; routines
/// may overwrite the values of their own clone but never its layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture<T> {
    kind: StorageKind,
    rows: usize,
    cols: usize,
    ld: usize,
    data: Vec<T>,
}

impl<T: Real> Fixture<T> {
    #[must_use]
    pub fn dense(rows: usize, cols: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "dense fixture {rows}x{cols} needs {} values",
            rows * cols
        );
        Self {
            kind: StorageKind::Dense,
            rows,
            cols,
            ld: rows.max(1),
            data,
        }
    }

    #[must_use]
    pub fn from_fn(rows: usize, cols: usize, mut entry: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for j in 0..cols {
            for i in 0..rows {
                data.push(entry(i, j));
            }
        }
        Self::dense(rows, cols, data)
    }

    #[must_use]
    pub fn vector(values: Vec<T>) -> Self {
        let rows = values.len();
        Self::dense(rows, 1, values)
    }

    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::dense(rows, cols, vec![T::ZERO; rows * cols])
    }

    #[must_use]
    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, n, |i, j| if i == j { T::ONE } else { T::ZERO })
    }

    /// Three split vectors of an `n x n` tridiagonal matrix.
    #[must_use]
    pub fn tridiagonal(sub: Vec<T>, diag: Vec<T>, sup: Vec<T>) -> Self {
        let n = diag.len();
        let off = n.saturating_sub(1);
        assert!(
            sub.len() == off && sup.len() == off,
            "tridiagonal fixture of order {n} needs {off} sub- and super-diagonal entries"
        );
        let mut data = sub;
        data.extend(diag);
        data.extend(sup);
        Self {
            kind: StorageKind::Tridiagonal,
            rows: n,
            cols: n,
            ld: 1,
            data,
        }
    }

    #[must_use]
    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn ld(&self) -> usize {
        self.ld
    }

    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Dense entry `(i, j)`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> T {
        debug_assert_eq!(self.kind, StorageKind::Dense);
        self.data[i + j * self.ld]
    }

    pub fn set(&mut self, i: usize, j: usize, value: T) {
        debug_assert_eq!(self.kind, StorageKind::Dense);
        self.data[i + j * self.ld] = value;
    }

    /// Copy of a dense fixture stored with a larger leading dimension.
    /// Padding rows hold zeros.
    #[must_use]
    pub fn with_leading_dimension(&self, ld: usize) -> Self {
        assert_eq!(self.kind, StorageKind::Dense, "only dense fixtures can be padded");
        assert!(
            ld >= self.rows.max(1),
            "leading dimension {ld} is smaller than {} rows",
            self.rows
        );
        let mut data = vec![T::ZERO; ld * self.cols];
        for j in 0..self.cols {
            for i in 0..self.rows {
                data[i + j * ld] = self.get(i, j);
            }
        }
        Self {
            kind: StorageKind::Dense,
            rows: self.rows,
            cols: self.cols,
            ld,
            data,
        }
    }

    /// Logical entry `(i, j)` regardless of storage kind; entries outside
    /// the stored band or triangle read as zero (or mirror for symmetric kinds).
    #[must_use]
    pub fn logical(&self, i: usize, j: usize) -> T {
        match self.kind {
            StorageKind::Dense => self.get(i, j),
            StorageKind::Banded { kl, ku, layout } => {
                if i + ku < j || i > j + kl {
                    T::ZERO
                } else {
                    let offset = match layout {
                        BandLayout::Factor => kl,
                        BandLayout::Plain => 0,
                    };
                    self.data[offset + ku + i - j + j * self.ld]
                }
            }
            StorageKind::SymmetricBand { kd, uplo } => {
                let (r, c) = if i <= j { (i, j) } else { (j, i) };
                if c - r > kd {
                    return T::ZERO;
                }
                match uplo {
                    Uplo::Upper => self.data[kd + r - c + c * self.ld],
                    Uplo::Lower => self.data[c - r + r * self.ld],
                }
            }
            StorageKind::Packed { uplo } => {
                let (r, c) = match uplo {
                    Uplo::Upper if i <= j => (i, j),
                    Uplo::Upper => (j, i),
                    Uplo::Lower if i >= j => (i, j),
                    Uplo::Lower => (j, i),
                };
                self.data[packed_index(uplo, self.rows, r, c)]
            }
            StorageKind::Tridiagonal => {
                let (sub, diag, sup) = self.tridiagonal_parts();
                if i == j {
                    diag[i]
                } else if i == j + 1 {
                    sub[j]
                } else if j == i + 1 {
                    sup[i]
                } else {
                    T::ZERO
                }
            }
        }
    }

    /// Decode any storage kind back into a dense column-major matrix.
    #[must_use]
    pub fn to_dense(&self) -> Self {
        Self::from_fn(self.rows, self.cols, |i, j| self.logical(i, j))
    }

    /// Encode a dense matrix into general band storage.
    ///
    /// # Panics
    /// When `kl + ku` does not leave the band narrower than the matrix.
    #[must_use]
    pub fn to_band(&self, kl: usize, ku: usize, layout: BandLayout) -> Self {
        assert_eq!(self.kind, StorageKind::Dense, "band encoding expects a dense fixture");
        assert!(
            kl + ku < self.rows.max(1),
            "band widths kl={kl} ku={ku} are inconsistent with {} rows",
            self.rows
        );
        let ld = band_leading_dimension(kl, ku, layout);
        let offset = match layout {
            BandLayout::Factor => kl,
            BandLayout::Plain => 0,
        };
        let mut data = vec![T::ZERO; ld * self.cols];
        for j in 0..self.cols {
            let first = j.saturating_sub(ku);
            let last = (j + kl + 1).min(self.rows);
            for i in first..last {
                data[offset + ku + i - j + j * ld] = self.get(i, j);
            }
        }
        Self {
            kind: StorageKind::Banded { kl, ku, layout },
            rows: self.rows,
            cols: self.cols,
            ld,
            data,
        }
    }

    /// Encode the `uplo` triangle of a symmetric dense matrix into
    /// symmetric band storage with `ldab = kd + 1`.
    #[must_use]
    pub fn to_symmetric_band(&self, kd: usize, uplo: Uplo) -> Self {
        assert_eq!(self.kind, StorageKind::Dense, "band encoding expects a dense fixture");
        assert_eq!(self.rows, self.cols, "symmetric band needs a square matrix");
        assert!(
            kd < self.rows.max(1),
            "band width kd={kd} is inconsistent with order {}",
            self.rows
        );
        let n = self.rows;
        let ld = kd + 1;
        let mut data = vec![T::ZERO; ld * n];
        for j in 0..n {
            match uplo {
                Uplo::Upper => {
                    for i in j.saturating_sub(kd)..=j {
                        data[kd + i - j + j * ld] = self.get(i, j);
                    }
                }
                Uplo::Lower => {
                    for i in j..(j + kd + 1).min(n) {
                        data[i - j + j * ld] = self.get(i, j);
                    }
                }
            }
        }
        Self {
            kind: StorageKind::SymmetricBand { kd, uplo },
            rows: n,
            cols: n,
            ld,
            data,
        }
    }

    /// Encode one triangle of a square dense matrix in packed column order.
    #[must_use]
    pub fn to_packed(&self, uplo: Uplo) -> Self {
        assert_eq!(self.kind, StorageKind::Dense, "packing expects a dense fixture");
        assert_eq!(self.rows, self.cols, "packed storage needs a square matrix");
        let n = self.rows;
        let mut data = Vec::with_capacity(packed_len(n));
        for j in 0..n {
            let range = match uplo {
                Uplo::Upper => 0..j + 1,
                Uplo::Lower => j..n,
            };
            for i in range {
                data.push(self.get(i, j));
            }
        }
        Self {
            kind: StorageKind::Packed { uplo },
            rows: n,
            cols: n,
            ld: 1,
            data,
        }
    }

    #[must_use]
    pub fn tridiagonal_parts(&self) -> (&[T], &[T], &[T]) {
        assert_eq!(self.kind, StorageKind::Tridiagonal);
        let off = self.rows.saturating_sub(1);
        let (sub, rest) = self.data.split_at(off);
        let (diag, sup) = rest.split_at(self.rows);
        (sub, diag, sup)
    }

    pub fn tridiagonal_parts_mut(&mut self) -> (&mut [T], &mut [T], &mut [T]) {
        assert_eq!(self.kind, StorageKind::Tridiagonal);
        let off = self.rows.saturating_sub(1);
        let (sub, rest) = self.data.split_at_mut(off);
        let (diag, sup) = rest.split_at_mut(self.rows);
        (sub, diag, sup)
    }

    #[must_use]
    pub fn max_abs(&self) -> T {
        max_abs(&self.data)
    }

    #[must_use]
    pub fn transpose(&self) -> Self {
        let dense = self.to_dense();
        Self::from_fn(self.cols, self.rows, |i, j| dense.get(j, i))
    }

    #[must_use]
    pub fn matmul(&self, rhs: &Self) -> Self {
        assert_eq!(
            self.cols, rhs.rows,
            "cannot multiply {}x{} by {}x{}",
            self.rows, self.cols, rhs.rows, rhs.cols
        );
        let lhs = self.to_dense();
        let rhs = rhs.to_dense();
        Self::from_fn(lhs.rows, rhs.cols, |i, j| {
            let mut acc = T::ZERO;
            for k in 0..lhs.cols {
                acc += lhs.get(i, k) * rhs.get(k, j);
            }
            acc
        })
    }

    /// Hex SHA-256 of kind, shape and little-endian values.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut bytes = Vec::with_capacity(self.data.len() * 8 + 64);
        bytes.extend_from_slice(self.kind.as_str().as_bytes());
        bytes.extend_from_slice(T::PRECISION.as_str().as_bytes());
        for dim in [self.rows, self.cols, self.ld] {
            bytes.extend_from_slice(&(dim as u64).to_le_bytes());
        }
        for &value in &self.data {
            value.append_le_bytes(&mut bytes);
        }
        let digest = Sha256::digest(&bytes);
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[must_use]
pub fn max_abs<T: Real>(values: &[T]) -> T {
    values
        .iter()
        .fold(T::ZERO, |acc, &value| acc.max(value.abs()))
}
