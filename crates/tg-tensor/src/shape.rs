use std::fmt;

/// Maximum number of dimensions a tensor can have.
pub const MAX_DIMS: usize = 4;

/// A tensor shape: up to [`MAX_DIMS`] dimension sizes, with trailing unused
/// dimensions stored as 1.
///
/// Dimension 0 is the contiguous (fastest-varying) one, so a matrix with
/// dims `[k, n]` holds `n` rows of `k` elements each. Two shapes compare
/// equal when their padded dimension arrays are equal: `[2, 3]` and
/// `[2, 3, 1, 1]` describe the same layout.
#[derive(Debug, Clone, Copy)]
pub struct Shape {
    dims: [usize; MAX_DIMS],
    rank: usize,
}

impl Shape {
    /// Create a shape from a slice of dimension sizes.
    ///
    /// # Panics
    /// Panics if more than [`MAX_DIMS`] dimensions are given, or if any
    /// dimension is zero.
    pub fn new(dims: &[usize]) -> Self {
        assert!(
            dims.len() <= MAX_DIMS,
            "shape {:?} has more than {} dimensions",
            dims,
            MAX_DIMS
        );
        assert!(
            dims.iter().all(|&d| d > 0),
            "shape {:?} has a zero-sized dimension",
            dims
        );
        let mut padded = [1usize; MAX_DIMS];
        padded[..dims.len()].copy_from_slice(dims);
        Shape {
            dims: padded,
            rank: dims.len().max(1),
        }
    }

    /// Shorthand for a 1-D shape.
    pub fn vector(d0: usize) -> Self {
        Shape::new(&[d0])
    }

    /// Shorthand for a 2-D shape.
    pub fn matrix(d0: usize, d1: usize) -> Self {
        Shape::new(&[d0, d1])
    }

    /// Number of dimensions as constructed (trailing 1s not counted).
    pub fn ndim(&self) -> usize {
        self.rank
    }

    /// Returns the size of dimension `i`. Trailing dimensions are 1.
    ///
    /// # Panics
    /// Panics if `i >= MAX_DIMS`.
    pub fn dim(&self, i: usize) -> usize {
        self.dims[i]
    }

    /// All [`MAX_DIMS`] dimension sizes, trailing 1s included.
    pub fn dims(&self) -> &[usize; MAX_DIMS] {
        &self.dims
    }

    /// The dimension sizes truncated to `ndim`, for display and error
    /// reporting.
    pub fn to_vec(&self) -> Vec<usize> {
        self.dims[..self.rank].to_vec()
    }

    /// Total number of elements (product of all dimension sizes).
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Row-major byte strides for elements of `elem_size` bytes:
    /// `stride[0] = elem_size`, `stride[i] = stride[i-1] * dim[i-1]`.
    pub fn byte_strides(&self, elem_size: usize) -> [usize; MAX_DIMS] {
        let mut strides = [0usize; MAX_DIMS];
        strides[0] = elem_size;
        for i in 1..MAX_DIMS {
            strides[i] = strides[i - 1] * self.dims[i - 1];
        }
        strides
    }

    /// True if a tensor of this shape can be broadcast onto `target`:
    /// every axis must either match the target's or be 1. Absent axes are
    /// stored as 1, so the rule covers lower-rank operands uniformly.
    pub fn broadcasts_to(&self, target: &Shape) -> bool {
        (0..MAX_DIMS).all(|i| self.dims[i] == target.dims[i] || self.dims[i] == 1)
    }

    /// Decompose a flat row-major element index into per-dimension indices
    /// (dimension 0 varies fastest).
    pub fn unflatten(&self, flat: usize) -> [usize; MAX_DIMS] {
        let mut idx = [0usize; MAX_DIMS];
        let mut rest = flat;
        for i in 0..MAX_DIMS {
            idx[i] = rest % self.dims[i];
            rest /= self.dims[i];
        }
        idx
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        // Trailing 1s carry no layout information; rank is display-only.
        self.dims == other.dims
    }
}

impl Eq for Shape {}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims[..self.rank].iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}
