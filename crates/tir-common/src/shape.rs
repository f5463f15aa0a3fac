//! Tensor shape algebra.
//!
//! A `TensorShape` is an ordered sequence of non-negative dimensions. The
//! scalar shape has rank 0. All shape-combining operations are total
//! functions returning `Option` — `None` means the operands are not
//! combinable under that operation.

use smallvec::SmallVec;

type Dims = SmallVec<[usize; 4]>;

/// The shape of a tensor: an ordered sequence of dimensions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TensorShape {
    dims: Dims,
}

impl TensorShape {
    /// The scalar (rank 0) shape.
    pub fn scalar() -> Self {
        TensorShape { dims: Dims::new() }
    }

    /// Create a shape from a dimension list.
    pub fn new(dims: impl IntoIterator<Item = usize>) -> Self {
        TensorShape {
            dims: dims.into_iter().collect(),
        }
    }

    /// The number of dimensions.
    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// True for the rank-0 shape.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// True for rank-1 shapes.
    #[inline]
    pub fn is_vector(&self) -> bool {
        self.dims.len() == 1
    }

    /// The dimensions as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.dims
    }

    /// Iterate over the dimensions.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.dims.iter().copied()
    }

    /// The total number of elements.
    pub fn contiguous_size(&self) -> usize {
        self.dims.iter().product()
    }

    /// Broadcast this shape with another, aligning from the trailing
    /// dimension. Two dimensions combine iff they are equal or either is 1.
    pub fn broadcast(&self, other: &TensorShape) -> Option<TensorShape> {
        let rank = self.rank().max(other.rank());
        let mut dims = Dims::with_capacity(rank);
        for i in 0..rank {
            let a = self.dim_from_end(i);
            let b = other.dim_from_end(i);
            let d = match (a, b) {
                (Some(a), Some(b)) if a == b => a,
                (Some(1), Some(b)) => b,
                (Some(a), Some(1)) => a,
                (Some(a), None) => a,
                (None, Some(b)) => b,
                _ => return None,
            };
            dims.push(d);
        }
        dims.reverse();
        Some(TensorShape { dims })
    }

    /// Concatenate along `axis`: ranks and all non-axis dimensions must
    /// match; the axis dimension is the sum.
    pub fn concatenating(&self, other: &TensorShape, axis: usize) -> Option<TensorShape> {
        if self.rank() != other.rank() || axis >= self.rank() {
            return None;
        }
        for i in 0..self.rank() {
            if i != axis && self.dims[i] != other.dims[i] {
                return None;
            }
        }
        let mut dims = self.dims.clone();
        dims[axis] += other.dims[axis];
        Some(TensorShape { dims })
    }

    /// Matrix-multiplied shape. Both operands must have rank >= 2 with
    /// equal leading (batch) dimensions and a matching inner dimension.
    pub fn matrix_multiplied(&self, other: &TensorShape) -> Option<TensorShape> {
        let r = self.rank();
        if r < 2 || other.rank() != r {
            return None;
        }
        if self.dims[..r - 2] != other.dims[..r - 2] {
            return None;
        }
        if self.dims[r - 1] != other.dims[r - 2] {
            return None;
        }
        let mut dims = Dims::from_slice(&self.dims[..r - 2]);
        dims.push(self.dims[r - 2]);
        dims.push(other.dims[r - 1]);
        Some(TensorShape { dims })
    }

    /// The shape with its dimension order reversed.
    pub fn transposed(&self) -> TensorShape {
        let mut dims = self.dims.clone();
        dims.reverse();
        TensorShape { dims }
    }

    /// Remove the dimensions at the given indices. Out-of-range indices are
    /// ignored.
    pub fn dropping_dimensions(&self, indices: &[usize]) -> TensorShape {
        let dims = self
            .dims
            .iter()
            .enumerate()
            .filter(|(i, _)| !indices.contains(i))
            .map(|(_, d)| *d)
            .collect();
        TensorShape { dims }
    }

    /// Remove the dimension at `index`.
    pub fn dropping_dimension(&self, index: usize) -> Option<TensorShape> {
        if index >= self.rank() {
            return None;
        }
        let mut dims = self.dims.clone();
        dims.remove(index);
        Some(TensorShape { dims })
    }

    /// Insert a size-1 dimension at `index` (which may equal the rank).
    pub fn padding_dimension(&self, index: usize) -> Option<TensorShape> {
        if index > self.rank() {
            return None;
        }
        let mut dims = self.dims.clone();
        dims.insert(index, 1);
        Some(TensorShape { dims })
    }

    /// Replace the dimension at `index`.
    pub fn with_dimension(&self, index: usize, size: usize) -> Option<TensorShape> {
        if index >= self.rank() {
            return None;
        }
        let mut dims = self.dims.clone();
        dims[index] = size;
        Some(TensorShape { dims })
    }

    /// Shapes are compatible when they broadcast.
    pub fn is_compatible_with(&self, other: &TensorShape) -> bool {
        self.broadcast(other).is_some()
    }

    fn dim_from_end(&self, i: usize) -> Option<usize> {
        if i < self.rank() {
            Some(self.dims[self.rank() - 1 - i])
        } else {
            None
        }
    }
}

impl std::ops::Index<usize> for TensorShape {
    type Output = usize;

    fn index(&self, index: usize) -> &usize {
        &self.dims[index]
    }
}

impl FromIterator<usize> for TensorShape {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        TensorShape::new(iter)
    }
}

impl From<&[usize]> for TensorShape {
    fn from(dims: &[usize]) -> Self {
        TensorShape::new(dims.iter().copied())
    }
}

impl std::fmt::Display for TensorShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_scalar() {
            return write!(f, "scalar");
        }
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, "x")?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(dims: &[usize]) -> TensorShape {
        TensorShape::from(dims)
    }

    #[test]
    fn broadcast_aligns_trailing_dimensions() {
        assert_eq!(
            shape(&[2, 1, 4]).broadcast(&shape(&[3, 4])),
            Some(shape(&[2, 3, 4]))
        );
        assert_eq!(
            shape(&[5]).broadcast(&TensorShape::scalar()),
            Some(shape(&[5]))
        );
        assert_eq!(shape(&[2, 3]).broadcast(&shape(&[4, 3])), None);
    }

    #[test]
    fn concatenating_sums_the_axis() {
        assert_eq!(
            shape(&[2, 3]).concatenating(&shape(&[2, 5]), 1),
            Some(shape(&[2, 8]))
        );
        assert_eq!(shape(&[2, 3]).concatenating(&shape(&[3, 3]), 1), None);
        assert_eq!(shape(&[2]).concatenating(&shape(&[2]), 1), None);
    }

    #[test]
    fn matrix_multiplied_requires_matching_inner() {
        assert_eq!(
            shape(&[4, 3]).matrix_multiplied(&shape(&[3, 7])),
            Some(shape(&[4, 7]))
        );
        assert_eq!(
            shape(&[8, 4, 3]).matrix_multiplied(&shape(&[8, 3, 2])),
            Some(shape(&[8, 4, 2]))
        );
        assert_eq!(shape(&[4, 3]).matrix_multiplied(&shape(&[4, 7])), None);
        assert_eq!(shape(&[3]).matrix_multiplied(&shape(&[3])), None);
    }

    #[test]
    fn dimension_edits() {
        assert_eq!(
            shape(&[2, 3, 4]).dropping_dimensions(&[0, 2]),
            shape(&[3])
        );
        assert_eq!(shape(&[2, 3]).padding_dimension(1), Some(shape(&[2, 1, 3])));
        assert_eq!(shape(&[2, 3]).padding_dimension(3), None);
        assert_eq!(shape(&[1, 5]).dropping_dimension(0), Some(shape(&[5])));
    }

    #[test]
    fn display_uses_x_separators() {
        assert_eq!(shape(&[2, 3, 4]).to_string(), "2x3x4");
        assert_eq!(TensorShape::scalar().to_string(), "scalar");
    }
}
