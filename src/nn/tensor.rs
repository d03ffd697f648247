//! Row-major `f32` tensors exchanged with the inference engine.
//!
//! Network outputs are decoded by indexing leading dimensions, which yields a [`TensorView`] of
//! the remaining ones.

use std::fmt;

use tinyvec::TinyVec;

/// Owned tensor of any rank.
#[derive(Clone)]
pub struct Tensor {
    shape: TinyVec<[usize; 6]>,
    data: Box<[f32]>,
}

impl Tensor {
    /// Fills a tensor of `shape` by calling `f` with every index, in row-major order.
    pub fn from_shape_fn<const N: usize>(
        shape: [usize; N],
        mut f: impl FnMut([usize; N]) -> f32,
    ) -> Self {
        let len = shape.iter().product();
        let data = (0..len)
            .map(|mut flat| {
                let mut index = [0; N];
                for (i, &dim) in index.iter_mut().zip(&shape).rev() {
                    *i = flat % dim;
                    flat /= dim;
                }
                f(index)
            })
            .collect();
        Self {
            shape: shape.iter().copied().collect(),
            data,
        }
    }

    /// Collects the row-major elements of a tensor of `shape`.
    ///
    /// Panics unless `elements` yields exactly the number of elements `shape` describes.
    #[track_caller]
    pub fn from_iter(shape: &[usize], elements: impl IntoIterator<Item = f32>) -> Self {
        let data: Box<[f32]> = elements.into_iter().collect();
        let expected: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected,
            "{} elements given for shape {shape:?}",
            data.len()
        );
        Self {
            shape: shape.iter().copied().collect(),
            data,
        }
    }

    pub(super) fn from_tract(tensor: &tract_onnx::prelude::Tensor) -> anyhow::Result<Self> {
        let data = tensor.as_slice::<f32>()?;
        Ok(Self::from_iter(tensor.shape(), data.iter().copied()))
    }

    pub(super) fn to_tract(&self) -> anyhow::Result<tract_onnx::prelude::Tensor> {
        let tensor = tract_onnx::prelude::Tensor::from_shape::<f32>(&self.shape, &self.data)?;
        Ok(tensor)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn view(&self) -> TensorView<'_> {
        TensorView {
            shape: &self.shape,
            data: &self.data,
        }
    }

    /// Same as [`TensorView::index`] on the whole tensor.
    #[track_caller]
    pub fn index<const N: usize>(&self, index: [usize; N]) -> TensorView<'_> {
        self.view().index(index)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor{:?}", self.shape())
    }
}

/// The trailing dimensions of a [`Tensor`], borrowed.
#[derive(Clone, Copy)]
pub struct TensorView<'a> {
    shape: &'a [usize],
    data: &'a [f32],
}

impl<'a> TensorView<'a> {
    pub fn shape(&self) -> &'a [usize] {
        self.shape
    }

    /// Fixes the first `N` dimensions to `index`.
    ///
    /// For a view of shape `[2, 3, 4]`, `[1]` gives a `[3, 4]` view and `[1, 2, 3]` a single
    /// element. Panics if `index` is longer than the shape or out of bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, index: [usize; N]) -> TensorView<'a> {
        assert!(
            N <= self.shape.len(),
            "index {index:?} is longer than shape {:?}",
            self.shape
        );
        let (outer, inner) = self.shape.split_at(N);
        let mut row = 0;
        for (&i, &len) in index.iter().zip(outer) {
            assert!(i < len, "index {index:?} out of bounds for shape {:?}", self.shape);
            row = row * len + i;
        }
        let size: usize = inner.iter().product();
        TensorView {
            shape: inner,
            data: &self.data[row * size..(row + 1) * size],
        }
    }

    /// Views of each entry along the first dimension. Panics on a 0-dimensional view.
    #[track_caller]
    pub fn rows(&self) -> impl Iterator<Item = TensorView<'a>> {
        let Some(&count) = self.shape.first() else {
            panic!("a 0-dimensional view has no rows");
        };
        let this = *self;
        (0..count).map(move |i| this.index([i]))
    }

    /// The elements of a 1-dimensional view.
    #[track_caller]
    pub fn as_slice(&self) -> &'a [f32] {
        assert_eq!(self.shape.len(), 1, "shape {:?} is not a vector", self.shape);
        self.data
    }

    /// The element of a 0-dimensional view.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert!(self.shape.is_empty(), "shape {:?} is not a scalar", self.shape);
        self.data[0]
    }
}

impl fmt::Debug for TensorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TensorView{:?}", self.shape)
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;

    #[test]
    fn shape_fn_is_row_major() {
        let mut visited = Vec::new();
        let tensor = Tensor::from_shape_fn([1, 2, 3], |index| {
            visited.push(index);
            visited.len() as f32
        });
        assert_eq!(visited[..4], [[0, 0, 0], [0, 0, 1], [0, 0, 2], [0, 1, 0]]);
        assert_eq!(visited.len(), 6);
        assert_eq!(tensor.shape(), &[1, 2, 3]);
        assert_eq!(tensor.index([0, 1]).as_slice(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn zero_sized_dimension() {
        let tensor = Tensor::from_shape_fn([1, 0, 3], |index| unreachable!("{index:?}"));
        assert_eq!(tensor.index([0]).shape(), &[0, 3]);
        assert_eq!(tensor.index([0]).rows().count(), 0);
    }

    #[test]
    fn scalar() {
        let tensor = Tensor::from_shape_fn([], |[]| 2.5);
        assert_eq!(tensor.index([]).as_singular(), 2.5);
    }

    #[test]
    fn nested_index() {
        let tensor = Tensor::from_iter(&[2, 2], [0.0, 1.0, 2.0, 3.0]);
        assert_eq!(tensor.index([1]).as_slice(), [2.0, 3.0]);
        assert_eq!(tensor.index([1, 0]).as_singular(), 2.0);
        assert_eq!(tensor.index([1]).index([1]).as_singular(), 3.0);
        let firsts = tensor.view().rows().map(|row| row.as_slice()[0]).collect_vec();
        assert_eq!(firsts, [0.0, 2.0]);
    }

    #[test]
    #[should_panic]
    fn index_out_of_bounds() {
        Tensor::from_iter(&[2], [1.0, 2.0]).index([2]);
    }

    #[test]
    #[should_panic]
    fn element_count_mismatch() {
        Tensor::from_iter(&[2, 2], [1.0, 2.0, 3.0]);
    }
}
