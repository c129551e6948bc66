//! Feature tensors and temporal alignment.

use ndarray::{concatenate, Array2, ArrayView2, Axis, ShapeError, Slice};

/// A `(T, D)` feature matrix: `T` temporal samples of a `D`-dimensional
/// embedding. `D` is fixed by the encoder; `T` depends on the media.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTensor(Array2<f32>);

impl FeatureTensor {
    pub fn new(array: Array2<f32>) -> Self {
        Self(array)
    }

    /// Build from row-major data.
    pub fn from_shape_vec(rows: usize, dim: usize, data: Vec<f32>) -> Result<Self, ShapeError> {
        Array2::from_shape_vec((rows, dim), data).map(Self)
    }

    /// Stack row blocks (e.g. inference batches) along the temporal axis.
    pub fn concat_rows(parts: &[FeatureTensor]) -> Result<Self, ShapeError> {
        let views: Vec<ArrayView2<'_, f32>> = parts.iter().map(|p| p.0.view()).collect();
        concatenate(Axis(0), &views).map(Self)
    }

    /// Number of temporal samples.
    pub fn rows(&self) -> usize {
        self.0.nrows()
    }

    /// Embedding dimensionality.
    pub fn dim(&self) -> usize {
        self.0.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.0.dim()
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.0
    }

    pub fn into_inner(self) -> Array2<f32> {
        self.0
    }

    /// Keep the first `n` rows; a no-op when `n >= rows()`.
    pub fn truncate_rows(&mut self, n: usize) {
        if n < self.rows() {
            self.0.slice_axis_inplace(Axis(0), Slice::from(0..n));
        }
    }
}

impl From<Array2<f32>> for FeatureTensor {
    fn from(array: Array2<f32>) -> Self {
        Self(array)
    }
}

/// Truncate two tensors to their common temporal length.
///
/// Lower length wins: the longer tensor loses rows from the tail, no padding
/// or interpolation. Equal-length inputs are returned untouched.
pub fn align(mut first: FeatureTensor, mut second: FeatureTensor) -> (FeatureTensor, FeatureTensor) {
    let n = first.rows().min(second.rows());
    first.truncate_rows(n);
    second.truncate_rows(n);
    (first, second)
}

/// Vision and audio features of one clip with identical `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPair {
    vision: FeatureTensor,
    audio: FeatureTensor,
}

impl AlignedPair {
    pub fn new(vision: FeatureTensor, audio: FeatureTensor) -> Self {
        let (vision, audio) = align(vision, audio);
        Self { vision, audio }
    }

    pub fn rows(&self) -> usize {
        self.vision.rows()
    }

    pub fn vision(&self) -> &FeatureTensor {
        &self.vision
    }

    pub fn audio(&self) -> &FeatureTensor {
        &self.audio
    }

    pub fn into_parts(self) -> (FeatureTensor, FeatureTensor) {
        (self.vision, self.audio)
    }
}
