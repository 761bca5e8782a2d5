use ndarray::{Array4, Axis};
use shared::{NormalizationProfile, TensorLayout};

/// Batch-of-one image tensor laid out the way its profile demands.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    data: Array4<f32>,
    profile: NormalizationProfile,
}

impl NormalizedTensor {
    pub fn new(data: Array4<f32>, profile: NormalizationProfile) -> Self {
        debug_assert_eq!(
            data.shape(),
            &Self::expected_shape(profile)[..],
            "tensor shape does not match profile {}",
            profile
        );
        Self { data, profile }
    }

    pub fn zeros(profile: NormalizationProfile) -> Self {
        let [n, a, b, c] = Self::expected_shape(profile);
        Self::new(Array4::zeros((n, a, b, c)), profile)
    }

    pub fn expected_shape(profile: NormalizationProfile) -> [usize; 4] {
        let (width, height) = profile.input_size();
        let (w, h) = (width as usize, height as usize);
        match profile.layout() {
            TensorLayout::Nchw => [1, 3, h, w],
            TensorLayout::Nhwc => [1, h, w, 3],
        }
    }

    pub fn matches_profile(&self, profile: NormalizationProfile) -> bool {
        self.profile == profile && self.data.shape() == &Self::expected_shape(profile)[..]
    }

    pub fn profile(&self) -> NormalizationProfile {
        self.profile
    }

    pub fn layout(&self) -> TensorLayout {
        self.profile.layout()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    /// Row-major copy of the whole tensor.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    /// The single batch element as nested rows, for JSON transports.
    pub fn instance(&self) -> Vec<Vec<Vec<f32>>> {
        let sample = self.data.index_axis(Axis(0), 0);
        sample
            .outer_iter()
            .map(|plane| plane.outer_iter().map(|row| row.to_vec()).collect())
            .collect()
    }
}
