pub mod errors;

pub use errors::{DfeError, DfeErrorCategory, DfeResult};

use crate::numerics::stable_sum;
use serde::{Deserialize, Serialize};

/// Population-scaled selection coefficient: negative is deleterious, positive
/// beneficial, zero neutral.
pub type GammaValue = f64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpectrumError {
    #[error("spectrum shape must contain at least one axis")]
    EmptyShape,
    #[error("spectrum axis {axis} has zero length")]
    ZeroLengthAxis { axis: usize },
    #[error("spectrum data length {actual} does not match shape {shape:?} (expected {expected})")]
    LengthMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("spectrum shapes differ: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },
}

impl From<SpectrumError> for DfeError {
    fn from(error: SpectrumError) -> Self {
        DfeError::input_validation("INPUT.SPECTRUM_SHAPE", error.to_string())
    }
}

/// Expected allele-frequency spectrum for one (demography, gamma) pair.
///
/// Entries are stored row-major; axis `i` has length `sample_sizes[i] + 1`.
/// Deserialization goes through [`Spectrum::new`], so a decoded spectrum
/// always holds exactly as many entries as its shape describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpectrum")]
pub struct Spectrum {
    shape: Vec<usize>,
    data: Vec<f64>,
}

#[derive(Deserialize)]
struct RawSpectrum {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl TryFrom<RawSpectrum> for Spectrum {
    type Error = SpectrumError;

    fn try_from(raw: RawSpectrum) -> Result<Self, Self::Error> {
        Self::new(raw.shape, raw.data)
    }
}

impl Spectrum {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, SpectrumError> {
        let expected = element_count(&shape)?;
        if data.len() != expected {
            return Err(SpectrumError::LengthMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }

        Ok(Self { shape, data })
    }

    pub fn from_sample_sizes(sample_sizes: &[usize], data: Vec<f64>) -> Result<Self, SpectrumError> {
        Self::new(shape_for_sample_sizes(sample_sizes), data)
    }

    pub fn zeros(shape: &[usize]) -> Result<Self, SpectrumError> {
        let count = element_count(shape)?;
        Ok(Self {
            shape: shape.to_vec(),
            data: vec![0.0; count],
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn sample_sizes(&self) -> Vec<usize> {
        self.shape.iter().map(|axis| axis - 1).collect()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn total(&self) -> f64 {
        stable_sum(&self.data)
    }

    pub fn max_abs(&self) -> f64 {
        self.data
            .iter()
            .fold(0.0_f64, |max, value| max.max(value.abs()))
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|value| value.is_finite())
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().map(|value| value * factor).collect(),
        }
    }

    /// `self += factor * other`, element-wise.
    pub fn add_scaled(&mut self, other: &Spectrum, factor: f64) -> Result<(), SpectrumError> {
        self.ensure_same_shape(other)?;
        for (target, value) in self.data.iter_mut().zip(&other.data) {
            *target += factor * value;
        }
        Ok(())
    }

    pub fn ensure_same_shape(&self, other: &Spectrum) -> Result<(), SpectrumError> {
        if self.shape != other.shape {
            return Err(SpectrumError::ShapeMismatch {
                left: self.shape.clone(),
                right: other.shape.clone(),
            });
        }
        Ok(())
    }

    /// True for the all-ancestral and all-derived entries, which carry no
    /// polymorphism information.
    pub fn is_corner(&self, flat_index: usize) -> bool {
        let mut remainder = flat_index;
        let mut all_zero = true;
        let mut all_full = true;
        for axis_len in self.shape.iter().rev() {
            let coordinate = remainder % axis_len;
            remainder /= axis_len;
            all_zero &= coordinate == 0;
            all_full &= coordinate + 1 == *axis_len;
        }
        all_zero || all_full
    }
}

pub fn shape_for_sample_sizes(sample_sizes: &[usize]) -> Vec<usize> {
    sample_sizes.iter().map(|size| size + 1).collect()
}

fn element_count(shape: &[usize]) -> Result<usize, SpectrumError> {
    if shape.is_empty() {
        return Err(SpectrumError::EmptyShape);
    }
    if let Some(axis) = shape.iter().position(|axis_len| *axis_len == 0) {
        return Err(SpectrumError::ZeroLengthAxis { axis });
    }
    Ok(shape.iter().product())
}

/// Fixed inputs shared by every solve of one cache: demographic parameters
/// (without the trailing gamma), sample sizes and the increasing solver grid
/// resolutions used for extrapolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographySetup {
    pub params: Vec<f64>,
    pub sample_sizes: Vec<usize>,
    pub grid_resolutions: Vec<usize>,
}

impl DemographySetup {
    pub fn new(
        params: impl Into<Vec<f64>>,
        sample_sizes: impl Into<Vec<usize>>,
        grid_resolutions: impl Into<Vec<usize>>,
    ) -> Self {
        Self {
            params: params.into(),
            sample_sizes: sample_sizes.into(),
            grid_resolutions: grid_resolutions.into(),
        }
    }

    pub fn spectrum_shape(&self) -> Vec<usize> {
        shape_for_sample_sizes(&self.sample_sizes)
    }
}

/// Class of worker draining the build queue; solvers may route accelerator
/// jobs to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkerKind {
    #[default]
    Cpu,
    Accelerator,
}

impl WorkerKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Accelerator => "accelerator",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DemographySetup, Spectrum, SpectrumError};

    #[test]
    fn spectrum_validates_shape_against_data_length() {
        let error = Spectrum::from_sample_sizes(&[4], vec![0.0; 4]).expect_err("length mismatch");
        assert_eq!(
            error,
            SpectrumError::LengthMismatch {
                shape: vec![5],
                expected: 5,
                actual: 4,
            }
        );

        assert_eq!(Spectrum::new(vec![], vec![]), Err(SpectrumError::EmptyShape));
        assert_eq!(
            Spectrum::new(vec![3, 0], vec![]),
            Err(SpectrumError::ZeroLengthAxis { axis: 1 })
        );
    }

    #[test]
    fn decoding_applies_the_same_shape_checks() {
        let decoded: Spectrum =
            serde_json::from_str(r#"{"shape":[3],"data":[1.0,2.0,3.0]}"#).expect("valid spectrum");
        assert_eq!(decoded.data(), &[1.0, 2.0, 3.0]);

        let short = serde_json::from_str::<Spectrum>(r#"{"shape":[3],"data":[1.0]}"#)
            .expect_err("short data");
        assert!(short.to_string().contains("does not match shape"), "{short}");
        assert!(serde_json::from_str::<Spectrum>(r#"{"shape":[],"data":[]}"#).is_err());
    }

    #[test]
    fn add_scaled_accumulates_and_rejects_mismatched_shapes() {
        let mut acc = Spectrum::zeros(&[3]).expect("zeros");
        let one = Spectrum::new(vec![3], vec![1.0, 2.0, 3.0]).expect("spectrum");
        acc.add_scaled(&one, 2.0).expect("same shape");
        acc.add_scaled(&one, -0.5).expect("same shape");
        assert_eq!(acc.data(), &[1.5, 3.0, 4.5]);

        let other = Spectrum::zeros(&[4]).expect("zeros");
        assert!(matches!(
            acc.add_scaled(&other, 1.0),
            Err(SpectrumError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn corners_cover_monomorphic_entries_in_every_dimension() {
        let one_d = Spectrum::zeros(&[5]).expect("zeros");
        let corners: Vec<usize> = (0..5).filter(|index| one_d.is_corner(*index)).collect();
        assert_eq!(corners, vec![0, 4]);

        let two_d = Spectrum::zeros(&[3, 4]).expect("zeros");
        let corners: Vec<usize> = (0..12).filter(|index| two_d.is_corner(*index)).collect();
        assert_eq!(corners, vec![0, 11]);
    }

    #[test]
    fn demography_setup_derives_spectrum_shape() {
        let setup = DemographySetup::new(vec![0.5, 0.1], vec![10, 6], vec![40, 50, 60]);
        assert_eq!(setup.spectrum_shape(), vec![11, 7]);
        let spectrum = Spectrum::zeros(&setup.spectrum_shape()).expect("zeros");
        assert_eq!(spectrum.sample_sizes(), vec![10, 6]);
    }
}
