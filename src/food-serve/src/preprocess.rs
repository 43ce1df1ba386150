use half::f16;
use image::imageops::{self, FilterType};
use image::DynamicImage;
use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::Timer;

/// Side of the square model input, in pixels
pub const INPUT_SIZE: u32 = 224;

/// Channels per pixel (RGB)
pub const CHANNELS: usize = 3;

/// Resampling kernel used to bring every image down (or up) to the model
/// input size. Catmull-Rom is the cubic kernel closest to the bicubic resize
/// the model was trained against; changing it shifts downstream scores.
pub const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

const SIDE: usize = INPUT_SIZE as usize;

/// A 224x224x3 image with every channel scaled into `[0, 1]`, stored
/// row-major as height, width, channel.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    values: Vec<f32>,
}

impl NormalizedTensor {
    pub fn from_image(image: &DynamicImage) -> Self {
        let mut t = Timer::new_start("Resizing image");

        let rgb = image.to_rgb8();
        let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, RESIZE_FILTER);

        let values: Vec<f32> = resized
            .into_raw()
            .iter()
            .map(|x| *x as f32 / 255f32)
            .collect();

        t.stop();

        NormalizedTensor { values }
    }

    pub fn shape(&self) -> [usize; 3] {
        [SIDE, SIDE, CHANNELS]
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Value at row `y`, column `x`, channel `c`.
    pub fn get(&self, y: usize, x: usize, c: usize) -> Option<f32> {
        if y >= SIDE || x >= SIDE || c >= CHANNELS {
            return None;
        }
        self.values.get((y * SIDE + x) * CHANNELS + c).copied()
    }

    /// JSON view of the tensor as nested `[224][224][3]` arrays.
    ///
    /// With `legacy_precision` every value is narrowed to half precision
    /// first; old TensorFlow Serving releases (< 1.11) reject the full
    /// precision payload for this model.
    pub fn as_nested(&self, legacy_precision: bool) -> NestedTensor<'_> {
        NestedTensor {
            tensor: self,
            legacy_precision,
        }
    }
}

pub struct NestedTensor<'a> {
    tensor: &'a NormalizedTensor,
    legacy_precision: bool,
}

struct Row<'a> {
    pixels: &'a [f32],
    legacy_precision: bool,
}

struct Pixel<'a> {
    channels: &'a [f32],
    legacy_precision: bool,
}

impl Serialize for NestedTensor<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(SIDE))?;
        for pixels in self.tensor.values.chunks(SIDE * CHANNELS) {
            seq.serialize_element(&Row {
                pixels,
                legacy_precision: self.legacy_precision,
            })?;
        }
        seq.end()
    }
}

impl Serialize for Row<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(SIDE))?;
        for channels in self.pixels.chunks(CHANNELS) {
            seq.serialize_element(&Pixel {
                channels,
                legacy_precision: self.legacy_precision,
            })?;
        }
        seq.end()
    }
}

impl Serialize for Pixel<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(CHANNELS))?;
        for value in self.channels {
            if self.legacy_precision {
                seq.serialize_element(&f16::from_f32(*value).to_f32())?;
            } else {
                seq.serialize_element(value)?;
            }
        }
        seq.end()
    }
}
