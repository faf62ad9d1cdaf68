//! CPU RGBA8 frame buffer.

use vl_common::Resolution;

use crate::error::EffectError;

/// Straight-alpha RGBA8 image, rows top to bottom, no padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbaImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbaImage {
    /// Transparent black image.
    pub fn new(width: u32, height: u32) -> Self {
        let len = Resolution::new(width, height).rgba_byte_size();
        Self {
            width,
            height,
            data: vec![0; len],
        }
    }

    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, EffectError> {
        let expected = Resolution::new(width, height).rgba_byte_size();
        if data.len() != expected {
            return Err(EffectError::BadImageBuffer {
                width,
                height,
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Solid fill, mostly for tests and placeholders.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut image = Self::new(width, height);
        for px in image.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        image
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.index(x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = self.index(x, y);
        self.data[i..i + 4].copy_from_slice(&rgba);
    }

    /// Apply `f` to every pixel as normalized `[r, g, b, a]`.
    pub fn map_pixels(&self, mut f: impl FnMut([f32; 4]) -> [f32; 4]) -> Self {
        let mut out = Vec::with_capacity(self.data.len());
        for px in self.data.chunks_exact(4) {
            let mapped = f([
                to_unit(px[0]),
                to_unit(px[1]),
                to_unit(px[2]),
                to_unit(px[3]),
            ]);
            out.extend(mapped.iter().map(|&c| from_unit(c)));
        }
        Self {
            width: self.width,
            height: self.height,
            data: out,
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }
}

pub fn to_unit(c: u8) -> f32 {
    c as f32 / 255.0
}

pub fn from_unit(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}
