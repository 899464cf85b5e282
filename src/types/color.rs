//! Color image formats and the extracted image view

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Pixel formats the color camera can deliver.
#[repr(u32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ColorImageFormat {
    #[default]
    None = 0,
    Rgba = 1,
    Yuv = 2,
    Bgra = 3,
    Bayer = 4,
    Yuy2 = 5,
}

impl ColorImageFormat {
    /// Format every extracted image is delivered in.
    pub const TARGET: Self = ColorImageFormat::Bgra;

    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => ColorImageFormat::Rgba,
            2 => ColorImageFormat::Yuv,
            3 => ColorImageFormat::Bgra,
            4 => ColorImageFormat::Bayer,
            5 => ColorImageFormat::Yuy2,
            _ => ColorImageFormat::None,
        }
    }
}

impl fmt::Display for ColorImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorImageFormat::None => "none",
            ColorImageFormat::Rgba => "rgba",
            ColorImageFormat::Yuv => "yuv",
            ColorImageFormat::Bgra => "bgra",
            ColorImageFormat::Bayer => "bayer",
            ColorImageFormat::Yuy2 => "yuy2",
        };
        f.write_str(name)
    }
}

/// One 4-byte pixel in blue, green, red, alpha byte order.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Bgra {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub a: u8,
}

impl Bgra {
    pub const BYTES: usize = 4;

    pub const fn new(b: u8, g: u8, r: u8, a: u8) -> Self {
        Self { b, g, r, a }
    }
}

/// Where the pixels of a [`ColorImage`] live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelSource {
    /// Device-owned buffer, valid until the color frame is released.
    Direct,
    /// The pipeline's conversion buffer, valid until its next resize.
    Converted,
}

/// Color payload handed to color callbacks. Valid only for the duration of
/// the callback.
#[derive(Debug, Clone, Copy)]
pub struct ColorImage<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [Bgra],
    pub source: PixelSource,
}

impl<'a> ColorImage<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.pixels)
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len() * Bgra::BYTES
    }

    /// Pixel at `(x, y)`, row-major from the top-left corner.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Bgra> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }
}
