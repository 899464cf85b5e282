use bytemuck::Zeroable;
use tracing::trace;

use crate::error::{KinectError, Result};
use crate::frame::ColorFrame;
use crate::native::Sensor;
use crate::types::{Bgra, ColorImage, ColorImageFormat, PixelSource};

/// Extract the pixels of `frame` as BGRA.
///
/// A frame already in BGRA is handed out zero-copy from device memory.
/// Anything else is converted into `buffer`, which is resized to exactly
/// one frame and reused across calls.
pub fn extract_color<'o, S: Sensor>(
    frame: &'o ColorFrame<'_, S>,
    buffer: &'o mut Vec<Bgra>,
) -> Result<ColorImage<'o>> {
    let (width, height) = frame.dimensions()?;
    let pixel_count = (width as usize)
        .checked_mul(height as usize)
        .filter(|count| count.checked_mul(Bgra::BYTES).is_some())
        .ok_or(KinectError::InvalidDimensions { width: width as i32, height: height as i32 })?;

    // An unreadable format takes the conversion path.
    let format = frame.raw_format().unwrap_or(ColorImageFormat::None);

    if format == ColorImageFormat::TARGET {
        let raw = frame.raw_buffer()?;
        let expected = pixel_count * Bgra::BYTES;
        if raw.len() != expected {
            return Err(KinectError::BufferSizeMismatch { expected, actual: raw.len() });
        }
        let pixels: &[Bgra] = bytemuck::try_cast_slice(raw)
            .map_err(|_| KinectError::BufferSizeMismatch { expected, actual: raw.len() })?;

        trace!(width, height, "Color frame passed through");
        return Ok(ColorImage { width, height, pixels, source: PixelSource::Direct });
    }

    buffer.resize(pixel_count, Bgra::zeroed());
    frame.copy_converted(bytemuck::cast_slice_mut(buffer.as_mut_slice()))?;

    trace!(width, height, %format, "Color frame converted");
    Ok(ColorImage { width, height, pixels: buffer.as_slice(), source: PixelSource::Converted })
}
