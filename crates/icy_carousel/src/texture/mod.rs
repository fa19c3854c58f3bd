use std::sync::Arc;

use crate::error::LoadResult;

pub mod cache;
pub mod placeholder;

pub use cache::*;
pub use placeholder::*;

/// RGBA image data ready for upload
#[derive(Debug, Clone)]
pub struct RgbaData {
    /// Raw RGBA pixel data (Arc for cheap cloning)
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

impl RgbaData {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        let expected_size = (4 * width * height) as usize;
        let actual_size = data.len();

        let valid_data = if actual_size != expected_size {
            log::warn!(
                "[RgbaData] size mismatch: expected {} bytes ({}x{}x4), got {} bytes. Padding/truncating.",
                expected_size,
                width,
                height,
                actual_size
            );
            let mut fixed = vec![0u8; expected_size];
            let copy_size = actual_size.min(expected_size);
            fixed[..copy_size].copy_from_slice(&data[..copy_size]);
            fixed
        } else {
            data
        };

        Self {
            data: Arc::new(valid_data),
            width,
            height,
        }
    }

    /// Pixel at (x, y), `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        let px = self.data.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl PartialEq for RgbaData {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data) && self.width == other.width && self.height == other.height
    }
}

impl Eq for RgbaData {}

/// Decode any format the `image` crate understands into RGBA8.
pub fn decode_rgba(bytes: &[u8]) -> LoadResult<RgbaData> {
    let img = ::image::load_from_memory(bytes)?;
    let (width, height) = (img.width(), img.height());
    Ok(RgbaData::new(img.to_rgba8().into_raw(), width, height))
}

/// Decode and scale to the poster size.
///
/// Scaling keeps the aspect ratio and fills the target box (the larger scale
/// factor wins), matching how posters are cropped by the item rect.
pub fn decode_poster(bytes: &[u8], target_width: u32, target_height: u32) -> LoadResult<RgbaData> {
    let img = ::image::load_from_memory(bytes)?;
    let (orig_width, orig_height) = (img.width().max(1), img.height().max(1));
    if target_width == 0 || target_height == 0 || (orig_width == target_width && orig_height == target_height) {
        let rgba = img.to_rgba8();
        return Ok(RgbaData::new(rgba.into_raw(), orig_width, orig_height));
    }

    let scale = (target_width as f32 / orig_width as f32).max(target_height as f32 / orig_height as f32);
    let new_width = ((orig_width as f32 * scale).round() as u32).max(1);
    let new_height = ((orig_height as f32 * scale).round() as u32).max(1);

    let resized = img.resize_exact(new_width, new_height, ::image::imageops::FilterType::Triangle);
    let rgba = resized.to_rgba8();
    Ok(RgbaData::new(rgba.into_raw(), new_width, new_height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ::image::RgbaImage::from_pixel(width, height, ::image::Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, ::image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn short_buffer_is_padded() {
        let data = RgbaData::new(vec![255; 4], 2, 2);
        assert_eq!(data.data.len(), 16);
        assert_eq!(data.pixel(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(data.pixel(1, 1), Some([0, 0, 0, 0]));
        assert_eq!(data.pixel(2, 0), None);
    }

    #[test]
    fn decodes_png() {
        let data = decode_rgba(&png(3, 2)).unwrap();
        assert_eq!((data.width, data.height), (3, 2));
        assert_eq!(data.pixel(2, 1), Some([10, 20, 30, 255]));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(decode_rgba(b"not an image"), Err(crate::LoadError::Decode(_))));
    }

    #[test]
    fn poster_scaling_fills_target() {
        let data = decode_poster(&png(100, 50), 28, 18).unwrap();
        // scale = max(0.28, 0.36) = 0.36
        assert_eq!((data.width, data.height), (36, 18));
    }
}
