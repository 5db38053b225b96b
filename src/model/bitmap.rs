use std::fmt;
use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{ImageFormat, ImageResult, Rgba, RgbaImage};

use crate::model::color::Color;

/// A decoded RGBA image: an icon, a screenshot thumbnail or a placeholder.
#[derive(Clone, PartialEq)]
pub struct Bitmap {
    image: RgbaImage,
}

impl Bitmap {
    pub fn solid(width: u32, height: u32, color: Color) -> Bitmap {
        Bitmap {
            image: RgbaImage::from_pixel(width.max(1), height.max(1), Rgba(color.to_rgba())),
        }
    }

    /// Decodes an encoded image (PNG).
    pub fn decode(bytes: &[u8]) -> ImageResult<Bitmap> {
        let image = image::load_from_memory(bytes)?.into_rgba8();
        Ok(Bitmap { image })
    }

    pub fn encode_png(&self) -> ImageResult<Vec<u8>> {
        let mut out = Vec::new();
        self.image.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
        Ok(out)
    }

    pub fn width(&self) -> u32 { self.image.width() }
    pub fn height(&self) -> u32 { self.image.height() }

    pub fn pixel_count(&self) -> usize { self.width() as usize * self.height() as usize }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let Rgba([r, g, b, a]) = *self.image.get_pixel(x, y);
        Some(Color(
            (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32,
        ))
    }

    /// Scales to exactly `width` x `height`. Returns a clone if the size
    /// already matches.
    pub fn resized(&self, width: u32, height: u32) -> Bitmap {
        let (width, height) = (width.max(1), height.max(1));
        if width == self.width() && height == self.height() {
            return self.clone();
        }
        Bitmap {
            image: imageops::resize(&self.image, width, height, FilterType::Triangle),
        }
    }

    pub fn as_rgba(&self) -> &RgbaImage { &self.image }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitmap({}x{})", self.width(), self.height())
    }
}
