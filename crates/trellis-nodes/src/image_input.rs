//! Marshals the host's image values into the PNG bytes the backend expects.

use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageInputError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("buffer length does not match {width}x{height} rgba")]
    BadBuffer { width: u32, height: u32 },
}

/// The forms an image input can arrive in from the host.
pub enum ImageInput {
    /// Contents of an already-encoded image file (PNG, JPEG, ...).
    Encoded(Vec<u8>),
    Path(PathBuf),
    /// Raw RGBA pixels, row-major.
    Rgba {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
}

const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];

impl ImageInput {
    /// Convert to PNG bytes. Already-PNG input passes through untouched;
    /// everything else is decoded and re-encoded.
    pub fn into_png_bytes(self) -> Result<Vec<u8>, ImageInputError> {
        match self {
            ImageInput::Encoded(bytes) => {
                if bytes.starts_with(&PNG_MAGIC) {
                    return Ok(bytes);
                }
                encode_png(image::load_from_memory(&bytes)?)
            }
            ImageInput::Path(path) => encode_png(image::open(path)?),
            ImageInput::Rgba {
                width,
                height,
                data,
            } => {
                let buffer = RgbaImage::from_raw(width, height, data)
                    .ok_or(ImageInputError::BadBuffer { width, height })?;
                encode_png(DynamicImage::ImageRgba8(buffer))
            }
        }
    }
}

fn encode_png(img: DynamicImage) -> Result<Vec<u8>, ImageInputError> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}
