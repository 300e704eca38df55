//! Image payload preparation
//!
//! Uploaded images are decoded, downscaled to a bounded side length, and
//! re-encoded before entering the task queue. This caps memory held per
//! task and the bytes shipped to the metadata service. Sources with an
//! alpha channel stay PNG; opaque sources are re-encoded as JPEG at the
//! configured quality; GIF is always flattened to PNG (first frame).
//!
//! Images already within bounds keep their original bytes — decoding is
//! still performed so corrupt files are rejected here rather than at the
//! metadata service.

use crate::error::DecomposeError;
use crate::types::{PayloadFormat, PreparedImage};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

/// JPEG re-encode quality bounds; values outside are clamped, not rejected
const JPEG_QUALITY_RANGE: std::ops::RangeInclusive<u8> = 40..=95;

fn clamp_jpeg_quality(value: u8) -> u8 {
    value.clamp(*JPEG_QUALITY_RANGE.start(), *JPEG_QUALITY_RANGE.end())
}

/// Decode, bound, and re-encode one uploaded image.
///
/// `file_name` is only used for error context. Returns the transport-ready
/// payload or a per-file [`DecomposeError::InvalidImage`].
pub fn prepare_image(
    file_name: &str,
    bytes: &[u8],
    max_side: u32,
    jpeg_quality: u8,
) -> Result<PreparedImage, DecomposeError> {
    let invalid = |reason: String| DecomposeError::InvalidImage {
        file: file_name.to_string(),
        reason,
    };

    let format = image::guess_format(bytes).map_err(|e| invalid(e.to_string()))?;
    if !matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif
    ) {
        return Err(invalid(format!("unexpected encoding {format:?}")));
    }

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| invalid(e.to_string()))?;

    let (width, height) = (decoded.width(), decoded.height());
    let needs_resize = width.max(height) > max_side;

    // Within bounds and already in a transport format: keep the original
    // bytes instead of re-encoding
    if !needs_resize {
        match format {
            ImageFormat::Png => {
                return Ok(PreparedImage {
                    bytes: bytes.to_vec(),
                    format: PayloadFormat::Png,
                });
            }
            ImageFormat::Jpeg => {
                return Ok(PreparedImage {
                    bytes: bytes.to_vec(),
                    format: PayloadFormat::Jpeg,
                });
            }
            _ => {} // GIF always re-encodes
        }
    }

    let bounded = if needs_resize {
        decoded.resize(max_side, max_side, FilterType::Lanczos3)
    } else {
        decoded
    };

    let has_alpha = bounded.color().has_alpha();
    if has_alpha || format == ImageFormat::Gif {
        encode_png(&bounded).map_err(invalid)
    } else {
        encode_jpeg(&bounded, clamp_jpeg_quality(jpeg_quality)).map_err(invalid)
    }
}

fn encode_png(img: &DynamicImage) -> Result<PreparedImage, String> {
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| format!("PNG encode failed: {e}"))?;
    Ok(PreparedImage {
        bytes: buf,
        format: PayloadFormat::Png,
    })
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<PreparedImage, String> {
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    img.to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| format!("JPEG encode failed: {e}"))?;
    Ok(PreparedImage {
        bytes: buf,
        format: PayloadFormat::Jpeg,
    })
}
