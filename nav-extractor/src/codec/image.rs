//! Raster icon payloads.
//!
//! Images travel as PNG bytes together with width, height and a content hash.
//! The text format base64-encodes the PNG; the binary format embeds it raw.

use crate::error::CodecError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, RgbaImage};
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

/// Shared, immutable RGBA raster. Equality compares pixels, not pointers.
#[derive(Clone)]
pub struct Image(Arc<RgbaImage>);

impl Image {
    pub fn new(pixels: RgbaImage) -> Self {
        Self(Arc::new(pixels))
    }

    /// Build from raw RGBA bytes; `None` if the buffer does not match the size
    pub fn from_rgba(width: u32, height: u32, raw: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, raw).map(Self::new)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.0
    }

    pub fn to_png(&self) -> Result<Vec<u8>, CodecError> {
        let mut buffer = Cursor::new(Vec::new());
        self.0.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }

    pub fn from_png(bytes: &[u8]) -> Result<Self, CodecError> {
        let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
        Ok(Self::new(decoded.to_rgba8()))
    }

    /// Decode a PNG payload, checking it against the advertised hash and size.
    /// An empty hash skips verification.
    pub fn from_payload(width: u32, height: u32, hash: &str, png: &[u8]) -> Result<Self, CodecError> {
        if !hash.is_empty() {
            let computed = content_hash(png);
            if !computed.eq_ignore_ascii_case(hash) {
                return Err(CodecError::HashMismatch {
                    expected: hash.to_string(),
                    computed,
                });
            }
        }

        let image = Self::from_png(png)?;
        if image.width() != width || image.height() != height {
            return Err(CodecError::Invalid {
                kind: "image",
                detail: format!(
                    "declared {}x{} but payload is {}x{}",
                    width,
                    height,
                    image.width(),
                    image.height()
                ),
            });
        }
        Ok(image)
    }
}

/// SHA-256 of the encoded bytes, lowercase hex
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.dimensions() == other.0.dimensions() && self.0.as_raw() == other.0.as_raw())
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct TextImage {
    width: u32,
    height: u32,
    hash: String,
    base64: String,
}

#[derive(Serialize, Deserialize)]
struct BinaryImage {
    width: u32,
    height: u32,
    hash: String,
    bytes: Vec<u8>,
}

impl Serialize for Image {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let png = self.to_png().map_err(S::Error::custom)?;
        let hash = content_hash(&png);

        if serializer.is_human_readable() {
            TextImage {
                width: self.width(),
                height: self.height(),
                hash,
                base64: STANDARD.encode(&png),
            }
            .serialize(serializer)
        } else {
            BinaryImage {
                width: self.width(),
                height: self.height(),
                hash,
                bytes: png,
            }
            .serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Image {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (width, height, hash, png) = if deserializer.is_human_readable() {
            let text = TextImage::deserialize(deserializer)?;
            let png = STANDARD.decode(text.base64.as_bytes()).map_err(D::Error::custom)?;
            (text.width, text.height, text.hash, png)
        } else {
            let binary = BinaryImage::deserialize(deserializer)?;
            (binary.width, binary.height, binary.hash, binary.bytes)
        };

        Image::from_payload(width, height, &hash, &png).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Format;
    use image::Rgba;

    fn arrow_icon() -> Image {
        let mut pixels = RgbaImage::new(4, 3);
        pixels.put_pixel(1, 1, Rgba([255, 0, 0, 255]));
        pixels.put_pixel(2, 1, Rgba([0, 0, 255, 128]));
        Image::new(pixels)
    }

    #[test]
    fn test_pixel_equality_not_reference() {
        let a = arrow_icon();
        let b = arrow_icon();
        assert!(!Arc::ptr_eq(&a.0, &b.0));
        assert_eq!(a, b);

        let mut other = RgbaImage::new(4, 3);
        other.put_pixel(0, 0, Rgba([1, 2, 3, 4]));
        assert_ne!(a, Image::new(other));
    }

    #[test]
    fn test_round_trip_both_formats() {
        let icon = arrow_icon();
        for format in [Format::Text, Format::Binary] {
            let bytes = format.encode(&icon).unwrap();
            let decoded: Image = format.decode(&bytes).unwrap();
            assert_eq!(decoded, icon);
        }
    }

    #[test]
    fn test_text_form_carries_base64() {
        let json: serde_json::Value = serde_json::to_value(arrow_icon()).unwrap();
        assert_eq!(json["width"], 4);
        assert_eq!(json["height"], 3);
        assert_eq!(json["hash"].as_str().unwrap().len(), 64);
        assert!(json["base64"].as_str().unwrap().starts_with("iVBORw0KGgo"));
    }

    #[test]
    fn test_hash_mismatch_rejected() {
        let icon = arrow_icon();
        let png = icon.to_png().unwrap();
        let err = Image::from_payload(4, 3, "deadbeef", &png).unwrap_err();
        assert!(matches!(err, CodecError::HashMismatch { .. }));
    }

    #[test]
    fn test_empty_hash_skips_verification() {
        let icon = arrow_icon();
        let png = icon.to_png().unwrap();
        assert_eq!(Image::from_payload(4, 3, "", &png).unwrap(), icon);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let png = arrow_icon().to_png().unwrap();
        let hash = content_hash(&png);
        assert!(Image::from_payload(3, 3, &hash, &png).is_err());
    }
}
