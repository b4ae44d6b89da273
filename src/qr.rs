//! QR encoding: text payload to a monochrome PNG.

use image::Luma;
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;

use crate::error::{AppError, Result};

/// Pixels per QR module in the rendered image.
const MODULE_PIXELS: u32 = 10;

/// Encode a payload into PNG bytes.
///
/// Level L error correction (~7% symbol damage recoverable), black modules
/// on white, 4-module quiet zone. The same input yields identical bytes for
/// a fixed library version. Payloads beyond QR capacity fail at symbol
/// construction; there is no length validation beyond what the symbol
/// format itself imposes.
pub fn encode_png(payload: &str) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L)
        .map_err(|e| AppError::Encode(format!("QR symbol construction failed: {e}")))?;

    let img = code
        .render::<Luma<u8>>()
        .module_dimensions(MODULE_PIXELS, MODULE_PIXELS)
        .quiet_zone(true)
        .build();

    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| AppError::Encode(format!("PNG encoding failed: {e}")))?;

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_encode_produces_png() {
        let bytes = encode_png("https://example.com").unwrap();
        assert!(bytes.len() > PNG_SIGNATURE.len());
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let first = encode_png("https://example.com").unwrap();
        let second = encode_png("https://example.com").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_distinct_payloads_differ() {
        let first = encode_png("payload one").unwrap();
        let second = encode_png("payload two").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_oversized_payload_fails_with_encode_error() {
        // Version 40 at level L tops out below 3000 bytes of binary data.
        let oversized = "a".repeat(4000);
        let err = encode_png(&oversized).unwrap_err();
        assert!(matches!(err, AppError::Encode(_)));
    }
}
