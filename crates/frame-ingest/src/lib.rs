//! Byte-level ingest for the camera gateway.
//!
//! Two sources feed the gateway: raw HTTP upload bodies and a length-prefixed
//! serial stream from an embedded camera module. This crate owns the pieces
//! both paths share — the decode seam and the error taxonomy — plus the
//! serial-specific frame reassembly.

mod serial;
mod types;

pub use serial::{END_MARKER, FrameReader, MAX_FRAME_BYTES, open_serial_port};
pub use types::IngestError;

use image::DynamicImage;

/// Decode an uploaded or reassembled payload into an image.
///
/// The embedded cameras send JPEG, but any container the `image` crate can
/// sniff is accepted.
pub fn decode_frame(bytes: &[u8]) -> Result<DynamicImage, IngestError> {
    Ok(image::load_from_memory(bytes)?)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};

    use super::*;

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let err = decode_frame(b"definitely not a jpeg").unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)));
    }

    #[test]
    fn empty_payload_is_a_decode_error() {
        assert!(matches!(decode_frame(b""), Err(IngestError::Decode(_))));
    }

    #[test]
    fn valid_jpeg_decodes() {
        let image = RgbImage::from_pixel(16, 16, Rgb([12, 200, 70]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .unwrap();

        let decoded = decode_frame(&bytes).unwrap();
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 16);
    }
}
