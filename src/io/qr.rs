//! QR primitives: encode a string into a module matrix, render a matrix to PNG
//!
//! The QR algorithm itself comes from the `qrcode` crate and PNG encoding from
//! `png`. Callers only see [`QrCodec`] and [`QrMatrix`].

use qrcode::{Color, EcLevel, QrCode};
use thiserror::Error;

/// Pixels per QR module
pub const DEFAULT_MODULE_PX: u32 = 8;
/// Light border around the code, in modules (the QR standard asks for 4)
pub const DEFAULT_QUIET_ZONE: u32 = 4;

const DARK: u8 = 0x00;
const LIGHT: u8 = 0xFF;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),
    #[error("QR image of {0}x{0} px is too large")]
    TooLarge(u64),
}

/// Square grid of QR modules, row-major, `true` = dark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    modules: Vec<bool>,
}

impl QrMatrix {
    pub fn width(&self) -> usize {
        self.width
    }

    /// Module at column `x`, row `y`
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        self.modules[y * self.width + x]
    }
}

/// Encode/render seam used by the voting pipeline
pub trait QrCodec: Send + Sync {
    fn encode(&self, content: &str) -> Result<QrMatrix, QrError>;
    fn render_png(&self, matrix: &QrMatrix) -> Result<Vec<u8>, QrError>;
}

/// Grayscale PNG renderer
#[derive(Debug, Clone, Copy)]
pub struct PngQrCodec {
    module_px: u32,
    quiet_zone: u32,
}

impl PngQrCodec {
    pub fn new(module_px: u32, quiet_zone: u32) -> Self {
        Self { module_px: module_px.max(1), quiet_zone }
    }
}

impl Default for PngQrCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MODULE_PX, DEFAULT_QUIET_ZONE)
    }
}

impl QrCodec for PngQrCodec {
    fn encode(&self, content: &str) -> Result<QrMatrix, QrError> {
        let code = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::M)?;
        let modules = code.to_colors().into_iter().map(|c| c == Color::Dark).collect();
        Ok(QrMatrix { width: code.width(), modules })
    }

    fn render_png(&self, matrix: &QrMatrix) -> Result<Vec<u8>, QrError> {
        let modules = matrix.width as u64 + 2 * u64::from(self.quiet_zone);
        let side_px = modules * u64::from(self.module_px);
        let side = u32::try_from(side_px).map_err(|_| QrError::TooLarge(side_px))?;
        let px = self.module_px as usize;
        let quiet = self.quiet_zone as usize;

        let mut pixels = vec![LIGHT; side as usize * side as usize];
        for y in 0..matrix.width {
            for x in 0..matrix.width {
                if !matrix.is_dark(x, y) {
                    continue;
                }
                let top = (y + quiet) * px;
                let left = (x + quiet) * px;
                for row in top..top + px {
                    let start = row * side as usize + left;
                    pixels[start..start + px].fill(DARK);
                }
            }
        }

        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, side, side);
            encoder.set_color(png::ColorType::Grayscale);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&pixels)?;
            writer.finish()?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_encode_produces_square_matrix() {
        let codec = PngQrCodec::default();
        let matrix = codec.encode("http://192.168.1.20:8080/polls/x/yes").unwrap();
        // version 1 is 21 modules wide, every version adds 4
        assert!(matrix.width() >= 21);
        assert_eq!((matrix.width() - 21) % 4, 0);
        // top-left finder pattern corner is dark
        assert!(matrix.is_dark(0, 0));
    }

    #[test]
    fn test_render_png_dimensions() {
        let codec = PngQrCodec::new(2, 4);
        let matrix = codec.encode("hello").unwrap();
        let bytes = codec.render_png(&matrix).unwrap();

        assert_eq!(&bytes[..8], &PNG_SIGNATURE);

        let decoder = png::Decoder::new(bytes.as_slice());
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        let expected = (matrix.width() as u32 + 8) * 2;
        assert_eq!(info.width, expected);
        assert_eq!(info.height, expected);
        assert_eq!(info.color_type, png::ColorType::Grayscale);
    }

    #[test]
    fn test_different_content_different_matrix() {
        let codec = PngQrCodec::default();
        assert_ne!(codec.encode("yes").unwrap(), codec.encode("no").unwrap());
    }
}
