//! Per-frame barcode decoding
//!
//! QR codes go through rqrr first. Frames without a readable QR grid are
//! handed to rxing's multi-format reader, which covers the 1D product
//! symbologies (EAN-13/EAN-8, UPC-A/UPC-E, Code 128, Code 39).

use crate::decoder::ScanResult;
use crate::error::{Error, Result};
use image::{DynamicImage, GrayImage};
use rxing::Exceptions;

/// Decodes the first readable barcode in a camera frame
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Create a frame decoder
    pub fn new() -> Self {
        Self
    }

    /// Decode a frame of any color type
    pub fn decode(&self, img: &DynamicImage) -> Result<ScanResult> {
        self.decode_gray(img.to_luma8())
    }

    /// Decode a grayscale frame.
    ///
    /// Returns [`Error::NoCodeInFrame`] when neither reader finds a symbol.
    pub fn decode_gray(&self, img: GrayImage) -> Result<ScanResult> {
        let qr_error = match self.decode_qr(img.clone()) {
            Ok(result) => return Ok(result),
            Err(Error::NoCodeInFrame) => None,
            Err(e) => Some(e),
        };

        match self.decode_multi_format(img) {
            Err(Error::NoCodeInFrame) => Err(qr_error.unwrap_or(Error::NoCodeInFrame)),
            outcome => outcome,
        }
    }

    /// When several grids are found, the first one that decodes wins.
    fn decode_qr(&self, img: GrayImage) -> Result<ScanResult> {
        let mut prepared = rqrr::PreparedImage::prepare(img);
        let grids = prepared.detect_grids();

        if grids.is_empty() {
            return Err(Error::NoCodeInFrame);
        }

        let detected = grids.len();
        let mut last_error = None;
        for grid in grids {
            match grid.decode() {
                Ok((meta, content)) => {
                    tracing::debug!(
                        version = ?meta.version,
                        ecc_level = ?meta.ecc_level,
                        length = content.len(),
                        "decoded QR code"
                    );
                    return Ok(ScanResult::new(content));
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(Error::Decode(format!(
            "{detected} grid(s) detected, none readable: {last_error:?}"
        )))
    }

    fn decode_multi_format(&self, img: GrayImage) -> Result<ScanResult> {
        let (width, height) = img.dimensions();
        match rxing::helpers::detect_in_luma(img.into_raw(), width, height, None) {
            Ok(result) => {
                tracing::debug!(
                    format = ?result.getBarcodeFormat(),
                    length = result.getText().len(),
                    "decoded barcode"
                );
                Ok(ScanResult::new(result.getText()))
            }
            Err(Exceptions::NotFoundException(_)) => Err(Error::NoCodeInFrame),
            Err(e) => Err(Error::Decode(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    const L_CODES: [&str; 10] = [
        "0001101", "0011001", "0010011", "0111101", "0100011", "0110001", "0101111", "0111011",
        "0110111", "0001011",
    ];

    // Left-half parity by leading digit, `G` marks even parity.
    const PARITY: [&str; 10] = [
        "LLLLLL", "LLGLGG", "LLGGLG", "LLGGGL", "LGLLGG", "LGGLLG", "LGGGLL", "LGLGLG", "LGLGGL",
        "LGGLGL",
    ];

    fn ean13_modules(code: &str) -> String {
        let digits: Vec<usize> = code
            .chars()
            .map(|c| c.to_digit(10).expect("digit") as usize)
            .collect();
        assert_eq!(digits.len(), 13);

        let r_code = |d: usize| -> String {
            L_CODES[d]
                .chars()
                .map(|c| if c == '0' { '1' } else { '0' })
                .collect()
        };

        let mut modules = String::from("101");
        for (i, &d) in digits[1..7].iter().enumerate() {
            if PARITY[digits[0]].as_bytes()[i] == b'L' {
                modules.push_str(L_CODES[d]);
            } else {
                modules.extend(r_code(d).chars().rev());
            }
        }
        modules.push_str("01010");
        for &d in &digits[7..] {
            modules.push_str(&r_code(d));
        }
        modules.push_str("101");
        modules
    }

    fn render_ean13(code: &str) -> GrayImage {
        const MODULE_PX: u32 = 3;
        const QUIET: u32 = 15;
        let modules = ean13_modules(code);
        assert_eq!(modules.len(), 95);

        let width = (modules.len() as u32 + 2 * QUIET) * MODULE_PX;
        let mut img = GrayImage::from_pixel(width, 120, Luma([255u8]));
        for (i, bar) in modules.chars().enumerate() {
            if bar != '1' {
                continue;
            }
            let x0 = (QUIET + i as u32) * MODULE_PX;
            for x in x0..x0 + MODULE_PX {
                for y in 10..110 {
                    img.put_pixel(x, y, Luma([0u8]));
                }
            }
        }
        img
    }

    #[test]
    fn test_blank_frame_has_no_code() {
        let blank = GrayImage::from_pixel(320, 240, Luma([255u8]));
        let decoder = FrameDecoder::new();
        assert!(matches!(
            decoder.decode_gray(blank),
            Err(Error::NoCodeInFrame)
        ));
    }

    #[test]
    fn test_color_frame_is_converted() {
        let frame = DynamicImage::new_rgb8(64, 48);
        assert!(matches!(
            FrameDecoder::new().decode(&frame),
            Err(Error::NoCodeInFrame)
        ));
    }

    #[test]
    fn test_decodes_ean13_label() {
        let frame = render_ean13("4006381333931");
        let result = FrameDecoder::new().decode_gray(frame).expect("EAN-13 decoded");
        assert_eq!(result.text, "4006381333931");
    }

    #[test]
    fn test_decodes_ean13_in_color_frame() {
        let frame = DynamicImage::ImageLuma8(render_ean13("5901234123457")).to_rgb8();
        let result = FrameDecoder::new()
            .decode(&DynamicImage::ImageRgb8(frame))
            .expect("EAN-13 decoded");
        assert_eq!(result.text, "5901234123457");
    }
}
