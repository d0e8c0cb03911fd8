// src/qr.rs
use anyhow::Context as _;
use image::codecs::png::PngEncoder;
use image::{ImageBuffer, ImageEncoder, Rgb, RgbImage};
use qrcode::{EcLevel, QrCode};

use crate::compose;
use crate::config::QrConfig;
use crate::error::ApiError;

const DEFAULT_FG: &str = "#000000";
const DEFAULT_BG: &str = "#ffffff";

/// Per-request styling, resolved from the raw request fields.
#[derive(Debug, Clone)]
pub struct QrStyle {
    pub fg: Rgb<u8>,
    pub bg: Rgb<u8>,
    pub size: u32,
    pub logo: Option<String>,
}

impl QrStyle {
    pub fn from_parts(
        config: &QrConfig,
        fg: Option<&str>,
        bg: Option<&str>,
        size: Option<u32>,
        logo: Option<String>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            fg: parse_hex_color(fg.unwrap_or(DEFAULT_FG))?,
            bg: parse_hex_color(bg.unwrap_or(DEFAULT_BG))?,
            size: config.clamp_size(size),
            logo,
        })
    }
}

#[derive(Debug, Clone)]
pub struct QrService {
    box_size: u32,
    border: u32,
    logo_scale: f32,
}

impl QrService {
    pub fn new(config: &QrConfig) -> Self {
        Self {
            box_size: config.box_size,
            border: config.border,
            logo_scale: config.logo_scale,
        }
    }

    /// Full request path: encode, render, compose, serialize to PNG.
    pub fn generate_png(&self, text: &str, style: &QrStyle) -> Result<Vec<u8>, ApiError> {
        let code = self.encode(text)?;
        let base = self.render(&code, style.fg, style.bg);
        let composed = compose::compose(base, style.size, style.logo.as_deref(), self.logo_scale);

        encode_png(&composed.into_image())
    }

    /// Encode text as a QR matrix.
    ///
    /// Error correction is fixed at level H so a center logo can occlude
    /// up to ~30% of the modules without breaking decodability.
    pub fn encode(&self, text: &str) -> Result<QrCode, ApiError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ApiError::Validation("text is required".to_string()));
        }

        QrCode::with_error_correction_level(text, EcLevel::H)
            .map_err(|e| ApiError::Validation(format!("cannot encode text as QR code: {e}")))
    }

    /// Render the QR matrix into an RGB image at module resolution.
    pub fn render(&self, code: &QrCode, fg: Rgb<u8>, bg: Rgb<u8>) -> RgbImage {
        let width = code.width();
        let box_size = self.box_size as usize;
        let border = self.border as usize;
        let img_size = (width + 2 * border) * box_size;

        let mut img: RgbImage = ImageBuffer::from_pixel(img_size as u32, img_size as u32, bg);

        for y in 0..width {
            for x in 0..width {
                if code[(x, y)] == qrcode::Color::Dark {
                    for dy in 0..box_size {
                        for dx in 0..box_size {
                            let px = ((border + x) * box_size + dx) as u32;
                            let py = ((border + y) * box_size + dy) as u32;
                            img.put_pixel(px, py, fg);
                        }
                    }
                }
            }
        }

        img
    }
}

/// Serialize an RGB image to PNG bytes.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, ApiError> {
    let mut png_bytes = Vec::new();

    let encoder = PngEncoder::new(&mut png_bytes);
    encoder
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ColorType::Rgb8,
        )
        .context("failed to encode PNG")?;

    Ok(png_bytes)
}

/// Parse `#RGB` or `#RRGGBB` hex colors; the `#` is optional.
pub fn parse_hex_color(value: &str) -> Result<Rgb<u8>, ApiError> {
    let hex = value.trim().trim_start_matches('#');

    let expanded = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
        6 => hex.to_string(),
        _ => {
            return Err(ApiError::Validation(format!("invalid color: {value}")));
        }
    };

    let channel = |range| {
        u8::from_str_radix(&expanded[range], 16)
            .map_err(|_| ApiError::Validation(format!("invalid color: {value}")))
    };

    Ok(Rgb([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> QrService {
        QrService {
            box_size: 10,
            border: 4,
            logo_scale: 0.25,
        }
    }

    #[test]
    fn encode_rejects_empty_text() {
        assert!(service().encode("").is_err());
        assert!(service().encode("   \t ").is_err());
    }

    #[test]
    fn render_dimensions_follow_module_count() {
        let svc = service();
        let code = svc.encode("https://example.com").unwrap();
        let img = svc.render(&code, Rgb([0, 0, 0]), Rgb([255, 255, 255]));

        let expected = (code.width() as u32 + 2 * 4) * 10;
        assert_eq!(img.width(), expected);
        assert_eq!(img.height(), expected);
    }

    #[test]
    fn render_uses_background_in_quiet_zone() {
        let svc = service();
        let code = svc.encode("hello").unwrap();
        let img = svc.render(&code, Rgb([10, 20, 30]), Rgb([200, 210, 220]));

        // Top-left corner sits inside the border.
        assert_eq!(img.get_pixel(0, 0), &Rgb([200, 210, 220]));
    }

    #[test]
    fn generate_png_honors_requested_size() {
        let svc = service();
        let style = QrStyle {
            fg: Rgb([0, 0, 0]),
            bg: Rgb([255, 255, 255]),
            size: 300,
            logo: None,
        };

        let png = svc.generate_png("hello world", &style).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 300);
        assert_eq!(decoded.height(), 300);
    }

    #[test]
    fn generate_png_is_deterministic() {
        let svc = service();
        let style = QrStyle {
            fg: Rgb([0, 0, 0]),
            bg: Rgb([255, 255, 255]),
            size: 250,
            logo: None,
        };

        let first = svc.generate_png("same input", &style).unwrap();
        let second = svc.generate_png("same input", &style).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn parse_hex_color_accepts_short_and_long_forms() {
        assert_eq!(parse_hex_color("#000000").unwrap(), Rgb([0, 0, 0]));
        assert_eq!(parse_hex_color("#A1B2C3").unwrap(), Rgb([0xa1, 0xb2, 0xc3]));
        assert_eq!(parse_hex_color("fff").unwrap(), Rgb([255, 255, 255]));
        assert_eq!(parse_hex_color("#1a2").unwrap(), Rgb([0x11, 0xaa, 0x22]));
    }

    #[test]
    fn parse_hex_color_rejects_garbage() {
        assert!(parse_hex_color("").is_err());
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("red").is_err());
        assert!(parse_hex_color("#zzzzzz").is_err());
    }
}
