//! Image composition for QR codes: final resize plus optional center logo.

use anyhow::Context as _;
use base64::{engine::general_purpose, Engine as _};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};

/// Outcome of a composition pass.
///
/// A broken logo must never fail the request, so the fallback is a variant
/// rather than an error.
#[derive(Debug)]
pub enum Composed {
    WithLogo(RgbImage),
    WithoutLogo(RgbImage),
}

impl Composed {
    pub fn into_image(self) -> RgbImage {
        match self {
            Composed::WithLogo(img) | Composed::WithoutLogo(img) => img,
        }
    }
}

/// Resize the rendered QR to `target_size` and overlay the logo, if any.
///
/// Lanczos keeps module edges crisp enough to stay scannable at small sizes.
pub fn compose(base: RgbImage, target_size: u32, logo: Option<&str>, logo_scale: f32) -> Composed {
    let resized = imageops::resize(&base, target_size, target_size, FilterType::Lanczos3);

    let Some(encoded) = logo else {
        return Composed::WithoutLogo(resized);
    };

    let logo_img = match decode_logo(encoded) {
        Ok(img) => img,
        Err(err) => {
            log::warn!("Ignoring center image: {err:#}");
            return Composed::WithoutLogo(resized);
        }
    };

    let mut canvas = resized;
    let logo_size = ((target_size as f32 * logo_scale) as u32).max(1);
    let mut logo_img = imageops::resize(
        &logo_img.to_rgba8(),
        logo_size,
        logo_size,
        FilterType::Lanczos3,
    );

    apply_circular_mask(&mut logo_img);

    let offset = (target_size - logo_size) / 2;
    overlay_blend(&mut canvas, &logo_img, offset, offset);

    Composed::WithLogo(canvas)
}

/// Decode a base64 logo, with or without a `data:image/...;base64,` prefix.
fn decode_logo(encoded: &str) -> anyhow::Result<DynamicImage> {
    let payload = encoded.rsplit(',').next().unwrap_or(encoded);

    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .context("invalid base64 data")?;

    image::load_from_memory(&bytes).context("unsupported image data")
}

/// Zero out alpha outside the inscribed circle.
fn apply_circular_mask(img: &mut RgbaImage) {
    let (width, height) = img.dimensions();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let radius = width.min(height) as f32 / 2.0;

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        if dx * dx + dy * dy > radius * radius {
            pixel[3] = 0;
        }
    }
}

/// Alpha-blend `top` onto `base` at the given position, flattening to RGB.
fn overlay_blend(base: &mut RgbImage, top: &RgbaImage, x: u32, y: u32) {
    for (dx, dy, pixel) in top.enumerate_pixels() {
        let target_x = x + dx;
        let target_y = y + dy;
        if target_x >= base.width() || target_y >= base.height() {
            continue;
        }

        let alpha = pixel[3] as f32 / 255.0;
        if alpha <= 0.01 {
            continue;
        }

        let bg = *base.get_pixel(target_x, target_y);
        let blend =
            |fg: u8, bg: u8| (fg as f32 * alpha + bg as f32 * (1.0 - alpha)).round() as u8;

        base.put_pixel(
            target_x,
            target_y,
            Rgb([
                blend(pixel[0], bg[0]),
                blend(pixel[1], bg[1]),
                blend(pixel[2], bg[2]),
            ]),
        );
    }
}
