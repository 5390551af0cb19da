//! Image loading, the synthetic test scene, and tonemapped output.

use std::path::{Path, PathBuf};

use glam::{Vec3, Vec4};
use lumen_render::HdrImage;

#[derive(Debug, thiserror::Error)]
pub enum ImageIoError {
    #[error("failed to read image {path}: {source}")]
    Read {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("failed to write image {path}: {source}")]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Load an image as linear RGBA. 8-bit sources are treated as sRGB.
pub fn load_linear(path: &Path) -> Result<HdrImage, ImageIoError> {
    let dynamic = image::open(path).map_err(|source| ImageIoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = dynamic.into_rgba32f();
    let (width, height) = rgba.dimensions();
    Ok(HdrImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Vec4::new(
            srgb_to_linear(r),
            srgb_to_linear(g),
            srgb_to_linear(b),
            a,
        )
    }))
}

/// A dark gradient with a handful of point lights and one bright bar, for
/// running without an input image.
pub fn synthetic_scene(width: u32, height: u32) -> HdrImage {
    let lights = [
        (0.25, 0.30, Vec3::new(60.0, 48.0, 30.0)),
        (0.70, 0.45, Vec3::new(20.0, 35.0, 80.0)),
        (0.55, 0.80, Vec3::new(90.0, 90.0, 90.0)),
    ];
    HdrImage::from_fn(width, height, |x, y| {
        let u = (x as f32 + 0.5) / width as f32;
        let v = (y as f32 + 0.5) / height as f32;
        let mut color = Vec3::new(0.02, 0.025, 0.04) * (1.0 + v);
        for (lx, ly, light) in lights {
            let dx = (u - lx) * width as f32;
            let dy = (v - ly) * height as f32;
            if dx * dx + dy * dy <= 4.0 {
                color += light;
            }
        }
        if (0.1..0.9).contains(&u) && (y == height / 8) {
            color += Vec3::splat(4.0);
        }
        color.extend(1.0)
    })
}

/// Tonemap with the ACES fit and encode to 8-bit sRGB.
pub fn tonemap(image: &HdrImage, exposure: f32) -> image::RgbaImage {
    image::RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let texel = image.get(x, y);
        let mapped = aces(texel.truncate() * exposure);
        image::Rgba([
            to_u8(linear_to_srgb(mapped.x)),
            to_u8(linear_to_srgb(mapped.y)),
            to_u8(linear_to_srgb(mapped.z)),
            to_u8(texel.w),
        ])
    })
}

pub fn save_tonemapped(path: &Path, image: &HdrImage, exposure: f32) -> Result<(), ImageIoError> {
    tonemap(image, exposure)
        .save(path)
        .map_err(|source| ImageIoError::Write {
            path: path.to_path_buf(),
            source,
        })
}

fn aces(hdr: Vec3) -> Vec3 {
    let a = 2.51;
    let b = 0.03;
    let c = 2.43;
    let d = 0.59;
    let e = 0.14;
    ((hdr * (a * hdr + b)) / (hdr * (c * hdr + d) + e)).clamp(Vec3::ZERO, Vec3::ONE)
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn to_u8(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}
