//! Compute kernels the bloom pass dispatches besides the FFT: bright-pass
//! extraction, additive blend, PSF remap, and the procedural PSF generator.
//!
//! Each kernel takes a small `Pod` uniform block so a GPU backend can upload
//! it as-is. The host-side reference implementations live here as functions
//! over [`HdrImage`]; [`CpuKernels`](crate::cpu::CpuKernels) binds them to the
//! [`BloomKernels`] trait.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

use crate::error::BloomError;
use crate::image::{HdrImage, TexelRect};
use crate::params::BloomParameters;
use crate::sizing::TileLayout;

/// Rec.709 luma weights.
pub const LUMINANCE_WEIGHTS: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

const EPSILON: f32 = 0.0001;

/// Kernel dispatches of the bloom pass, over a backend's texture type `T`.
///
/// Like the FFT primitive, every call enqueues and returns.
pub trait BloomKernels<T> {
    /// Extract bright texels of `scene` into the content rect of `staging`.
    /// Staging texels outside the content rect are zeroed.
    fn bright_pass(
        &mut self,
        scene: &T,
        staging: &mut T,
        uniforms: &BrightPassUniforms,
    ) -> Result<(), BloomError>;

    /// Add the convolved staging content, scaled by intensity, onto `scene`.
    fn blend(&mut self, staging: &T, scene: &mut T, uniforms: &BlendUniforms)
    -> Result<(), BloomError>;

    /// Remap the PSF held in `psf` into a spatial kernel in `otf`, centred
    /// on texel (0, 0).
    fn remap_psf(&mut self, psf: &T, otf: &mut T, uniforms: &PsfRemapUniforms)
    -> Result<(), BloomError>;

    /// Write the procedural glare kernel into `otf`.
    fn generate_psf(&mut self, otf: &mut T, uniforms: &PsfGenerateUniforms)
    -> Result<(), BloomError>;
}

/// Uniform block of the bright-pass kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BrightPassUniforms {
    pub threshold: f32,
    pub knee: f32,
    pub clamp_max: f32,
    pub _pad: f32,
    /// Content rect in staging texels: x, y, width, height.
    pub content: [u32; 4],
}

impl BrightPassUniforms {
    pub fn new(params: &BloomParameters, layout: &TileLayout) -> Self {
        Self {
            threshold: params.threshold,
            knee: params.knee,
            clamp_max: params.clamp_max,
            _pad: 0.0,
            content: rect_to_array(layout.content_rect()),
        }
    }

    pub fn content_rect(&self) -> TexelRect {
        rect_from_array(self.content)
    }
}

/// Uniform block of the blend kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BlendUniforms {
    pub intensity: f32,
    pub _pad: [f32; 3],
    pub content: [u32; 4],
}

impl BlendUniforms {
    pub fn new(params: &BloomParameters, layout: &TileLayout) -> Self {
        Self {
            intensity: params.intensity,
            _pad: [0.0; 3],
            content: rect_to_array(layout.content_rect()),
        }
    }

    pub fn content_rect(&self) -> TexelRect {
        rect_from_array(self.content)
    }
}

/// Uniform block of the PSF remap kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PsfRemapUniforms {
    pub min_clamp: f32,
    pub max_clamp: f32,
    pub pow: f32,
    pub scale: f32,
    /// Region of the PSF texture holding the blitted source image.
    pub content: [u32; 4],
}

impl PsfRemapUniforms {
    pub fn new(params: &BloomParameters, layout: &TileLayout) -> Self {
        Self {
            min_clamp: params.psf_min_clamp,
            max_clamp: params.psf_max_clamp,
            pow: params.psf_pow,
            scale: params.psf_scale,
            content: rect_to_array(psf_content_rect(layout)),
        }
    }

    pub fn content_rect(&self) -> TexelRect {
        rect_from_array(self.content)
    }
}

/// Uniform block of the PSF generator.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PsfGenerateUniforms {
    pub tile: [u32; 2],
    /// Fraction of the tile covered by content, per axis: `1 - 2 * fft_extend`.
    pub content_scale: [f32; 2],
    /// Non-zero to centre the kernel on texel (0, 0) with wrap-around
    /// instead of on the tile centre.
    pub remap: u32,
    pub _pad: [u32; 3],
}

impl PsfGenerateUniforms {
    pub fn new(params: &BloomParameters, layout: &TileLayout) -> Self {
        Self {
            tile: [layout.tile.width, layout.tile.height],
            content_scale: (Vec2::ONE - 2.0 * params.fft_extend).to_array(),
            remap: 1,
            _pad: [0; 3],
        }
    }
}

/// Region of the PSF texture a user image is blitted into: the tile minus
/// its padding on both axes.
pub fn psf_content_rect(layout: &TileLayout) -> TexelRect {
    TexelRect::new(
        layout.padding.x,
        layout.padding.y,
        layout.tile.width.saturating_sub(2 * layout.padding.x),
        layout.tile.height.saturating_sub(2 * layout.padding.y),
    )
}

fn rect_to_array(rect: TexelRect) -> [u32; 4] {
    [rect.x, rect.y, rect.width, rect.height]
}

fn rect_from_array(a: [u32; 4]) -> TexelRect {
    TexelRect::new(a[0], a[1], a[2], a[3])
}

pub fn luminance(color: Vec3) -> f32 {
    color.dot(LUMINANCE_WEIGHTS)
}

/// Soft-knee bright-pass curve.
///
/// `knee` is relative to `threshold`. Below `threshold - k` the result is
/// zero, above `threshold + k` it is `color * (l - threshold) / l`, and in
/// between a quadratic joins the two. At exactly `threshold` the colour is
/// scaled by `k / (4 * threshold)`.
pub fn soft_threshold(color: Vec3, threshold: f32, knee: f32) -> Vec3 {
    let l = luminance(color);
    let k = threshold * knee;
    let soft = (l - threshold + k).clamp(0.0, 2.0 * k);
    let contribution = soft * soft / (4.0 * k + EPSILON);
    let factor = (l - threshold).max(contribution) / l.max(EPSILON);
    color * factor.max(0.0)
}

/// Host reference of the bright-pass kernel.
///
/// When the scene is larger than the content rect each staging texel averages
/// four bilinear taps, so highlights narrower than the footprint still land
/// in the staging image.
pub fn bright_pass_image(scene: &HdrImage, staging: &mut HdrImage, uniforms: &BrightPassUniforms) {
    let rect = uniforms.content_rect();
    let h = staging.height();
    let clamp_max = Vec3::splat(uniforms.clamp_max);
    let texel_size = Vec2::new(1.0 / rect.width as f32, 1.0 / rect.height as f32);
    let downsampling = scene.width() > rect.width || scene.height() > rect.height;
    let taps: &[Vec2] = if downsampling {
        &[
            Vec2::new(-0.25, -0.25),
            Vec2::new(0.25, -0.25),
            Vec2::new(-0.25, 0.25),
            Vec2::new(0.25, 0.25),
        ]
    } else {
        &[Vec2::ZERO]
    };
    let fetch = |uv: Vec2| {
        scene
            .sample(uv.x, uv.y)
            .truncate()
            .max(Vec3::ZERO)
            .min(clamp_max)
    };

    for y in 0..h {
        let row = staging.row_mut(y);
        for (x, texel) in row.iter_mut().enumerate() {
            let x = x as u32;
            if !rect.contains(x, y) {
                *texel = Vec4::ZERO;
                continue;
            }
            let centre = Vec2::new((x - rect.x) as f32 + 0.5, (y - rect.y) as f32 + 0.5) * texel_size;
            let color = taps
                .iter()
                .map(|offset| fetch(centre + *offset * texel_size))
                .sum::<Vec3>()
                / taps.len() as f32;
            *texel = soft_threshold(color, uniforms.threshold, uniforms.knee).extend(0.0);
        }
    }
}

/// Host reference of the blend kernel. Alpha is left untouched.
pub fn blend_image(staging: &HdrImage, scene: &mut HdrImage, uniforms: &BlendUniforms) {
    let rect = uniforms.content_rect();
    let (w, h) = scene.dimensions();
    for y in 0..h {
        let sy = rect.y as f32 + (y as f32 + 0.5) / h as f32 * rect.height as f32 - 0.5;
        for x in 0..w {
            let sx = rect.x as f32 + (x as f32 + 0.5) / w as f32 * rect.width as f32 - 0.5;
            let bloom = staging.sample_in(sx, sy, rect).truncate();
            let texel = scene.get(x, y);
            let rgb = texel.truncate() + bloom * uniforms.intensity;
            scene.set(x, y, rgb.extend(texel.w));
        }
    }
}

/// Host reference of the PSF remap kernel.
pub fn remap_psf_image(psf: &HdrImage, otf: &mut HdrImage, uniforms: &PsfRemapUniforms) {
    let rect = uniforms.content_rect();
    let (w, h) = otf.dimensions();
    otf.fill(Vec4::ZERO);
    if rect.is_empty() {
        return;
    }

    let range = uniforms.max_clamp - uniforms.min_clamp;
    let remap = |v: f32| ((v - uniforms.min_clamp) / range).clamp(0.0, 1.0).powf(uniforms.pow);

    let mut sum = Vec3::ZERO;
    let mut remapped = Vec::with_capacity(rect.width as usize * rect.height as usize);
    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            let v = psf.get(x, y).truncate();
            let v = Vec3::new(remap(v.x), remap(v.y), remap(v.z));
            sum += v;
            remapped.push(v);
        }
    }

    let norm = Vec3::new(
        normalizer(sum.x, uniforms.scale),
        normalizer(sum.y, uniforms.scale),
        normalizer(sum.z, uniforms.scale),
    );
    let cx = rect.x + rect.width / 2;
    let cy = rect.y + rect.height / 2;
    let mut values = remapped.into_iter();
    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            let Some(v) = values.next() else {
                return;
            };
            let tx = (x + w - cx) % w;
            let ty = (y + h - cy) % h;
            otf.set(tx, ty, (v * norm).extend(0.0));
        }
    }
}

fn normalizer(sum: f32, scale: f32) -> f32 {
    if sum > EPSILON { scale / sum } else { 0.0 }
}

/// Host reference of the procedural PSF generator.
///
/// A radially symmetric glare: a one-texel Gaussian core plus a power-law
/// halo whose width follows the content size. Red spreads a little wider than
/// blue. Each channel sums to one.
pub fn generate_psf_image(otf: &mut HdrImage, uniforms: &PsfGenerateUniforms) {
    let (w, h) = otf.dimensions();
    let content = Vec2::new(
        w as f32 * uniforms.content_scale[0],
        h as f32 * uniforms.content_scale[1],
    );
    let extent = 0.5 * content.min_element();
    let halo_width = Vec3::new(1.15, 1.0, 0.85) * (extent * 0.01).max(0.5);

    let mut sum = Vec3::ZERO;
    for y in 0..h {
        for x in 0..w {
            let (dx, dy) = if uniforms.remap != 0 {
                (wrapped(x, w), wrapped(y, h))
            } else {
                (x as f32 - (w / 2) as f32, y as f32 - (h / 2) as f32)
            };
            let r = (dx * dx + dy * dy).sqrt();
            let value = if r > extent {
                Vec3::ZERO
            } else {
                let core = (-r * r).exp();
                let halo = (Vec3::ONE + Vec3::splat(r) / halo_width).powf(-3.0) * 0.02;
                Vec3::splat(core) + halo
            };
            sum += value;
            otf.set(x, y, value.extend(0.0));
        }
    }

    let norm = Vec3::ONE / sum.max(Vec3::splat(EPSILON));
    for texel in otf.texels_mut() {
        *texel = (texel.truncate() * norm).extend(0.0);
    }
}

/// Signed distance of `i` from 0 on a ring of length `n`.
fn wrapped(i: u32, n: u32) -> f32 {
    if i < n / 2 {
        i as f32
    } else {
        i as f32 - n as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizing::TileSize;
    use glam::UVec2;

    fn small_layout() -> TileLayout {
        TileLayout {
            tile: TileSize::new(32, 16),
            padding: UVec2::new(4, 2),
            staging_height: 12,
            staging: crate::sizing::StagingLayout::Cropped,
        }
    }

    #[test]
    fn test_uniform_sizes_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<BrightPassUniforms>(), 32);
        assert_eq!(std::mem::size_of::<BlendUniforms>(), 32);
        assert_eq!(std::mem::size_of::<PsfRemapUniforms>(), 32);
        assert_eq!(std::mem::size_of::<PsfGenerateUniforms>(), 32);
    }

    #[test]
    fn test_threshold_boundary_is_continuous() {
        let threshold = 1.0;
        let knee = 0.5;
        let color = Vec3::ONE;
        assert!((luminance(color) - threshold).abs() < 1e-6);

        let out = soft_threshold(color, threshold, knee);
        let expected = threshold * knee / (4.0 * threshold);
        assert!(
            (out.x - expected).abs() < 1e-3,
            "boundary pixel should be scaled by {expected}, got {out:?}"
        );
        assert!(out.x > 0.0 && out.x < 1.0, "boundary must be neither clipped nor passed");
    }

    #[test]
    fn test_dim_pixels_are_rejected() {
        let out = soft_threshold(Vec3::splat(0.4), 1.0, 0.5);
        assert_eq!(out, Vec3::ZERO);
    }

    #[test]
    fn test_bright_pixels_lose_threshold() {
        let color = Vec3::splat(5.0);
        let out = soft_threshold(color, 1.0, 0.5);
        let expected = color * (4.0 / 5.0);
        assert!((out - expected).abs().max_element() < 1e-4, "got {out:?}");
    }

    #[test]
    fn test_zero_threshold_passes_everything() {
        let color = Vec3::new(0.2, 0.5, 0.1);
        let out = soft_threshold(color, 0.0, 0.5);
        assert!((out - color).abs().max_element() < 1e-4, "got {out:?}");
    }

    #[test]
    fn test_bright_pass_clamps_and_fills_content_only() {
        let layout = small_layout();
        let params = BloomParameters {
            threshold: 0.0,
            clamp_max: 2.0,
            ..Default::default()
        };
        let uniforms = BrightPassUniforms::new(&params, &layout);
        let scene = HdrImage::filled(8, 4, Vec4::new(10.0, 1.0, 1.0, 1.0));
        let mut staging = HdrImage::filled(32, 12, Vec4::ONE);
        bright_pass_image(&scene, &mut staging, &uniforms);

        assert_eq!(staging.get(0, 0), Vec4::ZERO, "padding column must be cleared");
        assert_eq!(staging.get(31, 11), Vec4::ZERO);
        let inside = staging.get(10, 5);
        assert!((inside.x - 2.0).abs() < 1e-4, "red must be clamped, got {inside:?}");
        assert_eq!(inside.w, 0.0);
    }

    #[test]
    fn test_downsampled_highlight_keeps_energy_at_any_offset() {
        let layout = small_layout();
        let params = BloomParameters {
            threshold: 0.0,
            ..Default::default()
        };
        let uniforms = BrightPassUniforms::new(&params, &layout);
        // 4 scene texels per staging texel horizontally
        for column in 40..44 {
            let scene = HdrImage::from_fn(96, 12, |x, _| {
                if x == column {
                    Vec4::new(8.0, 0.0, 0.0, 1.0)
                } else {
                    Vec4::ZERO
                }
            });
            let mut staging = HdrImage::new(32, 12);
            bright_pass_image(&scene, &mut staging, &uniforms);
            let energy = staging.sum().x;
            assert!(
                (energy - 24.0).abs() < 1e-3,
                "highlight at column {column} kept {energy}, expected 24"
            );
        }
    }

    #[test]
    fn test_blend_adds_scaled_bloom_and_keeps_alpha() {
        let layout = small_layout();
        let params = BloomParameters {
            intensity: 0.5,
            ..Default::default()
        };
        let uniforms = BlendUniforms::new(&params, &layout);
        let staging = HdrImage::filled(32, 12, Vec4::new(2.0, 4.0, 0.0, 9.0));
        let mut scene = HdrImage::filled(6, 3, Vec4::new(0.1, 0.1, 0.1, 0.75));
        blend_image(&staging, &mut scene, &uniforms);
        let texel = scene.get(3, 1);
        assert!((texel.x - 1.1).abs() < 1e-5, "got {texel:?}");
        assert!((texel.y - 2.1).abs() < 1e-5);
        assert_eq!(texel.w, 0.75);
    }

    #[test]
    fn test_generated_psf_is_normalized_and_centred() {
        let layout = small_layout();
        let params = BloomParameters::default();
        let uniforms = PsfGenerateUniforms::new(&params, &layout);
        let mut otf = HdrImage::new(32, 16);
        generate_psf_image(&mut otf, &uniforms);

        let sum = otf.sum();
        for c in [sum.x, sum.y, sum.z] {
            assert!((c - 1.0).abs() < 1e-4, "channel energy {c}");
        }
        let peak = otf.get(0, 0);
        assert!(otf.texels().iter().all(|t| t.y <= peak.y), "peak must sit at the origin");
        assert_eq!(sum.w, 0.0);
    }

    #[test]
    fn test_remap_shifts_centre_to_origin_and_scales() {
        let layout = small_layout();
        let params = BloomParameters {
            psf_scale: 2.0,
            ..Default::default()
        };
        let uniforms = PsfRemapUniforms::new(&params, &layout);
        let rect = uniforms.content_rect();
        assert_eq!(rect, TexelRect::new(4, 2, 24, 12));

        let mut psf = HdrImage::new(32, 16);
        psf.set(16, 8, Vec4::new(1.0, 0.5, 0.25, 1.0));
        let mut otf = HdrImage::new(32, 16);
        remap_psf_image(&psf, &mut otf, &uniforms);

        let origin = otf.get(0, 0);
        assert!((origin.x - 2.0).abs() < 1e-5, "got {origin:?}");
        assert!((origin.y - 2.0).abs() < 1e-5);
        assert!((origin.z - 2.0).abs() < 1e-5);
        assert!((otf.sum().x - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_remap_clamps_below_min() {
        let layout = small_layout();
        let params = BloomParameters {
            psf_min_clamp: 0.5,
            ..Default::default()
        };
        let uniforms = PsfRemapUniforms::new(&params, &layout);
        let mut psf = HdrImage::filled(32, 16, Vec4::splat(0.25));
        psf.set(10, 5, Vec4::splat(1.0));
        let mut otf = HdrImage::new(32, 16);
        remap_psf_image(&psf, &mut otf, &uniforms);

        let nonzero = otf.texels().iter().filter(|t| t.x > 0.0).count();
        assert_eq!(nonzero, 1, "values under psf_min_clamp must vanish");
    }
}
