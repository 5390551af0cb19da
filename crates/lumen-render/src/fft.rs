//! FFT primitive seam and the CPU reference transform.
//!
//! The bloom pass only needs three operations from an FFT backend: an
//! in-place forward transform (to build the OTF), and two interchangeable
//! convolutions. [`FftPrimitive`] is that contract; [`CpuFft`] implements it
//! on host images so every property of the pass can be checked without a GPU.
//!
//! # Frequency-domain layout
//!
//! A spectrum occupies a texture of the same size and format as its spatial
//! source. Two real channels share one complex plane (`R + iG` and `B + iA`),
//! so texel `(u, v)` of a spectrum holds `(Re₀, Im₀, Re₁, Im₁)`. Because the
//! PSF channels are real, the spectral multiply can separate the two channels
//! of each plane through Hermitian symmetry and convolve each image channel
//! with its own kernel channel.

use std::f32::consts::PI;
use std::ops::{Add, Mul, Range, Sub};
use std::sync::Arc;

use glam::Vec4;
use rustc_hash::FxHashMap;

use crate::cpu::CpuTexture;
use crate::error::BloomError;
use crate::image::HdrImage;
use crate::sizing::TileSize;

/// Rows and columns of an FFT tile that carry data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileRanges {
    pub horizontal: Range<u32>,
    pub vertical: Range<u32>,
}

impl TileRanges {
    pub fn full(tile: TileSize) -> Self {
        Self {
            horizontal: 0..tile.width,
            vertical: 0..tile.height,
        }
    }
}

/// Operations an FFT backend provides to the bloom pass.
///
/// All three enqueue work and return; none of them wait for completion.
pub trait FftPrimitive<T> {
    /// Replace `texture` with its forward transform.
    fn forward(&mut self, texture: &mut T) -> Result<(), BloomError>;

    /// Circularly convolve `image` with the kernel whose spectrum is `otf`,
    /// as three separate full-tile phases.
    ///
    /// `image` must be as wide as the tile and at most as tall. A shorter
    /// image occupies the vertically centred band of the tile and the rows
    /// around it are zero.
    fn convolve(&mut self, image: &mut T, otf: &T) -> Result<(), BloomError>;

    /// Same result as [`convolve`](Self::convolve), fused and restricted to
    /// `ranges`.
    ///
    /// Tile texel `(x, y)` inside `ranges` maps to image texel
    /// `(x, y + offset)`; tile texels outside `ranges` are zero. Only texels
    /// inside `ranges` are written back.
    fn convolve_opt(
        &mut self,
        image: &mut T,
        otf: &T,
        tile: TileSize,
        ranges: &TileRanges,
        offset: i32,
    ) -> Result<(), BloomError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Complex {
    re: f32,
    im: f32,
}

impl Complex {
    const ZERO: Complex = Complex { re: 0.0, im: 0.0 };

    #[inline]
    fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    #[inline]
    fn conj(self) -> Self {
        Self::new(self.re, -self.im)
    }

    /// `i * self`
    #[inline]
    fn mul_i(self) -> Self {
        Self::new(-self.im, self.re)
    }

    /// `-i * self`
    #[inline]
    fn mul_neg_i(self) -> Self {
        Self::new(self.im, -self.re)
    }

    #[inline]
    fn scale(self, s: f32) -> Self {
        Self::new(self.re * s, self.im * s)
    }
}

impl Add for Complex {
    type Output = Complex;
    #[inline]
    fn add(self, rhs: Complex) -> Complex {
        Complex::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex {
    type Output = Complex;
    #[inline]
    fn sub(self, rhs: Complex) -> Complex {
        Complex::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex {
    type Output = Complex;
    #[inline]
    fn mul(self, rhs: Complex) -> Complex {
        Complex::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

/// Precomputed twiddles and bit-reversal table for one transform length.
struct FftPlan {
    len: usize,
    twiddles: Vec<Complex>,
    bit_reverse: Vec<u32>,
}

impl FftPlan {
    fn new(len: usize) -> Self {
        let bits = len.trailing_zeros();
        let twiddles = (0..len / 2)
            .map(|k| {
                let angle = -2.0 * PI * k as f32 / len as f32;
                Complex::new(angle.cos(), angle.sin())
            })
            .collect();
        let bit_reverse = (0..len as u32)
            .map(|i| if bits == 0 { 0 } else { i.reverse_bits() >> (32 - bits) })
            .collect();
        Self {
            len,
            twiddles,
            bit_reverse,
        }
    }

    /// Unnormalised in-place transform.
    fn process(&self, data: &mut [Complex], inverse: bool) {
        debug_assert_eq!(data.len(), self.len);
        for (i, &j) in self.bit_reverse.iter().enumerate() {
            let j = j as usize;
            if i < j {
                data.swap(i, j);
            }
        }

        let mut size = 2;
        while size <= self.len {
            let half = size / 2;
            let stride = self.len / size;
            for start in (0..self.len).step_by(size) {
                for k in 0..half {
                    let mut w = self.twiddles[k * stride];
                    if inverse {
                        w = w.conj();
                    }
                    let a = data[start + k];
                    let b = data[start + k + half] * w;
                    data[start + k] = a + b;
                    data[start + k + half] = a - b;
                }
            }
            size *= 2;
        }
    }
}

/// A complex plane of tile size.
struct Plane {
    width: usize,
    height: usize,
    data: Vec<Complex>,
}

impl Plane {
    fn zeroed(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![Complex::ZERO; width * height],
        }
    }

    fn row_mut(&mut self, y: usize) -> &mut [Complex] {
        let start = y * self.width;
        &mut self.data[start..start + self.width]
    }

    fn transform_rows(&mut self, rows: Range<usize>, plan: &FftPlan, inverse: bool) {
        for y in rows {
            plan.process(self.row_mut(y), inverse);
        }
    }

    fn transform_columns(&mut self, plan: &FftPlan, inverse: bool, scratch: &mut Vec<Complex>) {
        scratch.resize(self.height, Complex::ZERO);
        for x in 0..self.width {
            for y in 0..self.height {
                scratch[y] = self.data[y * self.width + x];
            }
            plan.process(scratch, inverse);
            for y in 0..self.height {
                self.data[y * self.width + x] = scratch[y];
            }
        }
    }
}

/// The two complex planes of an RGBA texture.
struct PlanePair([Plane; 2]);

impl PlanePair {
    fn zeroed(tile: TileSize) -> Self {
        let (w, h) = (tile.width as usize, tile.height as usize);
        Self([Plane::zeroed(w, h), Plane::zeroed(w, h)])
    }

    #[inline]
    fn put(&mut self, index: usize, texel: Vec4) {
        self.0[0].data[index] = Complex::new(texel.x, texel.y);
        self.0[1].data[index] = Complex::new(texel.z, texel.w);
    }

    #[inline]
    fn get(&self, index: usize) -> Vec4 {
        let a = self.0[0].data[index];
        let b = self.0[1].data[index];
        Vec4::new(a.re, a.im, b.re, b.im)
    }
}

/// Reference FFT backend on host memory.
///
/// Radix-2, so both tile dimensions must be powers of two. Plans are cached
/// per length.
#[derive(Default)]
pub struct CpuFft {
    plans: FxHashMap<usize, Arc<FftPlan>>,
    scratch: Vec<Complex>,
}

impl CpuFft {
    pub fn new() -> Self {
        Self::default()
    }

    fn plan(&mut self, len: u32) -> Result<Arc<FftPlan>, BloomError> {
        if len == 0 || !len.is_power_of_two() {
            return Err(BloomError::NonPowerOfTwo(len));
        }
        Ok(self
            .plans
            .entry(len as usize)
            .or_insert_with(|| Arc::new(FftPlan::new(len as usize)))
            .clone())
    }

    /// Forward-transform an image in place.
    pub fn forward_image(&mut self, image: &mut HdrImage) -> Result<(), BloomError> {
        let tile = TileSize::new(image.width(), image.height());
        let rows = self.plan(tile.width)?;
        let cols = self.plan(tile.height)?;

        let mut planes = PlanePair::zeroed(tile);
        for (i, texel) in image.texels().iter().enumerate() {
            planes.put(i, *texel);
        }
        for plane in &mut planes.0 {
            plane.transform_rows(0..tile.height as usize, &rows, false);
            plane.transform_columns(&cols, false, &mut self.scratch);
        }
        for (i, texel) in image.texels_mut().iter_mut().enumerate() {
            *texel = planes.get(i);
        }
        Ok(())
    }

    /// Inverse of [`forward_image`](Self::forward_image), normalised.
    pub fn inverse_image(&mut self, image: &mut HdrImage) -> Result<(), BloomError> {
        let tile = TileSize::new(image.width(), image.height());
        let rows = self.plan(tile.width)?;
        let cols = self.plan(tile.height)?;

        let mut planes = PlanePair::zeroed(tile);
        for (i, texel) in image.texels().iter().enumerate() {
            planes.put(i, *texel);
        }
        for plane in &mut planes.0 {
            plane.transform_columns(&cols, true, &mut self.scratch);
            plane.transform_rows(0..tile.height as usize, &rows, true);
        }
        let norm = 1.0 / tile.texel_count() as f32;
        for (i, texel) in image.texels_mut().iter_mut().enumerate() {
            *texel = planes.get(i) * norm;
        }
        Ok(())
    }

    /// Full-tile convolution, each phase over every row and column.
    pub fn convolve_image(&mut self, image: &mut HdrImage, otf: &HdrImage) -> Result<(), BloomError> {
        let tile = TileSize::new(otf.width(), otf.height());
        if image.width() != tile.width || image.height() > tile.height {
            return Err(BloomError::DimensionMismatch {
                label: "convolve image".to_string(),
                actual_width: image.width(),
                actual_height: image.height(),
                expected_width: tile.width,
                expected_height: tile.height,
            });
        }
        let rows = self.plan(tile.width)?;
        let cols = self.plan(tile.height)?;
        let band = (tile.height - image.height()) / 2;

        let mut planes = PlanePair::zeroed(tile);
        let width = tile.width as usize;
        for y in 0..image.height() {
            let base = (y + band) as usize * width;
            for (x, texel) in image.row(y).iter().enumerate() {
                planes.put(base + x, *texel);
            }
        }

        // forward
        for plane in &mut planes.0 {
            plane.transform_rows(0..tile.height as usize, &rows, false);
            plane.transform_columns(&cols, false, &mut self.scratch);
        }
        // multiply
        multiply_spectra(&mut planes, otf);
        // inverse
        for plane in &mut planes.0 {
            plane.transform_columns(&cols, true, &mut self.scratch);
            plane.transform_rows(0..tile.height as usize, &rows, true);
        }

        let norm = 1.0 / tile.texel_count() as f32;
        for y in 0..image.height() {
            let base = (y + band) as usize * width;
            for (x, texel) in image.row_mut(y).iter_mut().enumerate() {
                *texel = planes.get(base + x) * norm;
            }
        }
        Ok(())
    }

    /// Range-restricted convolution. Rows outside `ranges.vertical` are known
    /// to be zero on input and are never written, so their row transforms are
    /// skipped in both directions.
    pub fn convolve_opt_image(
        &mut self,
        image: &mut HdrImage,
        otf: &HdrImage,
        tile: TileSize,
        ranges: &TileRanges,
        offset: i32,
    ) -> Result<(), BloomError> {
        if otf.dimensions() != (tile.width, tile.height) {
            return Err(BloomError::DimensionMismatch {
                label: "otf".to_string(),
                actual_width: otf.width(),
                actual_height: otf.height(),
                expected_width: tile.width,
                expected_height: tile.height,
            });
        }
        check_ranges(image, tile, ranges, offset)?;
        let rows = self.plan(tile.width)?;
        let cols = self.plan(tile.height)?;

        let width = tile.width as usize;
        let row_span = ranges.vertical.start as usize..ranges.vertical.end as usize;
        let col_span = ranges.horizontal.start as usize..ranges.horizontal.end as usize;

        let mut planes = PlanePair::zeroed(tile);
        for y in ranges.vertical.clone() {
            let src = image.row((y as i32 + offset) as u32);
            let base = y as usize * width;
            for x in col_span.clone() {
                planes.put(base + x, src[x]);
            }
        }

        for plane in &mut planes.0 {
            plane.transform_rows(row_span.clone(), &rows, false);
            plane.transform_columns(&cols, false, &mut self.scratch);
        }
        multiply_spectra(&mut planes, otf);
        for plane in &mut planes.0 {
            plane.transform_columns(&cols, true, &mut self.scratch);
            plane.transform_rows(row_span.clone(), &rows, true);
        }

        let norm = 1.0 / tile.texel_count() as f32;
        for y in ranges.vertical.clone() {
            let base = y as usize * width;
            let dst = image.row_mut((y as i32 + offset) as u32);
            for x in col_span.clone() {
                dst[x] = planes.get(base + x) * norm;
            }
        }
        Ok(())
    }
}

fn check_ranges(
    image: &HdrImage,
    tile: TileSize,
    ranges: &TileRanges,
    offset: i32,
) -> Result<(), BloomError> {
    let out_of_bounds = |detail: String| Err(BloomError::RangeOutOfBounds { detail });

    if ranges.horizontal.start > ranges.horizontal.end
        || ranges.horizontal.end > tile.width
        || ranges.horizontal.end > image.width()
    {
        return out_of_bounds(format!("horizontal {:?}", ranges.horizontal));
    }
    if ranges.vertical.start > ranges.vertical.end || ranges.vertical.end > tile.height {
        return out_of_bounds(format!("vertical {:?}", ranges.vertical));
    }
    if ranges.vertical.is_empty() {
        return Ok(());
    }
    let first = ranges.vertical.start as i64 + offset as i64;
    let last = ranges.vertical.end as i64 - 1 + offset as i64;
    if first < 0 || last >= image.height() as i64 {
        return out_of_bounds(format!(
            "vertical {:?} with offset {offset} on {} rows",
            ranges.vertical,
            image.height()
        ));
    }
    Ok(())
}

/// Multiply the packed image spectrum by the packed kernel spectrum,
/// channel by channel.
///
/// For a plane `Z = F(a) + i F(b)` of real channels `a`, `b`:
/// `F(a)(k) = (Z(k) + conj(Z(-k))) / 2` and `F(b)(k) = -i (Z(k) - conj(Z(-k))) / 2`.
/// The product `F(a)·F(ka) + i F(b)·F(kb)` transforms back to
/// `(a ⊛ ka) + i (b ⊛ kb)`.
fn multiply_spectra(planes: &mut PlanePair, otf: &HdrImage) {
    let width = planes.0[0].width;
    let height = planes.0[0].height;
    let otf_texels = otf.texels();

    for (channel, plane) in planes.0.iter_mut().enumerate() {
        let kernel = |i: usize| {
            let t = otf_texels[i];
            if channel == 0 {
                Complex::new(t.x, t.y)
            } else {
                Complex::new(t.z, t.w)
            }
        };

        let mut product = vec![Complex::ZERO; width * height];
        for v in 0..height {
            let mv = (height - v) % height;
            for u in 0..width {
                let mu = (width - u) % width;
                let i = v * width + u;
                let m = mv * width + mu;

                let z = plane.data[i];
                let z_mirror = plane.data[m].conj();
                let a = (z + z_mirror).scale(0.5);
                let b = (z - z_mirror).scale(0.5).mul_neg_i();

                let k = kernel(i);
                let k_mirror = kernel(m).conj();
                let ka = (k + k_mirror).scale(0.5);
                let kb = (k - k_mirror).scale(0.5).mul_neg_i();

                product[i] = a * ka + (b * kb).mul_i();
            }
        }
        plane.data = product;
    }
}

impl FftPrimitive<HdrImage> for CpuFft {
    fn forward(&mut self, texture: &mut HdrImage) -> Result<(), BloomError> {
        self.forward_image(texture)
    }

    fn convolve(&mut self, image: &mut HdrImage, otf: &HdrImage) -> Result<(), BloomError> {
        self.convolve_image(image, otf)
    }

    fn convolve_opt(
        &mut self,
        image: &mut HdrImage,
        otf: &HdrImage,
        tile: TileSize,
        ranges: &TileRanges,
        offset: i32,
    ) -> Result<(), BloomError> {
        self.convolve_opt_image(image, otf, tile, ranges, offset)
    }
}

impl FftPrimitive<CpuTexture> for CpuFft {
    fn forward(&mut self, texture: &mut CpuTexture) -> Result<(), BloomError> {
        log::trace!("fft forward '{}'", texture.label());
        self.forward_image(texture.image_mut())
    }

    fn convolve(&mut self, image: &mut CpuTexture, otf: &CpuTexture) -> Result<(), BloomError> {
        log::trace!("fft convolve '{}' (naive)", image.label());
        self.convolve_image(image.image_mut(), otf.image())
    }

    fn convolve_opt(
        &mut self,
        image: &mut CpuTexture,
        otf: &CpuTexture,
        tile: TileSize,
        ranges: &TileRanges,
        offset: i32,
    ) -> Result<(), BloomError> {
        log::trace!(
            "fft convolve '{}' (merged, rows {:?}, offset {offset})",
            image.label(),
            ranges.vertical
        );
        self.convolve_opt_image(image.image_mut(), otf.image(), tile, ranges, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_otf(fft: &mut CpuFft, tile: TileSize, at: (u32, u32)) -> HdrImage {
        let mut kernel = HdrImage::new(tile.width, tile.height);
        kernel.set(at.0, at.1, Vec4::ONE);
        fft.forward_image(&mut kernel).unwrap();
        kernel
    }

    fn pattern(width: u32, height: u32) -> HdrImage {
        HdrImage::from_fn(width, height, |x, y| {
            let fx = x as f32;
            let fy = y as f32;
            Vec4::new(
                (fx * 0.37 + fy * 0.11).sin().abs() * 3.0,
                ((fx + 2.0 * fy) * 0.05).cos().abs(),
                if (x + y) % 7 == 0 { 5.0 } else { 0.25 },
                1.0,
            )
        })
    }

    /// Direct circular convolution of one channel, for small tiles.
    fn direct_convolve(image: &HdrImage, kernel: &HdrImage) -> HdrImage {
        let (w, h) = image.dimensions();
        HdrImage::from_fn(w, h, |x, y| {
            let mut acc = Vec4::ZERO;
            for ky in 0..h {
                for kx in 0..w {
                    let sx = (x + w - kx) % w;
                    let sy = (y + h - ky) % h;
                    acc += image.get(sx, sy) * kernel.get(kx, ky);
                }
            }
            acc
        })
    }

    #[test]
    fn test_non_power_of_two_rejected() {
        let mut fft = CpuFft::new();
        let mut image = HdrImage::new(12, 8);
        assert!(matches!(
            fft.forward_image(&mut image),
            Err(BloomError::NonPowerOfTwo(12))
        ));
    }

    #[test]
    fn test_forward_of_delta_is_flat() {
        let mut fft = CpuFft::new();
        let spectrum = delta_otf(&mut fft, TileSize::new(8, 4), (0, 0));
        // R + iG with R = G = 1 everywhere in frequency
        for texel in spectrum.texels() {
            assert!((texel.x - 1.0).abs() < 1e-6 && (texel.y - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_forward_inverse_recovers_image() {
        let mut fft = CpuFft::new();
        let original = pattern(16, 8);
        let mut image = original.clone();
        fft.forward_image(&mut image).unwrap();
        fft.inverse_image(&mut image).unwrap();
        let diff = image.max_abs_diff(&original).unwrap();
        assert!(diff < 1e-4, "round trip drifted by {diff}");
    }

    #[test]
    fn test_delta_kernel_is_identity() {
        let mut fft = CpuFft::new();
        let tile = TileSize::new(16, 8);
        let otf = delta_otf(&mut fft, tile, (0, 0));
        let original = pattern(16, 8);
        let mut image = original.clone();
        fft.convolve_image(&mut image, &otf).unwrap();
        let diff = image.max_abs_diff(&original).unwrap();
        assert!(diff < 1e-4, "identity convolution drifted by {diff}");
    }

    #[test]
    fn test_shifted_delta_translates() {
        let mut fft = CpuFft::new();
        let tile = TileSize::new(8, 8);
        let otf = delta_otf(&mut fft, tile, (2, 1));
        let mut image = HdrImage::new(8, 8);
        image.set(3, 3, Vec4::new(1.0, 2.0, 3.0, 4.0));
        fft.convolve_image(&mut image, &otf).unwrap();
        let moved = image.get(5, 4);
        assert!(
            (moved - Vec4::new(1.0, 2.0, 3.0, 4.0)).abs().max_element() < 1e-5,
            "expected texel at (5, 4), got {moved:?}"
        );
    }

    #[test]
    fn test_per_channel_kernels_match_direct_convolution() {
        let mut fft = CpuFft::new();
        let (w, h) = (8, 8);
        let kernel = HdrImage::from_fn(w, h, |x, y| {
            let d = (x.min(w - x) + y.min(h - y)) as f32;
            Vec4::new(
                (-d * 0.9).exp(),
                (-d * 0.5).exp(),
                (-d * 1.7).exp(),
                if x == 0 && y == 0 { 1.0 } else { 0.0 },
            )
        });
        let image = pattern(w, h);
        let expected = direct_convolve(&image, &kernel);

        let mut otf = kernel.clone();
        fft.forward_image(&mut otf).unwrap();
        let mut actual = image.clone();
        fft.convolve_image(&mut actual, &otf).unwrap();

        let diff = actual.max_abs_diff(&expected).unwrap();
        assert!(diff < 1e-3, "FFT convolution differs from direct by {diff}");
    }

    #[test]
    fn test_merged_matches_naive_full_tile() {
        let mut fft = CpuFft::new();
        let tile = TileSize::new(32, 16);
        let mut kernel = HdrImage::new(tile.width, tile.height);
        kernel.set(0, 0, Vec4::splat(0.5));
        kernel.set(1, 0, Vec4::splat(0.25));
        kernel.set(0, 15, Vec4::splat(0.25));
        let mut otf = kernel;
        fft.forward_image(&mut otf).unwrap();

        let source = pattern(tile.width, tile.height);
        let mut naive = source.clone();
        fft.convolve_image(&mut naive, &otf).unwrap();
        let mut merged = source;
        fft.convolve_opt_image(&mut merged, &otf, tile, &TileRanges::full(tile), 0)
            .unwrap();

        let diff = merged.max_abs_diff(&naive).unwrap();
        assert!(diff < 1e-4, "strategies differ by {diff}");
    }

    #[test]
    fn test_cropped_band_matches_padded_full_tile() {
        let mut fft = CpuFft::new();
        let tile = TileSize::new(32, 16);
        let pad = 3;
        let mut kernel = HdrImage::new(tile.width, tile.height);
        kernel.set(0, 0, Vec4::splat(0.4));
        kernel.set(0, 1, Vec4::splat(0.3));
        kernel.set(0, 15, Vec4::splat(0.3));
        let mut otf = kernel;
        fft.forward_image(&mut otf).unwrap();

        let cropped = pattern(tile.width, tile.height - 2 * pad);
        let full = HdrImage::from_fn(tile.width, tile.height, |x, y| {
            if (pad..tile.height - pad).contains(&y) {
                cropped.get(x, y - pad)
            } else {
                Vec4::ZERO
            }
        });

        let mut reference = full;
        fft.convolve_image(&mut reference, &otf).unwrap();

        let mut merged = cropped.clone();
        let ranges = TileRanges {
            horizontal: 0..tile.width,
            vertical: pad..tile.height - pad,
        };
        fft.convolve_opt_image(&mut merged, &otf, tile, &ranges, -(pad as i32))
            .unwrap();

        let mut naive_cropped = cropped;
        fft.convolve_image(&mut naive_cropped, &otf).unwrap();

        for y in 0..merged.height() {
            for x in 0..merged.width() {
                let expected = reference.get(x, y + pad);
                let got = merged.get(x, y);
                assert!(
                    (got - expected).abs().max_element() < 1e-4,
                    "merged texel ({x}, {y}) = {got:?}, padded reference {expected:?}"
                );
            }
        }
        let diff = merged.max_abs_diff(&naive_cropped).unwrap();
        assert!(diff < 1e-4, "naive band convolution differs by {diff}");
    }

    #[test]
    fn test_range_outside_image_is_rejected() {
        let mut fft = CpuFft::new();
        let tile = TileSize::new(8, 8);
        let otf = delta_otf(&mut fft, tile, (0, 0));
        let mut image = HdrImage::new(8, 4);
        let ranges = TileRanges {
            horizontal: 0..8,
            vertical: 1..7,
        };
        assert!(matches!(
            fft.convolve_opt_image(&mut image, &otf, tile, &ranges, -1),
            Err(BloomError::RangeOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_convolve_rejects_tall_image() {
        let mut fft = CpuFft::new();
        let tile = TileSize::new(8, 4);
        let otf = delta_otf(&mut fft, tile, (0, 0));
        let mut image = HdrImage::new(8, 8);
        assert!(matches!(
            fft.convolve_image(&mut image, &otf),
            Err(BloomError::DimensionMismatch { .. })
        ));
    }
}
