//! Linear HDR images held in host memory.
//!
//! [`HdrImage`] is the texel store behind the CPU reference device and the
//! form in which hosts hand scene or PSF images to the pipeline.

use glam::Vec4;

/// An axis-aligned texel rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TexelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TexelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle covering a whole `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// A linear RGBA float image, row-major, origin top-left.
#[derive(Clone, Debug, PartialEq)]
pub struct HdrImage {
    width: u32,
    height: u32,
    texels: Vec<Vec4>,
}

impl HdrImage {
    /// A zero-filled image.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Vec4::ZERO)
    }

    pub fn filled(width: u32, height: u32, value: Vec4) -> Self {
        Self {
            width,
            height,
            texels: vec![value; width as usize * height as usize],
        }
    }

    /// Build an image by evaluating `f(x, y)` for every texel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Vec4) -> Self {
        let mut texels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                texels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            texels,
        }
    }

    /// Wrap existing texels. Returns `None` when the length doesn't match.
    pub fn from_texels(width: u32, height: u32, texels: Vec<Vec4>) -> Option<Self> {
        (texels.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            texels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    pub fn texels_mut(&mut self) -> &mut [Vec4] {
        &mut self.texels
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Texel at `(x, y)`. Panics when out of bounds, like slice indexing.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.texels[self.index(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: Vec4) {
        let i = self.index(x, y);
        self.texels[i] = value;
    }

    pub fn row(&self, y: u32) -> &[Vec4] {
        let start = self.index(0, y);
        &self.texels[start..start + self.width as usize]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [Vec4] {
        let start = self.index(0, y);
        let width = self.width as usize;
        &mut self.texels[start..start + width]
    }

    pub fn fill(&mut self, value: Vec4) {
        self.texels.fill(value);
    }

    /// A `width`x`height` image holding `self` scaled bilinearly into `dest`.
    /// Texels outside `dest` are zero.
    pub fn resampled_into(&self, width: u32, height: u32, dest: TexelRect) -> HdrImage {
        let mut out = HdrImage::new(width, height);
        if dest.is_empty() || self.width == 0 || self.height == 0 {
            return out;
        }
        let right = dest.right().min(width);
        let bottom = dest.bottom().min(height);
        for y in dest.y..bottom {
            let v = ((y - dest.y) as f32 + 0.5) / dest.height as f32;
            for x in dest.x..right {
                let u = ((x - dest.x) as f32 + 0.5) / dest.width as f32;
                out.set(x, y, self.sample(u, v));
            }
        }
        out
    }

    /// Bilinear sample at normalized coordinates, clamped to the edges.
    pub fn sample(&self, u: f32, v: f32) -> Vec4 {
        self.sample_in(
            u * self.width as f32 - 0.5,
            v * self.height as f32 - 0.5,
            TexelRect::full(self.width, self.height),
        )
    }

    /// Bilinear sample at texel-space position `(x, y)` (texel centres at
    /// integer coordinates), clamped to `rect`.
    pub fn sample_in(&self, x: f32, y: f32, rect: TexelRect) -> Vec4 {
        if rect.is_empty() {
            return Vec4::ZERO;
        }
        let min_x = rect.x as f32;
        let min_y = rect.y as f32;
        let max_x = (rect.right() - 1) as f32;
        let max_y = (rect.bottom() - 1) as f32;
        let x = x.clamp(min_x, max_x);
        let y = y.clamp(min_y, max_y);

        let x0 = x.floor();
        let y0 = y.floor();
        let tx = x - x0;
        let ty = y - y0;
        let x0 = x0 as u32;
        let y0 = y0 as u32;
        let x1 = (x0 + 1).min(rect.right() - 1);
        let y1 = (y0 + 1).min(rect.bottom() - 1);

        let top = self.get(x0, y0).lerp(self.get(x1, y0), tx);
        let bottom = self.get(x0, y1).lerp(self.get(x1, y1), tx);
        top.lerp(bottom, ty)
    }

    /// Largest absolute per-channel difference. `None` if the sizes differ.
    pub fn max_abs_diff(&self, other: &HdrImage) -> Option<f32> {
        if self.dimensions() != other.dimensions() {
            return None;
        }
        Some(
            self.texels
                .iter()
                .zip(&other.texels)
                .map(|(a, b)| (*a - *b).abs().max_element())
                .fold(0.0, f32::max),
        )
    }

    /// Sum of all texels.
    pub fn sum(&self) -> Vec4 {
        self.texels.iter().copied().sum()
    }
}
