//! Resource sizing policy.
//!
//! Maps the quality tier and edge-extension fraction to FFT tile geometry and
//! decides whether the pass's cached textures can be kept for this frame.
//! The staging, PSF, and OTF textures are always reallocated together.

use glam::UVec2;
use lumen_config::Quality;

use crate::fft::TileRanges;
use crate::image::TexelRect;
use crate::params::BloomParameters;
use crate::texture::{BLOOM_TEXTURE_FORMAT, TextureDesc};

/// FFT tile dimensions. Both are powers of two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileSize {
    pub width: u32,
    pub height: u32,
}

impl TileSize {
    pub const MEDIUM: TileSize = TileSize::new(512, 256);
    pub const HIGH: TileSize = TileSize::new(1024, 512);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn for_quality(quality: Quality) -> Self {
        match quality {
            Quality::Medium => Self::MEDIUM,
            Quality::High => Self::HIGH,
        }
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Which convolution path the pass takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvolutionStrategy {
    /// Forward transform, spectral multiply, inverse transform as separate
    /// full-tile passes.
    Naive,
    /// The three phases fused, restricted to the valid rows.
    MergedDispatch,
}

/// How the staging image relates to the FFT tile vertically.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StagingLayout {
    /// Staging spans the whole tile; no vertical padding is applied.
    FullTile,
    /// Staging omits the vertical padding rows; the convolution treats them
    /// as zero.
    Cropped,
}

/// Concrete geometry derived from the parameters for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileLayout {
    pub tile: TileSize,
    /// `floor(tile * fft_extend)` per axis, before the staging layout is applied.
    pub padding: UVec2,
    pub staging_height: u32,
    pub staging: StagingLayout,
}

impl TileLayout {
    pub fn from_params(params: &BloomParameters) -> Self {
        let tile = TileSize::for_quality(params.quality);
        let padding = UVec2::new(
            (tile.width as f32 * params.fft_extend.x).floor() as u32,
            (tile.height as f32 * params.fft_extend.y).floor() as u32,
        );
        let staging = params.staging_layout();
        let staging_height = match staging {
            StagingLayout::FullTile => tile.height,
            StagingLayout::Cropped => tile.height.saturating_sub(2 * padding.y),
        };
        Self {
            tile,
            padding,
            staging_height,
            staging,
        }
    }

    /// Vertical padding actually applied around the content. Zero when the
    /// staging image spans the full tile.
    pub fn vertical_padding(&self) -> u32 {
        match self.staging {
            StagingLayout::FullTile => 0,
            StagingLayout::Cropped => self.padding.y,
        }
    }

    /// Region of the staging image that carries scene content. The columns
    /// outside it are horizontal padding.
    pub fn content_rect(&self) -> TexelRect {
        TexelRect::new(
            self.padding.x,
            0,
            self.tile.width.saturating_sub(2 * self.padding.x),
            self.staging_height,
        )
    }

    /// Rows and columns of the tile the merged convolution must process.
    pub fn tile_ranges(&self) -> TileRanges {
        let pad = self.vertical_padding();
        TileRanges {
            horizontal: 0..self.tile.width,
            vertical: pad..pad + self.staging_height,
        }
    }

    /// Offset from tile rows to staging rows.
    pub fn vertical_offset(&self) -> i32 {
        -(self.vertical_padding() as i32)
    }

    pub fn staging_desc(&self) -> TextureDesc {
        TextureDesc::bloom("bloom-staging", self.tile.width, self.staging_height)
    }

    pub fn psf_desc(&self) -> TextureDesc {
        TextureDesc::bloom("bloom-psf", self.tile.width, self.tile.height)
    }

    pub fn otf_desc(&self) -> TextureDesc {
        TextureDesc::bloom("bloom-otf", self.tile.width, self.tile.height)
    }
}

/// Descriptors of the textures currently held by the pass.
#[derive(Clone, Copy, Debug)]
pub struct CurrentAllocation<'a> {
    pub staging: &'a TextureDesc,
    pub otf: &'a TextureDesc,
}

/// Outcome of the sizing policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizingDecision {
    Keep(TileLayout),
    Reallocate(TileLayout),
}

impl SizingDecision {
    pub fn layout(&self) -> &TileLayout {
        match self {
            SizingDecision::Keep(layout) | SizingDecision::Reallocate(layout) => layout,
        }
    }

    pub fn needs_reallocation(&self) -> bool {
        matches!(self, SizingDecision::Reallocate(_))
    }
}

/// Decide whether the cached textures fit `params`.
pub fn decide(params: &BloomParameters, current: Option<CurrentAllocation<'_>>) -> SizingDecision {
    let layout = TileLayout::from_params(params);
    let Some(current) = current else {
        return SizingDecision::Reallocate(layout);
    };

    let tile_changed = current.otf.dimensions() != (layout.tile.width, layout.tile.height)
        || current.staging.width != layout.tile.width;
    let height_changed = current.staging.height != layout.staging_height;
    let format_changed = current.staging.format != BLOOM_TEXTURE_FORMAT
        || current.otf.format != BLOOM_TEXTURE_FORMAT;

    if tile_changed || height_changed || format_changed {
        SizingDecision::Reallocate(layout)
    } else {
        SizingDecision::Keep(layout)
    }
}
