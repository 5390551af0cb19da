//! GPU resource layer: texture descriptors and the device seam the bloom pass
//! allocates through.
//!
//! Descriptors speak wgpu's vocabulary ([`wgpu::TextureFormat`],
//! [`wgpu::TextureUsages`]) so the same [`TextureDesc`] can be handed to the
//! wgpu device in [`crate::gpu`] or to the CPU reference device.
//! Textures release their memory on `Drop`.

use crate::error::BloomError;
use crate::image::{HdrImage, TexelRect};

/// Format of every texture the bloom pass owns: half-float RGBA for HDR range
/// with storage (random-write) support.
pub const BLOOM_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Describes a 2D texture allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    /// Debug label.
    pub label: String,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Pixel format.
    pub format: wgpu::TextureFormat,
    /// Allowed usages.
    pub usage: wgpu::TextureUsages,
}

impl TextureDesc {
    /// A bloom working texture: [`BLOOM_TEXTURE_FORMAT`], sampled, random-write,
    /// and copy-destination capable.
    pub fn bloom(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            format: BLOOM_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
        }
    }

    /// Whether compute kernels may write arbitrary texels.
    pub fn is_random_write(&self) -> bool {
        self.usage.contains(wgpu::TextureUsages::STORAGE_BINDING)
    }

    /// Bytes occupied by a single mip level.
    pub fn byte_size(&self) -> u64 {
        let texel = self.format.block_copy_size(None).unwrap_or(16) as u64;
        self.width as u64 * self.height as u64 * texel
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The equivalent wgpu descriptor.
    pub fn to_wgpu(&self) -> wgpu::TextureDescriptor<'_> {
        wgpu::TextureDescriptor {
            label: Some(self.label.as_str()),
            size: wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: self.usage,
            view_formats: &[],
        }
    }

    fn validate(&self) -> Result<(), BloomError> {
        if self.width == 0 || self.height == 0 {
            return Err(BloomError::DimensionMismatch {
                label: self.label.clone(),
                actual_width: self.width,
                actual_height: self.height,
                expected_width: self.width.max(1),
                expected_height: self.height.max(1),
            });
        }
        Ok(())
    }
}

/// A texture owned by some [`RenderDevice`].
pub trait DeviceTexture {
    fn desc(&self) -> &TextureDesc;

    fn width(&self) -> u32 {
        self.desc().width
    }

    fn height(&self) -> u32 {
        self.desc().height
    }
}

/// The allocation and transfer primitives the bloom pass needs from a GPU.
///
/// All operations enqueue work; ordering between calls is preserved.
pub trait RenderDevice {
    type Texture: DeviceTexture;

    /// Allocate a zero-initialised texture.
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Self::Texture, BloomError>;

    /// Upload `source`, scaled with bilinear filtering into `dest` of
    /// `target`. Texels outside `dest` are cleared.
    fn blit_image(&mut self, source: &HdrImage, target: &mut Self::Texture, dest: TexelRect);

    /// Clear a texture to zero.
    fn clear_texture(&mut self, target: &mut Self::Texture);

    /// Order all prior writes before subsequent reads.
    fn barrier(&mut self, _label: &str) {}
}

pub(crate) fn validate_desc(desc: &TextureDesc) -> Result<(), BloomError> {
    desc.validate()
}
