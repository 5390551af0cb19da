//! CPU reference backend: a [`RenderDevice`] whose textures live in host
//! memory, and the matching [`BloomKernels`].
//!
//! Used by tests and by hosts without a GPU. An optional memory budget makes
//! allocation failure reproducible.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec4;

use crate::error::BloomError;
use crate::image::{HdrImage, TexelRect};
use crate::kernels::{
    self, BlendUniforms, BloomKernels, BrightPassUniforms, PsfGenerateUniforms, PsfRemapUniforms,
};
use crate::texture::{DeviceTexture, RenderDevice, TextureDesc, validate_desc};

/// A texture in host memory. Returns its bytes to the owning device's budget
/// when dropped.
#[derive(Debug)]
pub struct CpuTexture {
    desc: TextureDesc,
    image: HdrImage,
    live_bytes: Arc<AtomicU64>,
}

impl CpuTexture {
    pub fn label(&self) -> &str {
        &self.desc.label
    }

    pub fn image(&self) -> &HdrImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut HdrImage {
        &mut self.image
    }
}

impl DeviceTexture for CpuTexture {
    fn desc(&self) -> &TextureDesc {
        &self.desc
    }
}

impl Drop for CpuTexture {
    fn drop(&mut self) {
        self.live_bytes
            .fetch_sub(self.desc.byte_size(), Ordering::Relaxed);
    }
}

/// Host-memory device.
#[derive(Debug, Default)]
pub struct CpuDevice {
    budget: Option<u64>,
    live_bytes: Arc<AtomicU64>,
    allocations: u64,
    barriers: u64,
}

impl CpuDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device that refuses allocations once `bytes` are live.
    pub fn with_budget(bytes: u64) -> Self {
        Self {
            budget: Some(bytes),
            ..Self::default()
        }
    }

    /// Bytes held by textures that have not been dropped.
    pub fn live_bytes(&self) -> u64 {
        self.live_bytes.load(Ordering::Relaxed)
    }

    /// Total successful allocations over the device's lifetime.
    pub fn allocation_count(&self) -> u64 {
        self.allocations
    }

    pub fn barrier_count(&self) -> u64 {
        self.barriers
    }

    /// Allocate a texture holding a copy of `image`.
    pub fn upload(&mut self, label: &str, image: &HdrImage) -> Result<CpuTexture, BloomError> {
        let mut desc = TextureDesc::bloom(label, image.width(), image.height());
        desc.format = wgpu::TextureFormat::Rgba32Float;
        let mut texture = self.create_texture(&desc)?;
        texture.image = image.clone();
        Ok(texture)
    }
}

impl RenderDevice for CpuDevice {
    type Texture = CpuTexture;

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<CpuTexture, BloomError> {
        validate_desc(desc)?;
        let bytes = desc.byte_size();
        let live = self.live_bytes.load(Ordering::Relaxed);
        if let Some(budget) = self.budget {
            if live + bytes > budget {
                log::warn!(
                    "CPU device budget exhausted: '{}' needs {bytes} bytes, {live}/{budget} in use",
                    desc.label
                );
                return Err(BloomError::OutOfMemory {
                    label: desc.label.clone(),
                    width: desc.width,
                    height: desc.height,
                    bytes,
                });
            }
        }

        self.live_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.allocations += 1;
        log::trace!(
            "Allocated CPU texture '{}' ({}x{}, {bytes} bytes)",
            desc.label,
            desc.width,
            desc.height
        );
        Ok(CpuTexture {
            desc: desc.clone(),
            image: HdrImage::new(desc.width, desc.height),
            live_bytes: Arc::clone(&self.live_bytes),
        })
    }

    fn blit_image(&mut self, source: &HdrImage, target: &mut CpuTexture, dest: TexelRect) {
        let (width, height) = target.image.dimensions();
        target.image = source.resampled_into(width, height, dest);
    }

    fn clear_texture(&mut self, target: &mut CpuTexture) {
        target.image.fill(Vec4::ZERO);
    }

    fn barrier(&mut self, label: &str) {
        self.barriers += 1;
        log::trace!("barrier: {label}");
    }
}

/// Host implementations of the bloom kernels.
#[derive(Debug, Default)]
pub struct CpuKernels;

impl BloomKernels<CpuTexture> for CpuKernels {
    fn bright_pass(
        &mut self,
        scene: &CpuTexture,
        staging: &mut CpuTexture,
        uniforms: &BrightPassUniforms,
    ) -> Result<(), BloomError> {
        check_rect_fits(staging, uniforms.content_rect())?;
        kernels::bright_pass_image(&scene.image, &mut staging.image, uniforms);
        Ok(())
    }

    fn blend(
        &mut self,
        staging: &CpuTexture,
        scene: &mut CpuTexture,
        uniforms: &BlendUniforms,
    ) -> Result<(), BloomError> {
        check_rect_fits(staging, uniforms.content_rect())?;
        kernels::blend_image(&staging.image, &mut scene.image, uniforms);
        Ok(())
    }

    fn remap_psf(
        &mut self,
        psf: &CpuTexture,
        otf: &mut CpuTexture,
        uniforms: &PsfRemapUniforms,
    ) -> Result<(), BloomError> {
        check_rect_fits(psf, uniforms.content_rect())?;
        if psf.desc.dimensions() != otf.desc.dimensions() {
            return Err(BloomError::DimensionMismatch {
                label: otf.desc.label.clone(),
                actual_width: otf.desc.width,
                actual_height: otf.desc.height,
                expected_width: psf.desc.width,
                expected_height: psf.desc.height,
            });
        }
        kernels::remap_psf_image(&psf.image, &mut otf.image, uniforms);
        Ok(())
    }

    fn generate_psf(
        &mut self,
        otf: &mut CpuTexture,
        uniforms: &PsfGenerateUniforms,
    ) -> Result<(), BloomError> {
        let [w, h] = uniforms.tile;
        if otf.desc.dimensions() != (w, h) {
            return Err(BloomError::DimensionMismatch {
                label: otf.desc.label.clone(),
                actual_width: otf.desc.width,
                actual_height: otf.desc.height,
                expected_width: w,
                expected_height: h,
            });
        }
        kernels::generate_psf_image(&mut otf.image, uniforms);
        Ok(())
    }
}

fn check_rect_fits(texture: &CpuTexture, rect: TexelRect) -> Result<(), BloomError> {
    if rect.right() > texture.desc.width || rect.bottom() > texture.desc.height {
        return Err(BloomError::RangeOutOfBounds {
            detail: format!(
                "{rect:?} on '{}' ({}x{})",
                texture.desc.label, texture.desc.width, texture.desc.height
            ),
        });
    }
    Ok(())
}
