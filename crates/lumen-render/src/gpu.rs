//! wgpu implementation of [`RenderDevice`].
//!
//! Clears are recorded into a pending command encoder that is submitted on
//! [`RenderDevice::barrier`]. Uploads go through `Queue::write_texture`, which
//! wgpu schedules ahead of the next submission, so the pending encoder is
//! flushed before every upload to keep enqueue order.

use glam::Vec4;

use crate::error::BloomError;
use crate::image::{HdrImage, TexelRect};
use crate::texture::{DeviceTexture, RenderDevice, TextureDesc, validate_desc};

/// Bytes per texel of [`crate::texture::BLOOM_TEXTURE_FORMAT`].
const TEXEL_BYTES: u32 = 8;

/// A texture allocated on a wgpu device.
pub struct WgpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    desc: TextureDesc,
}

impl DeviceTexture for WgpuTexture {
    fn desc(&self) -> &TextureDesc {
        &self.desc
    }
}

/// Allocate `desc` on a wgpu device.
///
/// Requests larger than the device's 2D limit are reported as
/// [`BloomError::TextureTooLarge`] instead of tripping wgpu validation.
pub fn create_wgpu_texture(
    device: &wgpu::Device,
    desc: &TextureDesc,
) -> Result<WgpuTexture, BloomError> {
    validate_desc(desc)?;
    let max = device.limits().max_texture_dimension_2d;
    if desc.width > max || desc.height > max {
        return Err(BloomError::TextureTooLarge {
            label: desc.label.clone(),
            width: desc.width,
            height: desc.height,
            max,
        });
    }

    let texture = device.create_texture(&desc.to_wgpu());
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    log::debug!(
        "Allocated GPU texture '{}' ({}x{}, {:?})",
        desc.label,
        desc.width,
        desc.height,
        desc.format
    );
    Ok(WgpuTexture {
        texture,
        view,
        desc: desc.clone(),
    })
}

/// Bloom resource device backed by a wgpu device and queue.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    encoder: Option<wgpu::CommandEncoder>,
    submissions: u64,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            encoder: None,
            submissions: 0,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Command buffers submitted so far.
    pub fn submission_count(&self) -> u64 {
        self.submissions
    }

    /// Submit pending commands, if any.
    pub fn flush(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit([encoder.finish()]);
            self.submissions += 1;
        }
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("bloom-resources"),
                })
        })
    }

    /// Copy `texture` back to the host and wait for it. Flushes pending work.
    pub fn read_texture(&mut self, texture: &WgpuTexture) -> Result<HdrImage, BloomError> {
        let (width, height) = (texture.width(), texture.height());
        let unpadded = width * TEXEL_BYTES;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("bloom-readback"),
            size: u64::from(padded * height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        self.encoder().copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            extent(width, height),
        );
        self.flush();

        let readback_error = |reason: String| BloomError::Readback {
            label: texture.desc.label.clone(),
            reason,
        };
        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| readback_error(e.to_string()))?;
        rx.recv()
            .map_err(|e| readback_error(e.to_string()))?
            .map_err(|e| readback_error(e.to_string()))?;

        let mut texels = Vec::with_capacity(width as usize * height as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in 0..height {
                let start = (row * padded) as usize;
                let end = start + unpadded as usize;
                texels.extend(
                    mapped[start..end]
                        .chunks_exact(TEXEL_BYTES as usize)
                        .map(decode_texel),
                );
            }
        }
        buffer.unmap();

        HdrImage::from_texels(width, height, texels)
            .ok_or_else(|| readback_error("short read".to_string()))
    }
}

impl RenderDevice for WgpuDevice {
    type Texture = WgpuTexture;

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<WgpuTexture, BloomError> {
        create_wgpu_texture(&self.device, desc)
    }

    fn blit_image(&mut self, source: &HdrImage, target: &mut WgpuTexture, dest: TexelRect) {
        let (width, height) = (target.width(), target.height());
        let scaled = source.resampled_into(width, height, dest);
        let data: Vec<u16> = scaled
            .texels()
            .iter()
            .flat_map(|t| t.to_array())
            .map(|c| half::f16::from_f32(c).to_bits())
            .collect();

        self.flush();
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&data),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * TEXEL_BYTES),
                rows_per_image: None,
            },
            extent(width, height),
        );
    }

    fn clear_texture(&mut self, target: &mut WgpuTexture) {
        self.encoder()
            .clear_texture(&target.texture, &wgpu::ImageSubresourceRange::default());
    }

    fn barrier(&mut self, label: &str) {
        log::trace!("barrier: {label}");
        self.flush();
    }
}

impl Drop for WgpuDevice {
    fn drop(&mut self) {
        if self.encoder.is_some() {
            log::warn!("WgpuDevice dropped with pending commands - submitting");
            self.flush();
        }
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

fn decode_texel(bytes: &[u8]) -> Vec4 {
    let channel = |i: usize| half::f16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]).to_f32();
    Vec4::new(channel(0), channel(1), channel(2), channel(3))
}

#[cfg(test)]
pub(crate) fn create_test_device_queue() -> Option<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok()?;

        adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .ok()
    })
}
