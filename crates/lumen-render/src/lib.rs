//! FFT-convolution bloom: parameter set, resource sizing, OTF cache, the
//! per-frame pass, and the device/FFT seams it runs on.

pub mod bloom;
pub mod cpu;
pub mod error;
pub mod fft;
pub mod gpu;
pub mod image;
pub mod kernels;
pub mod otf;
pub mod params;
pub mod sizing;
pub mod texture;

pub use bloom::{BloomPass, FrameOutcome, FrameTarget, SkipReason};
pub use cpu::{CpuDevice, CpuKernels, CpuTexture};
pub use error::{BloomError, ParamError};
pub use fft::{CpuFft, FftPrimitive, TileRanges};
pub use image::{HdrImage, TexelRect};
pub use kernels::{
    BlendUniforms, BloomKernels, BrightPassUniforms, PsfGenerateUniforms, PsfRemapUniforms,
};
pub use lumen_config::Quality;
pub use otf::{OtfCache, OtfState};
pub use params::BloomParameters;
pub use sizing::{
    ConvolutionStrategy, CurrentAllocation, SizingDecision, StagingLayout, TileLayout, TileSize,
};
pub use gpu::{WgpuDevice, WgpuTexture, create_wgpu_texture};
pub use texture::{BLOOM_TEXTURE_FORMAT, DeviceTexture, RenderDevice, TextureDesc};

/// A bloom pass running entirely on the CPU reference backend.
pub type CpuBloomPass = BloomPass<CpuTexture, CpuKernels, CpuFft>;
