//! FFT-convolution bloom for HDR rendering.
//!
//! Extracts bright pixels into a staging tile, convolves them with a cached
//! optical transfer function in frequency space, and adds the result back
//! onto the scene. Runs after lighting and before tonemapping.

use crate::error::BloomError;
use crate::fft::FftPrimitive;
use crate::kernels::{BlendUniforms, BloomKernels, BrightPassUniforms};
use crate::otf::{OtfCache, OtfState};
use crate::params::BloomParameters;
use crate::sizing::{self, ConvolutionStrategy, CurrentAllocation, SizingDecision, TileLayout};
use crate::texture::{DeviceTexture, RenderDevice};

/// The scene colour image of the current frame.
pub struct FrameTarget<'a, T> {
    /// `None` when the host has no valid colour resource this frame.
    pub color: Option<&'a mut T>,
    pub width: u32,
    pub height: u32,
}

impl<'a, T: DeviceTexture> FrameTarget<'a, T> {
    /// A target whose dimensions are those of `color`.
    pub fn new(color: &'a mut T) -> Self {
        let (width, height) = (color.width(), color.height());
        Self {
            color: Some(color),
            width,
            height,
        }
    }

    pub fn missing(width: u32, height: u32) -> Self {
        Self {
            color: None,
            width,
            height,
        }
    }
}

/// Why a frame was skipped without touching any texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    MissingTarget,
    EmptyTarget,
    /// The colour texture doesn't have the reported frame dimensions.
    TargetSizeMismatch,
}

/// What `execute` did this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Skipped(SkipReason),
    Applied {
        reallocated: bool,
        otf_rebuilt: bool,
        strategy: ConvolutionStrategy,
    },
}

impl FrameOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, FrameOutcome::Applied { .. })
    }
}

/// Textures that are always reallocated together.
struct BloomTargets<T> {
    layout: TileLayout,
    staging: T,
    otf: OtfCache<T>,
}

impl<T: DeviceTexture> BloomTargets<T> {
    fn allocate<D>(device: &mut D, layout: TileLayout) -> Result<Self, BloomError>
    where
        D: RenderDevice<Texture = T>,
    {
        let staging = device.create_texture(&layout.staging_desc())?;
        let otf = OtfCache::allocate(device, &layout)?;
        Ok(Self {
            layout,
            staging,
            otf,
        })
    }
}

/// FFT bloom pass.
///
/// Owns its kernels, its FFT backend, and every texture it needs. Textures
/// are created on the first frame that runs and replaced whenever the sizing
/// policy asks for it. Dropping the pass (or calling
/// [`dispose`](Self::dispose)) releases them.
pub struct BloomPass<T, K, F> {
    kernels: K,
    fft: F,
    targets: Option<BloomTargets<T>>,
    reallocations: u64,
}

impl<T, K, F> BloomPass<T, K, F>
where
    T: DeviceTexture,
    K: BloomKernels<T>,
    F: FftPrimitive<T>,
{
    pub fn new(kernels: K, fft: F) -> Self {
        Self {
            kernels,
            fft,
            targets: None,
            reallocations: 0,
        }
    }

    /// Run bloom on one frame.
    ///
    /// Parameter errors and allocation failures are returned; an unusable
    /// target skips the frame. Nothing is enqueued on a skipped frame.
    pub fn execute<D>(
        &mut self,
        device: &mut D,
        params: &BloomParameters,
        target: FrameTarget<'_, T>,
    ) -> Result<FrameOutcome, BloomError>
    where
        D: RenderDevice<Texture = T>,
    {
        if !params.is_active() {
            return Ok(FrameOutcome::Skipped(SkipReason::Disabled));
        }
        params.validate()?;

        let Some(scene) = target.color else {
            log::trace!("bloom skipped: no scene colour target");
            return Ok(FrameOutcome::Skipped(SkipReason::MissingTarget));
        };
        if target.width == 0 || target.height == 0 {
            return Ok(FrameOutcome::Skipped(SkipReason::EmptyTarget));
        }
        if (scene.width(), scene.height()) != (target.width, target.height) {
            log::debug!(
                "bloom skipped: scene is {}x{}, frame is {}x{}",
                scene.width(),
                scene.height(),
                target.width,
                target.height
            );
            return Ok(FrameOutcome::Skipped(SkipReason::TargetSizeMismatch));
        }

        // 1. sizing
        let reallocated = self.ensure_targets(device, params)?;
        let Some(targets) = self.targets.as_mut() else {
            return Ok(FrameOutcome::Skipped(SkipReason::MissingTarget));
        };
        let layout = targets.layout;

        // 2. OTF
        let otf_rebuilt =
            targets
                .otf
                .refresh(device, &mut self.kernels, &mut self.fft, params, &layout)?;
        if targets.otf.state() == OtfState::Stale {
            if reallocated {
                log::warn!("OTF was reallocated but update_otf is not set; bloom stays dark");
            } else {
                log::trace!("convolving with a stale OTF");
            }
        }

        // 3. bright pass
        let bright = BrightPassUniforms::new(params, &layout);
        self.kernels
            .bright_pass(scene, &mut targets.staging, &bright)?;
        device.barrier("bloom bright pass");

        // 4. convolution
        let strategy = params.convolution_strategy();
        match strategy {
            ConvolutionStrategy::Naive => {
                self.fft.convolve(&mut targets.staging, targets.otf.otf())?;
            }
            ConvolutionStrategy::MergedDispatch => {
                self.fft.convolve_opt(
                    &mut targets.staging,
                    targets.otf.otf(),
                    layout.tile,
                    &layout.tile_ranges(),
                    layout.vertical_offset(),
                )?;
            }
        }
        device.barrier("bloom convolution");

        // 5. blend
        let blend = BlendUniforms::new(params, &layout);
        self.kernels.blend(&targets.staging, scene, &blend)?;

        Ok(FrameOutcome::Applied {
            reallocated,
            otf_rebuilt,
            strategy,
        })
    }

    /// Run the sizing policy and reallocate if needed. Returns whether a
    /// reallocation happened.
    fn ensure_targets<D>(&mut self, device: &mut D, params: &BloomParameters) -> Result<bool, BloomError>
    where
        D: RenderDevice<Texture = T>,
    {
        let current = self.targets.as_ref().map(|t| CurrentAllocation {
            staging: t.staging.desc(),
            otf: t.otf.otf().desc(),
        });
        let layout = match sizing::decide(params, current) {
            SizingDecision::Keep(layout) => {
                if let Some(targets) = self.targets.as_mut() {
                    targets.layout = layout;
                }
                return Ok(false);
            }
            SizingDecision::Reallocate(layout) => layout,
        };

        // Release the old set before asking for the new one.
        self.targets = None;
        let targets = BloomTargets::allocate(device, layout)?;
        self.reallocations += 1;
        log::info!(
            "Bloom textures allocated: tile {}x{}, staging height {} ({:?})",
            layout.tile.width,
            layout.tile.height,
            layout.staging_height,
            layout.staging
        );
        self.targets = Some(targets);
        Ok(true)
    }

    /// State of the cached OTF, or `None` before the first allocation.
    pub fn otf_state(&self) -> Option<OtfState> {
        self.targets.as_ref().map(|t| t.otf.state())
    }

    pub fn layout(&self) -> Option<&TileLayout> {
        self.targets.as_ref().map(|t| &t.layout)
    }

    /// Number of times the texture set has been (re)allocated.
    pub fn reallocation_count(&self) -> u64 {
        self.reallocations
    }

    pub fn otf_texture(&self) -> Option<&T> {
        self.targets.as_ref().map(|t| t.otf.otf())
    }

    pub fn staging_texture(&self) -> Option<&T> {
        self.targets.as_ref().map(|t| &t.staging)
    }

    /// Release every texture. The next active frame allocates again.
    pub fn dispose(&mut self) {
        if self.targets.take().is_some() {
            log::debug!("Bloom textures released");
        }
    }
}
