//! OTF cache: the PSF and frequency-domain kernel textures, rebuilt only
//! when the parameter set asks for it.

use crate::error::BloomError;
use crate::fft::FftPrimitive;
use crate::kernels::{BloomKernels, PsfGenerateUniforms, PsfRemapUniforms, psf_content_rect};
use crate::params::BloomParameters;
use crate::sizing::TileLayout;
use crate::texture::RenderDevice;

/// Whether the cached OTF matches the current PSF inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtfState {
    /// Allocated but not built since. Convolving with it yields no bloom.
    Stale,
    /// Built from the PSF inputs of the last frame that set `update_otf`.
    Fresh,
}

/// Owns the PSF scratch texture and the OTF texture.
pub struct OtfCache<T> {
    psf: T,
    otf: T,
    state: OtfState,
}

impl<T> OtfCache<T> {
    /// Allocate both textures for `layout`. The cache starts [`OtfState::Stale`].
    pub fn allocate<D>(device: &mut D, layout: &TileLayout) -> Result<Self, BloomError>
    where
        D: RenderDevice<Texture = T>,
    {
        let psf = device.create_texture(&layout.psf_desc())?;
        let otf = device.create_texture(&layout.otf_desc())?;
        Ok(Self {
            psf,
            otf,
            state: OtfState::Stale,
        })
    }

    pub fn state(&self) -> OtfState {
        self.state
    }

    pub fn otf(&self) -> &T {
        &self.otf
    }

    /// Rebuild the OTF if `params` requests it. Returns whether it did.
    ///
    /// The request flag is read, never cleared.
    pub fn refresh<D, K, F>(
        &mut self,
        device: &mut D,
        kernels: &mut K,
        fft: &mut F,
        params: &BloomParameters,
        layout: &TileLayout,
    ) -> Result<bool, BloomError>
    where
        D: RenderDevice<Texture = T>,
        K: BloomKernels<T>,
        F: FftPrimitive<T>,
    {
        if !params.is_param_updated() {
            return Ok(false);
        }
        self.recompute(device, kernels, fft, params, layout)?;
        Ok(true)
    }

    fn recompute<D, K, F>(
        &mut self,
        device: &mut D,
        kernels: &mut K,
        fft: &mut F,
        params: &BloomParameters,
        layout: &TileLayout,
    ) -> Result<(), BloomError>
    where
        D: RenderDevice<Texture = T>,
        K: BloomKernels<T>,
        F: FftPrimitive<T>,
    {
        if params.generate_psf {
            log::debug!(
                "Generating PSF for {}x{} tile, fft_extend {:?}",
                layout.tile.width,
                layout.tile.height,
                params.fft_extend
            );
            kernels.generate_psf(&mut self.otf, &PsfGenerateUniforms::new(params, layout))?;
        } else if let Some(image) = params.psf_image.as_deref() {
            log::debug!(
                "Remapping {}x{} PSF image (clamp {}..{}, pow {}, scale {})",
                image.width(),
                image.height(),
                params.psf_min_clamp,
                params.psf_max_clamp,
                params.psf_pow,
                params.psf_scale
            );
            device.blit_image(image, &mut self.psf, psf_content_rect(layout));
            device.barrier("psf upload");
            kernels.remap_psf(&self.psf, &mut self.otf, &PsfRemapUniforms::new(params, layout))?;
        } else {
            log::warn!("generate_psf is off and no PSF image is set; bloom kernel is empty");
            device.clear_texture(&mut self.otf);
        }

        device.barrier("psf ready");
        fft.forward(&mut self.otf)?;
        self.state = OtfState::Fresh;
        Ok(())
    }
}
