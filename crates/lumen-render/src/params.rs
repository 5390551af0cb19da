//! The bloom parameter set: live, validated configuration read by the pass.
//!
//! The host owns a [`BloomParameters`] and mutates it between frames. The pass
//! only reads it; in particular it never clears [`BloomParameters::update_otf`].

use std::sync::Arc;

use glam::Vec2;
use lumen_config::{BloomSettings, Quality};

use crate::error::ParamError;
use crate::image::HdrImage;
use crate::sizing::{ConvolutionStrategy, StagingLayout};

/// Per-effect bloom configuration.
#[derive(Clone, Debug)]
pub struct BloomParameters {
    /// Master switch.
    pub enabled: bool,
    /// Selects the FFT tile dimensions.
    pub quality: Quality,
    /// Luminance threshold of the bright pass.
    pub threshold: f32,
    /// Soft knee as a fraction of `threshold`. Range \[0, 1\].
    pub knee: f32,
    /// Per-channel ceiling applied before thresholding.
    pub clamp_max: f32,
    /// Blend strength.
    pub intensity: f32,
    /// Fraction of the tile reserved as padding per axis. Each component in `[0, 0.5)`.
    pub fft_extend: Vec2,
    /// Select the naive three-phase convolution.
    pub disable_dispatch_merge_optimization: bool,
    /// Keep the staging image at full tile height.
    pub disable_read_write_optimization: bool,
    /// The PSF or its processing parameters changed since the OTF was last built.
    pub update_otf: bool,
    /// Procedural PSF instead of `psf_image`.
    pub generate_psf: bool,
    /// User-supplied PSF, linear RGBA.
    pub psf_image: Option<Arc<HdrImage>>,
    /// Energy multiplier for the remapped PSF.
    pub psf_scale: f32,
    /// Remap input mapped to zero.
    pub psf_min_clamp: f32,
    /// Remap input mapped to one.
    pub psf_max_clamp: f32,
    /// Remap curve exponent.
    pub psf_pow: f32,
}

impl Default for BloomParameters {
    fn default() -> Self {
        let mut params = Self::from_settings_unchecked(&BloomSettings::default());
        // Nothing has been built yet.
        params.update_otf = true;
        params
    }
}

impl BloomParameters {
    /// Build validated parameters from persisted settings.
    ///
    /// The PSF image is loaded by the host and attached separately. The
    /// result has `update_otf` set so the first frame builds the OTF.
    pub fn from_settings(
        settings: &BloomSettings,
        psf_image: Option<Arc<HdrImage>>,
    ) -> Result<Self, ParamError> {
        let mut params = Self::from_settings_unchecked(settings);
        params.psf_image = psf_image;
        params.update_otf = true;
        params.validate()?;
        Ok(params)
    }

    fn from_settings_unchecked(settings: &BloomSettings) -> Self {
        Self {
            enabled: settings.enabled,
            quality: settings.quality,
            threshold: settings.threshold,
            knee: settings.knee,
            clamp_max: settings.clamp_max,
            intensity: settings.intensity,
            fft_extend: Vec2::from_array(settings.fft_extend),
            disable_dispatch_merge_optimization: settings.disable_dispatch_merge_optimization,
            disable_read_write_optimization: settings.disable_read_write_optimization,
            update_otf: false,
            generate_psf: settings.generate_psf,
            psf_image: None,
            psf_scale: settings.psf_scale,
            psf_min_clamp: settings.psf_min_clamp,
            psf_max_clamp: settings.psf_max_clamp,
            psf_pow: settings.psf_pow,
        }
    }

    /// Whether the effect should run this frame.
    pub fn is_active(&self) -> bool {
        self.enabled
    }

    /// Whether the OTF must be rebuilt this frame.
    pub fn is_param_updated(&self) -> bool {
        self.update_otf
    }

    /// Acknowledge an OTF rebuild. Host configuration logic calls this after
    /// a frame has consumed the flag.
    pub fn clear_otf_update(&mut self) {
        self.update_otf = false;
    }

    /// Set the padding fraction, rejecting values that would leave no content.
    pub fn set_fft_extend(&mut self, fft_extend: Vec2) -> Result<(), ParamError> {
        validate_fft_extend(fft_extend)?;
        if fft_extend != self.fft_extend {
            self.fft_extend = fft_extend;
            self.update_otf = true;
        }
        Ok(())
    }

    /// Replace the user PSF image. Always marks the OTF for rebuild.
    pub fn set_psf_image(&mut self, image: Option<Arc<HdrImage>>) {
        self.psf_image = image;
        self.update_otf = true;
    }

    /// Merge freshly loaded settings into the live parameters.
    ///
    /// Validates first and leaves `self` untouched on error. Sets
    /// `update_otf` when a field that feeds the OTF changed and returns
    /// whether it did. The PSF image itself is not part of the settings; use
    /// [`set_psf_image`](Self::set_psf_image) for it.
    pub fn apply_settings(&mut self, settings: &BloomSettings) -> Result<bool, ParamError> {
        let mut next = Self::from_settings_unchecked(settings);
        next.psf_image = self.psf_image.take();
        next.update_otf = self.update_otf;
        if let Err(err) = next.validate() {
            self.psf_image = next.psf_image;
            return Err(err);
        }

        let psf_changed = next.psf_inputs_differ(self);
        if psf_changed {
            next.update_otf = true;
        }
        *self = next;
        Ok(psf_changed)
    }

    /// Whether the OTF built for `other` would differ from the one built for `self`.
    fn psf_inputs_differ(&self, other: &Self) -> bool {
        self.quality != other.quality
            || self.fft_extend != other.fft_extend
            || self.generate_psf != other.generate_psf
            || self.psf_scale != other.psf_scale
            || self.psf_min_clamp != other.psf_min_clamp
            || self.psf_max_clamp != other.psf_max_clamp
            || self.psf_pow != other.psf_pow
    }

    /// Which convolution path the pass takes.
    pub fn convolution_strategy(&self) -> ConvolutionStrategy {
        if self.disable_dispatch_merge_optimization {
            ConvolutionStrategy::Naive
        } else {
            ConvolutionStrategy::MergedDispatch
        }
    }

    /// How the staging image is laid out relative to the tile.
    pub fn staging_layout(&self) -> StagingLayout {
        if self.disable_read_write_optimization {
            StagingLayout::FullTile
        } else {
            StagingLayout::Cropped
        }
    }

    /// Check every invariant of the parameter set.
    pub fn validate(&self) -> Result<(), ParamError> {
        for (name, value) in [
            ("threshold", self.threshold),
            ("knee", self.knee),
            ("clamp_max", self.clamp_max),
            ("intensity", self.intensity),
            ("psf_scale", self.psf_scale),
            ("psf_min_clamp", self.psf_min_clamp),
            ("psf_max_clamp", self.psf_max_clamp),
            ("psf_pow", self.psf_pow),
        ] {
            if !value.is_finite() {
                return Err(ParamError::NonFinite { name, value });
            }
        }
        validate_fft_extend(self.fft_extend)?;

        if self.threshold < 0.0 {
            return Err(ParamError::NegativeThreshold(self.threshold));
        }
        if !(0.0..=1.0).contains(&self.knee) {
            return Err(ParamError::KneeOutOfRange(self.knee));
        }
        if self.clamp_max < 0.0 {
            return Err(ParamError::NegativeClamp(self.clamp_max));
        }
        if self.intensity < 0.0 {
            return Err(ParamError::NegativeIntensity(self.intensity));
        }
        if self.psf_min_clamp >= self.psf_max_clamp {
            return Err(ParamError::PsfClampInverted {
                min: self.psf_min_clamp,
                max: self.psf_max_clamp,
            });
        }
        if self.psf_pow <= 0.0 {
            return Err(ParamError::NonPositivePsfPow(self.psf_pow));
        }
        if self.psf_scale < 0.0 {
            return Err(ParamError::NegativePsfScale(self.psf_scale));
        }
        Ok(())
    }
}

fn validate_fft_extend(fft_extend: Vec2) -> Result<(), ParamError> {
    for (axis, value) in [('x', fft_extend.x), ('y', fft_extend.y)] {
        if !value.is_finite() {
            return Err(ParamError::NonFinite {
                name: "fft_extend",
                value,
            });
        }
        if !(0.0..0.5).contains(&value) {
            return Err(ParamError::FftExtendOutOfRange { axis, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters_are_valid() {
        let params = BloomParameters::default();
        assert!(params.validate().is_ok());
        assert!(params.is_active());
        assert!(
            params.is_param_updated(),
            "fresh parameters must request an OTF build"
        );
    }

    #[test]
    fn test_predicates_mirror_flags() {
        let mut params = BloomParameters::default();
        params.enabled = false;
        params.update_otf = false;
        assert!(!params.is_active());
        assert!(!params.is_param_updated());
    }

    #[test]
    fn test_fft_extend_half_is_rejected() {
        let mut params = BloomParameters::default();
        let err = params.set_fft_extend(Vec2::new(0.1, 0.5)).unwrap_err();
        assert_eq!(
            err,
            ParamError::FftExtendOutOfRange {
                axis: 'y',
                value: 0.5
            }
        );
        assert_eq!(params.fft_extend, Vec2::new(0.1, 0.2), "rejected value must not stick");
    }

    #[test]
    fn test_fft_extend_negative_is_rejected() {
        let mut params = BloomParameters::default();
        params.fft_extend = Vec2::new(-0.01, 0.0);
        assert!(matches!(
            params.validate(),
            Err(ParamError::FftExtendOutOfRange { axis: 'x', .. })
        ));
    }

    #[test]
    fn test_nan_is_rejected() {
        let mut params = BloomParameters::default();
        params.intensity = f32::NAN;
        assert!(matches!(
            params.validate(),
            Err(ParamError::NonFinite {
                name: "intensity",
                ..
            })
        ));
    }

    #[test]
    fn test_range_rules() {
        let base = BloomParameters::default();

        let mut p = base.clone();
        p.threshold = -0.5;
        assert_eq!(p.validate(), Err(ParamError::NegativeThreshold(-0.5)));

        let mut p = base.clone();
        p.knee = 1.5;
        assert_eq!(p.validate(), Err(ParamError::KneeOutOfRange(1.5)));

        let mut p = base.clone();
        p.clamp_max = -1.0;
        assert_eq!(p.validate(), Err(ParamError::NegativeClamp(-1.0)));

        let mut p = base.clone();
        p.psf_min_clamp = 0.8;
        p.psf_max_clamp = 0.2;
        assert!(matches!(
            p.validate(),
            Err(ParamError::PsfClampInverted { .. })
        ));

        let mut p = base;
        p.psf_pow = 0.0;
        assert_eq!(p.validate(), Err(ParamError::NonPositivePsfPow(0.0)));
    }

    #[test]
    fn test_set_fft_extend_marks_otf() {
        let mut params = BloomParameters::default();
        params.clear_otf_update();
        params.set_fft_extend(Vec2::new(0.1, 0.2)).unwrap();
        assert!(!params.update_otf, "unchanged value must not dirty the OTF");
        params.set_fft_extend(Vec2::new(0.05, 0.1)).unwrap();
        assert!(params.update_otf);
    }

    #[test]
    fn test_from_settings_validates() {
        let settings = BloomSettings {
            fft_extend: [0.1, 0.75],
            ..Default::default()
        };
        assert!(BloomParameters::from_settings(&settings, None).is_err());

        let params = BloomParameters::from_settings(&BloomSettings::default(), None).unwrap();
        assert!(params.update_otf);
    }

    #[test]
    fn test_apply_settings_flags_psf_changes() {
        let mut params = BloomParameters::default();
        params.clear_otf_update();

        let mut settings = BloomSettings {
            intensity: 0.9,
            ..Default::default()
        };
        assert!(!params.apply_settings(&settings).unwrap());
        assert!(!params.update_otf, "intensity does not feed the OTF");
        assert_eq!(params.intensity, 0.9);

        settings.psf_pow = 3.0;
        assert!(params.apply_settings(&settings).unwrap());
        assert!(params.update_otf);
    }

    #[test]
    fn test_apply_settings_quality_change_requests_rebuild() {
        let mut params = BloomParameters::default();
        params.clear_otf_update();
        let settings = BloomSettings {
            quality: Quality::High,
            ..Default::default()
        };
        assert!(params.apply_settings(&settings).unwrap());
        assert!(params.update_otf);
    }

    #[test]
    fn test_apply_settings_rejects_and_keeps_state() {
        let image = Arc::new(HdrImage::new(4, 4));
        let mut params = BloomParameters::default();
        params.set_psf_image(Some(image.clone()));
        let before_threshold = params.threshold;

        let settings = BloomSettings {
            threshold: -3.0,
            ..Default::default()
        };
        assert!(params.apply_settings(&settings).is_err());
        assert_eq!(params.threshold, before_threshold);
        assert!(params.psf_image.as_ref().is_some_and(|p| Arc::ptr_eq(p, &image)));
    }

    #[test]
    fn test_derived_strategy_and_layout() {
        let mut params = BloomParameters::default();
        assert_eq!(
            params.convolution_strategy(),
            ConvolutionStrategy::MergedDispatch
        );
        assert_eq!(params.staging_layout(), StagingLayout::Cropped);
        params.disable_dispatch_merge_optimization = true;
        params.disable_read_write_optimization = true;
        assert_eq!(params.convolution_strategy(), ConvolutionStrategy::Naive);
        assert_eq!(params.staging_layout(), StagingLayout::FullTile);
    }
}
