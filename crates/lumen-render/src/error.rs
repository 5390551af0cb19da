//! Error types for the bloom pipeline.

/// A bloom parameter failed validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    /// An `fft_extend` component is outside `[0, 0.5)`.
    #[error("fft_extend.{axis} = {value} is outside [0, 0.5)")]
    FftExtendOutOfRange { axis: char, value: f32 },

    /// A parameter is NaN or infinite.
    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f32 },

    /// Threshold below zero.
    #[error("threshold must be >= 0, got {0}")]
    NegativeThreshold(f32),

    /// Knee outside `[0, 1]`.
    #[error("knee must be in [0, 1], got {0}")]
    KneeOutOfRange(f32),

    /// Clamp ceiling below zero.
    #[error("clamp_max must be >= 0, got {0}")]
    NegativeClamp(f32),

    /// Intensity below zero.
    #[error("intensity must be >= 0, got {0}")]
    NegativeIntensity(f32),

    /// PSF remap range is empty or inverted.
    #[error("psf_min_clamp ({min}) must be below psf_max_clamp ({max})")]
    PsfClampInverted { min: f32, max: f32 },

    /// PSF remap exponent not positive.
    #[error("psf_pow must be > 0, got {0}")]
    NonPositivePsfPow(f32),

    /// PSF energy scale below zero.
    #[error("psf_scale must be >= 0, got {0}")]
    NegativePsfScale(f32),
}

/// Errors surfaced by the bloom pass and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum BloomError {
    /// Parameters failed validation at the top of a frame.
    #[error("invalid bloom parameters: {0}")]
    InvalidParameters(#[from] ParamError),

    /// The device could not allocate a texture. The host should disable the
    /// effect and keep rendering.
    #[error("out of GPU memory allocating '{label}' ({width}x{height}, {bytes} bytes)")]
    OutOfMemory {
        label: String,
        width: u32,
        height: u32,
        bytes: u64,
    },

    /// The texture exceeds the device's dimension limit.
    #[error("'{label}' ({width}x{height}) exceeds the device limit of {max}")]
    TextureTooLarge {
        label: String,
        width: u32,
        height: u32,
        max: u32,
    },

    /// Texture dimensions don't satisfy an operation's contract.
    #[error("'{label}' is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        label: String,
        actual_width: u32,
        actual_height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    /// FFT length is not a power of two.
    #[error("FFT length {0} is not a power of two")]
    NonPowerOfTwo(u32),

    /// A convolution range or offset addresses texels outside the image or tile.
    #[error("convolution range {detail} is out of bounds")]
    RangeOutOfBounds { detail: String },

    /// Copying a texture back to the host failed.
    #[error("readback of '{label}' failed: {reason}")]
    Readback { label: String, reason: String },
}

impl BloomError {
    /// True for failures the host should answer by disabling the effect
    /// rather than fixing configuration.
    pub fn is_resource_failure(&self) -> bool {
        matches!(
            self,
            BloomError::OutOfMemory { .. } | BloomError::TextureTooLarge { .. }
        )
    }
}
