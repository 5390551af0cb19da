//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Bloom effect settings.
    pub bloom: BloomSettings,
    /// Debug/development settings.
    pub debug: DebugConfig,
    /// Settings for the offline demo host.
    pub demo: DemoConfig,
}

/// FFT quality tier. Selects the working tile resolution of the convolution.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Quality {
    /// 512x256 FFT tile.
    #[default]
    Medium,
    /// 1024x512 FFT tile.
    High,
}

/// Persisted bloom settings.
///
/// This is the on-disk form of the bloom parameter set. The render crate
/// validates it and turns it into live parameters; values here are not
/// range-checked on load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BloomSettings {
    /// Master switch for the effect.
    pub enabled: bool,
    /// FFT tile resolution tier.
    pub quality: Quality,
    /// Luminance above which pixels contribute to bloom.
    pub threshold: f32,
    /// Soft knee ("scatter") as a fraction of the threshold. Range \[0, 1\].
    pub knee: f32,
    /// Per-channel ceiling applied before thresholding.
    pub clamp_max: f32,
    /// Blend strength of the convolved bloom.
    pub intensity: f32,
    /// Fraction of the tile reserved as padding on each axis. Range \[0, 0.5).
    pub fft_extend: [f32; 2],
    /// Run forward transform, spectral multiply and inverse transform as separate passes.
    pub disable_dispatch_merge_optimization: bool,
    /// Keep the staging image at full tile height instead of cropping the vertical padding.
    pub disable_read_write_optimization: bool,
    /// Use the procedural PSF instead of `psf_image`.
    pub generate_psf: bool,
    /// Path to a user-supplied PSF image.
    pub psf_image: Option<PathBuf>,
    /// Energy multiplier applied to the remapped PSF.
    pub psf_scale: f32,
    /// Input intensity mapped to zero by the PSF remap.
    pub psf_min_clamp: f32,
    /// Input intensity mapped to one by the PSF remap.
    pub psf_max_clamp: f32,
    /// Exponent of the PSF remap curve.
    pub psf_pow: f32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Directory for JSON log files in debug builds.
    pub log_dir: Option<PathBuf>,
}

/// Offline demo host configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemoConfig {
    /// Scene image to apply bloom to. A synthetic test scene is used when unset.
    pub input: Option<PathBuf>,
    /// Where the tonemapped result is written.
    pub output: PathBuf,
    /// Number of frames to run the pass for.
    pub frames: u32,
    /// Exposure multiplier applied before tonemapping the output.
    pub exposure: f32,
}

// --- Default implementations ---

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            quality: Quality::Medium,
            threshold: 1.0,
            knee: 0.5,
            clamp_max: 65_000.0,
            intensity: 0.3,
            fft_extend: [0.1, 0.2],
            disable_dispatch_merge_optimization: false,
            disable_read_write_optimization: false,
            generate_psf: true,
            psf_image: None,
            psf_scale: 1.0,
            psf_min_clamp: 0.0,
            psf_max_clamp: 1.0,
            psf_pow: 1.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: PathBuf::from("bloom.png"),
            frames: 1,
            exposure: 1.0,
        }
    }
}

/// Default config directory: `<platform config dir>/lumen`, or `./lumen` when
/// the platform has none.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lumen")
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let config = read_config(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let config_path = config_dir.join("config.ron");
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Write {
            path: config_path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let new_config = read_config(&config_path)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(!ron_str.is_empty());
        assert!(ron_str.contains("quality: Medium"));
        assert!(ron_str.contains("generate_psf: true"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.bloom.quality = Quality::High;
        config.bloom.psf_image = Some(PathBuf::from("psf/star.png"));
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_field_uses_default() {
        let ron_str = "(bloom: (threshold: 2.0))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.bloom.threshold, 2.0);
        assert_eq!(config.bloom.fft_extend, BloomSettings::default().fft_extend);
        assert_eq!(config.debug, DebugConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let ron_str = "(future_setting: true)";
        let result: Result<Config, _> = ron::from_str(ron_str);
        assert!(result.is_ok());
    }

    #[test]
    fn test_out_of_range_values_load_unchecked() {
        let ron_str = "(bloom: (fft_extend: (0.7, 0.9)))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.bloom.fft_extend, [0.7, 0.9]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.bloom.intensity = 0.8;
        config.bloom.disable_read_write_optimization = true;
        config.demo.frames = 4;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.bloom.psf_pow = 2.0;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().bloom.psf_pow, 2.0);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }

    #[test]
    fn test_broken_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();
        std::fs::write(dir.path().join("config.ron"), "(bloom: (threshold: ))").unwrap();

        let err = config.reload(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.ron"), "got: {err}");
    }

    #[test]
    fn test_reload_of_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::default().reload(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_default_config_dir_ends_with_lumen() {
        assert!(default_config_dir().ends_with("lumen"));
    }
}
