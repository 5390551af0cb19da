//! Command-line argument parsing for the Lumen demo host.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, Quality};

/// Lumen command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "lumen", about = "FFT convolution bloom")]
pub struct CliArgs {
    /// Scene image to apply bloom to.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output image path.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// PSF image. Implies the remap path instead of the procedural PSF.
    #[arg(long)]
    pub psf: Option<PathBuf>,

    /// FFT quality tier.
    #[arg(long, value_enum)]
    pub quality: Option<Quality>,

    /// Bright-pass threshold.
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Bloom intensity.
    #[arg(long)]
    pub intensity: Option<f32>,

    /// Number of frames to run.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Use the unmerged forward/multiply/inverse convolution.
    #[arg(long)]
    pub naive_convolution: bool,

    /// Keep the staging image at full tile height.
    #[arg(long)]
    pub full_tile_staging: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref input) = args.input {
            self.demo.input = Some(input.clone());
        }
        if let Some(ref output) = args.output {
            self.demo.output = output.clone();
        }
        if let Some(ref psf) = args.psf {
            self.bloom.psf_image = Some(psf.clone());
            self.bloom.generate_psf = false;
        }
        if let Some(quality) = args.quality {
            self.bloom.quality = quality;
        }
        if let Some(threshold) = args.threshold {
            self.bloom.threshold = threshold;
        }
        if let Some(intensity) = args.intensity {
            self.bloom.intensity = intensity;
        }
        if let Some(frames) = args.frames {
            self.demo.frames = frames;
        }
        if args.naive_convolution {
            self.bloom.disable_dispatch_merge_optimization = true;
        }
        if args.full_tile_staging {
            self.bloom.disable_read_write_optimization = true;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            quality: Some(Quality::High),
            threshold: Some(2.5),
            naive_convolution: true,
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.bloom.quality, Quality::High);
        assert_eq!(config.bloom.threshold, 2.5);
        assert!(config.bloom.disable_dispatch_merge_optimization);
        // Non-overridden fields retain defaults
        assert!(!config.bloom.disable_read_write_optimization);
        assert_eq!(config.bloom.intensity, 0.3);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_psf_flag_switches_to_remap_path() {
        let mut config = Config::default();
        let args = CliArgs {
            psf: Some(PathBuf::from("aperture.png")),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert!(!config.bloom.generate_psf);
        assert_eq!(config.bloom.psf_image, Some(PathBuf::from("aperture.png")));
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = CliArgs::parse_from([
            "lumen",
            "--quality",
            "high",
            "--frames",
            "3",
            "--full-tile-staging",
        ]);
        assert_eq!(args.quality, Some(Quality::High));
        assert_eq!(args.frames, Some(3));
        assert!(args.full_tile_staging);
        assert!(!args.naive_convolution);
    }
}
