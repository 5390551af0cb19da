//! Demo host for the Lumen FFT bloom pass.
//!
//! Loads `config.ron` (overridable via CLI flags), runs the bloom pass on the
//! CPU reference backend for a number of frames, and writes a tonemapped PNG.
//! Run with `cargo run -p lumen-demo -- --input scene.png --quality high`.
//! Without `--input` a synthetic scene is used.

mod io;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use lumen_config::{CliArgs, Config, default_config_dir};
use lumen_render::{
    BloomError, BloomParameters, CpuBloomPass, CpuDevice, CpuFft, CpuKernels, FrameOutcome,
    FrameTarget, HdrImage, ParamError,
};
use tracing::{error, info, warn};

const SYNTHETIC_WIDTH: u32 = 960;
const SYNTHETIC_HEIGHT: u32 = 540;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error(transparent)]
    Image(#[from] io::ImageIoError),
    #[error(transparent)]
    Params(#[from] ParamError),
    #[error(transparent)]
    Bloom(#[from] BloomError),
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    // Load or create config, then apply CLI overrides
    let on_disk = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    let mut config = on_disk.clone();
    config.apply_cli_overrides(&args);

    let log_dir = config
        .debug
        .log_dir
        .clone()
        .unwrap_or_else(|| config_dir.join("logs"));
    lumen_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    match run(&args, on_disk, config, &config_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(
    args: &CliArgs,
    mut on_disk: Config,
    mut config: Config,
    config_dir: &Path,
) -> Result<(), DemoError> {
    let base_scene = match &config.demo.input {
        Some(path) => {
            info!("Loading scene {}", path.display());
            io::load_linear(path)?
        }
        None => {
            info!("No input image, using a {SYNTHETIC_WIDTH}x{SYNTHETIC_HEIGHT} synthetic scene");
            io::synthetic_scene(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT)
        }
    };

    let psf = load_psf(&config);
    let mut params = BloomParameters::from_settings(&config.bloom, psf)?;
    info!(
        "Bloom: quality {:?}, threshold {}, intensity {}, {:?} convolution, {:?} staging",
        params.quality,
        params.threshold,
        params.intensity,
        params.convolution_strategy(),
        params.staging_layout()
    );

    let mut device = CpuDevice::new();
    let mut scene = device.upload("scene", &base_scene)?;
    let mut bloom = CpuBloomPass::new(CpuKernels, CpuFft::new());

    for frame in 0..config.demo.frames {
        *scene.image_mut() = base_scene.clone();

        match bloom.execute(&mut device, &params, FrameTarget::new(&mut scene)) {
            Ok(FrameOutcome::Applied {
                reallocated,
                otf_rebuilt,
                strategy,
            }) => info!(
                "Frame {frame}: bloom applied ({strategy:?}, reallocated: {reallocated}, OTF rebuilt: {otf_rebuilt})"
            ),
            Ok(FrameOutcome::Skipped(reason)) => info!("Frame {frame}: bloom skipped ({reason:?})"),
            Err(e) if e.is_resource_failure() => {
                warn!("Frame {frame}: {e}; disabling bloom");
                params.enabled = false;
                bloom.dispose();
            }
            Err(e) => return Err(e.into()),
        }

        // The host's configuration logic acknowledges the rebuild.
        params.clear_otf_update();

        if let Ok(Some(changed)) = on_disk.reload(config_dir) {
            let mut reloaded = changed.clone();
            reloaded.apply_cli_overrides(args);
            config = apply_reload(&mut params, config, reloaded);
            on_disk = changed;
        }
    }

    info!(
        "Bloom textures allocated {} time(s), {} bytes live",
        bloom.reallocation_count(),
        device.live_bytes()
    );

    let output = &config.demo.output;
    io::save_tonemapped(output, scene.image(), config.demo.exposure)?;
    info!("Wrote {}", output.display());
    Ok(())
}

/// Merge a reloaded config into the live parameters and return the config
/// now in effect. Rejected bloom settings keep `current`.
fn apply_reload(params: &mut BloomParameters, current: Config, reloaded: Config) -> Config {
    match params.apply_settings(&reloaded.bloom) {
        Ok(true) => info!("Config changed, OTF will be rebuilt"),
        Ok(false) => {}
        Err(e) => {
            warn!("Ignoring reloaded bloom settings: {e}");
            return current;
        }
    }
    if psf_source(&reloaded) != psf_source(&current) {
        params.set_psf_image(load_psf(&reloaded));
    }
    reloaded
}

/// The config fields that decide which PSF image, if any, is loaded.
fn psf_source(config: &Config) -> (bool, Option<&Path>) {
    (config.bloom.generate_psf, config.bloom.psf_image.as_deref())
}

/// Load the configured PSF image, if the remap path is selected.
fn load_psf(config: &Config) -> Option<Arc<HdrImage>> {
    if config.bloom.generate_psf {
        return None;
    }
    let path = config.bloom.psf_image.as_ref()?;
    match io::load_linear(path) {
        Ok(image) => {
            info!(
                "Loaded PSF {} ({}x{})",
                path.display(),
                image.width(),
                image.height()
            );
            Some(Arc::new(image))
        }
        Err(e) => {
            warn!("{e}; the bloom kernel will be empty");
            None
        }
    }
}
