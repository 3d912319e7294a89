// benchmark.rs — headless mode: render N frames with per-frame deltas and report timings

use crate::buffer::SourceImage;
use crate::config::ViewerConfig;
use crate::controller::ViewportController;
use crate::error::{Result, ViewerError};
use crate::loader::load_source_image;
use crate::panorama::{Algorithm, ViewportParameters};
use crate::timing::{TimingKind, TimingStats};

use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub algorithm: Algorithm,
    pub frames: usize,
    pub stats: TimingStats,
    /// View after the last frame.
    pub final_params: ViewportParameters,
    /// Copy of the last rendered frame.
    pub last_frame: Vec<u8>,
}

/// Renders `cfg.iterations` frames per selected algorithm. Frame 0 shows the
/// initial view; every following frame first applies `cfg.delta`.
pub fn run(cfg: &ViewerConfig, source: Arc<SourceImage>) -> Result<Vec<BenchmarkReport>> {
    let mut reports = Vec::new();

    for algorithm in cfg.algorithm.algorithms() {
        let mut stats = TimingStats::new();
        let mut controller = stats.time(TimingKind::Initialization, || {
            ViewportController::new(
                source.clone(),
                cfg.view,
                cfg.width_output,
                cfg.height_output,
                algorithm,
            )
        })?;

        for i in 0..cfg.iterations {
            stats.time(TimingKind::Frame, || {
                if i == 0 {
                    controller.reset_view();
                    Ok(())
                } else {
                    controller.advance(cfg.delta)
                }
            })?;
            stats.add(TimingKind::Render, controller.last_render_time());
        }

        log::info!(
            "{} projection, {} frames of {}x{}",
            algorithm.label(),
            cfg.iterations,
            cfg.width_output,
            cfg.height_output
        );
        stats.log_report(false);

        reports.push(BenchmarkReport {
            algorithm,
            frames: cfg.iterations,
            stats,
            final_params: *controller.params(),
            last_frame: controller.output().as_bytes().to_vec(),
        });
    }

    Ok(reports)
}

/// Loads the configured image and runs the benchmark on it.
pub fn run_headless(cfg: &ViewerConfig) -> Result<Vec<BenchmarkReport>> {
    let path = cfg
        .image
        .as_deref()
        .ok_or_else(|| ViewerError::Config("headless mode needs --img=PATH".into()))?;

    let mut stats = TimingStats::new();
    let source = stats.time(TimingKind::Load, || load_source_image(path))?;
    let reports = stats.time(TimingKind::Total, || run(cfg, Arc::new(source)))?;
    stats.log_report(false);
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlgorithmSelection;
    use crate::panorama::ViewDelta;
    use crate::projector::tests::coordinate_source;

    fn config(iterations: usize) -> ViewerConfig {
        ViewerConfig {
            width_output: 32,
            height_output: 16,
            iterations,
            algorithm: AlgorithmSelection::All,
            delta: ViewDelta {
                yaw: 30.0,
                pitch: 0.0,
                roll: 5.0,
            },
            ..ViewerConfig::default()
        }
    }

    #[test]
    fn runs_every_selected_algorithm() {
        let reports = run(&config(4), Arc::new(coordinate_source(128, 64))).unwrap();
        assert_eq!(reports.len(), 2);
        for r in &reports {
            assert_eq!(r.frames, 4);
            assert_eq!(r.stats.count(TimingKind::Frame), 4);
            assert_eq!(r.stats.count(TimingKind::Render), 4);
            assert_eq!(r.stats.count(TimingKind::Initialization), 1);
            // three deltas after the initial frame
            assert_eq!(r.final_params, ViewportParameters::new(90.0, 0.0, 15.0, 90.0));
        }
        assert_eq!(reports[0].last_frame, reports[1].last_frame);
    }

    #[test]
    fn headless_without_image_is_a_config_error() {
        assert!(matches!(
            run_headless(&config(1)),
            Err(ViewerError::Config(_))
        ));
    }
}
