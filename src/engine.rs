//! The visualizer engine: one object owning every piece of per-session state.
//!
//! A tick pulls one chunk from the audio source and runs it through
//! extractor → beat detector → particle system → compositor, advancing the
//! animation clock by fixed increments. Nothing here touches a window or an
//! audio device, so the whole pipeline runs headless in tests.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::audio::{AudioSource, BeatDetector, BeatEvent, SpectrumExtractor, SpectrumFrame};
use crate::error::{Result, VisualizerError};
use crate::params::VisualizerConfig;
use crate::visuals::{Canvas, Compositor, ParticleSystem, RadialField};

/// What happened on one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Index of the tick that produced this report, starting at 0
    pub frame: u64,
    pub beat: BeatEvent,
    /// Bolts spawned by this tick's beat
    pub spawned: usize,
    /// Bolts alive after aging
    pub live_particles: usize,
    /// Background hue used for this frame, in turns
    pub hue: f32,
}

pub struct Visualizer {
    config: VisualizerConfig,
    source: Option<Box<dyn AudioSource>>,
    extractor: SpectrumExtractor,
    detector: BeatDetector,
    particles: ParticleSystem,
    field: RadialField,
    compositor: Compositor,
    rng: StdRng,
    frame: u64,
    last_spectrum: SpectrumFrame,
}

impl Visualizer {
    /// Build an engine around an already opened source
    pub fn new(config: VisualizerConfig, source: Box<dyn AudioSource>) -> Result<Self> {
        config.validate()?;

        let compositor = Compositor::new(&config.render, &config.stages)?;
        info!(
            "Visualizer ready: {}x{} @ {} fps, chunk {}, seed {:#x}",
            config.render.width,
            config.render.height,
            config.render.fps,
            config.analysis.chunk_size,
            config.seed
        );

        Ok(Self {
            extractor: SpectrumExtractor::new(&config.analysis),
            detector: BeatDetector::new(&config.analysis),
            particles: ParticleSystem::new(config.render.max_live_particles),
            field: RadialField::new(&config.render),
            rng: StdRng::seed_from_u64(config.seed),
            last_spectrum: SpectrumFrame::zeros(config.analysis.spectrum_len()),
            source: Some(source),
            compositor,
            config,
            frame: 0,
        })
    }

    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    /// Ticks completed so far
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Session time of the next tick on the fixed frame clock
    pub fn clock(&self) -> Duration {
        Duration::from_secs_f64(self.frame as f64 / self.config.render.fps as f64)
    }

    /// Background hue offset for the next frame, wrapped to [0, 1)
    pub fn hue_offset(&self) -> f64 {
        (self.frame as f64 * self.config.render.hue_increment).fract()
    }

    /// Animation time accumulated in fixed steps
    pub fn animation_time(&self) -> f64 {
        self.frame as f64 * self.config.render.time_increment
    }

    /// Run one frame through the pipeline
    ///
    /// Fails with [`VisualizerError::NotRunning`] once the source has been
    /// released.
    pub fn tick(&mut self) -> Result<TickReport> {
        let now = self.clock();
        let hue = self.hue_offset() as f32;

        let source = self.source.as_deref_mut().ok_or(VisualizerError::NotRunning)?;
        let spectrum = self.extractor.next_frame(source);

        // Beats → particles
        let (beat, spawned) = if self.config.stages.beats {
            let beat = self.detector.detect(&spectrum, now);
            let spawned = self.particles.spawn_burst(&beat, &mut self.rng);
            (beat, spawned)
        } else {
            (BeatEvent::NONE, 0)
        };
        let live_particles = self.particles.tick(&mut self.rng);

        // Render
        let field = &self.field;
        let particles = &self.particles;
        self.compositor.composite(
            hue,
            &mut self.rng,
            |canvas, rng| field.render(&spectrum, hue, canvas, rng),
            |canvas, rng| particles.render(canvas, rng),
        );

        let report = TickReport {
            frame: self.frame,
            beat,
            spawned,
            live_particles,
            hue,
        };
        self.last_spectrum = spectrum;
        self.frame += 1;
        Ok(report)
    }

    /// Swap every render surface for a new canvas size
    ///
    /// Zero-area sizes are ignored and the current surfaces kept.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            debug!("Ignoring zero-area resize to {}x{}", width, height);
            return Ok(());
        }
        if self.compositor.size() == (width, height) {
            return Ok(());
        }
        self.compositor.resize(width, height)
    }

    /// Last finished frame
    pub fn canvas(&self) -> &Canvas {
        self.compositor.output()
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn detector(&self) -> &BeatDetector {
        &self.detector
    }

    /// Spectrum analysed on the most recent tick
    pub fn last_spectrum(&self) -> &SpectrumFrame {
        &self.last_spectrum
    }

    /// Drop the audio source; returns `false` if it was already released
    pub fn release_source(&mut self) -> bool {
        match self.source.take() {
            Some(source) => {
                drop(source);
                debug!("Visualizer released its audio source after {} ticks", self.frame);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MemorySource;
    use crate::params::{PipelineStages, RenderConfig};
    use std::f32::consts::TAU;

    const CHUNK: usize = 512;

    fn test_config() -> VisualizerConfig {
        VisualizerConfig {
            render: RenderConfig {
                width: 160,
                height: 153,
                bright_spirals: 2,
                dark_spirals: 2,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// One chunk: a loud tone above the bass band plus a bass tone at bin 5
    fn tone_chunk(bass_amplitude: f32) -> Vec<i16> {
        (0..CHUNK)
            .map(|t| {
                let phase = t as f32 / CHUNK as f32;
                let carrier = 10_000.0 * (TAU * 100.0 * phase).sin();
                let bass = bass_amplitude * (TAU * 5.0 * phase).sin();
                (carrier + bass).round() as i16
            })
            .collect()
    }

    fn spike_source() -> MemorySource {
        let mut samples = Vec::new();
        for _ in 0..9 {
            samples.extend(tone_chunk(1_000.0));
        }
        for _ in 0..3 {
            samples.extend(tone_chunk(9_000.0));
        }
        MemorySource::new(samples, 1, 44100)
    }

    #[test]
    fn test_silent_session() {
        let source = MemorySource::silent(10 * CHUNK, 1, 44100);
        let mut engine = Visualizer::new(test_config(), Box::new(source)).unwrap();

        let mut spawned = 0;
        for _ in 0..10 {
            let report = engine.tick().unwrap();
            assert!(!report.beat.occurred);
            spawned += report.spawned;
        }

        assert_eq!(spawned, 0);
        assert!(engine.particles().is_empty());
        assert!(engine.last_spectrum().is_silent());
        assert!((engine.hue_offset() - 10.0 * 0.005).abs() < 1e-9);
    }

    #[test]
    fn test_bass_spike_fires_one_beat() {
        let mut engine = Visualizer::new(test_config(), Box::new(spike_source())).unwrap();

        let reports: Vec<TickReport> = (0..12).map(|_| engine.tick().unwrap()).collect();

        let beats: Vec<&TickReport> = reports.iter().filter(|r| r.beat.occurred).collect();
        assert_eq!(beats.len(), 1, "expected exactly one beat");

        let beat = beats[0];
        assert_eq!(beat.frame, 9);
        assert!(
            (beat.beat.intensity - 5.0).abs() < 0.05,
            "intensity {}",
            beat.beat.intensity
        );
        assert!((1..=5).contains(&beat.spawned));
        assert!(beat.live_particles >= 1);

        // The louder frames right after are inside the refractory window
        assert!(reports[10..].iter().all(|r| !r.beat.occurred));
    }

    #[test]
    fn test_beats_stage_disabled() {
        let config = VisualizerConfig {
            stages: PipelineStages {
                beats: false,
                ..Default::default()
            },
            ..test_config()
        };
        let mut engine = Visualizer::new(config, Box::new(spike_source())).unwrap();

        for _ in 0..12 {
            let report = engine.tick().unwrap();
            assert_eq!(report.beat, BeatEvent::NONE);
        }
        assert!(engine.particles().is_empty());
    }

    #[test]
    fn test_frame_clock_is_fixed() {
        let source = MemorySource::silent(CHUNK, 1, 44100);
        let mut engine = Visualizer::new(test_config(), Box::new(source)).unwrap();

        for _ in 0..3 {
            engine.tick().unwrap();
        }

        assert_eq!(engine.frame_count(), 3);
        assert_eq!(engine.clock(), Duration::from_secs_f64(3.0 / 150.0));
        assert!((engine.animation_time() - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_resize_between_ticks() {
        let source = MemorySource::silent(CHUNK, 1, 44100);
        let mut engine = Visualizer::new(test_config(), Box::new(source)).unwrap();
        engine.tick().unwrap();

        engine.resize(320, 306).unwrap();
        engine.tick().unwrap();
        assert_eq!(engine.canvas().size(), (320, 306));

        engine.resize(0, 200).unwrap();
        assert_eq!(engine.canvas().size(), (320, 306));
    }

    #[test]
    fn test_same_seed_same_frames() {
        let run = || {
            let mut engine =
                Visualizer::new(test_config(), Box::new(spike_source())).unwrap();
            for _ in 0..12 {
                engine.tick().unwrap();
            }
            engine.canvas().data().to_vec()
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_tick_after_release_fails() {
        let source = MemorySource::silent(CHUNK, 1, 44100);
        let mut engine = Visualizer::new(test_config(), Box::new(source)).unwrap();

        assert!(engine.release_source());
        assert!(!engine.release_source());
        assert!(matches!(engine.tick(), Err(VisualizerError::NotRunning)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = VisualizerConfig {
            render: RenderConfig {
                fps: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let source = MemorySource::silent(CHUNK, 1, 44100);

        assert!(matches!(
            Visualizer::new(config, Box::new(source)),
            Err(VisualizerError::InvalidConfig(_))
        ));
    }
}
