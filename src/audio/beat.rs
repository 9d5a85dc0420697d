//! Beat detection over the bass band of successive spectrum frames.

use std::collections::VecDeque;
use std::ops::Range;
use std::time::Duration;

use tracing::debug;

use super::spectrum::SpectrumFrame;
use crate::params::AnalysisConfig;

/// Bounded FIFO of recent bass energies
#[derive(Debug, Clone)]
pub struct EnergyHistory {
    values: VecDeque<f32>,
    capacity: usize,
}

impl EnergyHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a value, evicting the oldest once full
    pub fn push(&mut self, energy: f32) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(energy);
    }

    /// Arithmetic mean, `None` while empty
    pub fn mean(&self) -> Option<f32> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f32>() / self.values.len() as f32)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Result of one detection step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    /// A new beat was accepted on this tick
    pub occurred: bool,

    /// Beat strength, never below 1.0
    ///
    /// Between beats this carries the decayed residual of the last one.
    pub intensity: f32,
}

impl BeatEvent {
    pub const NONE: BeatEvent = BeatEvent {
        occurred: false,
        intensity: 1.0,
    };
}

/// Energy-ratio beat detector with a refractory window and decaying afterglow
pub struct BeatDetector {
    bass_bins: Range<usize>,
    threshold: f32,
    decay: f32,
    refractory: Duration,
    history: EnergyHistory,
    current_beat_energy: f32,
    last_beat: Option<Duration>,
}

impl BeatDetector {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            bass_bins: config.bass_bins.clone(),
            threshold: config.beat_threshold,
            decay: config.beat_decay,
            refractory: config.refractory,
            history: EnergyHistory::new(config.history_capacity),
            current_beat_energy: 0.0,
            last_beat: None,
        }
    }

    /// Feed one frame observed at `now` (monotonic, session-relative)
    pub fn detect(&mut self, frame: &SpectrumFrame, now: Duration) -> BeatEvent {
        let bass_energy = frame.band_energy(&self.bass_bins);

        self.history.push(bass_energy);
        let avg_energy = self.history.mean().unwrap_or(bass_energy);

        self.current_beat_energy *= self.decay;

        let mut occurred = false;
        let mut intensity = 1.0;

        if bass_energy > avg_energy * self.threshold && self.refractory_elapsed(now) {
            occurred = true;
            intensity = bass_energy / avg_energy;
            self.last_beat = Some(now);
            self.current_beat_energy = intensity;
            debug!(
                "Beat at {:?}: bass {:.3} / avg {:.3} = {:.2}",
                now, bass_energy, avg_energy, intensity
            );
        }

        BeatEvent {
            occurred,
            intensity: intensity.max(self.current_beat_energy),
        }
    }

    pub fn history(&self) -> &EnergyHistory {
        &self.history
    }

    pub fn last_beat(&self) -> Option<Duration> {
        self.last_beat
    }

    fn refractory_elapsed(&self, now: Duration) -> bool {
        match self.last_beat {
            Some(last) => now.saturating_sub(last) >= self.refractory,
            None => true,
        }
    }
}
