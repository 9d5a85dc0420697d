//! Fixed-rate playback loop around the engine.
//!
//! Window events never touch engine state directly: they are queued and
//! applied at the next tick boundary, so a resize or stop can never land in
//! the middle of a frame.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::audio::PlaybackSink;
use crate::engine::{TickReport, Visualizer};
use crate::error::{Result, VisualizerError};
use crate::visuals::Canvas;

/// Loop lifecycle; `Stopped` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    /// A resize is queued and will be applied at the next tick
    Resizing,
    Stopped,
}

/// Requests queued for the next tick boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    Resize { width: u32, height: u32 },
    TogglePause,
    Stop,
}

/// Result of one loop tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Rendered(TickReport),
    /// Analysis and animation are frozen; the last frame stays on screen
    Paused,
    Stopped,
}

pub struct PlaybackLoop {
    engine: Visualizer,
    playback: Option<Box<dyn PlaybackSink>>,
    state: LoopState,
    pending: VecDeque<LoopEvent>,
    paused: bool,
    resizable: bool,
}

impl PlaybackLoop {
    /// Wrap an engine and an optional audible playback
    pub fn new(engine: Visualizer, playback: Option<Box<dyn PlaybackSink>>) -> Self {
        let resizable = engine.config().stages.resizable;
        Self {
            engine,
            playback,
            state: LoopState::Idle,
            pending: VecDeque::new(),
            paused: false,
            resizable,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn engine(&self) -> &Visualizer {
        &self.engine
    }

    /// Last finished frame
    pub fn canvas(&self) -> &Canvas {
        self.engine.canvas()
    }

    pub fn start(&mut self) -> Result<()> {
        match self.state {
            LoopState::Idle => {
                self.state = LoopState::Running;
                info!("Playback loop started");
                Ok(())
            }
            LoopState::Running | LoopState::Resizing => Ok(()),
            LoopState::Stopped => Err(VisualizerError::NotRunning),
        }
    }

    /// Queue an event for the next tick boundary
    pub fn push_event(&mut self, event: LoopEvent) {
        if self.state == LoopState::Stopped {
            return;
        }
        if let LoopEvent::Resize { width, height } = event {
            if !self.resizable {
                debug!("Resizing disabled, ignoring {}x{}", width, height);
                return;
            }
            // An idle loop keeps the event queued until start
            if self.state == LoopState::Running {
                self.state = LoopState::Resizing;
            }
        }
        self.pending.push_back(event);
    }

    /// Apply pending events, then run one frame unless paused
    pub fn tick(&mut self) -> Result<TickOutcome> {
        match self.state {
            LoopState::Idle => return Err(VisualizerError::NotRunning),
            LoopState::Stopped => return Ok(TickOutcome::Stopped),
            LoopState::Running | LoopState::Resizing => {}
        }

        while let Some(event) = self.pending.pop_front() {
            match event {
                LoopEvent::Resize { width, height } => {
                    if let Err(e) = self.engine.resize(width, height) {
                        warn!(
                            "Resize to {}x{} failed, keeping previous surfaces: {}",
                            width, height, e
                        );
                    }
                }
                LoopEvent::TogglePause => self.set_paused(!self.paused),
                LoopEvent::Stop => {
                    self.stop();
                    return Ok(TickOutcome::Stopped);
                }
            }
        }
        self.state = LoopState::Running;

        if self.paused {
            return Ok(TickOutcome::Paused);
        }

        match self.engine.tick() {
            Ok(report) => Ok(TickOutcome::Rendered(report)),
            Err(e) => {
                self.stop();
                Err(e)
            }
        }
    }

    /// End the loop and release the audio source and playback
    ///
    /// Safe to call more than once.
    pub fn stop(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        self.state = LoopState::Stopped;
        self.pending.clear();
        self.engine.release_source();
        if let Some(mut playback) = self.playback.take() {
            playback.set_paused(true);
        }
        info!("Playback loop stopped after {} frames", self.engine.frame_count());
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        if let Some(playback) = self.playback.as_mut() {
            playback.set_paused(paused);
        }
        info!("{}", if paused { "Paused" } else { "Resumed" });
    }
}

impl Drop for PlaybackLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Caps the loop at a target frame rate
///
/// `ready` decides when a frame is due; the redraw handler then claims it
/// with `take_due`, so redraws the window system asks for on its own
/// (expose, resize) never advance the animation.
#[derive(Debug, Clone)]
pub struct FrameLimiter {
    period: Duration,
    next_deadline: Option<Instant>,
    due: bool,
}

impl FrameLimiter {
    pub fn new(fps: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            next_deadline: None,
            due: false,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// When the next frame is due; `None` before the first frame
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline
    }

    /// Returns `true` and schedules the following frame if one is due at `now`
    ///
    /// A loop that falls more than a period behind resynchronizes instead of
    /// bursting to catch up.
    pub fn ready(&mut self, now: Instant) -> bool {
        let ready = match self.next_deadline {
            Some(deadline) if now < deadline => false,
            Some(deadline) => {
                let next = deadline + self.period;
                self.next_deadline = Some(if next <= now { now + self.period } else { next });
                true
            }
            None => {
                self.next_deadline = Some(now + self.period);
                true
            }
        };
        self.due |= ready;
        ready
    }

    /// Consume the frame marked due by `ready`, at most once
    pub fn take_due(&mut self) -> bool {
        std::mem::take(&mut self.due)
    }
}
