//! Spiralstorm - audio-reactive spiral field with beat-driven lightning
//!
//! Opens a WAV file, plays it back on a loop and draws the spectrum as
//! nested spiral rings, with lightning bolts on every bass hit.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

use spiralstorm::audio::{LoopedPlayback, PlaybackSink, WavSource};
use spiralstorm::cli::Args;
use spiralstorm::presenter::Presenter;
use spiralstorm::{FrameLimiter, LoopEvent, PlaybackLoop, TickOutcome, Visualizer};

/// Main application state
struct App {
    // Window and presentation
    window: Option<Arc<Window>>,
    presenter: Option<Presenter>,

    // Engine, wrapped in its fixed-rate loop
    playback_loop: PlaybackLoop,
    limiter: FrameLimiter,

    title: String,
    initial_size: (u32, u32),

    /// Error that ended the session, reported after the event loop returns
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(playback_loop: PlaybackLoop, title: String) -> Self {
        let render = &playback_loop.engine().config().render;
        let initial_size = (render.width, render.height);
        let limiter = FrameLimiter::new(render.fps);

        Self {
            window: None,
            presenter: None,
            playback_loop,
            limiter,
            title,
            initial_size,
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.fatal = Some(err);
        self.playback_loop.stop();
        event_loop.exit();
    }

    fn quit(&mut self, event_loop: &ActiveEventLoop) {
        self.playback_loop.stop();
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = &self.window else {
            return;
        };

        if self.limiter.ready(Instant::now()) {
            window.request_redraw();
        }
        if let Some(deadline) = self.limiter.next_deadline() {
            event_loop.set_control_flow(ControlFlow::WaitUntil(deadline));
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }

        // Create window
        let (width, height) = self.initial_size;
        let window_attributes = Window::default_attributes()
            .with_title(self.title.as_str())
            .with_inner_size(winit::dpi::PhysicalSize::new(width, height));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                let err = anyhow::Error::new(e).context("Failed to create window");
                self.fail(event_loop, err);
                return;
            }
        };

        // Initialize presenter
        let presenter = match pollster::block_on(Presenter::new(Arc::clone(&window))) {
            Ok(presenter) => presenter,
            Err(e) => {
                let err = anyhow::Error::new(e).context("Failed to set up display");
                self.fail(event_loop, err);
                return;
            }
        };

        if let Err(e) = self.playback_loop.start() {
            self.fail(event_loop, e.into());
            return;
        }

        info!("Spiralstorm is running: F fullscreen, Space pause, Esc quit");

        window.request_redraw();
        self.window = Some(window);
        self.presenter = Some(presenter);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.quit(event_loop),
            WindowEvent::Resized(size) => {
                if let Some(presenter) = self.presenter.as_mut() {
                    presenter.resize(size.width, size.height);
                }
                self.playback_loop.push_event(LoopEvent::Resize {
                    width: size.width,
                    height: size.height,
                });
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(code),
                        repeat: false,
                        ..
                    },
                ..
            } => self.handle_key(event_loop, code),
            WindowEvent::RedrawRequested => self.render_frame(event_loop),
            _ => {}
        }
    }
}

impl App {
    fn handle_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode) {
        let Some(window) = &self.window else {
            return;
        };

        match code {
            KeyCode::KeyF => {
                let fullscreen = match window.fullscreen() {
                    Some(_) => None,
                    None => Some(Fullscreen::Borderless(None)),
                };
                window.set_fullscreen(fullscreen);
            }
            KeyCode::Escape => {
                // Leave fullscreen first, quit when already windowed
                if window.fullscreen().is_some() {
                    window.set_fullscreen(None);
                } else {
                    self.quit(event_loop);
                }
            }
            KeyCode::Space => self.playback_loop.push_event(LoopEvent::TogglePause),
            _ => {}
        }
    }

    /// Advance the loop if a frame is due, then show the canvas
    ///
    /// Redraws the window system requests between frames only re-present.
    fn render_frame(&mut self, event_loop: &ActiveEventLoop) {
        if self.limiter.take_due() {
            match self.playback_loop.tick() {
                Ok(TickOutcome::Rendered(_)) | Ok(TickOutcome::Paused) => {}
                Ok(TickOutcome::Stopped) => {
                    event_loop.exit();
                    return;
                }
                Err(e) => {
                    let err = anyhow::Error::new(e).context("Frame failed");
                    self.fail(event_loop, err);
                    return;
                }
            }
        }

        let Some(presenter) = self.presenter.as_mut() else {
            return;
        };
        if let Err(e) = presenter.present(self.playback_loop.canvas()) {
            self.fail(event_loop, e.into());
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    spiralstorm::logging::init(level).context("Failed to initialize logging")?;

    // Fatal before the loop starts: missing or unsupported audio
    let source = WavSource::open(&args.audio)
        .with_context(|| format!("Cannot visualize {}", args.audio.display()))?;
    let engine = Visualizer::new(args.to_config(), Box::new(source))
        .context("Failed to build visualizer")?;

    let playback: Option<Box<dyn PlaybackSink>> = if args.mute {
        None
    } else {
        match LoopedPlayback::start(&args.audio) {
            Ok(playback) => Some(Box::new(playback)),
            Err(e) => {
                warn!("Continuing without sound: {}", e);
                None
            }
        }
    };

    let title = match args.audio.file_name() {
        Some(name) => format!("Spiralstorm - {}", name.to_string_lossy()),
        None => "Spiralstorm".to_string(),
    };

    let mut app = App::new(PlaybackLoop::new(engine, playback), title);
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.run_app(&mut app).context("Event loop failed")?;

    if let Some(err) = app.fatal.take() {
        return Err(err);
    }
    Ok(())
}
