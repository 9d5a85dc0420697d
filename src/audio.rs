//! Audio input and analysis.
//!
//! Pulls PCM chunks from a source, turns them into normalized spectrum
//! frames and derives beat events from the bass band. Audible playback runs
//! beside the analysis path on its own output stream.

mod beat;
mod playback;
mod source;
mod spectrum;

// Re-export public types
pub use beat::{BeatDetector, BeatEvent, EnergyHistory};
pub use playback::{decode_all, DecodedAudio, LoopCursor, LoopedPlayback, PlaybackSink};
pub use source::{AudioSource, MemorySource, WavSource};
pub use spectrum::{hann_window, read_looped, SpectrumExtractor, SpectrumFrame};
