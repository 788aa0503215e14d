//! castkit Audio Engine
//!
//! Wraps the external transcoding toolchain. Every operation addresses files
//! through `SandboxedPath`, so nothing outside the data root can be read or
//! written.
//!
//! # Edit Pipeline
//!
//! ```text
//! segment.mp3 ──► ffmpeg (trim / aselect / afftdn) ──► .castkit-edit-*/out.wav
//!                                                        │ verify non-empty
//!                                                        │ probe duration
//!                                                        ▼
//!                                   install_replacement: rename to clip.<id>.wav
//!                                   move clip.srt ─► clip.<id>.srt
//!                                   delete clip.mp3, clip.json
//! ```
//!
//! Rendering uses [`AudioEngine::concatenate`] with the episode's encoding
//! settings; peak data for playback UIs comes from
//! [`AudioEngine::generate_waveform_peaks`].

pub mod encode;
pub mod engine;
pub mod install;
pub mod probe;
pub mod silence;
pub mod tool;

pub use engine::*;
pub use install::*;
pub use probe::ProbeInfo;
pub use silence::SilenceSpan;
