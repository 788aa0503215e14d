//! castkit Render Engine
//!
//! Joins an episode's segments into the final deliverable.
//!
//! # Pipeline Architecture
//!
//! ```text
//! segments (by position) ──► resolve audio ──► skip missing / escaped paths
//!                                                    │
//!                         try_start(Render, episode) ┤ conflict ─► "already building"
//!                                                    ▼
//!                          concatenate ─► .castkit-render-*.ext ─► final.ext
//!                                                    │
//!                          probe ─► persist duration, size, mime, copyright
//!                                                    │
//!                          publicly visible? ─► regenerate feed, ping hub
//!                                                    │
//!                          waveform peaks ─► Done
//! ```
//!
//! Publishing and waveform failures are logged and never fail the render.

pub mod pipeline;
pub mod publish;

pub use pipeline::*;
pub use publish::*;
