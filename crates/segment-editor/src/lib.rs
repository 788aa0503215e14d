//! castkit Segment Editor
//!
//! The operations a creator performs on an episode timeline. Each one checks
//! ownership and ordering, hands audio work to the audio engine, keeps the
//! transcript beside the audio in step, and persists the new path and
//! duration.
//!
//! Mutations of one segment are serialized by a per-segment lock, so two
//! edits of the same clip never interleave. Bulk transcription runs as a
//! single-flight job keyed by `(Transcribe, episode)`.

pub mod editor;
pub mod locks;
pub mod transcripts;
pub mod transforms;

#[cfg(test)]
mod testing;

pub use editor::SegmentEditor;
pub use locks::SegmentLocks;
pub use transcripts::TranscriptionHandle;
pub use transforms::SilenceRemovalOutcome;
