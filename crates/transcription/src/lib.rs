//! castkit Transcription
//!
//! Transcripts are SRT files stored beside the audio they describe. This
//! crate owns their parsing and the timing arithmetic that keeps them in step
//! with audio edits, and the gateway that asks a speech-to-text service for a
//! fresh one.
//!
//! Two providers are supported:
//! - a self-hosted Whisper ASR webservice (`POST {base}/asr?output=srt`)
//! - a hosted API with bearer auth (`file`, `model`, `response_format`)

pub mod gateway;
pub mod providers;
pub mod subtitles;

pub use gateway::TranscriptionGateway;
pub use providers::{AudioUpload, CloudAsr, SelfHostedAsr, SpeechToText};
pub use subtitles::{remove_cue_and_shift, Cue, SubtitleTrack, TimedText};
