//! Silence spans: detection log parsing and the filters that cut them out.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A region of the timeline to remove, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceSpan {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl SilenceSpan {
    pub fn new(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        (self.end_secs - self.start_secs).max(0.0)
    }

    /// Length of the part of this span that lies inside `[0, t]`.
    pub fn overlap_before(&self, t: f64) -> f64 {
        (self.end_secs.min(t) - self.start_secs.max(0.0)).max(0.0)
    }
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"silence_(start|end):\s*(-?[0-9]+(?:\.[0-9]+)?)").expect("static regex")
    })
}

/// Pair up `silence_start:` / `silence_end:` markers from ffmpeg's
/// `silencedetect` stderr.
///
/// A trailing start with no end means the file ends in silence; that span is
/// closed at `duration_secs`.
pub fn parse_silence_log(stderr: &str, duration_secs: f64) -> Vec<SilenceSpan> {
    let mut spans = Vec::new();
    let mut pending: Option<f64> = None;

    for caps in marker_regex().captures_iter(stderr) {
        let Ok(value) = caps[2].parse::<f64>() else {
            continue;
        };
        match &caps[1] {
            "start" => pending = Some(value.max(0.0)),
            _ => {
                if let Some(start) = pending.take() {
                    let end = value.min(duration_secs);
                    if end > start {
                        spans.push(SilenceSpan::new(start, end));
                    }
                }
            }
        }
    }

    if let Some(start) = pending {
        if duration_secs > start {
            spans.push(SilenceSpan::new(start, duration_secs));
        }
    }

    spans
}

/// Clip spans to `[0, duration]`, sort them, and merge overlaps.
pub fn normalize_spans(spans: &[SilenceSpan], duration_secs: f64) -> Vec<SilenceSpan> {
    let mut clipped: Vec<SilenceSpan> = spans
        .iter()
        .map(|s| SilenceSpan::new(s.start_secs.max(0.0), s.end_secs.min(duration_secs)))
        .filter(|s| s.end_secs > s.start_secs)
        .collect();
    clipped.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));

    let mut merged: Vec<SilenceSpan> = Vec::with_capacity(clipped.len());
    for span in clipped {
        match merged.last_mut() {
            Some(last) if span.start_secs <= last.end_secs => {
                last.end_secs = last.end_secs.max(span.end_secs);
            }
            _ => merged.push(span),
        }
    }
    merged
}

/// Total seconds covered by normalized spans.
pub fn total_duration(spans: &[SilenceSpan]) -> f64 {
    spans.iter().map(SilenceSpan::duration_secs).sum()
}

/// `aselect` filter that drops every span and re-times the remaining samples
/// so the output plays gap-free.
pub fn build_cut_filter(spans: &[SilenceSpan]) -> String {
    let terms: Vec<String> = spans
        .iter()
        .map(|s| format!("between(t,{:.3},{:.3})", s.start_secs, s.end_secs))
        .collect();
    format!("aselect='not({})',asetpts=N/SR/TB", terms.join("+"))
}
