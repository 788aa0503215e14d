//! Time-coded transcripts in SRT (and WebVTT) form, plus the timing
//! arithmetic that keeps them aligned with edited audio.

use std::path::Path;

use castkit_audio_engine::SilenceSpan;
use castkit_common::error::{CastError, CastResult};
use serde::{Deserialize, Serialize};

/// One caption line. `index` is 1-based and always sequential within a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub index: usize,
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

impl Cue {
    pub fn duration_secs(&self) -> f64 {
        (self.end_secs - self.start_secs).max(0.0)
    }
}

/// A `{start, end, text}` span as speech-to-text services report them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedText {
    #[serde(alias = "start")]
    pub start_secs: f64,
    #[serde(alias = "end")]
    pub end_secs: f64,
    pub text: String,
}

/// Ordered cues.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    cues: Vec<Cue>,
}

impl SubtitleTrack {
    /// Build a track from cues, renumbering them 1..n.
    pub fn new(cues: Vec<Cue>) -> Self {
        let mut track = Self { cues };
        track.renumber();
        track
    }

    /// Parse SRT text. Malformed blocks are skipped.
    pub fn parse(text: &str) -> Self {
        let cues = blocks(text).filter_map(|b| parse_srt_block(&b)).collect();
        Self::new(cues)
    }

    /// Parse WebVTT text. Header, `NOTE`, `STYLE`, and `REGION` blocks are
    /// ignored; cue identifiers are optional.
    pub fn parse_vtt(text: &str) -> Self {
        let cues = blocks(text).filter_map(|b| parse_vtt_block(&b)).collect();
        Self::new(cues)
    }

    /// Parse either format, choosing by the `WEBVTT` signature.
    pub fn parse_any(text: &str) -> Self {
        if text.trim_start_matches('\u{feff}').trim_start().starts_with("WEBVTT") {
            Self::parse_vtt(text)
        } else {
            Self::parse(text)
        }
    }

    /// One cue per non-blank segment, ordered by start time.
    pub fn from_segments(segments: &[TimedText]) -> Self {
        let mut cues: Vec<Cue> = segments
            .iter()
            .filter(|s| !s.text.trim().is_empty())
            .filter(|s| s.start_secs.is_finite() && s.end_secs.is_finite())
            .filter(|s| s.end_secs > s.start_secs.max(0.0))
            .map(|s| Cue {
                index: 0,
                start_secs: s.start_secs.max(0.0),
                end_secs: s.end_secs,
                text: s.text.trim().to_string(),
            })
            .collect();
        cues.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));
        Self::new(cues)
    }

    /// A single cue holding all of `text` over `[0, duration_secs]`.
    ///
    /// A non-positive duration becomes a one second cue. Blank text yields an
    /// empty track.
    pub fn single_cue(text: &str, duration_secs: f64) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Self::default();
        }
        let end = if duration_secs.is_finite() && duration_secs > 0.0 {
            duration_secs
        } else {
            1.0
        };
        Self::new(vec![Cue {
            index: 1,
            start_secs: 0.0,
            end_secs: end,
            text: text.to_string(),
        }])
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// The cue with 1-based `index`.
    pub fn cue(&self, index: usize) -> Option<&Cue> {
        index.checked_sub(1).and_then(|i| self.cues.get(i))
    }

    /// SRT text: `"{index}\n{start} --> {end}\n{text}\n"` per cue, separated
    /// by blank lines.
    pub fn format(&self) -> String {
        self.cues
            .iter()
            .map(|cue| {
                format!(
                    "{}\n{} --> {}\n{}\n",
                    cue.index,
                    format_timestamp(cue.start_secs),
                    format_timestamp(cue.end_secs),
                    cue.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// WebVTT text.
    pub fn to_vtt(&self) -> String {
        let mut output = String::from("WEBVTT\n\n");
        for cue in &self.cues {
            output.push_str(&format!(
                "{} --> {}\n{}\n\n",
                format_vtt_timestamp(cue.start_secs),
                format_vtt_timestamp(cue.end_secs),
                cue.text
            ));
        }
        output
    }

    /// Drop the cue at 0-based `position` and pull every later cue back by
    /// `removed_secs`. `None` when `position` is out of range.
    ///
    /// Cues that start before the removed one are left alone. Shifted times
    /// never go below zero, and a shifted cue left with no length is dropped.
    pub fn without_cue(&self, position: usize, removed_secs: f64) -> Option<Self> {
        let removed = self.cues.get(position)?;
        let removed_start = removed.start_secs;
        let shift = removed_secs.max(0.0);

        let cues = self
            .cues
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != position)
            .filter_map(|(_, cue)| {
                if cue.start_secs < removed_start {
                    return Some(cue.clone());
                }
                let shifted = Cue {
                    start_secs: (cue.start_secs - shift).max(0.0),
                    end_secs: (cue.end_secs - shift).max(0.0),
                    ..cue.clone()
                };
                (shifted.end_secs > shifted.start_secs).then_some(shifted)
            })
            .collect();
        Some(Self::new(cues))
    }

    /// Re-time the track for audio hard-trimmed to `[new_start, new_end]`.
    ///
    /// Cues outside the window are dropped, cues crossing a boundary are
    /// clipped, and everything is moved so the window starts at zero.
    pub fn remap_after_trim(&self, new_start_secs: f64, new_end_secs: f64) -> Self {
        let cues = self
            .cues
            .iter()
            .filter(|cue| cue.end_secs > new_start_secs && cue.start_secs < new_end_secs)
            .filter_map(|cue| {
                let start = cue.start_secs.max(new_start_secs) - new_start_secs;
                let end = cue.end_secs.min(new_end_secs) - new_start_secs;
                (end > start).then(|| Cue {
                    start_secs: start.max(0.0),
                    end_secs: end,
                    ..cue.clone()
                })
            })
            .collect();
        Self::new(cues)
    }

    /// Re-time the track after `spans` were cut out of the audio.
    ///
    /// Each boundary moves back by the amount of removed time that precedes
    /// it. Cues that collapse to nothing are dropped.
    pub fn remap_after_silence_removal(&self, spans: &[SilenceSpan]) -> Self {
        let removed_before = |t: f64| -> f64 { spans.iter().map(|s| s.overlap_before(t)).sum() };

        let cues = self
            .cues
            .iter()
            .filter_map(|cue| {
                let start = (cue.start_secs - removed_before(cue.start_secs)).max(0.0);
                let end = (cue.end_secs - removed_before(cue.end_secs)).max(start);
                (end > start).then(|| Cue {
                    start_secs: start,
                    end_secs: end,
                    ..cue.clone()
                })
            })
            .collect();
        Self::new(cues)
    }

    /// Replace the text of the cue with 1-based `index`.
    pub fn update_cue_text(&self, index: usize, text: &str) -> CastResult<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CastError::validation("Cue text cannot be blank"));
        }
        if text.lines().any(|l| l.trim().is_empty()) {
            return Err(CastError::validation("Cue text cannot contain blank lines"));
        }
        if self.cue(index).is_none() {
            return Err(CastError::not_found("cue", index));
        }

        let mut track = self.clone();
        track.cues[index - 1].text = text.to_string();
        Ok(track)
    }

    /// Read a transcript file. `None` when the file does not exist.
    pub fn load(path: &Path) -> CastResult<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Some(Self::parse_any(&text))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the track as SRT, or as WebVTT when `path` ends in `.vtt`.
    pub fn save(&self, path: &Path) -> CastResult<()> {
        let content = match path.extension().and_then(|e| e.to_str()) {
            Some("vtt") => self.to_vtt(),
            _ => self.format(),
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    fn renumber(&mut self) {
        for (i, cue) in self.cues.iter_mut().enumerate() {
            cue.index = i + 1;
        }
    }
}

/// Text-level cue removal: parse, drop the cue at 0-based `remove_index`,
/// shift, and re-render. Out of range returns `text` untouched.
pub fn remove_cue_and_shift(text: &str, remove_index: usize, removed_secs: f64) -> String {
    match SubtitleTrack::parse(text).without_cue(remove_index, removed_secs) {
        Some(track) => track.format(),
        None => text.to_string(),
    }
}

/// `HH:MM:SS,mmm`, rounded to the nearest millisecond.
pub fn format_timestamp(secs: f64) -> String {
    format_with_separator(secs, ',')
}

/// `HH:MM:SS.mmm`.
pub fn format_vtt_timestamp(secs: f64) -> String {
    format_with_separator(secs, '.')
}

fn format_with_separator(secs: f64, separator: char) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}{separator}{millis:03}")
}

/// Parse `HH:MM:SS,mmm`, `HH:MM:SS.mmm`, or `MM:SS.mmm` into seconds.
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let value = value.trim();
    let parts: Vec<&str> = value.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => ("0", *m, *s),
        _ => return None,
    };
    let hours: u64 = hours.trim().parse().ok()?;
    let minutes: u64 = minutes.trim().parse().ok()?;
    let seconds = seconds.trim().replace(',', ".");
    if seconds.is_empty() || !seconds.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let seconds: f64 = seconds.parse().ok()?;
    Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

/// `start --> end [settings]`.
fn parse_time_line(line: &str) -> Option<(f64, f64)> {
    let (start, rest) = line.split_once("-->")?;
    let end = rest.split_whitespace().next()?;
    let start = parse_timestamp(start)?;
    let end = parse_timestamp(end)?;
    (end > start).then_some((start, end))
}

/// Blank-line separated groups of lines, CRLF tolerant.
fn blocks(text: &str) -> impl Iterator<Item = Vec<String>> {
    let mut groups = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for line in text.trim_start_matches('\u{feff}').lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line.to_string());
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups.into_iter()
}

fn cue_from_lines(start: f64, end: f64, text_lines: &[String]) -> Option<Cue> {
    let text = text_lines
        .iter()
        .map(|l| l.trim())
        .collect::<Vec<_>>()
        .join("\n");
    if text.trim().is_empty() {
        return None;
    }
    Some(Cue {
        index: 0,
        start_secs: start,
        end_secs: end,
        text,
    })
}

fn parse_srt_block(lines: &[String]) -> Option<Cue> {
    let [index, timing, text @ ..] = lines else {
        return None;
    };
    index.trim().parse::<usize>().ok()?;
    let (start, end) = parse_time_line(timing)?;
    cue_from_lines(start, end, text)
}

fn parse_vtt_block(lines: &[String]) -> Option<Cue> {
    let first = lines.first()?.trim();
    if first.starts_with("WEBVTT")
        || first.starts_with("NOTE")
        || first.starts_with("STYLE")
        || first.starts_with("REGION")
    {
        return None;
    }
    let timing_at = lines.iter().position(|l| l.contains("-->"))?;
    if timing_at > 1 {
        return None;
    }
    let (start, end) = parse_time_line(&lines[timing_at])?;
    cue_from_lines(start, end, &lines[timing_at + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cue(start: f64, end: f64, text: &str) -> Cue {
        Cue {
            index: 0,
            start_secs: start,
            end_secs: end,
            text: text.to_string(),
        }
    }

    fn tuples(track: &SubtitleTrack) -> Vec<(f64, f64, String)> {
        track
            .cues()
            .iter()
            .map(|c| (c.start_secs, c.end_secs, c.text.clone()))
            .collect()
    }

    #[test]
    fn test_format_layout() {
        let track = SubtitleTrack::new(vec![cue(0.0, 2.5, "Hello"), cue(3.0, 5.0, "World")]);
        assert_eq!(
            track.format(),
            "1\n00:00:00,000 --> 00:00:02,500\nHello\n\n2\n00:00:03,000 --> 00:00:05,000\nWorld\n"
        );
    }

    #[test]
    fn test_timestamp_codec() {
        assert_eq!(format_timestamp(3661.5), "01:01:01,500");
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(1.9996), "00:00:02,000");
        assert_eq!(format_vtt_timestamp(61.25), "00:01:01.250");

        assert_eq!(parse_timestamp("01:01:01,500"), Some(3661.5));
        assert_eq!(parse_timestamp("00:00:02.250"), Some(2.25));
        assert_eq!(parse_timestamp("01:02.5"), Some(62.5));
        assert_eq!(parse_timestamp("aa:00:01,000"), None);
        assert_eq!(parse_timestamp("00:00:-1,000"), None);
    }

    #[test]
    fn test_parse_skips_malformed_blocks() {
        let text = "1\r\n00:00:00,000 --> 00:00:01,000\r\nfirst\r\n\r\n\
                    not a number\n00:00:01,000 --> 00:00:02,000\nbad index\n\n\
                    3\n00:00:02,000 -> 00:00:03,000\nbad arrow\n\n\
                    4\n00:00:03,000 --> 00:00:04,000\n\n\
                    5\n00:00:04.000 --> 00:00:05.500\nlast line one\nlast line two\n";
        let track = SubtitleTrack::parse(text);
        assert_eq!(track.len(), 2);
        assert_eq!(track.cues()[0].text, "first");
        assert_eq!(track.cues()[1].index, 2);
        assert_eq!(track.cues()[1].text, "last line one\nlast line two");
        assert_eq!(track.cues()[1].end_secs, 5.5);
    }

    #[test]
    fn test_parse_vtt_with_identifiers_and_settings() {
        let text = "WEBVTT - generated\n\nNOTE produced by asr\n\n\
                    intro\n00:00.000 --> 00:01.500 align:start\nHi there\n\n\
                    00:00:01.500 --> 00:00:03.000\nSecond\n";
        let track = SubtitleTrack::parse_any(text);
        assert_eq!(
            tuples(&track),
            vec![
                (0.0, 1.5, "Hi there".to_string()),
                (1.5, 3.0, "Second".to_string())
            ]
        );
    }

    #[test]
    fn test_vtt_output() {
        let track = SubtitleTrack::single_cue("hello", 2.0);
        assert_eq!(track.to_vtt(), "WEBVTT\n\n00:00:00.000 --> 00:00:02.000\nhello\n\n");
        assert_eq!(SubtitleTrack::parse_vtt(&track.to_vtt()), track);
    }

    #[test]
    fn test_remove_middle_cue_shifts_later_cues() {
        let track = SubtitleTrack::new(vec![
            cue(0.0, 2.0, "a"),
            cue(2.0, 4.0, "b"),
            cue(4.0, 6.0, "c"),
        ]);
        let result = track.without_cue(1, 2.0).unwrap();
        assert_eq!(
            tuples(&result),
            vec![(0.0, 2.0, "a".to_string()), (2.0, 4.0, "c".to_string())]
        );
        assert_eq!(
            result.cues().iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_remove_drops_cues_collapsed_by_the_shift() {
        // "b" overlaps "a" and ends before the removed length runs out.
        let track = SubtitleTrack::new(vec![
            cue(1.0, 4.0, "a"),
            cue(1.5, 2.5, "b"),
            cue(5.0, 6.0, "c"),
        ]);
        let result = track.without_cue(0, 3.0).unwrap();
        assert_eq!(tuples(&result), vec![(2.0, 3.0, "c".to_string())]);
        assert_eq!(result.cues()[0].index, 1);

        let text = track.format();
        let shifted = SubtitleTrack::parse(&remove_cue_and_shift(&text, 0, 3.0));
        assert_eq!(tuples(&shifted), vec![(2.0, 3.0, "c".to_string())]);
    }

    #[test]
    fn test_remove_out_of_range_returns_text_unchanged() {
        let text = "1\n00:00:00,000 --> 00:00:01,000\nonly\n";
        assert_eq!(remove_cue_and_shift(text, 5, 1.0), text);
        assert_eq!(
            remove_cue_and_shift(text, 0, 1.0),
            String::new(),
            "removing the only cue leaves an empty track"
        );
    }

    #[test]
    fn test_remap_after_trim_clips_and_rebases() {
        let track = SubtitleTrack::new(vec![
            cue(0.0, 1.0, "before"),
            cue(1.5, 3.0, "crosses start"),
            cue(3.0, 4.0, "inside"),
            cue(5.5, 7.0, "crosses end"),
            cue(8.0, 9.0, "after"),
        ]);
        let result = track.remap_after_trim(2.0, 6.0);
        assert_eq!(
            tuples(&result),
            vec![
                (0.0, 1.0, "crosses start".to_string()),
                (1.0, 2.0, "inside".to_string()),
                (3.5, 4.0, "crosses end".to_string()),
            ]
        );
    }

    #[test]
    fn test_remap_after_silence_straddling_span() {
        let track = SubtitleTrack::new(vec![cue(1.0, 5.0, "x")]);
        let result = track.remap_after_silence_removal(&[SilenceSpan::new(2.0, 3.0)]);
        assert_eq!(tuples(&result), vec![(1.0, 4.0, "x".to_string())]);
    }

    #[test]
    fn test_remap_after_silence_drops_cues_inside_spans() {
        let track = SubtitleTrack::new(vec![
            cue(0.0, 1.0, "keep"),
            cue(2.2, 2.8, "silent"),
            cue(4.0, 5.0, "later"),
        ]);
        let result =
            track.remap_after_silence_removal(&[SilenceSpan::new(2.0, 3.0), SilenceSpan::new(3.5, 4.0)]);
        assert_eq!(
            tuples(&result),
            vec![(0.0, 1.0, "keep".to_string()), (2.5, 3.5, "later".to_string())]
        );
    }

    #[test]
    fn test_update_cue_text() {
        let track = SubtitleTrack::new(vec![cue(0.0, 1.0, "helo"), cue(1.0, 2.0, "world")]);
        let updated = track.update_cue_text(1, "  hello ").unwrap();
        assert_eq!(updated.cues()[0].text, "hello");
        assert_eq!(updated.cues()[1].text, "world");

        assert_eq!(track.update_cue_text(3, "x").unwrap_err().kind(), "not_found");
        assert_eq!(track.update_cue_text(0, "x").unwrap_err().kind(), "not_found");
        assert_eq!(track.update_cue_text(1, "   ").unwrap_err().kind(), "validation");
        assert_eq!(track.update_cue_text(1, "a\n\nb").unwrap_err().kind(), "validation");
    }

    #[test]
    fn test_from_segments_orders_and_filters() {
        let track = SubtitleTrack::from_segments(&[
            TimedText {
                start_secs: 2.0,
                end_secs: 3.0,
                text: " second ".to_string(),
            },
            TimedText {
                start_secs: 0.0,
                end_secs: 1.0,
                text: "first".to_string(),
            },
            TimedText {
                start_secs: 1.0,
                end_secs: 1.0,
                text: "empty span".to_string(),
            },
            TimedText {
                start_secs: 3.0,
                end_secs: 4.0,
                text: "  ".to_string(),
            },
        ]);
        assert_eq!(
            tuples(&track),
            vec![(0.0, 1.0, "first".to_string()), (2.0, 3.0, "second".to_string())]
        );
    }

    #[test]
    fn test_single_cue_defaults_to_one_second() {
        let track = SubtitleTrack::single_cue("hello", 0.0);
        assert_eq!(tuples(&track), vec![(0.0, 1.0, "hello".to_string())]);
        assert!(SubtitleTrack::single_cue("   ", 10.0).is_empty());
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let srt = dir.path().join("clip.srt");
        assert!(SubtitleTrack::load(&srt).unwrap().is_none());

        let track = SubtitleTrack::single_cue("saved", 3.0);
        track.save(&srt).unwrap();
        assert_eq!(SubtitleTrack::load(&srt).unwrap(), Some(track.clone()));

        let vtt = dir.path().join("clip.vtt");
        track.save(&vtt).unwrap();
        assert!(std::fs::read_to_string(&vtt).unwrap().starts_with("WEBVTT"));
        assert_eq!(SubtitleTrack::load(&vtt).unwrap(), Some(track));
    }

    fn arb_track() -> impl Strategy<Value = SubtitleTrack> {
        proptest::collection::vec(
            (0u64..3_600_000, 1u64..60_000, "[A-Za-z][A-Za-z ,.!?']{0,30}", proptest::option::of("[a-z]{1,10}")),
            0..20,
        )
        .prop_map(|raw| {
            let cues = raw
                .into_iter()
                .map(|(start_ms, len_ms, line, second)| {
                    let text = match second {
                        Some(s) => format!("{}\n{s}", line.trim()),
                        None => line.trim().to_string(),
                    };
                    cue(
                        start_ms as f64 / 1000.0,
                        (start_ms + len_ms) as f64 / 1000.0,
                        &text,
                    )
                })
                .collect();
            SubtitleTrack::new(cues)
        })
    }

    proptest! {
        #[test]
        fn format_then_parse_preserves_cues(track in arb_track()) {
            let parsed = SubtitleTrack::parse(&track.format());
            prop_assert_eq!(parsed.len(), track.len());
            for (a, b) in parsed.cues().iter().zip(track.cues()) {
                prop_assert!((a.start_secs - b.start_secs).abs() < 1e-9);
                prop_assert!((a.end_secs - b.end_secs).abs() < 1e-9);
                prop_assert_eq!(&a.text, &b.text);
            }
            for (i, c) in parsed.cues().iter().enumerate() {
                prop_assert_eq!(c.index, i + 1);
            }
        }

        #[test]
        fn removal_never_goes_negative(
            track in arb_track(),
            position in 0usize..25,
            removed in 0.0f64..5000.0,
        ) {
            let result = track.without_cue(position, removed).unwrap_or(track.clone());
            for c in result.cues() {
                prop_assert!(c.start_secs >= 0.0);
                prop_assert!(c.end_secs >= 0.0);
            }
        }

        #[test]
        fn removal_leaves_only_cues_with_length(
            track in arb_track(),
            position in 0usize..25,
            removed in 0.0f64..5000.0,
        ) {
            if let Some(result) = track.without_cue(position, removed) {
                for c in result.cues() {
                    prop_assert!(c.end_secs > c.start_secs, "{:?}", c);
                }
            }
        }
    }
}
