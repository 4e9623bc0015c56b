//! Subtitle sidecar generation in SRT and VTT formats.

use crate::cue::TimedSegment;

/// Generate SRT subtitle content from timed segments.
pub fn generate_srt(segments: &[TimedSegment]) -> String {
    let mut output = String::new();

    for (i, segment) in segments.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(segment.start),
            format_srt_time(segment.end),
        ));
        output.push_str(&segment.text);
        output.push_str("\n\n");
    }

    output
}

/// Generate WebVTT subtitle content from timed segments.
pub fn generate_vtt(segments: &[TimedSegment]) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for segment in segments {
        output.push_str(&format!(
            "{} --> {}\n",
            format_vtt_time(segment.start),
            format_vtt_time(segment.end),
        ));
        output.push_str(&segment.text);
        output.push_str("\n\n");
    }

    output
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm
fn format_srt_time(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_timestamp(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Format seconds as VTT timestamp: HH:MM:SS.mmm
fn format_vtt_time(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_timestamp(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

fn split_timestamp(secs: f64) -> (u64, u64, u64, u64) {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    (
        total_ms / 3_600_000,
        (total_ms % 3_600_000) / 60_000,
        (total_ms % 60_000) / 1000,
        total_ms % 1000,
    )
}

/// Save subtitles to a file, picking VTT for `.vtt` paths and SRT otherwise.
pub fn save_subtitles(segments: &[TimedSegment], path: &std::path::Path) -> std::io::Result<()> {
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("vtt") => generate_vtt(segments),
        _ => generate_srt(segments),
    };
    std::fs::write(path, content)
}
