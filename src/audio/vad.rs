//! Offline Voice Activity Detection (VAD).
//!
//! Finds speech regions in a whole recording using RMS-energy framing, so the
//! recognizer can skip long silences. Timestamps produced on the compacted
//! (speech-only) audio are mapped back to the source timeline with
//! [`SpeechMap`].

use crate::defaults;

/// Configuration for offline speech detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadConfig {
    /// RMS threshold for a frame to count as speech (0.0 to 1.0).
    pub speech_threshold: f32,
    /// Analysis frame length (milliseconds).
    pub frame_ms: u32,
    /// Gaps shorter than this are bridged (milliseconds).
    pub min_silence_ms: u32,
    /// Regions shorter than this are dropped (milliseconds).
    pub min_speech_ms: u32,
    /// Padding added on both sides of each region (milliseconds).
    pub speech_pad_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::VAD_THRESHOLD,
            frame_ms: 30,
            min_silence_ms: defaults::VAD_MIN_SILENCE_MS,
            min_speech_ms: 250,
            speech_pad_ms: 400,
        }
    }
}

/// A run of speech, as sample indices into the source (`end` exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechRegion {
    pub start: usize,
    pub end: usize,
}

impl SpeechRegion {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (ms as u64 * sample_rate as u64 / 1000) as usize
}

/// Detect speech regions in `samples`.
///
/// Regions are sorted, non-overlapping and clamped to the input.
pub fn detect_speech(samples: &[i16], sample_rate: u32, config: &VadConfig) -> Vec<SpeechRegion> {
    let frame_len = ms_to_samples(config.frame_ms, sample_rate).max(1);

    // Raw runs of loud frames.
    let mut runs: Vec<SpeechRegion> = Vec::new();
    for (idx, frame) in samples.chunks(frame_len).enumerate() {
        if calculate_rms(frame) <= config.speech_threshold {
            continue;
        }
        let start = idx * frame_len;
        let end = start + frame.len();
        match runs.last_mut() {
            Some(last) if last.end == start => last.end = end,
            _ => runs.push(SpeechRegion { start, end }),
        }
    }

    // Bridge short pauses.
    let min_silence = ms_to_samples(config.min_silence_ms, sample_rate);
    let mut merged: Vec<SpeechRegion> = Vec::new();
    for run in runs {
        match merged.last_mut() {
            Some(last) if run.start - last.end < min_silence => last.end = run.end,
            _ => merged.push(run),
        }
    }

    // Drop blips, pad, and merge whatever the padding made overlap.
    let min_speech = ms_to_samples(config.min_speech_ms, sample_rate);
    let pad = ms_to_samples(config.speech_pad_ms, sample_rate);
    let mut regions: Vec<SpeechRegion> = Vec::new();
    for region in merged.into_iter().filter(|r| r.len() >= min_speech) {
        let padded = SpeechRegion {
            start: region.start.saturating_sub(pad),
            end: (region.end + pad).min(samples.len()),
        };
        match regions.last_mut() {
            Some(last) if padded.start <= last.end => last.end = last.end.max(padded.end),
            _ => regions.push(padded),
        }
    }

    regions
}

/// Concatenate the samples covered by `regions`.
pub fn collect_speech(samples: &[i16], regions: &[SpeechRegion]) -> Vec<i16> {
    let mut speech = Vec::with_capacity(regions.iter().map(SpeechRegion::len).sum());
    for region in regions {
        speech.extend_from_slice(&samples[region.start..region.end]);
    }
    speech
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Chunk {
    compact_start: f64,
    source_start: f64,
    duration: f64,
}

/// Maps times on the compacted speech-only audio back to the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechMap {
    chunks: Vec<Chunk>,
}

impl SpeechMap {
    pub fn new(regions: &[SpeechRegion], sample_rate: u32) -> Self {
        let rate = sample_rate as f64;
        let mut compact_start = 0.0;
        let chunks = regions
            .iter()
            .map(|region| {
                let chunk = Chunk {
                    compact_start,
                    source_start: region.start as f64 / rate,
                    duration: region.len() as f64 / rate,
                };
                compact_start += chunk.duration;
                chunk
            })
            .collect();
        Self { chunks }
    }

    /// Total duration of the compacted audio in seconds.
    pub fn speech_duration(&self) -> f64 {
        self.chunks.iter().map(|c| c.duration).sum()
    }

    /// Map a segment start. At a chunk boundary, the later chunk wins.
    pub fn map_start(&self, t: f64) -> f64 {
        self.chunks
            .iter()
            .rev()
            .find(|c| c.compact_start <= t)
            .or(self.chunks.first())
            .map_or(t, |c| c.source_start + (t - c.compact_start).max(0.0))
    }

    /// Map a segment end. At a chunk boundary, the earlier chunk wins.
    pub fn map_end(&self, t: f64) -> f64 {
        self.chunks
            .iter()
            .find(|c| t <= c.compact_start + c.duration)
            .or(self.chunks.last())
            .map_or(t, |c| c.source_start + (t - c.compact_start).max(0.0))
    }
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// # Returns
/// Normalized RMS value (0.0 to 1.0), where:
/// - 0.0 represents silence
/// - ~0.707 represents a full-scale sine wave
/// - 1.0 represents maximum amplitude
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}
