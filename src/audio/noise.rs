use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rodio::Source;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const SAMPLE_RATE: u32 = 44100;
/// One-pole integration constant for brown noise.
pub const BROWN_INTEGRATION: f32 = 0.02;
/// Makeup gain so brown noise sits at roughly the loudness of white noise.
pub const BROWN_GAIN: f32 = 3.5;
/// Attenuation applied to every noise color by the output gain stage.
pub const OUTPUT_GAIN: f32 = 0.14;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NoiseColor {
    White,
    Brown,
}

impl NoiseColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseColor::White => "white",
            NoiseColor::Brown => "brown",
        }
    }

    pub fn parse(value: &str) -> Option<NoiseColor> {
        match value.trim().to_ascii_lowercase().as_str() {
            "white" => Some(NoiseColor::White),
            "brown" | "brownian" | "red" => Some(NoiseColor::Brown),
            _ => None,
        }
    }
}

/// One-pole low-pass over white noise. `last` holds the pre-gain value.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrownFilter {
    last: f32,
}

impl BrownFilter {
    pub fn last(&self) -> f32 {
        self.last
    }

    pub fn process(&mut self, white: f32) -> f32 {
        self.last = (self.last + BROWN_INTEGRATION * white) / (1.0 + BROWN_INTEGRATION);
        self.last
    }
}

/// Endless mono noise stream, pulled sample by sample from the output
/// callback. `next` does no allocation, locking or I/O.
pub struct NoiseSource {
    color: NoiseColor,
    sample_rate: u32,
    brown: BrownFilter,
    rng: StdRng,
}

impl NoiseSource {
    pub fn new(color: NoiseColor) -> Self {
        Self::with_rng(color, StdRng::from_entropy())
    }

    pub fn seeded(color: NoiseColor, seed: u64) -> Self {
        Self::with_rng(color, StdRng::seed_from_u64(seed))
    }

    fn with_rng(color: NoiseColor, rng: StdRng) -> Self {
        Self {
            color,
            sample_rate: SAMPLE_RATE,
            brown: BrownFilter::default(),
            rng,
        }
    }

    pub fn color(&self) -> NoiseColor {
        self.color
    }

    /// Output gain stage on top of the generator.
    pub fn with_output_gain(self) -> rodio::source::Amplify<Self> {
        self.amplify(OUTPUT_GAIN)
    }
}

impl Iterator for NoiseSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let white: f32 = self.rng.gen_range(-1.0..=1.0);
        let sample = match self.color {
            NoiseColor::White => white,
            NoiseColor::Brown => self.brown.process(white) * BROWN_GAIN,
        };
        Some(sample)
    }
}

impl Source for NoiseSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brown_filter_follows_recurrence() {
        let inputs = [1.0_f32, -0.5, 0.25, 1.0, -1.0, 0.0, 0.75];
        let mut filter = BrownFilter::default();
        let mut expected = 0.0_f32;

        for v in inputs {
            expected = (expected + BROWN_INTEGRATION * v) / (1.0 + BROWN_INTEGRATION);
            let got = filter.process(v);
            assert!((got - expected).abs() < 1e-7);
            assert_eq!(filter.last(), got);
        }
    }

    #[test]
    fn brown_filter_converges_towards_constant_input() {
        let mut filter = BrownFilter::default();
        for _ in 0..5000 {
            filter.process(1.0);
        }
        assert!(filter.last() > 0.99);
        assert!(filter.last() <= 1.0);
    }

    #[test]
    fn white_samples_stay_in_unit_range() {
        let source = NoiseSource::seeded(NoiseColor::White, 7);
        for sample in source.take(20_000) {
            assert!((-1.0..=1.0).contains(&sample));
        }
    }

    #[test]
    fn brown_samples_stay_within_gain_envelope() {
        let source = NoiseSource::seeded(NoiseColor::Brown, 11);
        for sample in source.take(50_000) {
            assert!(sample.abs() <= BROWN_GAIN);
        }
    }

    #[test]
    fn output_gain_bounds_every_color() {
        let envelope = BROWN_GAIN * OUTPUT_GAIN + f32::EPSILON;
        for color in [NoiseColor::White, NoiseColor::Brown] {
            let source = NoiseSource::seeded(color, 3).with_output_gain();
            for sample in source.take(20_000) {
                assert!(sample.abs() <= envelope);
            }
        }
    }

    #[test]
    fn brown_noise_is_smoother_than_white() {
        fn mean_step(color: NoiseColor) -> f32 {
            let samples: Vec<f32> = NoiseSource::seeded(color, 42).take(10_000).collect();
            let total: f32 = samples.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
            total / (samples.len() - 1) as f32
        }

        assert!(mean_step(NoiseColor::Brown) < mean_step(NoiseColor::White) / 4.0);
    }

    #[test]
    fn source_reports_mono_stream() {
        let source = NoiseSource::seeded(NoiseColor::White, 1);
        assert_eq!(source.channels(), 1);
        assert_eq!(source.sample_rate(), SAMPLE_RATE);
        assert_eq!(source.total_duration(), None);
    }
}
