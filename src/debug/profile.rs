use instant::Instant;

/// Stages of `ArSession::frame`, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Tracking,
    Gesture,
    Behavior,
    Arbiter,
}

impl FramePhase {
    pub const ALL: [FramePhase; 4] = [
        Self::Tracking,
        Self::Gesture,
        Self::Behavior,
        Self::Arbiter,
    ];

    fn slot(self) -> usize {
        match self {
            Self::Tracking => 0,
            Self::Gesture => 1,
            Self::Behavior => 2,
            Self::Arbiter => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Tracking => "tracking",
            Self::Gesture => "gesture",
            Self::Behavior => "behavior",
            Self::Arbiter => "arbiter",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PhaseSample {
    last_us: f64,
    peak_us: f64,
}

/// Wall time spent in each frame phase: the latest frame, and the worst
/// frame since the last [`PhaseProfile::reset_peaks`].
#[derive(Debug, Clone, Default)]
pub struct PhaseProfile {
    samples: [PhaseSample; 4],
}

impl PhaseProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close a span opened with `Instant::now()` at the start of `phase`.
    pub fn record(&mut self, phase: FramePhase, started: Instant) {
        self.record_us(phase, started.elapsed().as_secs_f64() * 1_000_000.0);
    }

    fn record_us(&mut self, phase: FramePhase, us: f64) {
        let sample = &mut self.samples[phase.slot()];
        sample.last_us = us;
        sample.peak_us = sample.peak_us.max(us);
    }

    pub fn last_us(&self, phase: FramePhase) -> f64 {
        self.samples[phase.slot()].last_us
    }

    pub fn peak_us(&self, phase: FramePhase) -> f64 {
        self.samples[phase.slot()].peak_us
    }

    /// Wall time of the latest frame across all phases.
    pub fn frame_us(&self) -> f64 {
        self.samples.iter().map(|s| s.last_us).sum()
    }

    pub fn reset_peaks(&mut self) {
        for sample in &mut self.samples {
            sample.peak_us = sample.last_us;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peaks_hold_until_reset() {
        let mut profile = PhaseProfile::new();
        profile.record_us(FramePhase::Gesture, 40.0);
        profile.record_us(FramePhase::Gesture, 10.0);
        profile.record_us(FramePhase::Arbiter, 5.0);
        assert_eq!(profile.last_us(FramePhase::Gesture), 10.0);
        assert_eq!(profile.peak_us(FramePhase::Gesture), 40.0);
        assert_eq!(profile.peak_us(FramePhase::Tracking), 0.0);
        assert_eq!(profile.frame_us(), 15.0);

        profile.reset_peaks();
        assert_eq!(profile.peak_us(FramePhase::Gesture), 10.0);
    }

    #[test]
    fn record_measures_a_live_span() {
        let mut profile = PhaseProfile::new();
        profile.record(FramePhase::Tracking, Instant::now());
        assert!(profile.last_us(FramePhase::Tracking) >= 0.0);
    }
}
