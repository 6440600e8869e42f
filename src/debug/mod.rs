pub mod profile;

use self::profile::{FramePhase, PhaseProfile};

/// Seconds of frame time between periodic stats lines.
const LOG_INTERVAL: f64 = 5.0;

/// Smoothing for the average frame time.
const DT_SMOOTHING: f64 = 0.05;

/// Frame counters and phase timings for host overlays, plus a periodic
/// log line. Peaks cover the current log window only.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    pub frame_count: u64,
    /// Smoothed frame time (seconds).
    pub dt_avg: f64,
    /// Longest frame time (seconds) in the current log window.
    pub dt_peak: f64,
    pub profile: PhaseProfile,

    window_elapsed: f64,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one frame's dt; logs and opens a new window every few seconds.
    pub fn record_frame(&mut self, dt: f64, entity_count: usize) {
        self.dt_avg = if self.frame_count == 0 {
            dt
        } else {
            self.dt_avg + (dt - self.dt_avg) * DT_SMOOTHING
        };
        self.frame_count += 1;
        self.dt_peak = self.dt_peak.max(dt);

        self.window_elapsed += dt;
        if self.window_elapsed < LOG_INTERVAL {
            return;
        }
        let phases: Vec<String> = FramePhase::ALL
            .iter()
            .map(|&p| {
                format!(
                    "{} {:.0}us/{:.0}us",
                    p.label(),
                    self.profile.last_us(p),
                    self.profile.peak_us(p)
                )
            })
            .collect();
        log::info!(
            "frames: {} | critters: {} | dt {:.2}ms (peak {:.2}ms) | {}",
            self.frame_count,
            entity_count,
            self.dt_avg * 1000.0,
            self.dt_peak * 1000.0,
            phases.join(" | "),
        );
        self.window_elapsed = 0.0;
        self.dt_peak = 0.0;
        self.profile.reset_peaks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_seeds_the_average() {
        let mut stats = FrameStats::new();
        stats.record_frame(0.02, 0);
        assert_eq!(stats.dt_avg, 0.02);
        stats.record_frame(0.04, 0);
        assert!((stats.dt_avg - 0.021).abs() < 1e-12);
        assert_eq!(stats.dt_peak, 0.04);
        assert_eq!(stats.frame_count, 2);
    }

    #[test]
    fn peak_resets_each_log_window() {
        let mut stats = FrameStats::new();
        stats.record_frame(0.5, 0);
        for _ in 0..9 {
            stats.record_frame(0.5, 3);
        }
        assert_eq!(stats.dt_peak, 0.0);
        stats.record_frame(0.1, 3);
        assert_eq!(stats.dt_peak, 0.1);
    }
}
