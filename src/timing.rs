// timing.rs — accumulated per-phase timings with an optional lap window

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingKind {
    Initialization,
    Load,
    Render,
    Frame,
    Total,
}

impl TimingKind {
    pub const ALL: [TimingKind; 5] = [
        TimingKind::Initialization,
        TimingKind::Load,
        TimingKind::Render,
        TimingKind::Frame,
        TimingKind::Total,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TimingKind::Initialization => "Initialization",
            TimingKind::Load => "Image load",
            TimingKind::Render => "Render",
            TimingKind::Frame => "Frame",
            TimingKind::Total => "Total",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Accumulator {
    count: u32,
    sum: Duration,
}

impl Accumulator {
    fn add(&mut self, d: Duration) {
        self.count += 1;
        self.sum += d;
    }

    fn average(&self) -> Option<Duration> {
        (self.count > 0).then(|| self.sum / self.count)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimingStats {
    totals: [Accumulator; TimingKind::ALL.len()],
    laps: [Accumulator; TimingKind::ALL.len()],
}

impl TimingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.totals = Default::default();
        self.reset_lap();
    }

    pub fn reset_lap(&mut self) {
        self.laps = Default::default();
    }

    pub fn add(&mut self, kind: TimingKind, d: Duration) {
        self.totals[kind.index()].add(d);
        self.laps[kind.index()].add(d);
    }

    /// Runs `f` and books its wall time under `kind`.
    pub fn time<R>(&mut self, kind: TimingKind, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let r = f();
        self.add(kind, start.elapsed());
        r
    }

    pub fn count(&self, kind: TimingKind) -> u32 {
        self.totals[kind.index()].count
    }

    pub fn average(&self, kind: TimingKind) -> Option<Duration> {
        self.totals[kind.index()].average()
    }

    pub fn lap_average(&self, kind: TimingKind) -> Option<Duration> {
        self.laps[kind.index()].average()
    }

    /// One line per phase that saw at least one sample.
    pub fn report(&self, include_lap: bool) -> Vec<String> {
        TimingKind::ALL
            .iter()
            .filter_map(|&kind| {
                let avg = self.average(kind)?;
                let mut line = format!(
                    "{:>16} {:>5} times averaging {:>12.5}ms",
                    kind.label(),
                    self.count(kind),
                    avg.as_secs_f64() * 1e3
                );
                if kind == TimingKind::Frame {
                    line += &format!(" FPS = {:.2}", fps(avg));
                }
                if include_lap {
                    if let Some(lap) = self.lap_average(kind) {
                        line += &format!(
                            " | {:>5} lap averaging {:>12.5}ms",
                            self.laps[kind.index()].count,
                            lap.as_secs_f64() * 1e3
                        );
                    }
                }
                Some(line)
            })
            .collect()
    }

    pub fn log_report(&self, include_lap: bool) {
        for line in self.report(include_lap) {
            log::info!("{line}");
        }
    }
}

pub fn fps(frame: Duration) -> f64 {
    1.0 / frame.as_secs_f64().max(1e-9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_per_kind() {
        let mut t = TimingStats::new();
        t.add(TimingKind::Render, Duration::from_millis(10));
        t.add(TimingKind::Render, Duration::from_millis(30));
        assert_eq!(t.count(TimingKind::Render), 2);
        assert_eq!(t.average(TimingKind::Render), Some(Duration::from_millis(20)));
        assert_eq!(t.average(TimingKind::Frame), None);
    }

    #[test]
    fn lap_resets_independently() {
        let mut t = TimingStats::new();
        t.add(TimingKind::Frame, Duration::from_millis(40));
        t.reset_lap();
        t.add(TimingKind::Frame, Duration::from_millis(20));
        assert_eq!(t.average(TimingKind::Frame), Some(Duration::from_millis(30)));
        assert_eq!(t.lap_average(TimingKind::Frame), Some(Duration::from_millis(20)));
        t.reset();
        assert_eq!(t.count(TimingKind::Frame), 0);
    }

    #[test]
    fn report_skips_empty_kinds() {
        let mut t = TimingStats::new();
        let v = t.time(TimingKind::Load, || 7);
        assert_eq!(v, 7);
        t.add(TimingKind::Frame, Duration::from_millis(25));
        let lines = t.report(true);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Image load"));
        assert!(lines[1].contains("FPS = 40.00"), "{}", lines[1]);
    }
}
