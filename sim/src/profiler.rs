//! Per-phase tick timing.
//!
//! When enabled on a [`crate::SimWorld`], every tick records how long each
//! phase took:
//!
//! - `commands` - command drain and follow sync
//! - `activation` - hot/warm chunk rebuild
//! - `systems` - gameplay systems
//! - `snapshot` - capture and rotation
//!
//! ```rust
//! use strata_sim::SimWorld;
//!
//! let mut sim = SimWorld::new();
//! sim.enable_profiling(true);
//! sim.set_paused(true);
//! sim.step_ticks(10);
//! if let Some(profiler) = sim.profiler() {
//!     println!("{}", profiler.summary());
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

pub const PHASE_COMMANDS: &str = "commands";
pub const PHASE_ACTIVATION: &str = "activation";
pub const PHASE_SYSTEMS: &str = "systems";
pub const PHASE_SNAPSHOT: &str = "snapshot";

/// Collects timings for named sections.
#[derive(Debug, Default)]
pub struct Profiler {
    sections: BTreeMap<&'static str, SectionStats>,
    tick_count: u64,
}

/// Statistics for a profiled section
#[derive(Debug, Default, Clone)]
pub struct SectionStats {
    pub total_time: Duration,
    pub call_count: u64,
    pub min_time: Option<Duration>,
    pub max_time: Option<Duration>,
}

impl SectionStats {
    pub fn avg_time(&self) -> Duration {
        if self.call_count == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.call_count as u32
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.total_time += elapsed;
        self.call_count += 1;
        self.min_time = Some(self.min_time.map_or(elapsed, |m| m.min(elapsed)));
        self.max_time = Some(self.max_time.map_or(elapsed, |m| m.max(elapsed)));
    }
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time a section using a closure.
    pub fn time_section<F, R>(&mut self, name: &'static str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.sections.entry(name).or_default().record(start.elapsed());
        result
    }

    pub fn tick(&mut self) {
        self.tick_count += 1;
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn get_section(&self, name: &str) -> Option<&SectionStats> {
        self.sections.get(name)
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.keys().copied().collect()
    }

    /// Render a table of all sections, slowest first.
    pub fn summary(&self) -> String {
        let mut sections: Vec<_> = self.sections.iter().collect();
        sections.sort_by(|a, b| b.1.total_time.cmp(&a.1.total_time));
        let total: Duration = sections.iter().map(|(_, s)| s.total_time).sum();

        let mut out = String::new();
        let _ = writeln!(out, "=== Profiler Summary ({} ticks) ===", self.tick_count);
        let _ = writeln!(
            out,
            "{:<12} {:>10} {:>10} {:>10} {:>10} {:>8}",
            "Section", "Total", "Avg", "Min", "Max", "% Time"
        );
        for (name, stats) in &sections {
            let pct = if total.as_nanos() > 0 {
                stats.total_time.as_nanos() as f64 / total.as_nanos() as f64 * 100.0
            } else {
                0.0
            };
            let _ = writeln!(
                out,
                "{:<12} {:>10.2?} {:>10.2?} {:>10.2?} {:>10.2?} {:>7.1}%",
                name,
                stats.total_time,
                stats.avg_time(),
                stats.min_time.unwrap_or(Duration::ZERO),
                stats.max_time.unwrap_or(Duration::ZERO),
                pct
            );
        }
        out
    }

    pub fn reset(&mut self) {
        self.sections.clear();
        self.tick_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_profiler_basic() {
        let mut profiler = Profiler::new();
        profiler.time_section(PHASE_COMMANDS, || sleep(Duration::from_millis(5)));
        profiler.tick();

        let stats = profiler.get_section(PHASE_COMMANDS).unwrap();
        assert!(stats.total_time >= Duration::from_millis(5));
        assert_eq!(stats.call_count, 1);
        assert_eq!(profiler.tick_count(), 1);
    }

    #[test]
    fn test_summary_lists_sections() {
        let mut profiler = Profiler::new();
        for _ in 0..3 {
            profiler.time_section(PHASE_SYSTEMS, || ());
            profiler.time_section(PHASE_SNAPSHOT, || ());
            profiler.tick();
        }
        let summary = profiler.summary();
        assert!(summary.contains("3 ticks"));
        assert!(summary.contains(PHASE_SYSTEMS));
        assert_eq!(profiler.section_names(), vec![PHASE_SNAPSHOT, PHASE_SYSTEMS]);

        profiler.reset();
        assert!(profiler.get_section(PHASE_SYSTEMS).is_none());
    }
}
