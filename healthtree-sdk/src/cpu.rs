//! Per-CPU load monitoring.

use std::fmt;
use std::io;
use std::path::PathBuf;

use healthtree_types::{Level, StatusReport};
use parking_lot::Mutex;

use crate::task::{add_value, summary, StatusTask};

/// Where CPU load figures come from.
pub trait LoadSource: Send + Sync + fmt::Debug {
    /// Busy percentage of every CPU since the previous call.
    fn per_cpu_percent(&self) -> io::Result<Vec<f64>>;
}

/// Cumulative jiffies of one CPU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CpuTimes {
    busy: u64,
    total: u64,
}

/// Per-CPU lines (`cpu0`, `cpu1`, ...) of a `/proc/stat` dump.
fn parse_proc_stat(text: &str) -> Vec<CpuTimes> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let label = fields.next()?;
            let index = label.strip_prefix("cpu")?;
            if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }

            let jiffies: Vec<u64> = fields.map_while(|f| f.parse().ok()).collect();
            if jiffies.len() < 4 {
                return None;
            }
            let total: u64 = jiffies.iter().sum();
            // idle + iowait
            let idle = jiffies[3] + jiffies.get(4).copied().unwrap_or(0);
            Some(CpuTimes {
                busy: total.saturating_sub(idle),
                total,
            })
        })
        .collect()
}

/// Linux load from `/proc/stat`, as the difference between two reads.
///
/// The first read compares against boot, so it yields the average since then.
#[derive(Debug)]
pub struct ProcStat {
    path: PathBuf,
    previous: Mutex<Vec<CpuTimes>>,
}

impl ProcStat {
    pub fn new() -> Self {
        Self::at("/proc/stat")
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            previous: Mutex::new(Vec::new()),
        }
    }
}

impl Default for ProcStat {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadSource for ProcStat {
    fn per_cpu_percent(&self) -> io::Result<Vec<f64>> {
        let current = parse_proc_stat(&std::fs::read_to_string(&self.path)?);
        let mut previous = self.previous.lock();

        let percents = current
            .iter()
            .enumerate()
            .map(|(i, now)| {
                let before = previous.get(i).copied().unwrap_or_default();
                let total = now.total.saturating_sub(before.total);
                let busy = now.busy.saturating_sub(before.busy);
                if total == 0 {
                    0.0
                } else {
                    100.0 * busy as f64 / total as f64
                }
            })
            .collect();

        *previous = current;
        Ok(percents)
    }
}

/// Warns when any single CPU is busier than a threshold.
#[derive(Debug)]
pub struct CpuTask {
    warning_percentage: u32,
    source: Box<dyn LoadSource>,
}

impl CpuTask {
    /// Read `/proc/stat`, warning above `warning_percentage`.
    pub fn new(warning_percentage: u32) -> Self {
        Self::with_source(warning_percentage, ProcStat::new())
    }

    pub fn with_source(warning_percentage: u32, source: impl LoadSource + 'static) -> Self {
        Self {
            warning_percentage,
            source: Box::new(source),
        }
    }
}

impl StatusTask for CpuTask {
    fn name(&self) -> &str {
        "CPU Information"
    }

    fn run(&self, report: &mut StatusReport) {
        let loads = match self.source.per_cpu_percent() {
            Ok(loads) if !loads.is_empty() => loads,
            Ok(_) => return summary(report, Level::Error, "No CPU load available"),
            Err(e) => return summary(report, Level::Error, format!("Failed to read CPU load: {}", e)),
        };

        let average = loads.iter().sum::<f64>() / loads.len() as f64;
        add_value(report, "CPU Load Average", format!("{:.1}", average));

        let threshold = f64::from(self.warning_percentage);
        let mut warn = false;
        for (i, load) in loads.iter().enumerate() {
            add_value(report, &format!("CPU {} Load", i), format!("{:.1}", load));
            warn |= *load > threshold;
        }

        if warn {
            summary(
                report,
                Level::Warn,
                format!("At least one CPU exceeds {} percent", self.warning_percentage),
            );
        } else {
            summary(report, Level::Ok, format!("CPU Average {:.1} percent", average));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(Debug)]
    struct Fixed(io::Result<Vec<f64>>);

    impl LoadSource for Fixed {
        fn per_cpu_percent(&self) -> io::Result<Vec<f64>> {
            match &self.0 {
                Ok(loads) => Ok(loads.clone()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    fn run(task: &CpuTask) -> StatusReport {
        let mut report = StatusReport::new(task.name(), Level::Ok, "");
        task.run(&mut report);
        report
    }

    #[test]
    fn average_below_threshold_is_ok() {
        let report = run(&CpuTask::with_source(90, Fixed(Ok(vec![10.0, 30.0]))));
        assert_eq!(report.name, "CPU Information");
        assert_eq!(report.level, Level::Ok);
        assert_eq!(report.message, "CPU Average 20.0 percent");
        assert_eq!(report.value("CPU Load Average"), Some("20.0"));
        assert_eq!(report.value("CPU 1 Load"), Some("30.0"));
    }

    #[test]
    fn one_busy_cpu_warns() {
        let report = run(&CpuTask::with_source(90, Fixed(Ok(vec![5.0, 95.5]))));
        assert_eq!(report.level, Level::Warn);
        assert_eq!(report.message, "At least one CPU exceeds 90 percent");
    }

    #[test]
    fn unreadable_source_is_an_error() {
        let failing = Fixed(Err(io::Error::new(io::ErrorKind::NotFound, "gone")));
        let report = run(&CpuTask::with_source(90, failing));
        assert_eq!(report.level, Level::Error);
        assert_eq!(report.message, "Failed to read CPU load: gone");

        let report = run(&CpuTask::with_source(90, Fixed(Ok(vec![]))));
        assert_eq!(report.message, "No CPU load available");
    }

    #[test]
    fn parses_per_cpu_lines_only() {
        let text = "cpu  10 0 10 80 0 0 0 0 0 0\n\
                    cpu0 5 0 5 40 0 0 0 0 0 0\n\
                    cpu1 1 1 1 1 4 0 0 0 0 0\n\
                    intr 12345\n\
                    cpuX 1 2 3 4\n";
        assert_eq!(
            parse_proc_stat(text),
            [
                CpuTimes { busy: 10, total: 50 },
                CpuTimes { busy: 3, total: 8 }
            ]
        );
    }

    #[test]
    fn proc_stat_reports_difference_between_reads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cpu0 10 0 10 80 0").unwrap();
        let source = ProcStat::at(file.path());
        assert_eq!(source.per_cpu_percent().unwrap(), [20.0]);

        std::fs::write(file.path(), "cpu0 40 0 40 120 0\n").unwrap();
        assert_eq!(source.per_cpu_percent().unwrap(), [60.0]);
    }
}
