//! Report generation for mutation testing results
//!
//! This module formats and displays mutant verdicts and turns survivors into
//! reportable failures.

use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

use crate::error::{MutationError, Result};
use crate::runner::{MutantStatus, MutantVerdict};

/// Summary report of mutation testing
#[derive(Debug, Serialize)]
pub struct MutationReport {
    pub verdicts: Vec<MutantVerdict>,
    #[serde(rename = "total_duration_ms", serialize_with = "crate::runner::as_millis")]
    pub total_duration: Duration,
    #[serde(skip)]
    timeout: Option<Duration>,
}

impl MutationReport {
    /// Create a new report from verdicts
    pub fn new(verdicts: Vec<MutantVerdict>) -> Self {
        let total_duration = verdicts.iter().map(|v| v.duration).sum();
        Self {
            verdicts,
            total_duration,
            timeout: None,
        }
    }

    /// Record the per-mutant limit the verdicts were produced under
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Merge the verdicts of another report into this one
    pub fn extend(&mut self, other: MutationReport) {
        self.total_duration += other.total_duration;
        self.timeout = self.timeout.or(other.timeout);
        self.verdicts.extend(other.verdicts);
    }

    /// Count of mutants that were killed (detected by the suite)
    pub fn killed(&self) -> usize {
        self.verdicts.iter().filter(|v| v.killed()).count()
    }

    /// Count of mutants that survived (not detected by the suite)
    pub fn survived(&self) -> usize {
        self.verdicts.iter().filter(|v| v.survived()).count()
    }

    /// Count of mutants whose run timed out
    pub fn timeouts(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|v| v.status == MutantStatus::TimedOut)
            .count()
    }

    /// Total number of mutants
    pub fn total(&self) -> usize {
        self.verdicts.len()
    }

    /// Calculate mutation score (percentage of killed mutants)
    /// Only considers killed and survived (excludes timeouts)
    pub fn score(&self) -> f64 {
        let testable = self.killed() + self.survived();
        if testable == 0 {
            return 100.0;
        }
        (self.killed() as f64 / testable as f64) * 100.0
    }

    /// Get surviving mutants (test gaps)
    pub fn surviving_mutants(&self) -> Vec<&MutantVerdict> {
        self.verdicts.iter().filter(|v| v.survived()).collect()
    }

    /// One failure per mutant that was not killed, survivors first
    pub fn failures(&self) -> Vec<MutationError> {
        let (survived, timed_out): (Vec<_>, Vec<_>) = self
            .verdicts
            .iter()
            .filter_map(|v| v.failure(self.timeout))
            .partition(|failure| matches!(failure, MutationError::Survived { .. }));
        survived.into_iter().chain(timed_out).collect()
    }

    /// `Ok` if every mutant was killed
    pub fn into_result(self) -> Result<()> {
        let mut failures = self.failures();
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(MutationError::Unkilled { failures }),
        }
    }

    /// Serialize the report as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| MutationError::config(format!("Failed to serialize report: {e}")))
    }

    /// Print the report to stdout
    pub fn print(&self) {
        println!();
        println!("{}", "Mutation Testing Report".bold());
        println!("{}", "=".repeat(60));
        println!();

        for verdict in &self.verdicts {
            let status_str = match &verdict.status {
                MutantStatus::Killed { .. } => "[KILLED]".green().bold(),
                MutantStatus::Survived => "[SURVIVED]".red().bold(),
                MutantStatus::TimedOut => "[TIMEOUT]".yellow().bold(),
            };

            println!(
                "{} {} {}",
                status_str,
                verdict.name,
                format_duration(verdict.duration).dimmed()
            );
            if !verdict.description.is_empty() {
                println!("        {}", verdict.description.dimmed());
            }
            if let MutantStatus::Killed { reason } = &verdict.status {
                println!("        {}", first_line(reason).dimmed());
            }
        }

        println!();
        println!("{}", "Summary".bold());
        println!("{}", "-".repeat(40));
        println!("Total mutants:     {}", self.total());
        println!(
            "Killed:            {} {}",
            self.killed(),
            "(good - the suite caught the mutant)".dimmed()
        );
        println!(
            "Survived:          {} {}",
            self.survived(),
            "(bad - the suite missed the mutant)".dimmed()
        );
        if self.timeouts() > 0 {
            println!("Timeouts:          {}", self.timeouts());
        }

        println!();
        let score = self.score();
        let score_str = format!("{:.1}%", score);
        let score_colored = if score >= 90.0 {
            score_str.green().bold()
        } else if score >= 70.0 {
            score_str.yellow().bold()
        } else {
            score_str.red().bold()
        };
        println!("Mutation Score:    {}", score_colored);
        println!("Duration:          {}", format_duration(self.total_duration));

        let survivors = self.surviving_mutants();
        if !survivors.is_empty() {
            println!();
            println!("{}", "Surviving Mutants (improve your tests!)".red().bold());
            println!("{}", "-".repeat(40));
            for verdict in survivors {
                println!("  • {}", "Test suite passed!".yellow());
                println!("    {}: {}", verdict.name, verdict.description);
            }
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

/// Format duration in a human-readable way
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn verdict(name: &str, status: MutantStatus) -> MutantVerdict {
        MutantVerdict {
            name: name.to_string(),
            description: format!("{name} description"),
            status,
            duration: Duration::from_millis(10),
        }
    }

    fn killed(name: &str) -> MutantVerdict {
        verdict(
            name,
            MutantStatus::Killed {
                reason: "panicked: assertion failed".to_string(),
            },
        )
    }

    #[test]
    fn test_counts_and_score() {
        let report = MutationReport::new(vec![
            killed("A"),
            killed("B"),
            killed("C"),
            verdict("D", MutantStatus::Survived),
            verdict("E", MutantStatus::TimedOut),
        ]);

        assert_eq!(report.total(), 5);
        assert_eq!(report.killed(), 3);
        assert_eq!(report.survived(), 1);
        assert_eq!(report.timeouts(), 1);
        assert_eq!(report.score(), 75.0);
        assert_eq!(report.total_duration, Duration::from_millis(50));
    }

    #[test]
    fn test_empty_report_scores_full() {
        let report = MutationReport::new(Vec::new());
        assert_eq!(report.score(), 100.0);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_single_survivor_is_labeled_failure() {
        let report = MutationReport::new(vec![killed("A"), verdict("NO_MUTATION", MutantStatus::Survived)]);
        let err = report.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Test suite passed!\nNO_MUTATION: NO_MUTATION description"
        );
    }

    #[test]
    fn test_failures_put_survivors_first() {
        let report = MutationReport::new(vec![
            verdict("SLOW", MutantStatus::TimedOut),
            verdict("WEAK", MutantStatus::Survived),
        ])
        .with_timeout(Some(Duration::from_secs(3)));

        let failures = report.failures();
        assert!(matches!(&failures[0], MutationError::Survived { name, .. } if name == "WEAK"));
        assert!(matches!(
            &failures[1],
            MutationError::TimedOut { limit, .. } if *limit == Duration::from_secs(3)
        ));
        assert!(matches!(
            report.into_result(),
            Err(MutationError::Unkilled { failures }) if failures.len() == 2
        ));
    }

    #[test]
    fn test_yaml_output() {
        let report = MutationReport::new(vec![verdict("A", MutantStatus::Survived)]);
        let yaml = report.to_yaml().unwrap();
        assert!(yaml.contains("name: A"));
        assert!(yaml.contains("status: survived"));
        assert!(yaml.contains("duration_ms: 10"));
        assert!(yaml.contains("total_duration_ms: 10"));
    }

    #[test]
    fn test_extend_merges() {
        let mut report = MutationReport::new(vec![killed("A")]);
        report.extend(MutationReport::new(vec![verdict("B", MutantStatus::Survived)]));
        assert_eq!(report.total(), 2);
        assert_eq!(report.survived(), 1);
        assert_eq!(report.total_duration, Duration::from_millis(20));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }
}
