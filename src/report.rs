//! Consolidated run report
//!
//! A [`RunReport`] holds one [`PublicationResult`] per publication, in input
//! order, plus a classified summary. Failures are split by whether someone has
//! to act:
//!
//! - hard: source authentication, tracking store, aborted or crashed
//!   publications, malformed documents
//! - soft: discovery or download failures that the next run retries,
//!   recipient failures listed for manual resend, and archive failures

use crate::types::{ArchiveOutcome, DeliveryOutcome, PublicationResult, PublicationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts over all publications of a run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Publications in the run
    pub publications: usize,
    /// Editions processed (possibly with recipient failures)
    pub processed: usize,
    /// Publications with nothing to do
    pub skipped: usize,
    /// Publications whose pipeline stopped
    pub failed: usize,
    /// Failed publications that need operator action
    pub needs_action: usize,
    /// Failed (recipient, channel) deliveries
    pub recipient_failures: usize,
    /// Editions whose archival failed
    pub archive_failures: usize,
}

/// Outcome of one run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Produced by a dry run
    pub dry_run: bool,
    /// Classified counts
    pub summary: RunSummary,
    /// One result per publication, in input order
    pub results: Vec<PublicationResult>,
}

impl RunReport {
    /// Build the report for `results`
    pub fn new(results: Vec<PublicationResult>, dry_run: bool, started_at: DateTime<Utc>) -> Self {
        let mut summary = RunSummary {
            publications: results.len(),
            ..RunSummary::default()
        };

        for result in &results {
            match &result.status {
                PublicationStatus::Processed => summary.processed += 1,
                PublicationStatus::Skipped { .. } => summary.skipped += 1,
                PublicationStatus::Failed { kind, .. } => {
                    summary.failed += 1;
                    if kind.needs_action() {
                        summary.needs_action += 1;
                    }
                }
            }
            summary.recipient_failures += result.failures().count();
            if matches!(result.archive, ArchiveOutcome::Failed { .. }) {
                summary.archive_failures += 1;
            }
        }

        Self {
            started_at,
            finished_at: Utc::now(),
            dry_run,
            summary,
            results,
        }
    }

    /// Whether an operator has to step in
    pub fn needs_action(&self) -> bool {
        self.summary.needs_action > 0
    }

    /// Result for one publication
    pub fn result_for(&self, publication_id: &str) -> Option<&PublicationResult> {
        self.results
            .iter()
            .find(|r| r.publication_id == publication_id)
    }

    /// Failed publications that need operator action
    pub fn hard_failures(&self) -> impl Iterator<Item = &PublicationResult> {
        self.results.iter().filter(|r| {
            matches!(&r.status, PublicationStatus::Failed { kind, .. } if kind.needs_action())
        })
    }

    /// Failed publications the next run will retry on its own
    pub fn soft_failures(&self) -> impl Iterator<Item = &PublicationResult> {
        self.results.iter().filter(|r| {
            matches!(&r.status, PublicationStatus::Failed { kind, .. } if !kind.needs_action())
        })
    }

    /// Every failed (publication, delivery) pair, for manual resend
    pub fn recipient_failures(&self) -> impl Iterator<Item = (&str, &DeliveryOutcome)> {
        self.results
            .iter()
            .flat_map(|r| r.failures().map(move |d| (r.publication_id.as_str(), d)))
    }

    /// Human-readable summary
    pub fn render(&self) -> String {
        let mut lines = Vec::new();

        lines.push(if self.dry_run {
            "Edition delivery report (dry run)".to_string()
        } else {
            "Edition delivery report".to_string()
        });
        lines.push(format!(
            "Publications: {} processed, {} skipped, {} failed",
            self.summary.processed, self.summary.skipped, self.summary.failed
        ));

        let hard: Vec<_> = self.hard_failures().collect();
        if !hard.is_empty() {
            lines.push(String::new());
            lines.push("NEEDS ACTION".to_string());
            for result in hard {
                lines.push(format!("  - {}", failure_line(result)));
            }
        }

        let processed: Vec<_> = self.results.iter().filter(|r| r.is_processed()).collect();
        if !processed.is_empty() {
            lines.push(String::new());
            lines.push("Processed".to_string());
            for result in processed {
                let title = result
                    .edition
                    .as_ref()
                    .map(|e| e.title.as_str())
                    .unwrap_or("?");
                let counts = &result.counts;
                lines.push(format!(
                    "  - {} \"{}\": notify {} ok / {} failed, drop-off {} ok / {} failed, archive: {}",
                    result.publication_id,
                    title,
                    counts.notified,
                    counts.notify_failed,
                    counts.dropped_off,
                    counts.dropoff_failed,
                    archive_label(&result.archive)
                ));
                if counts.already_delivered > 0 {
                    lines.push(format!(
                        "      {} deliveries already made by an earlier run",
                        counts.already_delivered
                    ));
                }
            }
        }

        let skipped: Vec<_> = self
            .results
            .iter()
            .filter_map(|r| match &r.status {
                PublicationStatus::Skipped { reason } => Some((r, reason)),
                _ => None,
            })
            .collect();
        if !skipped.is_empty() {
            lines.push(String::new());
            lines.push("Skipped".to_string());
            for (result, reason) in skipped {
                lines.push(format!("  - {}: {}", result.publication_id, reason));
            }
        }

        let soft: Vec<_> = self.soft_failures().collect();
        if !soft.is_empty() {
            lines.push(String::new());
            lines.push("Failed (retried next run)".to_string());
            for result in soft {
                lines.push(format!("  - {}", failure_line(result)));
            }
        }

        let resend: Vec<_> = self.recipient_failures().collect();
        if !resend.is_empty() {
            lines.push(String::new());
            lines.push("Recipient failures (manual resend)".to_string());
            for (publication_id, delivery) in resend {
                lines.push(format!(
                    "  - {} -> {} [{}]: {}",
                    publication_id,
                    delivery.recipient,
                    delivery.channel,
                    delivery.error.as_deref().unwrap_or("unknown error")
                ));
            }
        }

        lines.join("\n")
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

fn failure_line(result: &PublicationResult) -> String {
    match &result.status {
        PublicationStatus::Failed { error, kind } => {
            format!("{} [{}]: {}", result.publication_id, kind.as_str(), error)
        }
        _ => result.publication_id.clone(),
    }
}

fn archive_label(outcome: &ArchiveOutcome) -> String {
    match outcome {
        ArchiveOutcome::Archived { location, .. } => format!("archived ({})", location),
        ArchiveOutcome::AlreadyArchived { .. } => "archived by an earlier run".to_string(),
        ArchiveOutcome::Failed { error } => format!("failed, non-blocking ({})", error),
        ArchiveOutcome::NotConfigured => "not configured".to_string(),
        ArchiveOutcome::Simulated => "would archive".to_string(),
        ArchiveOutcome::NotAttempted => "not attempted".to_string(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, ChannelCounts, Edition, FailureKind, SkipReason};
    use chrono::NaiveDate;

    fn processed(id: &str, archive: ArchiveOutcome, deliveries: Vec<DeliveryOutcome>) -> PublicationResult {
        let mut counts = ChannelCounts::default();
        for d in &deliveries {
            match (d.channel, d.success) {
                (Channel::Notify, true) => counts.notified += 1,
                (Channel::Notify, false) => counts.notify_failed += 1,
                (Channel::Dropoff, true) => counts.dropped_off += 1,
                (Channel::Dropoff, false) => counts.dropoff_failed += 1,
                _ => {}
            }
        }
        PublicationResult {
            publication_id: id.to_string(),
            success: true,
            status: PublicationStatus::Processed,
            edition: Some(Edition {
                title: "MF 10/2026".to_string(),
                issue: "Issue 10/2026".to_string(),
                publication_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
                source_ref: "ref".to_string(),
            }),
            edition_key: None,
            counts,
            archive,
            deliveries,
            dry_run: false,
        }
    }

    fn sample() -> RunReport {
        RunReport::new(
            vec![
                processed(
                    "mf",
                    ArchiveOutcome::Failed {
                        error: "bucket unavailable".to_string(),
                    },
                    vec![
                        DeliveryOutcome::delivered("alice@example.com", Channel::Notify, None),
                        DeliveryOutcome::failed("bob@example.com", Channel::Dropoff, "quota exceeded"),
                    ],
                ),
                PublicationResult::skipped("weekly", SkipReason::AlreadyProcessed, None, None),
                PublicationResult::failed("daily", FailureKind::Download, "404 not found"),
                PublicationResult::failed("monthly", FailureKind::Authentication, "bad password"),
            ],
            false,
            Utc::now(),
        )
    }

    #[test]
    fn summary_classifies_every_publication() {
        let report = sample();
        assert_eq!(
            report.summary,
            RunSummary {
                publications: 4,
                processed: 1,
                skipped: 1,
                failed: 2,
                needs_action: 1,
                recipient_failures: 1,
                archive_failures: 1,
            }
        );
        assert!(report.needs_action());
    }

    #[test]
    fn hard_and_soft_failures_are_separated() {
        let report = sample();
        let hard: Vec<_> = report.hard_failures().map(|r| r.publication_id.as_str()).collect();
        let soft: Vec<_> = report.soft_failures().map(|r| r.publication_id.as_str()).collect();
        assert_eq!(hard, vec!["monthly"]);
        assert_eq!(soft, vec!["daily"]);
    }

    #[test]
    fn render_lists_channels_archive_and_resends() {
        let text = sample().render();

        assert!(text.contains("1 processed, 1 skipped, 2 failed"));
        assert!(text.contains("NEEDS ACTION\n  - monthly [authentication]: bad password"));
        assert!(text.contains("notify 1 ok / 0 failed, drop-off 0 ok / 1 failed"));
        assert!(text.contains("archive: failed, non-blocking (bucket unavailable)"));
        assert!(text.contains("  - weekly: already processed"));
        assert!(text.contains("  - daily [download]: 404 not found"));
        assert!(text.contains("mf -> bob@example.com [dropoff]: quota exceeded"));

        // Hard failures come before everything else
        let action = text.find("NEEDS ACTION").unwrap();
        let processed = text.find("Processed").unwrap();
        assert!(action < processed);
    }

    #[test]
    fn archive_outcomes_are_labelled_distinctly() {
        assert_eq!(archive_label(&ArchiveOutcome::NotConfigured), "not configured");
        assert_eq!(
            archive_label(&ArchiveOutcome::Archived {
                location: "/a/mf/2026/x.pdf".to_string(),
                container: None
            }),
            "archived (/a/mf/2026/x.pdf)"
        );
    }

    #[test]
    fn report_serializes_with_tagged_statuses() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["summary"]["processed"], 1);
        assert_eq!(json["results"][0]["status"]["state"], "processed");
        assert_eq!(json["results"][0]["archive"]["status"], "failed");
        assert_eq!(json["results"][1]["status"]["reason"], "already_processed");
        assert_eq!(json["results"][3]["status"]["kind"], "authentication");
    }

    #[test]
    fn empty_run_renders_header_only() {
        let report = RunReport::new(vec![], true, Utc::now());
        assert_eq!(
            report.render(),
            "Edition delivery report (dry run)\nPublications: 0 processed, 0 skipped, 0 failed"
        );
    }
}
