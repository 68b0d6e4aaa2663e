use serde::Serialize;

/// What happened to one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Renamed,
    WouldRename,
    Unchanged,
    Collision,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    pub disposition: Disposition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct BatchStats {
    pub renamed: usize,
    pub would_rename: usize,
    pub unchanged: usize,
    pub collisions: usize,
    pub failures: usize,
    pub lookup_failures: usize,
}

/// Aggregate outcome of a batch run. Partial success is the normal case:
/// the run is failed as a whole if any file failed, even though other
/// files were renamed.
#[derive(Debug, Clone, Serialize, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    pub stats: BatchStats,
}

impl BatchReport {
    pub fn record(&mut self, report: FileReport) {
        match report.disposition {
            Disposition::Renamed => self.stats.renamed += 1,
            Disposition::WouldRename => self.stats.would_rename += 1,
            Disposition::Unchanged => self.stats.unchanged += 1,
            Disposition::Collision => self.stats.collisions += 1,
            Disposition::Failed => self.stats.failures += 1,
        }
        self.files.push(report);
    }

    /// True if anything went wrong anywhere in the run.
    pub fn failed(&self) -> bool {
        self.stats.collisions > 0 || self.stats.failures > 0 || self.stats.lookup_failures > 0
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let stats = &self.stats;
        let mut parts = Vec::new();
        if stats.would_rename > 0 {
            parts.push(format!("{} would be renamed", stats.would_rename));
        } else {
            parts.push(format!("{} renamed", stats.renamed));
        }
        parts.push(format!("{} unchanged", stats.unchanged));
        let failed = stats.collisions + stats.failures;
        parts.push(format!("{failed} failed"));
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(disposition: Disposition) -> FileReport {
        FileReport {
            path: "a".to_string(),
            new_path: None,
            disposition,
            message: None,
        }
    }

    #[test]
    fn test_record_tallies_stats() {
        let mut report = BatchReport::default();
        report.record(entry(Disposition::Renamed));
        report.record(entry(Disposition::Renamed));
        report.record(entry(Disposition::Unchanged));
        report.record(entry(Disposition::Collision));

        assert_eq!(report.stats.renamed, 2);
        assert_eq!(report.stats.unchanged, 1);
        assert_eq!(report.stats.collisions, 1);
        assert!(report.failed());
        assert_eq!(report.summary(), "2 renamed, 1 unchanged, 1 failed");
    }

    #[test]
    fn test_clean_run_is_not_failed() {
        let mut report = BatchReport::default();
        report.record(entry(Disposition::Renamed));
        report.record(entry(Disposition::Unchanged));
        assert!(!report.failed());
    }

    #[test]
    fn test_lookup_failures_fail_the_run() {
        let mut report = BatchReport::default();
        report.record(entry(Disposition::Unchanged));
        report.stats.lookup_failures = 1;
        assert!(report.failed());
    }

    #[test]
    fn test_dry_run_summary_wording() {
        let mut report = BatchReport::default();
        report.record(entry(Disposition::WouldRename));
        assert_eq!(report.summary(), "1 would be renamed, 0 unchanged, 0 failed");
    }

    #[test]
    fn test_serializes_to_json() {
        let mut report = BatchReport::default();
        report.record(FileReport {
            path: "old.txt".to_string(),
            new_path: Some("new.txt".to_string()),
            disposition: Disposition::Renamed,
            message: None,
        });

        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&report).unwrap()).unwrap();
        assert_eq!(value["files"][0]["disposition"], "renamed");
        assert_eq!(value["files"][0]["new_path"], "new.txt");
        assert_eq!(value["stats"]["renamed"], 1);
    }
}
