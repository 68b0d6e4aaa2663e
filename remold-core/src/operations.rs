//! The batch driver: applies a compiled rule to each input path in order
//! and performs the renames. Single-threaded by design; the only state
//! shared across iterations is the run context, the directory-creation set
//! and the accumulated report. Failures are isolated per file and there is
//! no rollback of renames already performed.

use crate::quote::shell_quote;
use crate::report::{BatchReport, Disposition, FileReport};
use crate::rule::{CompiledRule, RunContext};
use crate::transforms::probe_exists;
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Print what would be done instead of doing it.
    pub dry_run: bool,
    /// Allow renaming over an existing file.
    pub force: bool,
    /// Create missing destination directories.
    pub make_dirs: bool,
    /// Report each rename on stdout.
    pub verbose: bool,
    /// Run `PROGRAM OLD NEW` instead of renaming directly.
    pub rename_command: Option<String>,
}

/// Process `files` in order with one rule application each. Per-file
/// failures (collision, mkdir, rename) are reported and counted but do not
/// stop the batch; a runtime error inside the rule itself aborts the run.
pub fn run_batch(
    rule: &CompiledRule,
    files: &[String],
    options: &BatchOptions,
) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    let mut ctx = RunContext::new();
    let mut created_dirs: HashSet<PathBuf> = HashSet::new();

    for old in files {
        let new = rule
            .apply(Path::new(old), old, &mut ctx)
            .with_context(|| format!("rule failed on {}", shell_quote(old)))?;

        if new == *old {
            if options.verbose {
                println!("{} unchanged", shell_quote(old));
            }
            report.record(FileReport {
                path: old.clone(),
                new_path: None,
                disposition: Disposition::Unchanged,
                message: None,
            });
            continue;
        }

        if new.is_empty() {
            eprintln!("remold: {} would have an empty name", shell_quote(old));
            report.record(FileReport {
                path: old.clone(),
                new_path: None,
                disposition: Disposition::Failed,
                message: Some("empty new name".to_string()),
            });
            continue;
        }

        if !options.force
            && probe_exists(Path::new(&new))
                .with_context(|| format!("cannot check {}", shell_quote(&new)))?
        {
            eprintln!(
                "remold: {} not renamed: {} already exists",
                shell_quote(old),
                shell_quote(&new)
            );
            report.record(FileReport {
                path: old.clone(),
                new_path: Some(new),
                disposition: Disposition::Collision,
                message: Some("destination already exists".to_string()),
            });
            continue;
        }

        if options.make_dirs {
            if let Err(message) = ensure_parent_dir(Path::new(&new), &mut created_dirs) {
                eprintln!("remold: {message}");
                report.record(FileReport {
                    path: old.clone(),
                    new_path: Some(new),
                    disposition: Disposition::Failed,
                    message: Some(message),
                });
                continue;
            }
        }

        if options.dry_run {
            let program = options.rename_command.as_deref().unwrap_or("mv");
            println!("{} {} {}", program, shell_quote(old), shell_quote(&new));
            report.record(FileReport {
                path: old.clone(),
                new_path: Some(new),
                disposition: Disposition::WouldRename,
                message: None,
            });
            continue;
        }

        match rename_file(old, &new, options.rename_command.as_deref()) {
            Ok(()) => {
                if options.verbose {
                    println!("{} renamed as {}", shell_quote(old), shell_quote(&new));
                }
                report.record(FileReport {
                    path: old.clone(),
                    new_path: Some(new),
                    disposition: Disposition::Renamed,
                    message: None,
                });
            },
            Err(e) => {
                eprintln!("remold: {e:#}");
                report.record(FileReport {
                    path: old.clone(),
                    new_path: Some(new),
                    disposition: Disposition::Failed,
                    message: Some(format!("{e:#}")),
                });
            },
        }
    }

    report.stats.lookup_failures = ctx.lookup_failures();
    Ok(report)
}

/// Create the destination's parent directory unless this run already did.
/// The set is consulted first so a thousand files landing in one new
/// directory cost one `create_dir_all`.
fn ensure_parent_dir(
    new_path: &Path,
    created_dirs: &mut HashSet<PathBuf>,
) -> std::result::Result<(), String> {
    let Some(parent) = new_path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || created_dirs.contains(parent) {
        return Ok(());
    }
    fs::create_dir_all(parent).map_err(|e| {
        format!(
            "cannot create directory {}: {}",
            shell_quote(&parent.to_string_lossy()),
            e
        )
    })?;
    created_dirs.insert(parent.to_path_buf());
    Ok(())
}

fn rename_file(old: &str, new: &str, command: Option<&str>) -> Result<()> {
    match command {
        Some(command) => {
            // "git mv" style commands: first word is the program, the rest
            // are leading arguments; OLD and NEW are appended.
            let mut words = command.split_whitespace();
            let Some(program) = words.next() else {
                bail!("rename command is empty");
            };
            let status = Command::new(program)
                .args(words)
                .arg(old)
                .arg(new)
                .status()
                .with_context(|| format!("failed to run {}", shell_quote(program)))?;
            if !status.success() {
                bail!(
                    "{} {} {}: {}",
                    command,
                    shell_quote(old),
                    shell_quote(new),
                    status
                );
            }
            Ok(())
        },
        None => fs::rename(old, new).with_context(|| {
            format!(
                "cannot rename {} to {}",
                shell_quote(old),
                shell_quote(new)
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::compile;
    use std::fs::File;
    use tempfile::TempDir;

    fn rule(text: &str) -> CompiledRule {
        compile(&[text.to_string()]).unwrap()
    }

    fn touch(path: &Path) {
        File::create(path).unwrap();
    }

    #[test]
    fn test_rename_and_unchanged() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().to_str().unwrap();
        touch(&dir.path().join("qqold.txt"));
        touch(&dir.path().join("other.txt"));

        let files = vec![format!("{base}/qqold.txt"), format!("{base}/other.txt")];
        let report = run_batch(&rule("s/qqold/qqnew/"), &files, &BatchOptions::default()).unwrap();

        assert_eq!(report.stats.renamed, 1);
        assert_eq!(report.stats.unchanged, 1);
        assert!(!report.failed());
        assert!(dir.path().join("qqnew.txt").exists());
        assert!(!dir.path().join("qqold.txt").exists());
        assert!(dir.path().join("other.txt").exists());
    }

    #[test]
    fn test_collision_is_reported_and_skipped() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().to_str().unwrap();
        touch(&dir.path().join("qqold.txt"));
        touch(&dir.path().join("qqnew.txt"));

        let files = vec![format!("{base}/qqold.txt")];
        let report = run_batch(&rule("s/qqold/qqnew/"), &files, &BatchOptions::default()).unwrap();

        assert_eq!(report.stats.collisions, 1);
        assert!(report.failed());
        // Both files untouched
        assert!(dir.path().join("qqold.txt").exists());
        assert!(dir.path().join("qqnew.txt").exists());
    }

    #[test]
    fn test_force_overwrites_collision() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().to_str().unwrap();
        touch(&dir.path().join("qqold.txt"));
        touch(&dir.path().join("qqnew.txt"));

        let options = BatchOptions {
            force: true,
            ..BatchOptions::default()
        };
        let files = vec![format!("{base}/qqold.txt")];
        let report = run_batch(&rule("s/qqold/qqnew/"), &files, &options).unwrap();

        assert_eq!(report.stats.renamed, 1);
        assert!(!report.failed());
        assert!(!dir.path().join("qqold.txt").exists());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().to_str().unwrap();
        touch(&dir.path().join("qqold.txt"));

        let options = BatchOptions {
            dry_run: true,
            ..BatchOptions::default()
        };
        let files = vec![format!("{base}/qqold.txt")];
        let report = run_batch(&rule("s/qqold/qqnew/"), &files, &options).unwrap();

        assert_eq!(report.stats.would_rename, 1);
        assert!(dir.path().join("qqold.txt").exists());
        assert!(!dir.path().join("qqnew.txt").exists());
    }

    #[test]
    fn test_make_dirs_creates_destination_parent() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().to_str().unwrap();
        touch(&dir.path().join("qqold.txt"));
        touch(&dir.path().join("qqtwo.txt"));

        let options = BatchOptions {
            make_dirs: true,
            ..BatchOptions::default()
        };
        let files = vec![format!("{base}/qqold.txt"), format!("{base}/qqtwo.txt")];
        let report = run_batch(&rule("s|/qq|/sorted/qq|"), &files, &options).unwrap();

        assert_eq!(report.stats.renamed, 2);
        assert!(dir.path().join("sorted/qqold.txt").exists());
        assert!(dir.path().join("sorted/qqtwo.txt").exists());
    }

    #[test]
    fn test_missing_parent_without_make_dirs_fails_per_file() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().to_str().unwrap();
        touch(&dir.path().join("qqold.txt"));
        touch(&dir.path().join("qqtwo.txt"));

        let files = vec![format!("{base}/qqold.txt"), format!("{base}/qqtwo.txt")];
        let report = run_batch(&rule("s|/qqold|/missing/qqold|"), &files, &BatchOptions::default())
            .unwrap();

        // First file fails, second is unchanged by the rule and skipped
        assert_eq!(report.stats.failures, 1);
        assert_eq!(report.stats.unchanged, 1);
        assert!(report.failed());
        assert!(dir.path().join("qqold.txt").exists());
    }

    #[test]
    fn test_empty_new_name_is_a_failure() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().to_str().unwrap();
        touch(&dir.path().join("qqold.txt"));

        let files = vec![format!("{base}/qqold.txt")];
        let report = run_batch(&rule("s/.*/x/; s/x//"), &files, &BatchOptions::default());
        let report = report.unwrap();

        assert_eq!(report.stats.failures, 1);
        assert!(dir.path().join("qqold.txt").exists());
    }

    #[test]
    fn test_alternate_command_is_invoked() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().to_str().unwrap();
        touch(&dir.path().join("qqold.txt"));

        let options = BatchOptions {
            rename_command: Some("cp".to_string()),
            ..BatchOptions::default()
        };
        let files = vec![format!("{base}/qqold.txt")];
        let report = run_batch(&rule("s/qqold/qqnew/"), &files, &options).unwrap();

        assert_eq!(report.stats.renamed, 1);
        // cp keeps the source in place
        assert!(dir.path().join("qqold.txt").exists());
        assert!(dir.path().join("qqnew.txt").exists());
    }

    #[test]
    fn test_failing_command_is_a_per_file_failure() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().to_str().unwrap();
        touch(&dir.path().join("qqold.txt"));

        let options = BatchOptions {
            rename_command: Some("false".to_string()),
            ..BatchOptions::default()
        };
        let files = vec![format!("{base}/qqold.txt")];
        let report = run_batch(&rule("s/qqold/qqnew/"), &files, &options).unwrap();

        assert_eq!(report.stats.failures, 1);
        assert!(report.failed());
    }

    #[test]
    fn test_unique_avoids_collision_entirely() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().to_str().unwrap();
        touch(&dir.path().join("qqold.txt"));
        touch(&dir.path().join("qqnew.txt"));

        let files = vec![format!("{base}/qqold.txt")];
        let report =
            run_batch(&rule("s/qqold/qqnew/; unique"), &files, &BatchOptions::default()).unwrap();

        assert_eq!(report.stats.renamed, 1);
        assert!(!report.failed());
        assert!(dir.path().join("qqnew#1.txt").exists());
    }
}
