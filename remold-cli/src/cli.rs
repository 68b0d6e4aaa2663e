use clap::{Parser, ValueEnum};
use remold_core::{quote_literal, CleanMode};

/// Batch-rename files by applying a rewrite rule to each name
///
/// The rule is either given inline (`-e`, or shorthand flags that expand to
/// rule statements) or as the first positional argument. Remaining operands
/// are the files to rename; with none, names are read from stdin, one per
/// line.
#[derive(Parser, Debug)]
#[command(name = "remold")]
#[command(author, version, about)]
pub struct Cli {
    /// Rule statement to apply; may be repeated, statements run in order
    #[arg(short = 'e', long = "expr", value_name = "RULE")]
    pub expr: Vec<String>,

    /// Convert each name to lowercase
    #[arg(short = 'l', long)]
    pub lowercase: bool,

    /// Remove characters that are unsafe in filenames
    #[arg(short = 'c', long)]
    pub clean: bool,

    /// Collapse runs of unsafe characters into `_` instead of removing them
    #[arg(long, requires = "clean")]
    pub collapse: bool,

    /// Percent-encode characters that are unsafe in filenames
    #[arg(long = "url-encode")]
    pub url_encode: bool,

    /// Add `#N` counters until the new name does not already exist
    #[arg(long)]
    pub unique: bool,

    /// Replace each name with a zero-padded sequence number of this width
    #[arg(short = 'N', long, value_name = "WIDTH")]
    pub renumber: Option<usize>,

    /// Prepend TEXT to each name
    #[arg(short = 'p', long, value_name = "TEXT")]
    pub prefix: Option<String>,

    /// File each name into a YYYY-MM-DD/ subdirectory from its mtime
    #[arg(long = "by-date")]
    pub by_date: bool,

    /// Print what would be done without renaming anything
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Overwrite existing files
    #[arg(short = 'f', long, env = "REMOLD_FORCE")]
    pub force: bool,

    /// Create missing destination directories
    #[arg(short = 'm', long = "make-dirs")]
    pub make_dirs: bool,

    /// Report every rename and skipped file
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Run `PROGRAM OLD NEW` instead of renaming directly (e.g. "git mv")
    #[arg(long, value_name = "PROGRAM")]
    pub command: Option<String>,

    /// Final report format
    #[arg(long, value_enum, default_value_t = OutputArg::Summary)]
    pub output: OutputArg,

    /// [RULE] FILES... (the rule operand is consumed only when no -e or
    /// shorthand flag supplied one)
    #[arg(value_name = "ARGS")]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum OutputArg {
    /// One summary line on stdout
    Summary,
    /// The full per-file report as JSON
    Json,
}

impl Cli {
    /// True when the rule came from flags, so the first positional operand
    /// is a file rather than the rule.
    pub fn has_inline_rule(&self) -> bool {
        !self.expr.is_empty()
            || self.lowercase
            || self.clean
            || self.url_encode
            || self.unique
            || self.renumber.is_some()
            || self.prefix.is_some()
            || self.by_date
    }

    /// Expand `-e` statements and shorthand flags into rule fragments.
    /// Explicit statements come first in argv order; shorthands follow in a
    /// fixed order, with `unique` last so it probes the name that will
    /// actually be used.
    pub fn rule_fragments(&self, clean_mode: CleanMode) -> Vec<String> {
        let mut fragments = self.expr.clone();
        if self.lowercase {
            fragments.push("lowercase".to_string());
        }
        if self.clean {
            fragments.push(match clean_mode {
                CleanMode::Strip => "clean".to_string(),
                CleanMode::Collapse => "clean(collapse)".to_string(),
            });
        }
        if self.url_encode {
            fragments.push("url_encode".to_string());
        }
        if let Some(width) = self.renumber {
            fragments.push(format!("renumber({width})"));
        }
        if let Some(text) = &self.prefix {
            fragments.push(format!("prefix({})", quote_literal(text)));
        }
        if self.by_date {
            fragments.push("by_date".to_string());
        }
        if self.unique {
            fragments.push("unique".to_string());
        }
        fragments
    }
}
