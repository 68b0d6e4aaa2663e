use anyhow::{bail, Context, Result};
use clap::Parser;
use remold_core::{compile, run_batch, BatchOptions, CleanMode, Config};
use std::io::{self, BufRead, IsTerminal};
use std::process;

mod cli;

use cli::{Cli, OutputArg};

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        // Partial success is normal for a batch: some files renamed, some
        // failed, one exit code for the lot.
        Ok(run_failed) => process::exit(i32::from(run_failed)),
        Err(e) => {
            eprintln!("remold: {e:#}");
            process::exit(2);
        },
    }
}

fn run(cli: Cli) -> Result<bool> {
    let config = Config::load().unwrap_or_default();

    let clean_mode = if cli.collapse {
        CleanMode::Collapse
    } else {
        config.defaults.clean_mode
    };

    let mut operands = cli.args.clone();
    let fragments = if cli.has_inline_rule() {
        cli.rule_fragments(clean_mode)
    } else {
        if operands.is_empty() {
            bail!("no rule given; supply one as the first argument or with -e");
        }
        vec![operands.remove(0)]
    };

    // Compile once, before touching anything; a bad rule renames nothing.
    let rule = compile(&fragments)?;

    let files = if operands.is_empty() {
        read_names_from_stdin()?
    } else {
        operands
    };
    if files.is_empty() {
        bail!("no files to rename");
    }

    let options = BatchOptions {
        dry_run: cli.dry_run,
        force: cli.force,
        make_dirs: cli.make_dirs || config.defaults.make_dirs,
        verbose: cli.verbose || config.defaults.verbose,
        rename_command: cli.command.clone().or(config.defaults.rename_command),
    };

    let report = run_batch(&rule, &files, &options)?;

    match cli.output {
        OutputArg::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        ),
        OutputArg::Summary => println!("{}", report.summary()),
    }

    Ok(report.failed())
}

fn read_names_from_stdin() -> Result<Vec<String>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        bail!("no files given and stdin is a terminal");
    }
    let mut names = Vec::new();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read file list from stdin")?;
        if !line.is_empty() {
            names.push(line);
        }
    }
    Ok(names)
}
