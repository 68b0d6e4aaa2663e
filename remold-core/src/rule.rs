//! The rule engine: compiles user-authored rule text into a step list that
//! is applied to every input name.
//!
//! Rules are one or more statements separated by `;`:
//!
//! - `s<d>PATTERN<d>REPLACEMENT<d>[gi]`: regex substitution on the current
//!   name, with any punctuation delimiter (`s/\.jpeg$/.jpg/`,
//!   `s|/tmp/|/var/|`). `g` replaces every match, `i` matches
//!   case-insensitively. `$1` and `${name}` refer to captures; write `$$`
//!   for a literal dollar.
//! - A transform call: `lowercase`, `uppercase`, `clean`, `clean(collapse)`,
//!   `url_encode`, `unique`, `renumber(WIDTH)`, `by_date`, `prefix(TEXT)`.
//! - `stop`, `stop if /PATTERN/[i]`, `stop unless /PATTERN/[i]`: keep the
//!   current name and skip the remaining statements for this file.
//!
//! Rules compile once per invocation; a syntax or pattern error aborts
//! before any file is touched.

use crate::quote::shell_quote;
use crate::transforms::{self, CleanMode, TransformError};
use regex::{Regex, RegexBuilder};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("rule syntax error: {0}")]
    Syntax(String),
    #[error("invalid pattern in rule: {0}")]
    Pattern(#[from] regex::Error),
}

/// Per-run state threaded through every file's rule application. The
/// sequence counter and the lookup-failure tally are deliberately
/// process-wide; nothing else leaks between files.
#[derive(Debug, Default)]
pub struct RunContext {
    sequence: u64,
    lookup_failures: usize,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mtime lookups that failed during the run. Any nonzero
    /// count marks the run as failed.
    pub fn lookup_failures(&self) -> usize {
        self.lookup_failures
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

#[derive(Debug)]
enum Step {
    Subst {
        pattern: Regex,
        replacement: String,
        global: bool,
    },
    Call(Call),
    Stop(Option<Guard>),
}

#[derive(Debug)]
enum Call {
    Lowercase,
    Uppercase,
    Clean(CleanMode),
    UrlEncode,
    Unique,
    Renumber(usize),
    ByDate,
    Prefix(String),
}

#[derive(Debug)]
struct Guard {
    pattern: Regex,
    negate: bool,
}

/// A rule compiled to an ordered step list, ready to apply to any number of
/// names.
#[derive(Debug)]
pub struct CompiledRule {
    steps: Vec<Step>,
}

/// Compile rule fragments into a single rule. Fragments are joined with the
/// statement separator, so `-e s/a/b/ -e lowercase` equals `s/a/b/;
/// lowercase`.
pub fn compile(fragments: &[String]) -> Result<CompiledRule, CompileError> {
    let source = fragments.join(";");
    let mut parser = Parser::new(&source);
    let mut steps = Vec::new();
    while let Some(step) = parser.next_step()? {
        steps.push(step);
    }
    if steps.is_empty() {
        return Err(CompileError::Syntax("empty rule".to_string()));
    }
    Ok(CompiledRule { steps })
}

/// Quote `text` so it survives as a single `prefix(...)`-style argument in
/// rule source. Used when expanding shorthand flags into rule fragments.
pub fn quote_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

impl CompiledRule {
    /// Apply the rule to one name. `original` is the path as given on the
    /// command line; `by_date` stats it even after earlier steps have
    /// rewritten the working name. Returns the candidate new name, which
    /// may equal the input (the caller then skips the file).
    pub fn apply(
        &self,
        original: &Path,
        name: &str,
        ctx: &mut RunContext,
    ) -> Result<String, TransformError> {
        let mut value = name.to_string();
        for step in &self.steps {
            match step {
                Step::Stop(guard) => {
                    let fire = match guard {
                        None => true,
                        Some(g) => g.pattern.is_match(&value) != g.negate,
                    };
                    if fire {
                        break;
                    }
                },
                Step::Subst {
                    pattern,
                    replacement,
                    global,
                } => {
                    value = if *global {
                        pattern.replace_all(&value, replacement.as_str()).into_owned()
                    } else {
                        pattern.replace(&value, replacement.as_str()).into_owned()
                    };
                },
                Step::Call(call) => value = run_call(call, original, value, ctx)?,
            }
        }
        Ok(value)
    }
}

fn run_call(
    call: &Call,
    original: &Path,
    value: String,
    ctx: &mut RunContext,
) -> Result<String, TransformError> {
    Ok(match call {
        Call::Lowercase => value.to_lowercase(),
        Call::Uppercase => value.to_uppercase(),
        Call::Clean(mode) => transforms::clean(&value, *mode),
        Call::UrlEncode => transforms::url_encode(&value),
        Call::Unique => transforms::uniquify(value)?,
        Call::Renumber(width) => format!("{:0width$}", ctx.next_sequence(), width = *width),
        Call::ByDate => match transforms::date_prefix(original) {
            Ok(prefix) => format!("{prefix}{value}"),
            Err(err) => {
                // Recovered locally: keep the name, fail the run overall.
                eprintln!(
                    "remold: cannot read modification time of {}: {}",
                    shell_quote(&original.to_string_lossy()),
                    err
                );
                ctx.lookup_failures += 1;
                value
            },
        },
        Call::Prefix(text) => format!("{text}{value}"),
    })
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

fn is_delimiter(ch: char) -> bool {
    ch.is_ascii_punctuation() && ch != ';'
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn skip_separators(&mut self) {
        while self
            .peek()
            .is_some_and(|c| c.is_whitespace() || c == ';')
        {
            self.pos += 1;
        }
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                word.push(ch);
                self.pos += 1;
            } else {
                break;
            }
        }
        word
    }

    fn next_step(&mut self) -> Result<Option<Step>, CompileError> {
        self.skip_separators();
        let Some(first) = self.peek() else {
            return Ok(None);
        };

        let step = if first == 's' && self.peek_at(1).is_some_and(is_delimiter) {
            self.parse_subst()?
        } else if first.is_ascii_lowercase() || first == '_' {
            let word = self.read_word();
            match word.as_str() {
                "stop" => self.parse_stop()?,
                "lowercase" => Step::Call(Call::Lowercase),
                "uppercase" => Step::Call(Call::Uppercase),
                "clean" => Step::Call(Call::Clean(self.parse_clean_mode()?)),
                "url_encode" => Step::Call(Call::UrlEncode),
                "unique" => Step::Call(Call::Unique),
                "renumber" => Step::Call(Call::Renumber(self.parse_width()?)),
                "by_date" => Step::Call(Call::ByDate),
                "prefix" => Step::Call(Call::Prefix(self.parse_text_arg()?)),
                other => {
                    return Err(CompileError::Syntax(format!(
                        "unknown transform `{other}`"
                    )))
                },
            }
        } else {
            return Err(CompileError::Syntax(format!(
                "unexpected `{first}` in rule"
            )));
        };

        self.expect_statement_end()?;
        Ok(Some(step))
    }

    fn expect_statement_end(&mut self) -> Result<(), CompileError> {
        self.skip_ws();
        match self.peek() {
            None | Some(';') => Ok(()),
            Some(ch) => Err(CompileError::Syntax(format!(
                "expected `;` before `{ch}`"
            ))),
        }
    }

    fn parse_subst(&mut self) -> Result<Step, CompileError> {
        self.bump(); // 's'
        let delim = self
            .bump()
            .ok_or_else(|| CompileError::Syntax("missing substitution delimiter".to_string()))?;
        let pattern = self.read_until_delim(delim)?;
        let replacement = self.read_until_delim(delim)?;

        let mut global = false;
        let mut case_insensitive = false;
        while let Some(ch) = self.peek() {
            match ch {
                'g' => {
                    global = true;
                    self.pos += 1;
                },
                'i' => {
                    case_insensitive = true;
                    self.pos += 1;
                },
                c if c.is_ascii_alphabetic() => {
                    return Err(CompileError::Syntax(format!(
                        "unknown substitution flag `{c}`"
                    )))
                },
                _ => break,
            }
        }

        if pattern.is_empty() {
            return Err(CompileError::Syntax(
                "empty pattern in substitution".to_string(),
            ));
        }

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Step::Subst {
            pattern: regex,
            replacement,
            global,
        })
    }

    /// Read up to the next unescaped `delim`. `\<delim>` produces a literal
    /// delimiter; every other backslash sequence passes through untouched
    /// for the regex engine to interpret.
    fn read_until_delim(&mut self, delim: char) -> Result<String, CompileError> {
        let mut out = String::new();
        while let Some(ch) = self.bump() {
            if ch == delim {
                return Ok(out);
            }
            if ch == '\\' && self.peek() == Some(delim) {
                out.push(delim);
                self.pos += 1;
            } else {
                out.push(ch);
            }
        }
        Err(CompileError::Syntax(format!("missing closing `{delim}`")))
    }

    fn parse_stop(&mut self) -> Result<Step, CompileError> {
        let save = self.pos;
        self.skip_ws();
        if !self.peek().is_some_and(|c| c.is_ascii_lowercase()) {
            self.pos = save;
            return Ok(Step::Stop(None));
        }

        let word = self.read_word();
        let negate = match word.as_str() {
            "if" => false,
            "unless" => true,
            other => {
                return Err(CompileError::Syntax(format!(
                    "expected `if` or `unless` after `stop`, found `{other}`"
                )))
            },
        };

        self.skip_ws();
        let delim = match self.bump() {
            Some(ch) if is_delimiter(ch) => ch,
            _ => {
                return Err(CompileError::Syntax(
                    "expected a pattern after `stop if`/`stop unless`".to_string(),
                ))
            },
        };
        let pattern = self.read_until_delim(delim)?;
        let case_insensitive = self.eat('i');
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Step::Stop(Some(Guard {
            pattern: regex,
            negate,
        })))
    }

    fn parse_clean_mode(&mut self) -> Result<CleanMode, CompileError> {
        if !self.eat('(') {
            return Ok(CleanMode::Strip);
        }
        self.skip_ws();
        let word = self.read_word();
        let mode = match word.as_str() {
            "strip" => CleanMode::Strip,
            "collapse" => CleanMode::Collapse,
            other => {
                return Err(CompileError::Syntax(format!(
                    "unknown clean mode `{other}`"
                )))
            },
        };
        self.skip_ws();
        if !self.eat(')') {
            return Err(CompileError::Syntax(
                "missing `)` after clean mode".to_string(),
            ));
        }
        Ok(mode)
    }

    fn parse_width(&mut self) -> Result<usize, CompileError> {
        if !self.eat('(') {
            return Err(CompileError::Syntax(
                "renumber takes a digit width, e.g. renumber(3)".to_string(),
            ));
        }
        self.skip_ws();
        let mut digits = String::new();
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            digits.push(self.bump().unwrap_or_default());
        }
        self.skip_ws();
        if !self.eat(')') {
            return Err(CompileError::Syntax(
                "missing `)` after renumber width".to_string(),
            ));
        }
        let width: usize = digits.parse().map_err(|_| {
            CompileError::Syntax("renumber takes a digit width, e.g. renumber(3)".to_string())
        })?;
        if width == 0 || width > 32 {
            return Err(CompileError::Syntax(
                "renumber width must be between 1 and 32".to_string(),
            ));
        }
        Ok(width)
    }

    fn parse_text_arg(&mut self) -> Result<String, CompileError> {
        if !self.eat('(') {
            return Err(CompileError::Syntax(
                "prefix takes an argument, e.g. prefix(old-)".to_string(),
            ));
        }
        self.skip_ws();
        let text = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                self.read_quoted(quote)?
            },
            _ => {
                let mut out = String::new();
                while let Some(ch) = self.peek() {
                    if ch == ')' {
                        break;
                    }
                    out.push(ch);
                    self.pos += 1;
                }
                out.trim_end().to_string()
            },
        };
        self.skip_ws();
        if !self.eat(')') {
            return Err(CompileError::Syntax(
                "missing `)` after prefix argument".to_string(),
            ));
        }
        Ok(text)
    }

    fn read_quoted(&mut self, quote: char) -> Result<String, CompileError> {
        let mut out = String::new();
        while let Some(ch) = self.bump() {
            if ch == quote {
                return Ok(out);
            }
            if ch == '\\' && self.peek().is_some_and(|c| c == quote || c == '\\') {
                out.push(self.bump().unwrap_or_default());
            } else {
                out.push(ch);
            }
        }
        Err(CompileError::Syntax(
            "unterminated string in rule".to_string(),
        ))
    }
}
