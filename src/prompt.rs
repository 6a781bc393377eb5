//! User interaction surface: path input, folder choice, revision picker,
//! confirmation and status notes.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::config::expand_tilde;
use crate::git::Revision;
use crate::Result;

pub trait Prompter {
    /// Free-text input. `None` when the user entered nothing.
    fn input(&self, prompt: &str, placeholder: &str) -> Result<Option<String>>;

    /// Folder to clone a remote repository into.
    fn pick_folder(&self, prompt: &str) -> Result<Option<PathBuf>>;

    /// Index into `revisions` of the chosen restore point.
    fn select_revision(&self, revisions: &[Revision]) -> Result<Option<usize>>;

    fn confirm(&self, message: &str) -> Result<bool>;

    /// Transient status message.
    fn notify(&self, message: &str);
}

/// Reads answers from stdin and writes prompts to stdout.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn read_line(&self, prompt: &str) -> Result<String> {
        print!("{}", prompt);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }
}

impl Prompter for TerminalPrompter {
    fn input(&self, prompt: &str, placeholder: &str) -> Result<Option<String>> {
        println!("{}", prompt);
        let answer = self.read_line(&format!("  (e.g. {})\n> ", placeholder))?;
        Ok(non_empty(answer))
    }

    fn pick_folder(&self, prompt: &str) -> Result<Option<PathBuf>> {
        let answer = self.read_line(&format!("{}\n> ", prompt))?;
        Ok(non_empty(answer).map(|p| expand_tilde(&p)))
    }

    fn select_revision(&self, revisions: &[Revision]) -> Result<Option<usize>> {
        println!();
        for (idx, rev) in revisions.iter().enumerate() {
            println!("  {:>3}. {}", idx + 1, format_revision(rev));
        }
        println!();
        let answer = self.read_line("Select a snapshot to restore (number, empty to cancel): ")?;
        Ok(parse_selection(&answer, revisions.len()))
    }

    fn confirm(&self, message: &str) -> Result<bool> {
        let answer = self.read_line(&format!("{} [y/N] ", message))?.to_lowercase();
        Ok(answer == "y" || answer == "yes")
    }

    fn notify(&self, message: &str) {
        println!("{}", message);
    }
}

/// One-line rendering used by the picker and `history`.
pub fn format_revision(rev: &Revision) -> String {
    format!(
        "{}  {}  {}",
        rev.short_hash(),
        rev.date.format("%Y-%m-%d %H:%M"),
        rev.subject
    )
}

/// 1-based selection; anything out of range or unparseable cancels.
fn parse_selection(answer: &str, len: usize) -> Option<usize> {
    let n: usize = answer.trim().parse().ok()?;
    (1..=len).contains(&n).then(|| n - 1)
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
