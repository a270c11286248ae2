use crate::error::{Result, StoreError};
use crate::journal_entry::{IdScheme, JournalEntry};
use crate::journal_store::{JournalStore, SaveReport};
use std::io::{BufRead, Write};
use tracing::debug;

pub const SOURCE_TAG: &str = "cli";

/// Asks until a non-blank line arrives and returns it trimmed.
pub fn prompt_non_empty<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    field: &'static str,
    question: &str,
    complaint: &str,
) -> Result<String> {
    loop {
        write!(output, "{question}")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(StoreError::InputClosed(field));
        }
        let answer = line.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
        debug!(field, "rejected blank answer");
        writeln!(output, "{complaint}")?;
    }
}

pub fn read_reflection<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<(String, String)> {
    writeln!(output, "=== Learning Journal - New Entry ===")?;
    writeln!(output, "Type your reflection below:")?;
    let title = prompt_non_empty(
        input,
        output,
        "title",
        "Enter reflection title: ",
        "Title cannot be empty!",
    )?;
    let content = prompt_non_empty(
        input,
        output,
        "content",
        "Enter your reflection content: ",
        "Content cannot be empty!",
    )?;
    Ok((title, content))
}

/// Interactive save: prompt, store, print a confirmation.
pub fn run<R: BufRead, W: Write>(
    store: &JournalStore,
    scheme: IdScheme,
    input: &mut R,
    output: &mut W,
) -> Result<SaveReport> {
    let (title, content) = read_reflection(input, output)?;
    let report = store.save(JournalEntry::new(title, content, SOURCE_TAG, scheme, 0))?;

    if let Some(entry) = report.added.first() {
        writeln!(output)?;
        writeln!(output, "Reflection saved successfully!")?;
        writeln!(output, "Title: {}", entry.title)?;
        writeln!(output, "Word Count: {}", entry.word_count.unwrap_or(0))?;
        writeln!(output, "ID: {}", entry.id)?;
        writeln!(output, "Total entries: {}", report.total)?;
    }
    Ok(report)
}
