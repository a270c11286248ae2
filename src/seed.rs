use crate::error::Result;
use crate::journal_entry::{IdScheme, JournalEntry};
use crate::journal_store::{JournalStore, SaveReport};
use chrono::Local;
use std::io::Write;

pub const SOURCE_TAG: &str = "sample";

const SAMPLE_ENTRIES: [(&str, &str); 3] = [
    (
        "First Python Reflection",
        "This is my first reflection added via Python script. The JSON integration is working perfectly!",
    ),
    (
        "Learning Web Development",
        "Today I worked on integrating Python with JavaScript. The JSON file acts as a bridge between the two languages.",
    ),
    (
        "PWA Progress",
        "The Progressive Web App is coming along nicely. Adding file-based storage opens up new possibilities for data persistence.",
    ),
];

/// Appends the sample reflections in one save and prints a summary.
pub fn seed<W: Write>(store: &JournalStore, scheme: IdScheme, output: &mut W) -> Result<SaveReport> {
    let now = Local::now();
    let records = SAMPLE_ENTRIES
        .iter()
        .zip(0..)
        .map(|(&(title, content), offset)| {
            JournalEntry::new_at(
                title.to_string(),
                content.to_string(),
                SOURCE_TAG,
                scheme,
                offset,
                now,
            )
        })
        .collect();

    let report = store.save_all(records)?;
    writeln!(
        output,
        "Added {} sample entries to {}!",
        report.added.len(),
        store.path().display()
    )?;
    writeln!(output, "Total entries now: {}", report.total)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal_entry::StoredEntry;
    use tempfile::tempdir;

    #[test]
    fn test_seed_from_empty_directory() {
        let dir = tempdir().unwrap();
        let store = JournalStore::new(dir.path().join("reflections.json"));
        let mut output = Vec::new();

        seed(&store, IdScheme::Epoch, &mut output).unwrap();

        let stored = store.load();
        assert_eq!(stored.len(), 3);
        for entry in &stored {
            let entry = entry.as_entry().expect("seeded entries fit the schema");
            assert_eq!(entry.source.as_deref(), Some(SOURCE_TAG));
            assert!(!entry.id.to_string().is_empty());
            assert!(!entry.title.is_empty());
            assert!(!entry.content.is_empty());
            assert!(entry.word_count.unwrap_or(0) >= 1);
        }

        let printed = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Added 3 sample entries"));
        assert_eq!(lines[1], "Total entries now: 3");
    }

    #[test]
    fn test_seed_twice_keeps_ids_distinct() {
        let dir = tempdir().unwrap();
        let store = JournalStore::new(dir.path().join("reflections.json"));
        let mut output = Vec::new();

        seed(&store, IdScheme::Epoch, &mut output).unwrap();
        let report = seed(&store, IdScheme::Epoch, &mut output).unwrap();

        assert_eq!(report.total, 6);
        let stored = store.load();
        let mut ids: Vec<_> = stored
            .iter()
            .filter_map(StoredEntry::id_value)
            .map(|id| id.to_string())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }
}
