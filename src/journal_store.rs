use crate::error::{Result, StoreError};
use crate::journal_entry::{EntryId, IdScheme, JournalEntry, StoredEntry};
use chrono::Local;
use serde_json::Value;
use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

pub const DEFAULT_FILE: &str = "reflections.json";

/// The journal file: a single JSON array of entries, rewritten in full on
/// every save.
///
/// Two processes saving at the same time race: both read the same array and
/// the later write drops the other's entry. Nothing here guards against that.
#[derive(Debug, Clone)]
pub struct JournalStore {
    path: PathBuf,
}

#[derive(Debug)]
pub struct SaveReport {
    pub added: Vec<JournalEntry>,
    pub total: usize,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// Imported entries that don't fit the entry schema and were stored verbatim.
    pub unstructured: usize,
    pub skipped_duplicates: usize,
    /// Items without a non-blank string `title` and `content`.
    pub rejected: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JournalStats {
    pub total_entries: usize,
    pub total_words: usize,
    pub average_words: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Title,
}

impl SortOrder {
    pub fn next(self) -> Self {
        match self {
            SortOrder::Newest => SortOrder::Oldest,
            SortOrder::Oldest => SortOrder::Title,
            SortOrder::Title => SortOrder::Newest,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortOrder::Newest => "newest",
            SortOrder::Oldest => "oldest",
            SortOrder::Title => "title",
        }
    }
}

impl JournalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JournalStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every element of the array. A missing file, invalid JSON or a
    /// top level that isn't an array reads as empty.
    pub fn load(&self) -> Vec<StoredEntry> {
        let serialized = match fs::read_to_string(&self.path) {
            Ok(serialized) => serialized,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no journal file yet, starting empty");
                return Vec::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "journal file unreadable, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<StoredEntry>>(&serialized) {
            Ok(entries) => {
                let foreign = entries.iter().filter(|e| e.as_entry().is_none()).count();
                if foreign > 0 {
                    debug!(foreign, "journal holds elements outside the entry schema");
                }
                entries
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "journal file is not a JSON array, starting empty; the next save overwrites it"
                );
                Vec::new()
            }
        }
    }

    pub fn append(mut entries: Vec<StoredEntry>, record: JournalEntry) -> Vec<StoredEntry> {
        entries.push(record.into());
        entries
    }

    /// Overwrites the file with the whole array, creating it if needed.
    pub fn persist(&self, entries: &[StoredEntry]) -> Result<()> {
        write_pretty(&self.path, entries)?;
        debug!(path = %self.path.display(), count = entries.len(), "journal persisted");
        Ok(())
    }

    pub fn save(&self, record: JournalEntry) -> Result<SaveReport> {
        self.save_all(vec![record])
    }

    /// One read-modify-write cycle for a batch of new records.
    pub fn save_all(&self, records: Vec<JournalEntry>) -> Result<SaveReport> {
        let mut entries = self.load();
        let mut taken: HashSet<i64> = entries
            .iter()
            .filter_map(|e| e.id_value().and_then(|id| id.as_i64()))
            .collect();
        let mut added = Vec::with_capacity(records.len());
        for record in records {
            let record = claim_free_id(&mut taken, record);
            added.push(record.clone());
            entries = Self::append(entries, record);
        }
        self.persist(&entries)?;
        info!(added = added.len(), total = entries.len(), "entries saved");
        Ok(SaveReport {
            added,
            total: entries.len(),
        })
    }

    /// Writes a pretty copy of the journal to `dest`, returning the entry count.
    pub fn export_to(&self, dest: &Path) -> Result<usize> {
        let entries = self.load();
        write_pretty(dest, &entries)?;
        info!(dest = %dest.display(), count = entries.len(), "journal exported");
        Ok(entries.len())
    }

    /// Appends the items of another journal array that carry a non-blank
    /// `title` and `content`. Ids already present are skipped.
    pub fn import_from(&self, src: &Path, scheme: IdScheme) -> Result<ImportReport> {
        let serialized = fs::read_to_string(src).map_err(|source| StoreError::Read {
            path: src.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&serialized)
            .map_err(|e| StoreError::Import(format!("not valid JSON: {e}")))?;
        let Value::Array(items) = value else {
            return Err(StoreError::Import(
                "expected an array of entries".to_string(),
            ));
        };

        let now = Local::now();
        let mut report = ImportReport::default();
        let mut candidates = Vec::with_capacity(items.len());
        for item in items {
            match importable_entry(item, scheme, now) {
                Some(candidate) => candidates.push(candidate),
                None => report.rejected += 1,
            }
        }
        if candidates.is_empty() {
            return Err(StoreError::Import(
                "no valid reflection entries found in the file".to_string(),
            ));
        }

        let mut entries = self.load();
        let mut seen: HashSet<String> = entries
            .iter()
            .filter_map(StoredEntry::id_value)
            .map(|id| id.to_string())
            .collect();
        for candidate in candidates {
            let key = candidate.id_value().map(|id| id.to_string());
            if key.is_some_and(|key| !seen.insert(key)) {
                report.skipped_duplicates += 1;
                continue;
            }
            if candidate.as_entry().is_none() {
                report.unstructured += 1;
            }
            entries.push(candidate);
            report.imported += 1;
        }

        if report.imported > 0 {
            self.persist(&entries)?;
        }
        report.total = entries.len();
        info!(
            imported = report.imported,
            unstructured = report.unstructured,
            skipped_duplicates = report.skipped_duplicates,
            rejected = report.rejected,
            "journal import finished"
        );
        Ok(report)
    }
}

fn write_pretty(path: &Path, entries: &[StoredEntry]) -> Result<()> {
    let serialized = serde_json::to_string_pretty(entries)?;
    fs::write(path, serialized).map_err(|source| StoreError::Persist {
        path: path.to_path_buf(),
        source,
    })
}

fn importable_entry(
    mut item: Value,
    scheme: IdScheme,
    now: chrono::DateTime<Local>,
) -> Option<StoredEntry> {
    let object = item.as_object_mut()?;
    let non_blank = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty())
    };
    if !non_blank("title") || !non_blank("content") {
        debug!("import item lacks a title or content, rejected");
        return None;
    }
    if !object.contains_key("id") {
        let id = serde_json::to_value(scheme.id_at(now, 0)).ok()?;
        object.insert("id".to_string(), id);
    }
    let has_source = object
        .get("source")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty());
    if !has_source {
        object.insert("source".to_string(), Value::from("imported"));
    }

    match serde_json::from_value::<JournalEntry>(item.clone()) {
        Ok(entry) => Some(StoredEntry::Entry(entry)),
        Err(e) => {
            warn!(error = %e, id = ?item.get("id"), "import item does not fit the entry schema, stored verbatim");
            Some(StoredEntry::Foreign(item))
        }
    }
}

/// Moves an integer id past every id already taken. Ids are second-resolution,
/// so two saves within one second would otherwise collide.
fn claim_free_id(taken: &mut HashSet<i64>, mut record: JournalEntry) -> JournalEntry {
    if let EntryId::Number(mut n) = record.id {
        while taken.contains(&n) {
            match n.checked_add(1) {
                Some(next) => n = next,
                None => {
                    warn!(id = n, "no free integer id above the requested one, keeping it");
                    break;
                }
            }
        }
        taken.insert(n);
        record.id = EntryId::Number(n);
    }
    record
}

/// Totals over the word counts of a set of entries; `None` counts as 0 words.
pub fn stats(word_counts: impl IntoIterator<Item = Option<usize>>) -> JournalStats {
    let mut total_entries = 0;
    let mut total_words = 0;
    for count in word_counts {
        total_entries += 1;
        total_words += count.unwrap_or(0);
    }
    let average_words = if total_entries == 0 {
        0.0
    } else {
        total_words as f64 / total_entries as f64
    };
    JournalStats {
        total_entries,
        total_words,
        average_words,
    }
}

/// Case-insensitive title/content search followed by the requested ordering.
/// Only elements that fit the entry schema are searchable.
pub fn filter_entries(entries: &[StoredEntry], query: &str, order: SortOrder) -> Vec<JournalEntry> {
    let query = query.to_lowercase();
    let mut matches: Vec<JournalEntry> = entries
        .iter()
        .filter_map(StoredEntry::as_entry)
        .filter(|e| {
            query.is_empty()
                || e.title.to_lowercase().contains(&query)
                || e.content.to_lowercase().contains(&query)
        })
        .cloned()
        .collect();

    match order {
        SortOrder::Newest => matches.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
        SortOrder::Oldest => matches.sort_by(|a, b| a.created_at().cmp(&b.created_at())),
        SortOrder::Title => matches.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase())),
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use tempfile::tempdir;

    fn entry(title: &str, content: &str, offset: i64) -> JournalEntry {
        let base = Local.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        JournalEntry::new_at(
            title.to_string(),
            content.to_string(),
            "test",
            IdScheme::Epoch,
            offset,
            base + Duration::minutes(offset),
        )
    }

    fn stored(entries: &[JournalEntry]) -> Vec<StoredEntry> {
        entries.iter().cloned().map(StoredEntry::from).collect()
    }

    fn typed(entries: &[StoredEntry]) -> Vec<JournalEntry> {
        entries.iter().filter_map(StoredEntry::as_entry).cloned().collect()
    }

    #[test]
    fn test_persist_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = JournalStore::new(dir.path().join(DEFAULT_FILE));
        let entries = stored(&[
            entry("First", "one", 0),
            entry("Zweiter Eintrag", "Grüße, 日本語 und Emoji 🎉", 1),
            entry("Third", "three words here", 2),
        ]);

        store.persist(&entries).unwrap();

        assert_eq!(store.load(), entries);
    }

    #[test]
    fn test_persist_format_is_pretty_and_keeps_non_ascii() {
        let dir = tempdir().unwrap();
        let store = JournalStore::new(dir.path().join(DEFAULT_FILE));
        store.persist(&stored(&[entry("Grüße", "café", 0)])).unwrap();

        let written = fs::read_to_string(store.path()).unwrap();
        assert!(written.starts_with("[\n  {\n    \"id\""));
        assert!(written.contains("Grüße"));
        assert!(written.contains("café"));
        assert!(!written.contains("\\u"));
    }

    #[test]
    fn test_load_missing_and_corrupt_files_are_empty() {
        let dir = tempdir().unwrap();
        let missing = JournalStore::new(dir.path().join("absent.json"));
        assert!(missing.load().is_empty());

        let corrupt_path = dir.path().join("corrupt.json");
        fs::write(&corrupt_path, "{not valid json").unwrap();
        assert!(JournalStore::new(&corrupt_path).load().is_empty());

        let object_path = dir.path().join("object.json");
        fs::write(&object_path, r#"{"id": 1, "title": "t", "content": "c"}"#).unwrap();
        assert!(JournalStore::new(&object_path).load().is_empty());
    }

    #[test]
    fn test_save_keeps_elements_outside_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_FILE);
        let prior = json!([
            { "id": 1, "title": "keep me", "content": "old words" },
            { "id": 2, "title": "draft", "content": null },
            { "title": "no id", "content": "still mine" },
            { "id": 3.5, "title": "float id", "content": "x", "wordCount": "2" }
        ]);
        fs::write(&path, prior.to_string()).unwrap();
        let store = JournalStore::new(&path);

        let loaded = store.load();
        assert_eq!(loaded.len(), 4);
        assert_eq!(typed(&loaded).len(), 1);

        let report = store.save(entry("new", "appended last", 0)).unwrap();
        assert_eq!(report.total, 5);

        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let on_disk = on_disk.as_array().unwrap();
        assert_eq!(&on_disk[..4], prior.as_array().unwrap().as_slice());
        assert_eq!(on_disk[4]["title"], "new");
    }

    #[test]
    fn test_append_keeps_prefix_and_puts_record_last() {
        let start = stored(&[entry("a", "x", 0), entry("b", "y", 1)]);
        let record = entry("c", "z", 2);

        let result = JournalStore::append(start.clone(), record.clone());

        assert_eq!(result.len(), start.len() + 1);
        assert_eq!(&result[..start.len()], &start[..]);
        assert_eq!(result.last(), Some(&StoredEntry::Entry(record)));
    }

    #[test]
    fn test_persist_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let store = JournalStore::new(dir.path().join("no/such/dir/reflections.json"));

        let err = store.persist(&stored(&[entry("a", "b", 0)])).unwrap_err();
        assert!(matches!(err, StoreError::Persist { .. }));
    }

    #[test]
    fn test_save_creates_file_and_counts_total() {
        let dir = tempdir().unwrap();
        let store = JournalStore::new(dir.path().join(DEFAULT_FILE));
        assert!(!store.path().exists());

        let first = store.save(entry("a", "b", 0)).unwrap();
        let second = store.save(entry("c", "d", 1)).unwrap();

        assert!(store.path().exists());
        assert_eq!(first.total, 1);
        assert_eq!(second.total, 2);
        assert_eq!(store.load().len(), 2);
    }

    #[test]
    fn test_save_moves_colliding_integer_id() {
        let dir = tempdir().unwrap();
        let store = JournalStore::new(dir.path().join(DEFAULT_FILE));
        let first = entry("a", "b", 0);
        let mut second = entry("c", "d", 1);
        second.id = first.id.clone();

        store.save(first.clone()).unwrap();
        let report = store.save(second).unwrap();

        let EntryId::Number(n) = first.id else {
            panic!("epoch ids are numbers");
        };
        assert_eq!(report.added[0].id, EntryId::Number(n + 1));
    }

    #[test]
    fn test_claim_free_id_skips_taken_run() {
        let mut taken: HashSet<i64> = (100..105).collect();
        let mut record = entry("a", "b", 0);
        record.id = EntryId::Number(100);

        let claimed = claim_free_id(&mut taken, record.clone());
        assert_eq!(claimed.id, EntryId::Number(105));
        assert!(taken.contains(&105));

        let next = claim_free_id(&mut taken, record);
        assert_eq!(next.id, EntryId::Number(106));
    }

    #[test]
    fn test_claim_free_id_at_max_does_not_overflow() {
        let mut taken: HashSet<i64> = [i64::MAX].into_iter().collect();
        let mut record = entry("a", "b", 0);
        record.id = EntryId::Number(i64::MAX);

        let claimed = claim_free_id(&mut taken, record);

        assert_eq!(claimed.id, EntryId::Number(i64::MAX));
    }

    #[test]
    fn test_save_after_corrupt_file_starts_over() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_FILE);
        fs::write(&path, "{not valid json").unwrap();
        let store = JournalStore::new(&path);

        let report = store.save(entry("fresh", "start", 0)).unwrap();

        assert_eq!(report.total, 1);
        assert_eq!(typed(&store.load())[0].title, "fresh");
    }

    #[test]
    fn test_import_filters_and_dedupes() {
        let dir = tempdir().unwrap();
        let store = JournalStore::new(dir.path().join(DEFAULT_FILE));
        let existing = entry("kept", "already here", 0);
        store.persist(&stored(&[existing.clone()])).unwrap();

        let src = dir.path().join("import.json");
        let payload = json!([
            serde_json::to_value(&existing).unwrap(),
            { "id": 42, "title": "New one", "content": "fresh words" },
            { "id": 43, "title": "   ", "content": "blank title" },
            { "id": 44, "title": "No content" },
            { "title": "Missing id", "content": "gets one", "source": "web" },
            "not an object"
        ]);
        fs::write(&src, payload.to_string()).unwrap();

        let report = store.import_from(&src, IdScheme::Epoch).unwrap();

        assert_eq!(
            report,
            ImportReport {
                imported: 2,
                unstructured: 0,
                skipped_duplicates: 1,
                rejected: 3,
                total: 3
            }
        );
        let entries = typed(&store.load());
        assert_eq!(entries[1].id, EntryId::Number(42));
        assert_eq!(entries[1].source.as_deref(), Some("imported"));
        assert_eq!(entries[2].source.as_deref(), Some("web"));
    }

    #[test]
    fn test_import_keeps_items_outside_schema_verbatim() {
        let dir = tempdir().unwrap();
        let store = JournalStore::new(dir.path().join(DEFAULT_FILE));

        let src = dir.path().join("import.json");
        let payload = json!([
            { "id": null, "title": "Null id", "content": "still a reflection" },
            { "id": 7, "title": "String count", "content": "three words here", "wordCount": "3" }
        ]);
        fs::write(&src, payload.to_string()).unwrap();

        let report = store.import_from(&src, IdScheme::Epoch).unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(report.unstructured, 2);
        assert_eq!(report.rejected, 0);
        let loaded = store.load();
        assert_eq!(loaded.len(), 2);
        let StoredEntry::Foreign(second) = &loaded[1] else {
            panic!("a string wordCount does not fit the entry schema");
        };
        assert_eq!(second["wordCount"], "3");
        assert_eq!(second["source"], "imported");
    }

    #[test]
    fn test_import_rejects_non_array_and_empty_sets() {
        let dir = tempdir().unwrap();
        let store = JournalStore::new(dir.path().join(DEFAULT_FILE));

        let object = dir.path().join("object.json");
        fs::write(&object, r#"{"entries": []}"#).unwrap();
        assert!(matches!(
            store.import_from(&object, IdScheme::Epoch),
            Err(StoreError::Import(_))
        ));

        let blank = dir.path().join("blank.json");
        fs::write(&blank, r#"[{"id": 1, "title": "", "content": ""}]"#).unwrap();
        assert!(matches!(
            store.import_from(&blank, IdScheme::Epoch),
            Err(StoreError::Import(_))
        ));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_export_writes_copy() {
        let dir = tempdir().unwrap();
        let store = JournalStore::new(dir.path().join(DEFAULT_FILE));
        let entries = stored(&[entry("a", "b", 0), entry("c", "d", 1)]);
        store.persist(&entries).unwrap();

        let dest = dir.path().join("export.json");
        assert_eq!(store.export_to(&dest).unwrap(), 2);
        assert_eq!(JournalStore::new(&dest).load(), entries);
    }

    #[test]
    fn test_stats_counts_missing_word_count_as_zero() {
        let mut no_count = entry("c", "not counted", 2);
        no_count.word_count = None;
        let mut entries = stored(&[entry("a", "one two three", 0), entry("b", "four", 1), no_count]);
        entries.push(StoredEntry::Foreign(json!({ "id": 9, "content": null, "wordCount": 2 })));

        let summary = stats(entries.iter().map(StoredEntry::word_count));

        assert_eq!(summary.total_entries, 4);
        assert_eq!(summary.total_words, 6);
        assert!((summary.average_words - 1.5).abs() < f64::EPSILON);
        assert_eq!(stats(std::iter::empty()).average_words, 0.0);
    }

    #[test]
    fn test_filter_and_sort() {
        let mut entries = stored(&[
            entry("Rust ownership", "borrowing rules", 0),
            entry("css grid", "layout notes", 1),
            entry("Async", "Rust futures and tokio", 2),
        ]);
        entries.push(StoredEntry::Foreign(json!({ "id": 2, "title": "Rust draft", "content": null })));

        let titles = |v: Vec<JournalEntry>| v.into_iter().map(|e| e.title).collect::<Vec<_>>();

        assert_eq!(
            titles(filter_entries(&entries, "RUST", SortOrder::Newest)),
            vec!["Async", "Rust ownership"]
        );
        assert_eq!(
            titles(filter_entries(&entries, "", SortOrder::Oldest)),
            vec!["Rust ownership", "css grid", "Async"]
        );
        assert_eq!(
            titles(filter_entries(&entries, "", SortOrder::Title)),
            vec!["Async", "css grid", "Rust ownership"]
        );
    }
}
