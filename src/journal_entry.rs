use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const DATE_STRING_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const COMPACT_ID_FORMAT: &str = "%Y%m%d%H%M%S";

/// Entry identifier. Older producers wrote epoch seconds, others a compact
/// `YYYYMMDDHHMMSS` string; both shapes are accepted and written back as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Number(i64),
    Text(String),
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Number(n) => write!(f, "{n}"),
            EntryId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum IdScheme {
    /// Integer seconds since the Unix epoch.
    #[default]
    Epoch,
    /// `YYYYMMDDHHMMSS` string.
    Compact,
}

impl IdScheme {
    /// Id for an entry created at `now`, shifted by `offset` seconds so a
    /// batch created within one second still gets distinct ids.
    pub fn id_at(self, now: DateTime<Local>, offset: i64) -> EntryId {
        match self {
            IdScheme::Epoch => EntryId::Number(now.timestamp() + offset),
            IdScheme::Compact => {
                let shifted = now + Duration::seconds(offset);
                EntryId::Text(shifted.format(COMPACT_ID_FORMAT).to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(
        rename = "dateString",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub date_string: Option<String>,
    #[serde(rename = "wordCount", default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Keys written by other producers (e.g. `timestamp` from the browser
    /// shell). Carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JournalEntry {
    pub fn new(title: String, content: String, source: &str, scheme: IdScheme, offset: i64) -> Self {
        Self::new_at(title, content, source, scheme, offset, Local::now())
    }

    pub fn new_at(
        title: String,
        content: String,
        source: &str,
        scheme: IdScheme,
        offset: i64,
        now: DateTime<Local>,
    ) -> Self {
        let word_count = word_count(&content);
        JournalEntry {
            id: scheme.id_at(now, offset),
            title,
            content,
            date: Some(now.to_rfc3339()),
            date_string: Some(now.format(DATE_STRING_FORMAT).to_string()),
            word_count: Some(word_count),
            source: Some(source.to_string()),
            extra: Map::new(),
        }
    }

    /// Creation instant, read from `date` or, failing that, `timestamp`.
    /// Accepts RFC 3339 as well as offset-less ISO-8601 (taken as local time).
    pub fn created_at(&self) -> Option<DateTime<Local>> {
        let raw = self
            .date
            .as_deref()
            .or_else(|| self.extra.get("timestamp").and_then(Value::as_str))?;
        parse_instant(raw)
    }

    /// Human-readable creation time, falling back to the raw ISO string.
    pub fn display_date(&self) -> String {
        if let Some(s) = &self.date_string {
            return s.clone();
        }
        match self.created_at() {
            Some(at) => at.format(DATE_STRING_FORMAT).to_string(),
            None => self.date.clone().unwrap_or_default(),
        }
    }
}

/// One element of the journal array. Elements that don't fit
/// [`JournalEntry`] (null content, float ids, ...) are still journal data and
/// are kept verbatim so a rewrite of the file never drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredEntry {
    Entry(JournalEntry),
    Foreign(Value),
}

impl StoredEntry {
    pub fn as_entry(&self) -> Option<&JournalEntry> {
        match self {
            StoredEntry::Entry(entry) => Some(entry),
            StoredEntry::Foreign(_) => None,
        }
    }

    /// The `id` as raw JSON, whichever shape the element has.
    pub fn id_value(&self) -> Option<Value> {
        match self {
            StoredEntry::Entry(entry) => serde_json::to_value(&entry.id).ok(),
            StoredEntry::Foreign(value) => value.get("id").cloned(),
        }
    }

    pub fn word_count(&self) -> Option<usize> {
        match self {
            StoredEntry::Entry(entry) => entry.word_count,
            StoredEntry::Foreign(value) => value
                .get("wordCount")
                .and_then(Value::as_u64)
                .and_then(|n| usize::try_from(n).ok()),
        }
    }
}

impl From<JournalEntry> for StoredEntry {
    fn from(entry: JournalEntry) -> Self {
        StoredEntry::Entry(entry)
    }
}

fn parse_instant(raw: &str) -> Option<DateTime<Local>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Local));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local.from_local_datetime(&naive).earliest()
}

pub fn word_count(content: &str) -> usize {
    content.split_whitespace().count()
}
