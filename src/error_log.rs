//! Persistent, categorized error history.
//!
//! Every failure the generator decides to swallow is still recorded here so
//! that a bulk run can end with a report of what went wrong.

use crate::error::{Error, ErrorCategory, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info, warn};

const DEFAULT_MAX_ENTRIES: usize = 1_000;
const RECENT_IN_SUMMARY: usize = 10;
const ERROR_LOG_FILE: &str = "errors.json";

/// Where an error happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogContext {
    /// Module that raised the error
    pub module: String,
    /// Operation in progress
    pub operation: String,
    /// Forced category, overriding classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
    /// Forced severity, overriding classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Free-form key/value details
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl LogContext {
    /// Creates a context for a module and operation.
    #[must_use]
    pub fn new(module: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            operation: operation.into(),
            ..Self::default()
        }
    }

    /// Forces the category.
    #[must_use]
    pub const fn category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Forces the severity.
    #[must_use]
    pub const fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }
}

/// A single recorded error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Unique identifier
    pub id: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
    /// Error message
    pub message: String,
    /// Assigned category
    pub category: ErrorCategory,
    /// Assigned severity
    pub severity: Severity,
    /// Where it happened
    pub context: LogContext,
}

/// Short form of an entry kept in the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentError {
    /// Entry id
    pub id: String,
    /// Error message
    pub message: String,
    /// Assigned category
    pub category: ErrorCategory,
    /// Assigned severity
    pub severity: Severity,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

/// Aggregated counts over the stored entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSummary {
    /// Number of stored entries
    pub total: usize,
    /// Counts per category
    pub by_category: BTreeMap<ErrorCategory, usize>,
    /// Counts per severity
    pub by_severity: BTreeMap<Severity, usize>,
    /// Most recent entries, oldest first
    pub recent: Vec<RecentError>,
}

/// On-disk document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ErrorLog {
    entries: Vec<ErrorEntry>,
    #[serde(default)]
    summary: ErrorSummary,
    #[serde(default)]
    timestamp: String,
}

/// Messages grouped by frequency.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopError {
    /// Representative message
    pub message: String,
    /// Category of the group
    pub category: ErrorCategory,
    /// Occurrences
    pub count: usize,
    /// First occurrence
    pub first_seen: String,
    /// Last occurrence
    pub last_seen: String,
}

/// Report produced by [`ErrorLogger::report`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    /// When the report was generated
    pub generated: String,
    /// Aggregate counts
    pub summary: ErrorSummary,
    /// Last critical entries
    pub critical: Vec<ErrorEntry>,
    /// Most frequent messages
    #[serde(rename = "topErrors")]
    pub top_errors: Vec<TopError>,
}

/// Records errors to a capped, persisted history.
#[derive(Debug)]
pub struct ErrorLogger {
    path: Option<PathBuf>,
    max_entries: usize,
    log: Mutex<ErrorLog>,
    sequence: AtomicU64,
}

impl ErrorLogger {
    /// Opens (or creates) the error log under `<data_dir>/logs`.
    ///
    /// An unreadable log is replaced by an empty one.
    #[must_use]
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let log_dir = data_dir.as_ref().join("logs");
        if let Err(e) = fs::create_dir_all(&log_dir) {
            warn!("Could not create log directory {}: {}", log_dir.display(), e);
        }
        let path = log_dir.join(ERROR_LOG_FILE);
        let log = Self::load(&path);

        Self {
            path: Some(path),
            max_entries: DEFAULT_MAX_ENTRIES,
            log: Mutex::new(log),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates a logger that keeps entries in memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            max_entries: DEFAULT_MAX_ENTRIES,
            log: Mutex::new(ErrorLog::default()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Sets the maximum number of stored entries.
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    fn load(path: &Path) -> ErrorLog {
        if !path.exists() {
            return ErrorLog::default();
        }
        match fs::read_to_string(path)
            .map_err(|e| Error::io(path, e))
            .and_then(|raw| serde_json::from_str(&raw).map_err(Error::from))
        {
            Ok(log) => log,
            Err(e) => {
                warn!("Error loading error log: {}", e);
                ErrorLog::default()
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ErrorLog> {
        self.log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Records a library error.
    pub fn log_error(&self, err: &Error, context: LogContext) -> ErrorEntry {
        let category = context.category.unwrap_or_else(|| err.category());
        let severity = context.severity.unwrap_or_else(|| err.severity());
        self.record(err.to_string(), category, severity, context)
    }

    /// Records a free-form message, classifying it from its text.
    pub fn log_message(&self, message: impl Into<String>, context: LogContext) -> ErrorEntry {
        let message = message.into();
        let category = context
            .category
            .unwrap_or_else(|| ErrorCategory::from_message(&message));
        let severity = context
            .severity
            .unwrap_or_else(|| Severity::from_message(&message, category));
        self.record(message, category, severity, context)
    }

    fn record(
        &self,
        message: String,
        category: ErrorCategory,
        severity: Severity,
        context: LogContext,
    ) -> ErrorEntry {
        let now = chrono::Utc::now();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let entry = ErrorEntry {
            id: format!("{}-{seq}", now.timestamp_millis()),
            timestamp: now.to_rfc3339(),
            message,
            category,
            severity,
            context,
        };

        match severity {
            Severity::Critical | Severity::Error => error!(
                module = %entry.context.module,
                operation = %entry.context.operation,
                "[{}] {}: {}",
                severity.as_str().to_uppercase(),
                category,
                entry.message
            ),
            Severity::Warning => warn!(
                module = %entry.context.module,
                operation = %entry.context.operation,
                "[WARNING] {}: {}",
                category,
                entry.message
            ),
            Severity::Info => info!(
                module = %entry.context.module,
                operation = %entry.context.operation,
                "[INFO] {}: {}",
                category,
                entry.message
            ),
        }

        let mut log = self.lock();
        log.entries.push(entry.clone());
        if log.entries.len() > self.max_entries {
            let excess = log.entries.len() - self.max_entries;
            log.entries.drain(..excess);
        }
        self.persist(&mut log);

        entry
    }

    fn persist(&self, log: &mut ErrorLog) {
        log.summary = summarize(&log.entries);
        log.timestamp = chrono::Utc::now().to_rfc3339();

        let Some(path) = &self.path else {
            return;
        };
        let result = serde_json::to_string_pretty(&*log)
            .map_err(Error::from)
            .and_then(|json| fs::write(path, json).map_err(|e| Error::io(path, e)));
        if let Err(e) = result {
            error!("Failed to save error log: {}", e);
        }
    }

    /// Returns the last `limit` entries, oldest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<ErrorEntry> {
        let log = self.lock();
        let start = log.entries.len().saturating_sub(limit);
        log.entries[start..].to_vec()
    }

    /// Returns every stored entry in a category.
    #[must_use]
    pub fn by_category(&self, category: ErrorCategory) -> Vec<ErrorEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.category == category)
            .cloned()
            .collect()
    }

    /// Returns every stored entry with a severity.
    #[must_use]
    pub fn by_severity(&self, severity: Severity) -> Vec<ErrorEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.severity == severity)
            .cloned()
            .collect()
    }

    /// Returns aggregate counts.
    #[must_use]
    pub fn summary(&self) -> ErrorSummary {
        summarize(&self.lock().entries)
    }

    /// Groups entries by category and message prefix, most frequent first.
    #[must_use]
    pub fn top_errors(&self, limit: usize) -> Vec<TopError> {
        let log = self.lock();
        let mut groups: Vec<(String, TopError)> = Vec::new();

        for entry in &log.entries {
            let prefix: String = entry.message.chars().take(100).collect();
            let key = format!("{}:{prefix}", entry.category);
            if let Some((_, group)) = groups.iter_mut().find(|(k, _)| *k == key) {
                group.count += 1;
                group.last_seen.clone_from(&entry.timestamp);
            } else {
                groups.push((
                    key,
                    TopError {
                        message: entry.message.clone(),
                        category: entry.category,
                        count: 1,
                        first_seen: entry.timestamp.clone(),
                        last_seen: entry.timestamp.clone(),
                    },
                ));
            }
        }

        let mut top: Vec<TopError> = groups.into_iter().map(|(_, g)| g).collect();
        top.sort_by(|a, b| b.count.cmp(&a.count));
        top.truncate(limit);
        top
    }

    /// Builds a full report.
    #[must_use]
    pub fn report(&self) -> ErrorReport {
        let mut critical = self.by_severity(Severity::Critical);
        let start = critical.len().saturating_sub(5);
        critical.drain(..start);

        ErrorReport {
            generated: chrono::Utc::now().to_rfc3339(),
            summary: self.summary(),
            critical,
            top_errors: self.top_errors(10),
        }
    }

    /// Prints a human-readable report to stdout.
    pub fn print_report(&self) {
        let report = self.report();

        println!("\n📊 Error Report");
        println!("{}", "=".repeat(60));
        println!("Generated: {}", report.generated);
        println!("\nSummary:");
        println!("  Total Errors: {}", report.summary.total);

        if !report.summary.by_severity.is_empty() {
            println!("\nBy Severity:");
            for (severity, count) in &report.summary.by_severity {
                println!("  {severity}: {count}");
            }
        }

        if !report.summary.by_category.is_empty() {
            println!("\nBy Category:");
            for (category, count) in &report.summary.by_category {
                println!("  {category}: {count}");
            }
        }

        if !report.critical.is_empty() {
            println!("\nRecent Critical Errors:");
            for entry in &report.critical {
                println!("  [{}] {}", entry.timestamp, entry.message);
                println!("    Module: {}", entry.context.module);
            }
        }

        if !report.top_errors.is_empty() {
            println!("\nTop Errors by Frequency:");
            for (index, top) in report.top_errors.iter().take(5).enumerate() {
                let short: String = top.message.chars().take(60).collect();
                println!("  {}. [{}x] {}", index + 1, top.count, short);
                println!(
                    "     Category: {} | First: {} | Last: {}",
                    top.category, top.first_seen, top.last_seen
                );
            }
        }

        println!("{}\n", "=".repeat(60));
    }

    /// Writes the report as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn export(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.report())?;
        fs::write(path, json).map_err(|e| Error::io(path, e))?;
        info!("Error report exported to {}", path.display());
        Ok(())
    }

    /// Drops every stored entry.
    pub fn clear(&self) {
        let mut log = self.lock();
        log.entries.clear();
        self.persist(&mut log);
    }
}

fn summarize(entries: &[ErrorEntry]) -> ErrorSummary {
    let mut summary = ErrorSummary {
        total: entries.len(),
        ..ErrorSummary::default()
    };
    for entry in entries {
        *summary.by_category.entry(entry.category).or_default() += 1;
        *summary.by_severity.entry(entry.severity).or_default() += 1;
    }
    let start = entries.len().saturating_sub(RECENT_IN_SUMMARY);
    summary.recent = entries[start..]
        .iter()
        .map(|e| RecentError {
            id: e.id.clone(),
            message: e.message.clone(),
            category: e.category,
            severity: e.severity,
            timestamp: e.timestamp.clone(),
        })
        .collect();
    summary
}
