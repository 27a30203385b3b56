use crate::{
    article::Article,
    error::{Error, Result},
};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use tracing::{debug, info};

/// JSON manifest file name.
pub const MANIFEST_JSON: &str = "articles.json";

/// Script manifest file name, loaded by the site's front-end.
pub const MANIFEST_JS: &str = "articles.js";

/// Paths produced by [`ManifestWriter::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestPaths {
    /// `articles.json`
    pub json: PathBuf,
    /// `articles.js`
    pub js: PathBuf,
}

/// Persists the article manifest with atomic writes.
#[derive(Debug, Clone)]
pub struct ManifestWriter {
    output_dir: PathBuf,
    backup_existing: bool,
}

impl ManifestWriter {
    /// Writer targeting `output_dir`, without backups.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            backup_existing: false,
        }
    }

    /// Keeps a timestamped copy of each file before replacing it.
    #[must_use]
    pub const fn with_backup(mut self, backup_existing: bool) -> Self {
        self.backup_existing = backup_existing;
        self
    }

    /// Directory the manifest is written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes `articles.json` and `articles.js`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Output directory cannot be created
    /// - Serialization fails
    /// - File write operations fail
    pub fn write(&self, articles: &[Article]) -> Result<ManifestPaths> {
        fs::create_dir_all(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))?;

        let paths = ManifestPaths {
            json: self.output_dir.join(MANIFEST_JSON),
            js: self.output_dir.join(MANIFEST_JS),
        };

        self.write_one(&paths.json, &serde_json::to_string_pretty(articles)?)?;
        self.write_one(&paths.js, &render_js(articles)?)?;

        info!(
            "Wrote {} articles to {}",
            articles.len(),
            self.output_dir.display()
        );
        Ok(paths)
    }

    fn write_one(&self, path: &Path, content: &str) -> Result<()> {
        if path.exists() && self.backup_existing {
            backup_file(path)?;
        }
        write_file_atomic(path, content)?;
        debug!("Wrote {} ({} bytes)", path.display(), content.len());
        Ok(())
    }

    /// Removes backup files older than `max_age` from the output directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed or a backup cannot be removed.
    pub fn cleanup_old_backups(&self, max_age: Duration) -> Result<usize> {
        let mut removed = 0;
        let now = SystemTime::now();

        for entry in fs::read_dir(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))? {
            let entry = entry.map_err(|e| Error::io(&self.output_dir, e))?;
            let path = entry.path();

            let is_backup = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(".backup."));
            if !is_backup {
                continue;
            }

            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .map_err(|e| Error::io(&path, e))?;
            if now.duration_since(modified).is_ok_and(|age| age > max_age) {
                fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
                removed += 1;
                debug!("Removed old backup: {}", path.display());
            }
        }

        if removed > 0 {
            info!("Cleaned up {} old backup files", removed);
        }

        Ok(removed)
    }
}

/// Renders the script manifest: a generated-by header and `const articles = [...];`.
///
/// # Errors
///
/// Returns an error if the articles cannot be serialized.
pub fn render_js(articles: &[Article]) -> Result<String> {
    let json = serde_json::to_string_pretty(articles)?;
    Ok(format!(
        "// ============================================\n\
         // ARTICLE DATA STRUCTURE\n\
         // Generated by site-factory on {}\n\
         // ============================================\n\n\
         const articles = {json};\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ))
}

/// Reads a manifest written as `articles.json` or `articles.js`.
///
/// For script manifests the array between the first `[` and the last `]` is parsed.
///
/// # Errors
///
/// Returns an error if the file is missing or does not hold an article array.
pub fn read_manifest(path: impl AsRef<Path>) -> Result<Vec<Article>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

    let json = if path.extension().is_some_and(|ext| ext == "js") {
        let bytes = text.as_bytes();
        match (memchr::memchr(b'[', bytes), memchr::memrchr(b']', bytes)) {
            (Some(start), Some(end)) if end > start => &text[start..=end],
            _ => {
                return Err(Error::validation(format!(
                    "No article array found in {}",
                    path.display()
                )));
            }
        }
    } else {
        text.as_str()
    };

    Ok(serde_json::from_str(json)?)
}

/// Writes a file atomically.
///
/// # Process
///
/// 1. Writes content to a temporary file next to the target
/// 2. Syncs the temporary file to disk
/// 3. Renames it over the target path
///
/// # Errors
///
/// Returns an error if any step fails.
pub fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut temp_file = fs::File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| Error::io(&temp_path, e))?;

    // Ensure data is flushed to disk
    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;

    drop(temp_file);

    fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;

    Ok(())
}

/// Copies `path` to `<name>.backup.<nanos>` beside it.
fn backup_file(path: &Path) -> Result<PathBuf> {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());

    let filename = path
        .file_name()
        .ok_or_else(|| Error::config("Invalid file path"))?
        .to_string_lossy();

    let backup_path = path
        .parent()
        .ok_or_else(|| Error::config("Invalid file path"))?
        .join(format!("{filename}.backup.{timestamp}"));

    fs::copy(path, &backup_path).map_err(|e| Error::io(&backup_path, e))?;

    debug!("Created backup: {}", backup_path.display());
    Ok(backup_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn articles() -> Vec<Article> {
        vec![
            Article {
                id: Some(1),
                title: "First".to_string(),
                content: "<p>One</p>".to_string(),
                ..Article::default()
            },
            Article {
                id: Some(2),
                title: "Second [draft]".to_string(),
                content: "<p>Two</p>".to_string(),
                ..Article::default()
            },
        ]
    }

    #[test]
    fn test_writer_creates_output_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        let output_dir = temp.child("data");

        let paths = ManifestWriter::new(output_dir.path()).write(&articles()).unwrap();

        assert!(output_dir.exists());
        assert!(paths.json.exists());
        assert!(paths.js.exists());
    }

    #[test]
    fn test_manifest_round_trips_through_both_formats() {
        let temp = assert_fs::TempDir::new().unwrap();
        let paths = ManifestWriter::new(temp.path()).write(&articles()).unwrap();

        assert_eq!(read_manifest(&paths.json).unwrap(), articles());
        assert_eq!(read_manifest(&paths.js).unwrap(), articles());

        let js = fs::read_to_string(&paths.js).unwrap();
        assert!(js.contains("Generated by site-factory"));
        assert!(js.contains("const articles = ["));
        assert!(js.trim_end().ends_with("];"));
    }

    #[test]
    fn test_read_manifest_errors() {
        let temp = assert_fs::TempDir::new().unwrap();
        assert!(read_manifest(temp.child("missing.json").path()).unwrap_err().is_io());

        let bad = temp.child("bad.js");
        bad.write_str("const articles = null;").unwrap();
        assert!(read_manifest(bad.path()).is_err());
    }

    #[test]
    fn test_writer_creates_backup() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(MANIFEST_JSON).write_str("[]").unwrap();

        ManifestWriter::new(temp.path())
            .with_backup(true)
            .write(&articles())
            .unwrap();

        let entries: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();

        assert!(entries.iter().any(|name| name.starts_with("articles.json.backup.")));
        assert!(!entries.iter().any(|name| name.ends_with(".tmp")));
    }

    #[test]
    fn test_write_file_atomic_replaces_content() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("out.txt");
        file.write_str("old").unwrap();

        write_file_atomic(file.path(), "new").unwrap();
        file.assert("new");
    }

    #[test]
    fn test_cleanup_old_backups() {
        use std::thread;

        let temp = assert_fs::TempDir::new().unwrap();

        let old_backup = temp.child("articles.json.backup.123");
        old_backup.write_str("old").unwrap();

        thread::sleep(Duration::from_millis(100));

        let new_backup = temp.child("articles.json.backup.456");
        new_backup.write_str("new").unwrap();

        let removed = ManifestWriter::new(temp.path())
            .cleanup_old_backups(Duration::from_millis(50))
            .unwrap();

        assert_eq!(removed, 1);
        assert!(!old_backup.exists());
        assert!(new_backup.exists());
    }
}
