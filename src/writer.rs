//! Markdown file output: `<output_dir>/<library>/<title>[_N].md`

use crate::error::{Result, ScrapeError};
use crate::schema::PageRecord;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tracing::info;

const MAX_STEM_LEN: usize = 200;

/// Names are unique per library within one writer's lifetime (one run).
/// Files from earlier runs are overwritten.
#[derive(Debug)]
pub struct FileWriter {
    output_dir: PathBuf,
    used: Mutex<HashMap<String, HashSet<String>>>,
}

impl FileWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            used: Mutex::new(HashMap::new()),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn library_dir(&self, library_name: &str) -> PathBuf {
        self.output_dir.join(sanitize_filename(library_name))
    }

    /// Write one page, returning the path actually used
    pub async fn write(&self, library_name: &str, page: &PageRecord) -> Result<PathBuf> {
        let dir = self.library_dir(library_name);
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| ScrapeError::PersistenceFailure {
                path: dir.clone(),
                source,
            })?;

        let filename = self.reserve(library_name, &page.title);
        let path = dir.join(filename);
        fs::write(&path, page.content.as_bytes())
            .await
            .map_err(|source| ScrapeError::PersistenceFailure {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), "saved");
        Ok(path)
    }

    /// Pick the first free `<stem>.md`, `<stem>_2.md`, ... in the library's
    /// directory. Names are tracked per directory, so libraries whose names
    /// sanitize alike share one set.
    fn reserve(&self, library_name: &str, title: &str) -> String {
        let stem = sanitize_filename(title);
        let mut used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        let names = used.entry(sanitize_filename(library_name)).or_default();

        let mut candidate = format!("{}.md", stem);
        let mut n = 2;
        while names.contains(&candidate) {
            candidate = format!("{}_{}.md", stem, n);
            n += 1;
        }
        names.insert(candidate.clone());
        candidate
    }
}

/// Whitespace runs become `_`; anything but ASCII alnum, `_`, `-` is dropped
pub fn sanitize_filename(name: &str) -> String {
    let joined = name.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_STEM_LEN)
        .collect();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}
