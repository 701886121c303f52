//! Nested histogram folders stored in a single JSON file.
//!
//! The format stands in for a ROOT `TFile` and keeps the one property the
//! pipeline relies on: histograms live in named folders that nest
//! arbitrarily. Paths use `/` separators and are rooted at the file, e.g.
//! `/met` or `/ltop/mass`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use ts_core::{Error, Result};

use crate::histogram::Histogram;

/// A folder inside an archive: histograms plus nested subfolders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Folder {
    /// Histograms stored directly in this folder, keyed by name.
    #[serde(default)]
    pub histograms: BTreeMap<String, Histogram>,
    /// Nested folders, keyed by name.
    #[serde(default)]
    pub folders: BTreeMap<String, Folder>,
}

impl Folder {
    /// Look up a nested folder by `/`-separated path. Empty path is `self`.
    pub fn folder(&self, path: &str) -> Option<&Folder> {
        let mut current = self;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current = current.folders.get(part)?;
        }
        Some(current)
    }

    /// Visit every histogram below this folder.
    ///
    /// The callback receives the folder path (`""` for the archive root,
    /// `"/ltop"` for a subfolder) and the histogram.
    pub fn for_each_histogram<F>(&self, f: &mut F)
    where
        F: FnMut(&str, &Histogram),
    {
        self.walk("", f);
    }

    fn walk<F>(&self, path: &str, f: &mut F)
    where
        F: FnMut(&str, &Histogram),
    {
        for hist in self.histograms.values() {
            f(path, hist);
        }
        for (name, folder) in &self.folders {
            let sub = format!("{}/{}", path, name);
            folder.walk(&sub, f);
        }
    }
}

/// A histogram archive backed by a JSON file.
#[derive(Debug, Clone)]
pub struct Archive {
    path: PathBuf,
    root: Folder,
}

impl Archive {
    /// Open an existing archive for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Archive(format!(
                "input file does not exist: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)?;
        let root: Folder = serde_json::from_str(&text)?;
        Ok(Self { path: path.to_path_buf(), root })
    }

    /// Open an archive in update mode: existing content is kept, a missing
    /// file starts empty. Changes are written back by [`Archive::save`].
    pub fn update<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path)
        } else {
            Ok(Self { path: path.to_path_buf(), root: Folder::default() })
        }
    }

    /// Write the archive back to its file.
    pub fn save(&self) -> Result<()> {
        let text = serde_json::to_string(&self.root)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }

    /// Root folder.
    pub fn root(&self) -> &Folder {
        &self.root
    }

    /// Look up a histogram by full path, e.g. `/ltop/mass`.
    pub fn get(&self, path: &str) -> Option<&Histogram> {
        let (folder_path, name) = split_path(path)?;
        self.root.folder(folder_path)?.histograms.get(name)
    }

    /// Store a histogram under the given full path, creating intermediate
    /// folders as needed. The stored histogram's name is set from the path.
    pub fn insert(&mut self, path: &str, mut hist: Histogram) -> Result<()> {
        let (folder_path, name) =
            split_path(path).ok_or_else(|| Error::Archive(format!("bad path: {:?}", path)))?;
        hist.name = name.to_string();
        let mut current = &mut self.root;
        for part in folder_path.split('/').filter(|p| !p.is_empty()) {
            current = current.folders.entry(part.to_string()).or_default();
        }
        current.histograms.insert(name.to_string(), hist);
        Ok(())
    }
}

/// Split `/a/b/name` into (`/a/b`, `name`). Returns `None` for empty names.
fn split_path(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let (folder, name) = match trimmed.rfind('/') {
        Some(i) => (&trimmed[..i], &trimmed[i + 1..]),
        None => ("", trimmed),
    };
    if name.is_empty() {
        return None;
    }
    Some((path_of(path, folder), name))
}

fn path_of<'a>(full: &'a str, folder: &'a str) -> &'a str {
    // Preserve the leading slash of the original path for folder lookup.
    if folder.is_empty() {
        ""
    } else if full.starts_with('/') {
        &full[..folder.len() + 1]
    } else {
        folder
    }
}
