//! Document sources feeding `reload`.

use crate::error::{StoreError, StoreResult};
use datasync_model::DatasetDescriptor;
use datasync_types::DocumentId;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Raw documents of one dataset type, keyed by document id.
pub type Documents = BTreeMap<DocumentId, serde_json::Value>;

/// Supplies the current documents of a dataset type on each reload.
pub trait DocumentSource: Send + Sync {
    fn load(&self, descriptor: &DatasetDescriptor) -> StoreResult<Documents>;
}

/// Reads JSON documents laid out as
/// `<root>/<namespace>/<folder path>/<path>.json`.
///
/// Each file becomes `namespace:path`. Files that cannot be read or parsed,
/// or whose name is not a valid id, are logged and skipped.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DocumentSource for DirectorySource {
    fn load(&self, descriptor: &DatasetDescriptor) -> StoreResult<Documents> {
        let namespaces = fs::read_dir(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;

        let folder = descriptor.folder_path();
        let mut documents = Documents::new();

        for ns_entry in namespaces.flatten() {
            let ns_dir = ns_entry.path();
            if !ns_dir.is_dir() {
                continue;
            }
            let Some(namespace) = ns_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let base = ns_dir.join(&folder);
            if !base.is_dir() {
                continue;
            }

            let mut files = Vec::new();
            collect_json_files(&base, &mut files);

            for file in files {
                let Some(path) = relative_document_path(&base, &file) else {
                    continue;
                };
                let id = match DocumentId::new(namespace, path) {
                    Ok(id) => id,
                    Err(e) => {
                        warn!("Skipping {}: {}", file.display(), e);
                        continue;
                    }
                };
                let text = match fs::read_to_string(&file) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to read {}: {}", file.display(), e);
                        continue;
                    }
                };
                match serde_json::from_str(&text) {
                    Ok(value) => {
                        documents.insert(id, value);
                    }
                    Err(e) => warn!("Failed to parse {}: {}", file.display(), e),
                }
            }
        }

        debug!(
            "Found {} {} documents under {}",
            documents.len(),
            descriptor.name,
            self.root.display()
        );
        Ok(documents)
    }
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to list {}: {}", dir.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        // Symlinked directories are not followed; they could form a cycle.
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();
        if file_type.is_dir() {
            collect_json_files(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "json")
            && (!file_type.is_symlink() || path.is_file())
        {
            out.push(path);
        }
    }
}

/// `base/a/b.json` → `a/b`.
fn relative_document_path(base: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(base).ok()?.with_extension("");
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

/// In-memory documents per dataset type name.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    documents: HashMap<String, Documents>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dataset_type: impl Into<String>, documents: Documents) -> Self {
        self.insert(dataset_type, documents);
        self
    }

    pub fn insert(&mut self, dataset_type: impl Into<String>, documents: Documents) {
        self.documents.insert(dataset_type.into(), documents);
    }
}

impl DocumentSource for StaticSource {
    fn load(&self, descriptor: &DatasetDescriptor) -> StoreResult<Documents> {
        Ok(self
            .documents
            .get(&descriptor.name)
            .cloned()
            .unwrap_or_default())
    }
}
