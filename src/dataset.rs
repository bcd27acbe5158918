//! Dataset indexing: walking a BIDS tree into an immutable catalog of
//! file records.

pub mod filename;
pub mod participants;
pub mod sidecar;

pub use filename::{datatype_of, parse_filename, ParsedName, DEFAULT_DATATYPES};

use crate::value::Value;
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

/// Errors fatal to catalog construction.
#[derive(Debug)]
pub enum DatasetError {
    /// Root path does not exist
    NotFound(PathBuf),
    /// Root path exists but is not a directory
    NotADirectory(PathBuf),
    /// Root directory could not be read
    Unreadable { path: PathBuf, source: io::Error },
    /// Indexing was cancelled through the cancellation token
    Cancelled,
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::NotFound(path) => {
                write!(f, "dataset not found: {}", path.display())
            }
            DatasetError::NotADirectory(path) => {
                write!(f, "dataset root is not a directory: {}", path.display())
            }
            DatasetError::Unreadable { path, source } => {
                write!(f, "cannot read dataset {}: {}", path.display(), source)
            }
            DatasetError::Cancelled => write!(f, "indexing cancelled"),
        }
    }
}

impl std::error::Error for DatasetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DatasetError::Unreadable { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A sidecar that failed to parse; the sidecar is skipped, indexing goes on.
#[derive(Debug, Clone)]
pub struct SidecarWarning {
    pub path: PathBuf,
    pub message: String,
}

/// A participants.tsv problem; the row (or table) is skipped.
#[derive(Debug, Clone)]
pub struct ParticipantsWarning {
    pub path: PathBuf,
    pub message: String,
}

/// Non-fatal problems collected while indexing.
#[derive(Debug, Clone)]
pub enum IndexWarning {
    Sidecar(SidecarWarning),
    Participants(ParticipantsWarning),
}

impl std::fmt::Display for IndexWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexWarning::Sidecar(w) => {
                write!(f, "sidecar {}: {}", w.path.display(), w.message)
            }
            IndexWarning::Participants(w) => {
                write!(f, "participants {}: {}", w.path.display(), w.message)
            }
        }
    }
}

/// Cooperative cancellation handle, checked between files during indexing.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Indexing configuration.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Recognized datatype directory names
    pub datatypes: Vec<String>,
    pub cancel: CancellationToken,
}

impl Default for IndexOptions {
    fn default() -> Self {
        IndexOptions {
            datatypes: DEFAULT_DATATYPES.iter().map(|s| s.to_string()).collect(),
            cancel: CancellationToken::new(),
        }
    }
}

/// One indexed file: a self-contained bag of namespaced attributes.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute path
    pub filepath: PathBuf,
    /// Path relative to the dataset root
    pub relative_path: PathBuf,
    pub filename: String,
    pub extension: String,
    /// Filename entities in filename order
    pub entities: IndexMap<String, String>,
    pub suffix: Option<String>,
    /// Set when the file sits directly inside a datatype directory
    pub datatype: Option<String>,
    /// Effective metadata after sidecar inheritance
    pub metadata: HashMap<String, Value>,
    /// Matching participants row, if any
    pub participants: HashMap<String, Value>,
}

impl FileRecord {
    /// Resolve a bare (single-segment) field: entity first, then computed.
    pub fn field(&self, name: &str) -> Value {
        if let Some(value) = self.entities.get(name) {
            return Value::Str(value.clone());
        }
        match name {
            "filename" => Value::Str(self.filename.clone()),
            "filepath" => Value::Str(self.filepath.to_string_lossy().into_owned()),
            "relative_path" => Value::Str(self.relative_path.to_string_lossy().into_owned()),
            "extension" => Value::Str(self.extension.clone()),
            "suffix" => match &self.suffix {
                Some(s) => Value::Str(s.clone()),
                None => Value::Null,
            },
            "datatype" => match &self.datatype {
                Some(d) => Value::Str(d.clone()),
                None => Value::Null,
            },
            _ => Value::Null,
        }
    }
}

/// Aggregate numbers about a catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub total_files: usize,
    pub total_subjects: usize,
    pub files_by_datatype: BTreeMap<String, usize>,
    /// Sorted distinct `sub` values
    pub subjects: Vec<String>,
    /// Sorted distinct datatypes
    pub datatypes: Vec<String>,
}

/// The immutable catalog: every regular file under the root, indexed.
#[derive(Debug)]
pub struct BidsDataset {
    root: PathBuf,
    files: Vec<FileRecord>,
    warnings: Vec<IndexWarning>,
}

impl BidsDataset {
    /// Index the dataset at `root` with default options.
    pub fn index(root: impl AsRef<Path>) -> Result<BidsDataset, DatasetError> {
        BidsDataset::index_with(root, &IndexOptions::default())
    }

    /// Index the dataset at `root`.
    ///
    /// Performs a stable pre-order walk (symlinks followed, cycles detected)
    /// and builds one record per regular file. Sidecars, `participants.tsv`,
    /// and `*_scans.tsv`/`*_sessions.tsv` tables are indexed like any other
    /// file. The cancellation token is checked between files.
    pub fn index_with(
        root: impl AsRef<Path>,
        options: &IndexOptions,
    ) -> Result<BidsDataset, DatasetError> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(DatasetError::NotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(DatasetError::NotADirectory(root.to_path_buf()));
        }
        let root = root
            .canonicalize()
            .map_err(|source| DatasetError::Unreadable {
                path: root.to_path_buf(),
                source,
            })?;

        let mut warnings = Vec::new();

        let mut participant_warnings = Vec::new();
        let participants = participants::load_participants(&root, &mut participant_warnings);
        warnings.extend(participant_warnings.into_iter().map(IndexWarning::Participants));

        // First pass: collect paths in walk order and pre-parse sidecars.
        let mut paths: Vec<PathBuf> = Vec::new();
        let mut sidecars: Vec<sidecar::Sidecar> = Vec::new();

        let walker = WalkDir::new(&root).follow_links(true).sort_by_file_name();
        for entry in walker {
            if options.cancel.is_cancelled() {
                return Err(DatasetError::Cancelled);
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // A failure on the root itself is fatal; deeper
                    // failures (permissions, symlink loops) skip the entry.
                    if e.path() == Some(root.as_path()) {
                        return Err(DatasetError::Unreadable {
                            path: root.clone(),
                            source: e.into(),
                        });
                    }
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path().to_path_buf();

            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                let filename = entry.file_name().to_string_lossy().into_owned();
                let rel_dir = path
                    .parent()
                    .and_then(|p| p.strip_prefix(&root).ok())
                    .unwrap_or(Path::new(""))
                    .to_path_buf();
                match std::fs::read_to_string(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|text| {
                        serde_json::from_str::<serde_json::Value>(&text).map_err(|e| e.to_string())
                    }) {
                    Ok(serde_json::Value::Object(obj)) => {
                        let contents = obj
                            .into_iter()
                            .map(|(k, v)| (k, Value::from_json(v)))
                            .collect();
                        sidecars.push(sidecar::Sidecar {
                            path: path.clone(),
                            dir: rel_dir,
                            parsed: parse_filename(&filename),
                            contents,
                        });
                    }
                    Ok(_) => {
                        warnings.push(IndexWarning::Sidecar(SidecarWarning {
                            path: path.clone(),
                            message: "top-level JSON value is not an object".to_string(),
                        }));
                    }
                    Err(message) => {
                        warnings.push(IndexWarning::Sidecar(SidecarWarning {
                            path: path.clone(),
                            message,
                        }));
                    }
                }
            }

            paths.push(path);
        }

        // Second pass: build records with inherited metadata.
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            if options.cancel.is_cancelled() {
                return Err(DatasetError::Cancelled);
            }

            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let relative_path = path
                .strip_prefix(&root)
                .unwrap_or(path.as_path())
                .to_path_buf();
            let rel_dir = relative_path
                .parent()
                .unwrap_or(Path::new(""))
                .to_path_buf();

            let parsed = parse_filename(&filename);
            let metadata = sidecar::resolve_metadata(&sidecars, &path, &rel_dir, &parsed);
            let datatype = datatype_of(&path, &options.datatypes);

            let participant_row = parsed
                .entities
                .get("sub")
                .and_then(|sub| participants.get(sub))
                .cloned()
                .unwrap_or_default();

            files.push(FileRecord {
                filepath: path,
                relative_path,
                filename,
                extension: parsed.extension,
                entities: parsed.entities,
                suffix: parsed.suffix,
                datatype,
                metadata,
                participants: participant_row,
            });
        }

        Ok(BidsDataset {
            root,
            files,
            warnings,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Records in walk order.
    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    /// Non-fatal problems encountered while indexing.
    pub fn warnings(&self) -> &[IndexWarning] {
        &self.warnings
    }

    /// Sorted distinct `sub` entity values.
    pub fn subjects(&self) -> Vec<String> {
        let set: BTreeSet<String> = self
            .files
            .iter()
            .filter_map(|f| f.entities.get("sub").cloned())
            .collect();
        set.into_iter().collect()
    }

    /// Sorted distinct datatypes.
    pub fn datatypes(&self) -> Vec<String> {
        let set: BTreeSet<String> = self.files.iter().filter_map(|f| f.datatype.clone()).collect();
        set.into_iter().collect()
    }

    pub fn stats(&self) -> DatasetStats {
        let mut files_by_datatype = BTreeMap::new();
        for file in &self.files {
            if let Some(datatype) = &file.datatype {
                *files_by_datatype.entry(datatype.clone()).or_insert(0) += 1;
            }
        }
        let subjects = self.subjects();
        DatasetStats {
            total_files: self.files.len(),
            total_subjects: subjects.len(),
            files_by_datatype,
            subjects,
            datatypes: self.datatypes(),
        }
    }

    /// Every entity name with its sorted distinct values.
    pub fn entity_values(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for file in &self.files {
            for (key, value) in &file.entities {
                map.entry(key.clone()).or_default().insert(value.clone());
            }
        }
        map.into_iter()
            .map(|(k, v)| (k, v.into_iter().collect()))
            .collect()
    }
}
