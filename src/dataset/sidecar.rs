//! BIDS metadata inheritance.
//!
//! A JSON sidecar applies to a data file when the sidecar's entity set is a
//! subset of the file's entity set and both name the same suffix. Sidecars
//! merge from the dataset root down to the file's own directory, so deeper
//! and more specific files override shallower ones key by key.

use crate::dataset::filename::ParsedName;
use crate::value::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One sidecar discovered during the walk, pre-parsed for matching.
#[derive(Debug, Clone)]
pub struct Sidecar {
    pub path: PathBuf,
    /// Directory containing the sidecar, relative to the dataset root
    pub dir: PathBuf,
    pub parsed: ParsedName,
    pub contents: HashMap<String, Value>,
}

/// Depth of the sidecar's directory below the dataset root.
fn depth(dir: &Path) -> usize {
    dir.components().count()
}

/// Does `sidecar` apply to a file with the given name parts in `file_dir`?
///
/// The sidecar must live in `file_dir` or one of its ancestors (including
/// the root), its entities must be a subset of the file's, and the suffixes
/// must agree. A sidecar never applies to itself.
fn applies(sidecar: &Sidecar, file_path: &Path, file_dir: &Path, parsed: &ParsedName) -> bool {
    if sidecar.path == file_path {
        return false;
    }
    let at_root = sidecar.dir.as_os_str().is_empty();
    if !at_root && !file_dir.starts_with(&sidecar.dir) {
        return false;
    }
    if sidecar.parsed.suffix != parsed.suffix {
        return false;
    }
    sidecar
        .parsed
        .entities
        .iter()
        .all(|(k, v)| parsed.entities.get(k) == Some(v))
}

/// Merge `overlay` into `base`: nested maps merge recursively, everything
/// else is replaced.
fn merge_into(base: &mut HashMap<String, Value>, overlay: &HashMap<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Map(existing)), Value::Map(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Compute the effective metadata for one file from all applicable sidecars.
///
/// `sidecars` is every JSON sidecar in the dataset; applicability and
/// ordering (root first, then by specificity) are handled here.
pub fn resolve_metadata(
    sidecars: &[Sidecar],
    file_path: &Path,
    file_dir: &Path,
    parsed: &ParsedName,
) -> HashMap<String, Value> {
    let mut applicable: Vec<&Sidecar> = sidecars
        .iter()
        .filter(|s| applies(s, file_path, file_dir, parsed))
        .collect();

    // Shallower directories first; within a level, fewer entities first so
    // the more specific sidecar overrides.
    applicable.sort_by_key(|s| (depth(&s.dir), s.parsed.entities.len()));

    let mut metadata = HashMap::new();
    for sidecar in applicable {
        merge_into(&mut metadata, &sidecar.contents);
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::filename::parse_filename;

    fn sidecar(path: &str, contents: &[(&str, Value)]) -> Sidecar {
        let path = PathBuf::from(path);
        let dir = path.parent().unwrap().to_path_buf();
        let parsed = parse_filename(path.file_name().unwrap().to_str().unwrap());
        Sidecar {
            path,
            dir,
            parsed,
            contents: contents
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_deeper_sidecar_overrides() {
        let sidecars = vec![
            sidecar("task-rest_bold.json", &[("RepetitionTime", Value::Float(2.0))]),
            sidecar(
                "sub-01/func/sub-01_task-rest_bold.json",
                &[("RepetitionTime", Value::Float(1.5))],
            ),
        ];
        let parsed = parse_filename("sub-01_task-rest_bold.nii.gz");
        let metadata = resolve_metadata(
            &sidecars,
            Path::new("sub-01/func/sub-01_task-rest_bold.nii.gz"),
            Path::new("sub-01/func"),
            &parsed,
        );
        assert_eq!(metadata.get("RepetitionTime"), Some(&Value::Float(1.5)));
    }

    #[test]
    fn test_entity_superset_required() {
        let sidecars = vec![sidecar(
            "task-nback_bold.json",
            &[("TaskName", Value::Str("nback".into()))],
        )];
        let parsed = parse_filename("sub-01_task-rest_bold.nii.gz");
        let metadata = resolve_metadata(
            &sidecars,
            Path::new("sub-01/func/sub-01_task-rest_bold.nii.gz"),
            Path::new("sub-01/func"),
            &parsed,
        );
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_suffix_must_agree() {
        let sidecars = vec![sidecar(
            "task-rest_bold.json",
            &[("RepetitionTime", Value::Float(2.0))],
        )];
        let parsed = parse_filename("sub-01_task-rest_events.tsv");
        let metadata = resolve_metadata(
            &sidecars,
            Path::new("sub-01/func/sub-01_task-rest_events.tsv"),
            Path::new("sub-01/func"),
            &parsed,
        );
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_nested_maps_merge_recursively() {
        let sidecars = vec![
            sidecar(
                "task-rest_bold.json",
                &[(
                    "Coil",
                    Value::Map(
                        [
                            ("Channels".to_string(), Value::Int(32)),
                            ("Vendor".to_string(), Value::Str("X".into())),
                        ]
                        .into_iter()
                        .collect(),
                    ),
                )],
            ),
            sidecar(
                "sub-01/sub-01_task-rest_bold.json",
                &[(
                    "Coil",
                    Value::Map(
                        [("Channels".to_string(), Value::Int(64))]
                            .into_iter()
                            .collect(),
                    ),
                )],
            ),
        ];
        let parsed = parse_filename("sub-01_task-rest_bold.nii.gz");
        let metadata = resolve_metadata(
            &sidecars,
            Path::new("sub-01/func/sub-01_task-rest_bold.nii.gz"),
            Path::new("sub-01/func"),
            &parsed,
        );
        match metadata.get("Coil") {
            Some(Value::Map(coil)) => {
                assert_eq!(coil.get("Channels"), Some(&Value::Int(64)));
                assert_eq!(coil.get("Vendor"), Some(&Value::Str("X".into())));
            }
            other => panic!("expected merged map, got {:?}", other),
        }
    }
}
