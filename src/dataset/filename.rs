use indexmap::IndexMap;
use std::path::Path;

/// Datatype directory names recognized by default. A file sitting directly
/// inside one of these gets that name as its datatype.
pub const DEFAULT_DATATYPES: &[&str] = &[
    "anat", "func", "dwi", "fmap", "beh", "eeg", "meg", "ieeg", "pet", "perf", "micr",
];

/// Decomposed BIDS filename: ordered entity map, optional suffix, extension.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedName {
    /// `key-value` segments in filename order
    pub entities: IndexMap<String, String>,
    /// Trailing segment without a dash (`bold`, `T1w`, ...)
    pub suffix: Option<String>,
    /// Everything from the first dot to the end (`.nii.gz` is one extension)
    pub extension: String,
}

/// Parse a BIDS filename into entities, suffix, and extension.
///
/// Parsing is tolerant and never fails: malformed names yield whatever
/// entities were recognizable and no suffix. A non-final segment without a
/// dash is ignored.
///
/// # Examples
///
/// ```
/// use biql::dataset::parse_filename;
///
/// let parsed = parse_filename("sub-01_ses-pre_task-nback_run-2_bold.nii.gz");
/// assert_eq!(parsed.entities.get("sub").map(String::as_str), Some("01"));
/// assert_eq!(parsed.entities.get("task").map(String::as_str), Some("nback"));
/// assert_eq!(parsed.suffix.as_deref(), Some("bold"));
/// assert_eq!(parsed.extension, ".nii.gz");
/// ```
pub fn parse_filename(filename: &str) -> ParsedName {
    let (stem, extension) = match filename.find('.') {
        Some(idx) => (&filename[..idx], filename[idx..].to_string()),
        None => (filename, String::new()),
    };

    let mut entities = IndexMap::new();
    let mut suffix = None;

    let segments: Vec<&str> = stem.split('_').collect();
    let last = segments.len().saturating_sub(1);
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        match segment.find('-') {
            Some(dash) => {
                let key = &segment[..dash];
                let value = &segment[dash + 1..];
                if !key.is_empty() {
                    entities.insert(key.to_string(), value.to_string());
                }
            }
            None if i == last => suffix = Some(segment.to_string()),
            None => {} // tolerated noise segment
        }
    }

    ParsedName {
        entities,
        suffix,
        extension,
    }
}

/// Datatype of a file: the name of its immediate parent directory when that
/// name is one of the recognized datatype labels.
pub fn datatype_of(path: &Path, datatypes: &[String]) -> Option<String> {
    let parent = path.parent()?.file_name()?.to_str()?;
    datatypes
        .iter()
        .find(|d| d.as_str() == parent)
        .map(|d| d.clone())
}

#[test]
fn test_extension_spans_from_first_dot() {
    let parsed = parse_filename("sub-01_bold.nii.gz");
    assert_eq!(parsed.extension, ".nii.gz");
    assert_eq!(parsed.suffix.as_deref(), Some("bold"));
}

#[test]
fn test_malformed_names_do_not_fail() {
    let parsed = parse_filename("README");
    assert!(parsed.entities.is_empty());
    assert_eq!(parsed.suffix.as_deref(), Some("README"));
    assert_eq!(parsed.extension, "");

    let parsed = parse_filename("dataset_description.json");
    assert!(parsed.entities.is_empty());
    assert_eq!(parsed.suffix.as_deref(), Some("description"));
    assert_eq!(parsed.extension, ".json");
}

#[test]
fn test_value_keeps_dashes_after_first() {
    let parsed = parse_filename("sub-01_acq-high-res_T1w.nii");
    assert_eq!(
        parsed.entities.get("acq").map(String::as_str),
        Some("high-res")
    );
}
