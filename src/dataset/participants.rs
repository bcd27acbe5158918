//! `participants.tsv` loading.

use crate::dataset::ParticipantsWarning;
use crate::value::Value;
use std::collections::HashMap;
use std::path::Path;

/// Per-subject attribute rows keyed by subject token.
///
/// Each row is indexed under both the full `participant_id` (`sub-01`) and
/// the bare label (`01`) so record attachment can use the entity value
/// directly.
pub type ParticipantsTable = HashMap<String, HashMap<String, Value>>;

/// Read `participants.tsv` at the dataset root.
///
/// A missing file yields an empty table. Rows whose field count disagrees
/// with the header are skipped and reported through `warnings`.
pub fn load_participants(root: &Path, warnings: &mut Vec<ParticipantsWarning>) -> ParticipantsTable {
    let path = root.join("participants.tsv");
    if !path.is_file() {
        return ParticipantsTable::new();
    }

    let mut reader = match csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(false)
        .from_path(&path)
    {
        Ok(reader) => reader,
        Err(e) => {
            warnings.push(ParticipantsWarning {
                path,
                message: e.to_string(),
            });
            return ParticipantsTable::new();
        }
    };

    let headers: Vec<String> = match reader.headers() {
        Ok(headers) => headers.iter().map(|h| h.to_string()).collect(),
        Err(e) => {
            warnings.push(ParticipantsWarning {
                path,
                message: e.to_string(),
            });
            return ParticipantsTable::new();
        }
    };

    let mut table = ParticipantsTable::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warnings.push(ParticipantsWarning {
                    path: path.clone(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        let mut row = HashMap::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            row.insert(header.clone(), Value::Str(field.to_string()));
        }

        let id = match record.get(0) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                warnings.push(ParticipantsWarning {
                    path: path.clone(),
                    message: "row without participant_id".to_string(),
                });
                continue;
            }
        };

        // Index by both `sub-01` and `01`
        if let Some(bare) = id.strip_prefix("sub-") {
            table.insert(bare.to_string(), row.clone());
        }
        table.insert(id, row);
    }

    table
}
