//! Descriptor parsing and validation.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Component, Path};

use super::error::ValidationError;
use super::types::{RawRow, WorkItem};

const KEY_COLUMN: &str = "key";
const SOURCE_COLUMNS: [&str; 2] = ["source_location", "sourcelocation"];
const PARAMETER_COLUMN: &str = "parameter";

/// Normalizes a location to its canonical trailing-delimiter form.
pub fn normalize_location(location: &str) -> String {
    let trimmed = location.trim().trim_end_matches('/');
    format!("{}/", trimmed)
}

/// Whether `key` names exactly one directory under the staging root.
fn is_valid_key(key: &str) -> bool {
    let mut components = Path::new(key).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == OsStr::new(key)
    )
}

/// Checks keys of already-built items: each a single path segment, none repeated.
///
/// `parse` output always passes; this guards items built by other means.
pub fn validate_items(items: &[WorkItem]) -> Result<(), ValidationError> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (idx, item) in items.iter().enumerate() {
        let row = idx + 1;
        if !is_valid_key(&item.key) {
            return Err(ValidationError::InvalidKey {
                row,
                key: item.key.clone(),
            });
        }
        if let Some(&first_row) = seen.get(item.key.as_str()) {
            return Err(ValidationError::DuplicateKey {
                row,
                key: item.key.clone(),
                first_row,
            });
        }
        seen.insert(&item.key, row);
    }
    Ok(())
}

/// Validates raw rows into work items.
///
/// Blank parameters fall back to `default_parameter`. Output order matches
/// input order. Fails on the first missing field or repeated key.
pub fn parse<I>(rows: I, default_parameter: &str) -> Result<Vec<WorkItem>, ValidationError>
where
    I: IntoIterator<Item = RawRow>,
{
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut items = Vec::new();

    for (idx, row) in rows.into_iter().enumerate() {
        let row_no = idx + 1;

        let key = row
            .key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ValidationError::MissingField {
                row: row_no,
                field: "key",
            })?;
        let source = row
            .source_location
            .filter(|s| !s.trim().trim_end_matches('/').is_empty())
            .ok_or(ValidationError::MissingField {
                row: row_no,
                field: "source_location",
            })?;

        if !is_valid_key(&key) {
            return Err(ValidationError::InvalidKey { row: row_no, key });
        }
        if let Some(&first_row) = seen.get(&key) {
            return Err(ValidationError::DuplicateKey {
                row: row_no,
                key,
                first_row,
            });
        }
        seen.insert(key.clone(), row_no);

        let parameter = row
            .parameter
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| default_parameter.to_string());

        items.push(WorkItem {
            key,
            source_location: normalize_location(&source),
            parameter,
        });
    }

    Ok(items)
}

/// Parses a tab- or comma-separated descriptor with a header line.
///
/// Blank lines and lines starting with `#` are skipped. Unknown columns are
/// ignored.
pub fn parse_descriptor(
    text: &str,
    default_parameter: &str,
) -> Result<Vec<WorkItem>, ValidationError> {
    let mut lines = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'));

    let header = lines.next().ok_or(ValidationError::EmptyDescriptor)?;
    let delimiter = if header.contains('\t') { '\t' } else { ',' };

    let columns: Vec<String> = header
        .split(delimiter)
        .map(|c| c.trim().to_ascii_lowercase())
        .collect();
    let find = |names: &[&str]| columns.iter().position(|c| names.contains(&c.as_str()));

    let key_idx = find(&[KEY_COLUMN]).ok_or(ValidationError::MissingColumn { column: "key" })?;
    let source_idx = find(&SOURCE_COLUMNS).ok_or(ValidationError::MissingColumn {
        column: "source_location",
    })?;
    let parameter_idx = find(&[PARAMETER_COLUMN]);

    let mut rows = Vec::new();
    for (idx, line) in lines.enumerate() {
        let cells: Vec<&str> = line.split(delimiter).collect();
        if cells.len() != columns.len() {
            return Err(ValidationError::MalformedRow {
                row: idx + 1,
                expected: columns.len(),
                found: cells.len(),
            });
        }
        rows.push(RawRow::new(
            cells[key_idx],
            cells[source_idx],
            parameter_idx.map(|i| cells[i]).unwrap_or(""),
        ));
    }

    parse(rows, default_parameter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_location() {
        assert_eq!(normalize_location("loc/run1"), "loc/run1/");
        assert_eq!(normalize_location("loc/run1/"), "loc/run1/");
        assert_eq!(normalize_location(" s3://bucket/run//  "), "s3://bucket/run/");
    }

    #[test]
    fn test_blank_parameter_uses_default() {
        let items = parse(vec![RawRow::new("S1", "loc/run1/", "")], "modelA").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].parameter, "modelA");
        assert_eq!(items[0].source_location, "loc/run1/");
    }

    #[test]
    fn test_explicit_parameter_kept() {
        let items = parse(vec![RawRow::new("S1", "loc/run1", "sup")], "modelA").unwrap();
        assert_eq!(items[0].parameter, "sup");
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let rows = vec![
            RawRow::new("S1", "loc/a", ""),
            RawRow::new("S2", "loc/b", ""),
            RawRow::new("S1", "loc/c", ""),
        ];
        let err = parse(rows, "modelA").unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicateKey {
                row: 3,
                key: "S1".to_string(),
                first_row: 1,
            }
        );
        assert_eq!(err.row(), Some(3));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let err = parse(vec![RawRow::new("", "loc/a", "")], "m").unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { row: 1, field: "key" }));

        let err = parse(
            vec![RawRow::new("S1", "loc/a", ""), RawRow::new("S2", "/", "")],
            "m",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingField {
                row: 2,
                field: "source_location"
            }
        ));
    }

    #[test]
    fn test_keys_must_be_single_segment() {
        for key in ["/tmp/escaped", "../up", "..", ".", "run/1", "./S1", "S1/"] {
            let err = parse(
                vec![RawRow::new("S0", "loc/a", ""), RawRow::new(key, "loc/b", "")],
                "m",
            )
            .unwrap_err();
            assert_eq!(
                err,
                ValidationError::InvalidKey {
                    row: 2,
                    key: key.to_string()
                },
                "key {:?}",
                key
            );
        }
        assert!(parse(vec![RawRow::new("run-1.v2", "loc/a", "")], "m").is_ok());
    }

    #[test]
    fn test_validate_items() {
        let item = |key: &str| WorkItem {
            key: key.to_string(),
            source_location: "loc/".to_string(),
            parameter: "m".to_string(),
        };

        assert!(validate_items(&[item("a"), item("b")]).is_ok());
        assert!(matches!(
            validate_items(&[item("a"), item("b"), item("a")]),
            Err(ValidationError::DuplicateKey { row: 3, first_row: 1, .. })
        ));
        assert!(matches!(
            validate_items(&[item("a/../../x")]),
            Err(ValidationError::InvalidKey { row: 1, .. })
        ));
    }

    #[test]
    fn test_order_preserved() {
        let rows = vec![
            RawRow::new("B", "loc/b", ""),
            RawRow::new("A", "loc/a", ""),
            RawRow::new("C", "loc/c", ""),
        ];
        let keys: Vec<String> = parse(rows, "m").unwrap().into_iter().map(|i| i.key).collect();
        assert_eq!(keys, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_parse_tsv_descriptor() {
        let text = "key\tsourceLocation\tparameter\n\
                    # comment\n\
                    S1\tloc/run1/\t\n\
                    \n\
                    S2\tloc/run2\tsup\n";
        let items = parse_descriptor(text, "modelA").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].parameter, "modelA");
        assert_eq!(items[1].source_location, "loc/run2/");
        assert_eq!(items[1].parameter, "sup");
    }

    #[test]
    fn test_parse_csv_descriptor_without_parameter_column() {
        let text = "source_location,key,notes\nloc/x,X1,first\n";
        let items = parse_descriptor(text, "hac").unwrap();
        assert_eq!(items[0].key, "X1");
        assert_eq!(items[0].parameter, "hac");
    }

    #[test]
    fn test_descriptor_missing_column() {
        let err = parse_descriptor("key,parameter\nS1,m\n", "m").unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingColumn {
                column: "source_location"
            }
        );
    }

    #[test]
    fn test_descriptor_malformed_row() {
        let err = parse_descriptor("key,source_location\nS1,loc/a,extra\n", "m").unwrap_err();
        assert!(matches!(err, ValidationError::MalformedRow { row: 1, .. }));
    }

    #[test]
    fn test_empty_descriptor() {
        assert_eq!(
            parse_descriptor("\n# only a comment\n", "m").unwrap_err(),
            ValidationError::EmptyDescriptor
        );
    }
}
