//! Parser for `SHOW RESOURCE GROUP` output.
//!
//! The introspection query returns one row per classifier, each repeating
//! the group-level columns:
//! ```text
//! name   | id    | cpu_weight | ... | mem_limit | ... | classifiers
//! rg_etl | 10010 | 4          | ... | 80.0%     | ... | (id=10011, weight=4.0, user=etl, query_type in (INSERT))
//! rg_etl | 10010 | 4          | ... | 80.0%     | ... | (id=10012, weight=1.0, role=analyst)
//! ```
//!
//! Decoding is lenient: a column that fails to parse leaves its field
//! unset and the rest of the snapshot is still recovered.

use crate::backend::TextRow;
use crate::types::{Classifier, Property, ResourceGroupSpec};
use serde::Serialize;
use std::collections::BTreeSet;

/// Observed state of one resource group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Decoded properties and classifiers
    pub spec: ResourceGroupSpec,
    /// Database-assigned group id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Read-only spill threshold reported by newer servers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spill_mem_limit_threshold: Option<String>,
    /// Properties the server has a column for
    pub reported: BTreeSet<Property>,
}

impl Snapshot {
    /// A snapshot of `spec` as reported by a server exposing every property.
    pub fn from_spec(spec: ResourceGroupSpec) -> Self {
        Self {
            spec,
            reported: Property::ALL.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Whether the server reported a column for this property.
    pub fn reports(&self, property: Property) -> bool {
        self.reported.contains(&property)
    }

    /// Observed classifiers, in row order.
    pub fn classifiers(&self) -> &[Classifier] {
        &self.spec.classifiers
    }
}

/// Where each known column lives in a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    id: Option<usize>,
    properties: Vec<(Property, usize)>,
    spill_mem_limit_threshold: Option<usize>,
    classifiers: Option<usize>,
}

impl ColumnLayout {
    /// The fixed column order used when the cursor reports no names.
    pub fn positional() -> Self {
        Self {
            id: Some(1),
            properties: vec![
                (Property::CpuWeight, 2),
                (Property::ExclusiveCpuCores, 3),
                (Property::MemLimit, 4),
                (Property::BigQueryCpuSecondLimit, 5),
                (Property::BigQueryScanRowsLimit, 6),
                (Property::BigQueryMemLimit, 7),
                (Property::ConcurrencyLimit, 8),
            ],
            spill_mem_limit_threshold: Some(9),
            classifiers: Some(10),
        }
    }

    /// Locate columns by name. Unknown columns are ignored.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut layout = Self {
            id: None,
            properties: Vec::new(),
            spill_mem_limit_threshold: None,
            classifiers: None,
        };

        for (index, name) in names.iter().enumerate() {
            let name = name.as_ref().trim().to_lowercase();
            match name.as_str() {
                "id" => layout.id = Some(index),
                "spill_mem_limit_threshold" => layout.spill_mem_limit_threshold = Some(index),
                "classifiers" | "classifier" => layout.classifiers = Some(index),
                other => {
                    if let Some(property) = Property::from_key(other) {
                        layout.properties.push((property, index));
                    }
                }
            }
        }

        layout.properties.sort_by_key(|(property, _)| *property);
        layout
    }

    fn for_row(row: &TextRow) -> Self {
        if row.columns.is_empty() {
            Self::positional()
        } else {
            Self::from_names(&row.columns)
        }
    }
}

/// Decode introspection rows into a snapshot.
///
/// Returns `Ok(None)` when there are no rows, meaning the group does not
/// exist. A cursor error aborts the read.
pub fn parse_rows<I, E>(name: &str, rows: I) -> Result<Option<Snapshot>, E>
where
    I: IntoIterator<Item = Result<TextRow, E>>,
{
    let mut snapshot: Option<Snapshot> = None;
    let mut layout: Option<ColumnLayout> = None;

    for row in rows {
        let row = row?;
        let layout = layout.get_or_insert_with(|| ColumnLayout::for_row(&row));
        let snapshot = snapshot.get_or_insert_with(|| new_snapshot(name, layout, &row));

        merge_scalars(snapshot, layout, &row);

        if let Some(text) = layout.classifiers.and_then(|i| row.get(i)) {
            let classifier = decode_classifier(text);
            if classifier.id.is_none() && classifier.is_empty() {
                log::debug!("Skipping undecodable classifier of '{name}': {text:?}");
            } else {
                snapshot.spec.classifiers.push(classifier);
            }
        }
    }

    Ok(snapshot)
}

fn new_snapshot(name: &str, layout: &ColumnLayout, row: &TextRow) -> Snapshot {
    let reported = layout
        .properties
        .iter()
        .filter(|(_, index)| *index < row.values.len())
        .map(|(property, _)| *property)
        .collect();

    Snapshot {
        spec: ResourceGroupSpec::new(name),
        reported,
        ..Default::default()
    }
}

/// Fill scalar fields that are still unset from this row.
fn merge_scalars(snapshot: &mut Snapshot, layout: &ColumnLayout, row: &TextRow) {
    if snapshot.id.is_none() {
        snapshot.id = layout
            .id
            .and_then(|i| row.get(i))
            .and_then(|text| parse_int("id", text));
    }

    if snapshot.spill_mem_limit_threshold.is_none() {
        snapshot.spill_mem_limit_threshold = layout
            .spill_mem_limit_threshold
            .and_then(|i| row.get(i))
            .map(str::to_string);
    }

    for (property, index) in &layout.properties {
        if snapshot.spec.get(*property).is_some() {
            continue;
        }
        let Some(text) = row.get(*index) else {
            continue;
        };

        if *property == Property::MemLimit {
            snapshot.spec.mem_limit = Some(text.to_string());
        } else if let Some(value) = parse_int(property.key(), text) {
            set_int(&mut snapshot.spec, *property, value);
        }
    }
}

fn set_int(spec: &mut ResourceGroupSpec, property: Property, value: i64) {
    let slot = match property {
        Property::CpuWeight => &mut spec.cpu_weight,
        Property::ExclusiveCpuCores => &mut spec.exclusive_cpu_cores,
        Property::CpuCoreLimit => &mut spec.cpu_core_limit,
        Property::MaxCpuCores => &mut spec.max_cpu_cores,
        Property::ConcurrencyLimit => &mut spec.concurrency_limit,
        Property::BigQueryMemLimit => &mut spec.big_query_mem_limit,
        Property::BigQueryScanRowsLimit => &mut spec.big_query_scan_rows_limit,
        Property::BigQueryCpuSecondLimit => &mut spec.big_query_cpu_second_limit,
        Property::MemLimit => return,
    };
    *slot = Some(value);
}

fn parse_int(field: &str, text: &str) -> Option<i64> {
    match text.parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::debug!("Leaving {field} unset, not an integer: {text:?}");
            None
        }
    }
}

/// Decode a packed classifier string such as `id=7, user=alice`.
///
/// Accepts an optional outer pair of parentheses, `key=value` and
/// `key in (a, b)` conditions in any order, and quoted values. Unknown keys
/// are ignored and absent keys stay unset.
pub fn decode_classifier(text: &str) -> Classifier {
    let mut classifier = Classifier::new();

    for token in split_top_level(strip_outer_parens(text.trim())) {
        let Some((key, value)) = split_condition(token) else {
            log::debug!("Ignoring classifier token: {token:?}");
            continue;
        };

        if value.is_empty() {
            continue;
        }
        if key == "id" {
            classifier.id = parse_int("classifier id", &value);
        } else {
            classifier.set_field(&key, value);
        }
    }

    classifier
}

/// Split one condition into a lowercased key and an unquoted value.
fn split_condition(token: &str) -> Option<(String, String)> {
    let token = token.trim();

    if let Some(pos) = find_top_level(token, '=') {
        let key = token[..pos].trim().to_lowercase();
        let value = unquote(token[pos + 1..].trim()).to_string();
        return (!key.is_empty()).then_some((key, value));
    }

    // key in (a, b)
    let (key, rest) = token.split_once(char::is_whitespace)?;
    let rest = rest.trim_start();
    let list = rest
        .strip_prefix("in")
        .or_else(|| rest.strip_prefix("IN"))?
        .trim();
    if !(list.starts_with('(') && list.ends_with(')')) {
        return None;
    }
    let values: Vec<&str> = split_top_level(&list[1..list.len() - 1])
        .into_iter()
        .map(|v| unquote(v.trim()))
        .filter(|v| !v.is_empty())
        .collect();
    Some((key.trim().to_lowercase(), values.join(", ")))
}

/// Remove one pair of parentheses wrapping the whole text.
fn strip_outer_parens(text: &str) -> &str {
    if !(text.starts_with('(') && text.ends_with(')')) {
        return text;
    }

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (pos, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth = depth.saturating_sub(1);
                if depth == 0 && pos != text.len() - 1 {
                    return text;
                }
            }
            _ => {}
        }
    }

    &text[1..text.len() - 1]
}

/// Split on commas outside quotes and parentheses.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (pos, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&text[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);

    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

/// Position of `target` outside quotes and parentheses.
fn find_top_level(text: &str, target: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (pos, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, c) if c == target && depth == 0 => return Some(pos),
            _ => {}
        }
    }
    None
}

fn unquote(value: &str) -> &str {
    for q in ['\'', '"', '`'] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    const COLUMNS: [&str; 13] = [
        "name",
        "id",
        "cpu_weight",
        "exclusive_cpu_cores",
        "mem_limit",
        "big_query_cpu_second_limit",
        "big_query_scan_rows_limit",
        "big_query_mem_limit",
        "concurrency_limit",
        "spill_mem_limit_threshold",
        "classifiers",
        "cpu_core_limit",
        "max_cpu_cores",
    ];

    fn named_row(values: [&str; 13]) -> Result<TextRow, Infallible> {
        Ok(TextRow::with_columns(
            COLUMNS.iter().map(ToString::to_string).collect(),
            values.iter().map(|v| Some((*v).to_string())).collect(),
        ))
    }

    fn positional_row(values: &[&str]) -> Result<TextRow, Infallible> {
        Ok(TextRow::new(
            values.iter().map(|v| Some((*v).to_string())).collect(),
        ))
    }

    #[test]
    fn test_decode_classifier_simple() {
        let c = decode_classifier("id=7, user=alice");
        assert_eq!(c, Classifier::new().with_id(7).with_user("alice"));

        let c = decode_classifier("id=3, role=analyst, db=sales");
        assert_eq!(
            c,
            Classifier::new().with_id(3).with_role("analyst").with_db("sales")
        );
    }

    #[test]
    fn test_decode_classifier_server_format() {
        let c = decode_classifier(
            "(id=10011, weight=4.5, user=etl, query_type in (SELECT, INSERT), source_ip=192.168.2.1/24, db='sales')",
        );
        assert_eq!(c.id, Some(10011));
        assert_eq!(c.user.as_deref(), Some("etl"));
        assert_eq!(c.role, None);
        assert_eq!(c.query_type.as_deref(), Some("SELECT, INSERT"));
        assert_eq!(c.source_ip.as_deref(), Some("192.168.2.1/24"));
        assert_eq!(c.db.as_deref(), Some("sales"));
    }

    #[test]
    fn test_decode_classifier_reordered_and_quoted_delimiters() {
        let c = decode_classifier("db='a,b', id=2, user=\"x=y\"");
        assert_eq!(c.id, Some(2));
        assert_eq!(c.db.as_deref(), Some("a,b"));
        assert_eq!(c.user.as_deref(), Some("x=y"));
    }

    #[test]
    fn test_decode_classifier_bad_id() {
        let c = decode_classifier("id=abc, user=alice");
        assert_eq!(c.id, None);
        assert_eq!(c.user.as_deref(), Some("alice"));
    }

    #[test]
    fn test_strip_outer_parens_only_when_wrapping() {
        assert_eq!(strip_outer_parens("(a=1)"), "a=1");
        assert_eq!(strip_outer_parens("(a) in (b)"), "(a) in (b)");
        assert_eq!(strip_outer_parens("a=1"), "a=1");
    }

    #[test]
    fn test_no_rows_is_none() {
        let rows: Vec<Result<TextRow, Infallible>> = Vec::new();
        assert_eq!(parse_rows("rg1", rows).unwrap(), None);
    }

    #[test]
    fn test_parse_rows_by_name() {
        let rows = vec![
            named_row([
                "rg_etl", "10010", "4", "0", "80.0%", "300", "100000", "1073741824", "10", "0.8",
                "(id=10011, weight=4.0, user=etl)", "", "",
            ]),
            named_row([
                "rg_etl", "10010", "4", "0", "80.0%", "300", "100000", "1073741824", "10", "0.8",
                "(id=10012, weight=1.0, role=analyst)", "", "",
            ]),
        ];

        let snapshot = parse_rows("rg_etl", rows).unwrap().unwrap();
        assert_eq!(snapshot.id, Some(10010));
        assert_eq!(snapshot.spec.name, "rg_etl");
        assert_eq!(snapshot.spec.cpu_weight, Some(4));
        assert_eq!(snapshot.spec.exclusive_cpu_cores, Some(0));
        assert_eq!(snapshot.spec.mem_limit.as_deref(), Some("80.0%"));
        assert_eq!(snapshot.spec.big_query_cpu_second_limit, Some(300));
        assert_eq!(snapshot.spec.big_query_scan_rows_limit, Some(100_000));
        assert_eq!(snapshot.spec.big_query_mem_limit, Some(1_073_741_824));
        assert_eq!(snapshot.spec.concurrency_limit, Some(10));
        assert_eq!(snapshot.spec.cpu_core_limit, None);
        assert_eq!(snapshot.spill_mem_limit_threshold.as_deref(), Some("0.8"));
        assert!(snapshot.reports(Property::MaxCpuCores));
        assert_eq!(
            snapshot.classifiers(),
            &[
                Classifier::new().with_id(10011).with_user("etl"),
                Classifier::new().with_id(10012).with_role("analyst"),
            ]
        );
    }

    #[test]
    fn test_parse_rows_positional() {
        let rows = vec![positional_row(&[
            "rg1", "5", "2", "", "50.0%", "0", "0", "0", "4", "", "id=6, user=bob",
        ])];

        let snapshot = parse_rows("rg1", rows).unwrap().unwrap();
        assert_eq!(snapshot.id, Some(5));
        assert_eq!(snapshot.spec.cpu_weight, Some(2));
        assert_eq!(snapshot.spec.exclusive_cpu_cores, None);
        assert_eq!(snapshot.spec.concurrency_limit, Some(4));
        assert!(snapshot.reports(Property::ConcurrencyLimit));
        assert!(!snapshot.reports(Property::CpuCoreLimit));
        assert!(!snapshot.reports(Property::MaxCpuCores));
        assert_eq!(snapshot.classifiers().len(), 1);
    }

    #[test]
    fn test_unparsable_field_is_left_unset() {
        let rows = vec![positional_row(&[
            "rg1", "5", "2", "1", "80.0%", "60", "1000", "2147483648", "N/A", "", "",
        ])];

        let snapshot = parse_rows("rg1", rows).unwrap().unwrap();
        assert_eq!(snapshot.spec.concurrency_limit, None);
        assert_eq!(snapshot.spec.mem_limit.as_deref(), Some("80.0%"));
        assert_eq!(snapshot.spec.big_query_mem_limit, Some(2_147_483_648));
        assert_eq!(snapshot.spec.big_query_cpu_second_limit, Some(60));
        assert!(snapshot.classifiers().is_empty());
    }

    #[test]
    fn test_blank_scalars_do_not_overwrite() {
        let rows = vec![
            positional_row(&["rg1", "5", "2", "", "80.0%", "", "", "", "10", "", "id=1, user=a"]),
            positional_row(&["rg1", "", "", "", "", "", "", "", "", "", "id=2, user=b"]),
        ];

        let snapshot = parse_rows("rg1", rows).unwrap().unwrap();
        assert_eq!(snapshot.spec.cpu_weight, Some(2));
        assert_eq!(snapshot.spec.concurrency_limit, Some(10));
        assert_eq!(snapshot.classifiers().len(), 2);
    }

    #[test]
    fn test_cursor_error_aborts() {
        let rows: Vec<Result<TextRow, String>> = vec![
            Ok(TextRow::new(vec![Some("rg1".to_string())])),
            Err("connection lost".to_string()),
        ];
        assert_eq!(parse_rows("rg1", rows), Err("connection lost".to_string()));
    }
}
