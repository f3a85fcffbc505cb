//! Core types for resource group management.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A settable resource group property.
///
/// Variants are declared in render order: statements list properties in
/// this order regardless of how a spec was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    /// Relative CPU weight
    CpuWeight,
    /// Dedicated CPU cores
    ExclusiveCpuCores,
    /// Soft CPU core limit
    CpuCoreLimit,
    /// Hard CPU core cap
    MaxCpuCores,
    /// Memory limit, percentage or absolute
    MemLimit,
    /// Maximum concurrent queries
    ConcurrencyLimit,
    /// Big query memory threshold in bytes
    BigQueryMemLimit,
    /// Big query scanned rows threshold
    BigQueryScanRowsLimit,
    /// Big query CPU seconds threshold
    BigQueryCpuSecondLimit,
}

impl Property {
    /// All properties in render order.
    pub const ALL: [Property; 9] = [
        Property::CpuWeight,
        Property::ExclusiveCpuCores,
        Property::CpuCoreLimit,
        Property::MaxCpuCores,
        Property::MemLimit,
        Property::ConcurrencyLimit,
        Property::BigQueryMemLimit,
        Property::BigQueryScanRowsLimit,
        Property::BigQueryCpuSecondLimit,
    ];

    /// Property key as used in `WITH (...)` clauses and introspection columns.
    pub fn key(&self) -> &'static str {
        match self {
            Property::CpuWeight => "cpu_weight",
            Property::ExclusiveCpuCores => "exclusive_cpu_cores",
            Property::CpuCoreLimit => "cpu_core_limit",
            Property::MaxCpuCores => "max_cpu_cores",
            Property::MemLimit => "mem_limit",
            Property::ConcurrencyLimit => "concurrency_limit",
            Property::BigQueryMemLimit => "big_query_mem_limit",
            Property::BigQueryScanRowsLimit => "big_query_scan_rows_limit",
            Property::BigQueryCpuSecondLimit => "big_query_cpu_second_limit",
        }
    }

    /// Look up a property by key.
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_lowercase();
        Self::ALL.into_iter().find(|p| p.key() == key)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The value of a property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyValue {
    /// Integer-valued property
    Int(i64),
    /// Text-valued property (only `mem_limit`)
    Text(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Text(v) => f.write_str(v),
        }
    }
}

/// Normalize a memory limit to the form the database echoes back.
///
/// Whole percentages gain one decimal place (`"80%"` becomes `"80.0%"`).
/// Fractional percentages and absolute values are returned unchanged.
pub fn canonicalize_mem_limit(value: &str) -> String {
    let value = value.trim();
    if let Some(number) = value.strip_suffix('%') {
        let number = number.trim();
        if !number.is_empty() && !number.contains('.') {
            return format!("{number}.0%");
        }
        return format!("{number}%");
    }
    value.to_string()
}

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;
const TB: f64 = GB * 1024.0;

/// Parse a human-readable byte size (e.g. "512MB", "2GB", "1073741824").
///
/// Suffixes B, K/KB, M/MB, G/GB, T/TB are case-insensitive binary multiples.
pub fn parse_byte_size(text: &str) -> Result<i64> {
    let upper = text.trim().to_uppercase();
    if upper.is_empty() {
        return Err(Error::InvalidValue {
            field: "big_query_mem_limit",
            message: "empty size".to_string(),
        });
    }

    let suffixes = [
        ("TB", TB),
        ("GB", GB),
        ("MB", MB),
        ("KB", KB),
        ("T", TB),
        ("G", GB),
        ("M", MB),
        ("K", KB),
        ("B", 1.0),
    ];
    let (number, multiplier) = suffixes
        .iter()
        .find_map(|(suffix, mult)| upper.strip_suffix(suffix).map(|n| (n.trim(), *mult)))
        .unwrap_or((upper.as_str(), 1.0));

    if let Ok(whole) = number.parse::<i64>()
        && multiplier == 1.0
    {
        if whole < 0 {
            return Err(Error::InvalidValue {
                field: "big_query_mem_limit",
                message: format!("size cannot be negative: {whole}"),
            });
        }
        return Ok(whole);
    }

    let value: f64 = number.parse().map_err(|_| Error::InvalidValue {
        field: "big_query_mem_limit",
        message: format!("invalid number in size: '{number}'"),
    })?;
    let bytes = value * multiplier;
    if !(0.0..=i64::MAX as f64).contains(&bytes) {
        return Err(Error::InvalidValue {
            field: "big_query_mem_limit",
            message: format!("size out of range: '{}'", text.trim()),
        });
    }
    Ok(bytes as i64)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ByteSizeRepr {
    Bytes(i64),
    Text(String),
}

fn deserialize_byte_size<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ByteSizeRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(ByteSizeRepr::Bytes(bytes)) if bytes < 0 => Err(serde::de::Error::custom(format!(
            "big_query_mem_limit cannot be negative: {bytes}"
        ))),
        Some(ByteSizeRepr::Bytes(bytes)) => Ok(Some(bytes)),
        Some(ByteSizeRepr::Text(text)) => parse_byte_size(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// A routing predicate that assigns sessions to a resource group.
///
/// Each set field becomes one `key='value'` equality condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifier {
    /// Database-assigned id (observed classifiers only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Session user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Session role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Query type (e.g. select, insert)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
    /// Client address or CIDR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    /// Current database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,
}

impl Classifier {
    /// Condition keys in render order.
    pub const KEYS: [&'static str; 5] = ["user", "role", "query_type", "source_ip", "db"];

    /// Create a classifier with no conditions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the user condition.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the role condition.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the query type condition.
    pub fn with_query_type(mut self, query_type: impl Into<String>) -> Self {
        self.query_type = Some(query_type.into());
        self
    }

    /// Set the source address condition.
    pub fn with_source_ip(mut self, source_ip: impl Into<String>) -> Self {
        self.source_ip = Some(source_ip.into());
        self
    }

    /// Set the database condition.
    pub fn with_db(mut self, db: impl Into<String>) -> Self {
        self.db = Some(db.into());
        self
    }

    /// Set the database-assigned id.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Set conditions in render order, as `(key, value)` pairs.
    pub fn conditions(&self) -> Vec<(&'static str, &str)> {
        let fields = [
            &self.user,
            &self.role,
            &self.query_type,
            &self.source_ip,
            &self.db,
        ];
        Self::KEYS
            .iter()
            .zip(fields)
            .filter_map(|(key, value)| value.as_deref().map(|v| (*key, v)))
            .collect()
    }

    /// Whether no condition is set.
    pub fn is_empty(&self) -> bool {
        self.conditions().is_empty()
    }

    /// Structural equality over the settable fields, ignoring `id`.
    ///
    /// Query types compare case-insensitively because the database echoes
    /// them upper-cased.
    pub fn matches(&self, other: &Classifier) -> bool {
        let query_type_eq = match (&self.query_type, &other.query_type) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => true,
            _ => false,
        };
        query_type_eq
            && self.user == other.user
            && self.role == other.role
            && self.source_ip == other.source_ip
            && self.db == other.db
    }

    /// Assign a decoded field by key. Unknown keys are ignored.
    pub(crate) fn set_field(&mut self, key: &str, value: String) -> bool {
        let slot = match key {
            "user" => &mut self.user,
            "role" => &mut self.role,
            "query_type" => &mut self.query_type,
            "source_ip" => &mut self.source_ip,
            "db" => &mut self.db,
            _ => return false,
        };
        *slot = Some(value);
        true
    }
}

impl fmt::Display for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(id) = self.id {
            parts.push(format!("id={id}"));
        }
        for (key, value) in self.conditions() {
            parts.push(format!("{key}={value}"));
        }
        write!(f, "({})", parts.join(", "))
    }
}

/// Desired or observed state of one resource group.
///
/// Every property is optional; unset is distinct from zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroupSpec {
    /// Unique, immutable group name
    pub name: String,
    /// Relative CPU weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_weight: Option<i64>,
    /// Dedicated CPU cores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_cpu_cores: Option<i64>,
    /// Soft CPU core limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_core_limit: Option<i64>,
    /// Hard CPU core cap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cpu_cores: Option<i64>,
    /// Memory limit: a percentage ("80%") or absolute value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_limit: Option<String>,
    /// Maximum concurrent queries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_limit: Option<i64>,
    /// Big query memory threshold in bytes
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_byte_size"
    )]
    pub big_query_mem_limit: Option<i64>,
    /// Big query scanned rows threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub big_query_scan_rows_limit: Option<i64>,
    /// Big query CPU seconds threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub big_query_cpu_second_limit: Option<i64>,
    /// Routing rules, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classifiers: Vec<Classifier>,
}

impl ResourceGroupSpec {
    /// Create a spec with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set a property, returning the updated spec.
    ///
    /// Text values for integer properties are parsed; `big_query_mem_limit`
    /// also accepts sizes such as "2GB".
    pub fn with(mut self, property: Property, value: PropertyValue) -> Result<Self> {
        self.set(property, value)?;
        Ok(self)
    }

    /// Add a classifier.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifiers.push(classifier);
        self
    }

    /// Set a property.
    pub fn set(&mut self, property: Property, value: PropertyValue) -> Result<()> {
        if property == Property::MemLimit {
            self.mem_limit = Some(value.to_string());
            return Ok(());
        }

        let number = match value {
            PropertyValue::Int(v) => v,
            PropertyValue::Text(text) if property == Property::BigQueryMemLimit => {
                parse_byte_size(&text)?
            }
            PropertyValue::Text(text) => {
                text.trim().parse().map_err(|_| Error::InvalidValue {
                    field: "property",
                    message: format!("{property} expects an integer, got '{text}'"),
                })?
            }
        };

        let slot = match property {
            Property::CpuWeight => &mut self.cpu_weight,
            Property::ExclusiveCpuCores => &mut self.exclusive_cpu_cores,
            Property::CpuCoreLimit => &mut self.cpu_core_limit,
            Property::MaxCpuCores => &mut self.max_cpu_cores,
            Property::ConcurrencyLimit => &mut self.concurrency_limit,
            Property::BigQueryMemLimit => &mut self.big_query_mem_limit,
            Property::BigQueryScanRowsLimit => &mut self.big_query_scan_rows_limit,
            Property::BigQueryCpuSecondLimit => &mut self.big_query_cpu_second_limit,
            Property::MemLimit => unreachable!("handled above"),
        };
        *slot = Some(number);
        Ok(())
    }

    /// Get a property value, with `mem_limit` in canonical form.
    pub fn get(&self, property: Property) -> Option<PropertyValue> {
        let int = |v: Option<i64>| v.map(PropertyValue::Int);
        match property {
            Property::CpuWeight => int(self.cpu_weight),
            Property::ExclusiveCpuCores => int(self.exclusive_cpu_cores),
            Property::CpuCoreLimit => int(self.cpu_core_limit),
            Property::MaxCpuCores => int(self.max_cpu_cores),
            Property::MemLimit => self
                .mem_limit
                .as_deref()
                .map(|v| PropertyValue::Text(canonicalize_mem_limit(v))),
            Property::ConcurrencyLimit => int(self.concurrency_limit),
            Property::BigQueryMemLimit => int(self.big_query_mem_limit),
            Property::BigQueryScanRowsLimit => int(self.big_query_scan_rows_limit),
            Property::BigQueryCpuSecondLimit => int(self.big_query_cpu_second_limit),
        }
    }

    /// All set properties in render order.
    pub fn properties(&self) -> Vec<(Property, PropertyValue)> {
        Property::ALL
            .into_iter()
            .filter_map(|p| self.get(p).map(|v| (p, v)))
            .collect()
    }

    /// Whether any property beyond the name is set.
    pub fn has_properties(&self) -> bool {
        Property::ALL.iter().any(|p| self.get(*p).is_some())
    }

    /// A copy without database-assigned classifier ids, as a caller would declare it.
    pub fn without_ids(&self) -> Self {
        let mut spec = self.clone();
        for classifier in &mut spec.classifiers {
            classifier.id = None;
        }
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_mem_limit() {
        assert_eq!(canonicalize_mem_limit("80%"), "80.0%");
        assert_eq!(canonicalize_mem_limit("80.0%"), "80.0%");
        assert_eq!(canonicalize_mem_limit("80.5%"), "80.5%");
        assert_eq!(canonicalize_mem_limit("1024"), "1024");
        assert_eq!(canonicalize_mem_limit(""), "");
    }

    #[test]
    fn test_canonicalize_mem_limit_idempotent() {
        for input in ["80%", "80.0%", "7.25%", "1073741824", " 50% "] {
            let once = canonicalize_mem_limit(input);
            assert_eq!(canonicalize_mem_limit(&once), once);
        }
        assert_eq!(
            canonicalize_mem_limit("80%"),
            canonicalize_mem_limit("80.0%")
        );
    }

    #[test]
    fn test_parse_byte_size() {
        assert_eq!(parse_byte_size("1073741824").unwrap(), 1_073_741_824);
        assert_eq!(parse_byte_size("2GB").unwrap(), 2_147_483_648);
        assert_eq!(parse_byte_size("512mb").unwrap(), 536_870_912);
        assert_eq!(parse_byte_size("1.5K").unwrap(), 1536);
        assert_eq!(parse_byte_size("0").unwrap(), 0);
        assert!(parse_byte_size("").is_err());
        assert!(parse_byte_size("lots").is_err());
        assert!(parse_byte_size("-5").is_err());
    }

    #[test]
    fn test_property_order_and_keys() {
        let keys: Vec<_> = Property::ALL.iter().map(Property::key).collect();
        assert_eq!(
            keys,
            [
                "cpu_weight",
                "exclusive_cpu_cores",
                "cpu_core_limit",
                "max_cpu_cores",
                "mem_limit",
                "concurrency_limit",
                "big_query_mem_limit",
                "big_query_scan_rows_limit",
                "big_query_cpu_second_limit",
            ]
        );
        assert_eq!(Property::from_key("MEM_LIMIT"), Some(Property::MemLimit));
        assert_eq!(Property::from_key("spill_mem_limit_threshold"), None);
    }

    #[test]
    fn test_spec_get_canonicalizes_mem_limit() {
        let spec = ResourceGroupSpec {
            mem_limit: Some("80%".to_string()),
            ..ResourceGroupSpec::new("rg1")
        };
        assert_eq!(
            spec.get(Property::MemLimit),
            Some(PropertyValue::Text("80.0%".to_string()))
        );
    }

    #[test]
    fn test_spec_set_parses_text() {
        let spec = ResourceGroupSpec::new("rg1")
            .with(Property::ConcurrencyLimit, PropertyValue::Text("10".into()))
            .unwrap()
            .with(Property::BigQueryMemLimit, PropertyValue::Text("1GB".into()))
            .unwrap();
        assert_eq!(spec.concurrency_limit, Some(10));
        assert_eq!(spec.big_query_mem_limit, Some(1_073_741_824));

        let err = ResourceGroupSpec::new("rg1")
            .with(Property::CpuWeight, PropertyValue::Text("heavy".into()))
            .unwrap_err();
        assert!(err.to_string().contains("cpu_weight"));
    }

    #[test]
    fn test_zero_is_distinct_from_unset() {
        let spec = ResourceGroupSpec {
            concurrency_limit: Some(0),
            ..ResourceGroupSpec::new("rg1")
        };
        assert!(spec.has_properties());
        assert!(!ResourceGroupSpec::new("rg1").has_properties());
    }

    #[test]
    fn test_classifier_conditions_order() {
        let c = Classifier::new()
            .with_db("sales")
            .with_user("alice")
            .with_query_type("select");
        assert_eq!(
            c.conditions(),
            vec![("user", "alice"), ("query_type", "select"), ("db", "sales")]
        );
        assert!(Classifier::new().is_empty());
    }

    #[test]
    fn test_classifier_matches_ignores_id_and_query_type_case() {
        let observed = Classifier::new()
            .with_id(7)
            .with_user("alice")
            .with_query_type("SELECT");
        let desired = Classifier::new().with_user("alice").with_query_type("select");
        assert!(observed.matches(&desired));
        assert!(!observed.matches(&Classifier::new().with_user("alice")));
        assert!(!observed.matches(&Classifier::new().with_user("bob").with_query_type("select")));
    }

    #[test]
    fn test_classifier_display() {
        let c = Classifier::new().with_id(3).with_role("analyst").with_db("sales");
        assert_eq!(c.to_string(), "(id=3, role=analyst, db=sales)");
    }

    #[test]
    fn test_deserialize_spec_from_toml() {
        let text = r#"
name = "rg_etl"
cpu_weight = 4
mem_limit = "80%"
big_query_mem_limit = "2GB"

[[classifiers]]
user = "etl"
query_type = "insert"
"#;
        let spec: ResourceGroupSpec = toml::from_str(text).unwrap();
        assert_eq!(spec.name, "rg_etl");
        assert_eq!(spec.cpu_weight, Some(4));
        assert_eq!(spec.big_query_mem_limit, Some(2_147_483_648));
        assert_eq!(spec.concurrency_limit, None);
        assert_eq!(spec.classifiers.len(), 1);
        assert_eq!(spec.classifiers[0].user.as_deref(), Some("etl"));
    }

    #[test]
    fn test_deserialize_byte_size_integer() {
        let spec: ResourceGroupSpec =
            serde_json::from_str(r#"{"name": "rg1", "big_query_mem_limit": 1024}"#).unwrap();
        assert_eq!(spec.big_query_mem_limit, Some(1024));

        let err = serde_json::from_str::<ResourceGroupSpec>(
            r#"{"name": "rg1", "big_query_mem_limit": "huge"}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_serialize_skips_unset() {
        let spec = ResourceGroupSpec {
            concurrency_limit: Some(5),
            ..ResourceGroupSpec::new("rg1")
        };
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(json, r#"{"name":"rg1","concurrency_limit":5}"#);
    }
}
