//! Statement builder for resource group DDL.
//!
//! Renders specs into `CREATE`/`ALTER`/`DROP RESOURCE GROUP` text:
//! ```text
//! CREATE RESOURCE GROUP 'rg_etl' TO (user='etl', query_type='insert') WITH ('cpu_weight' = '4', 'mem_limit' = '80.0%')
//! ALTER RESOURCE GROUP 'rg_etl' WITH ('concurrency_limit' = '10')
//! ALTER RESOURCE GROUP 'rg_etl' ADD (role='analyst')
//! ALTER RESOURCE GROUP 'rg_etl' DROP (7)
//! DROP RESOURCE GROUP 'rg_etl'
//! ```
//!
//! Properties and classifier conditions are always rendered in a fixed
//! order, so equal specs produce byte-identical statements. Values are
//! quoted but not escaped; the reconciler rejects literals containing
//! quotes before anything reaches this module.

use crate::types::{Classifier, ResourceGroupSpec};

/// Build the statement that creates a resource group.
///
/// A spec with only a name yields a bare `CREATE RESOURCE GROUP '<name>'`.
pub fn build_create(spec: &ResourceGroupSpec) -> String {
    let mut statement = format!("CREATE RESOURCE GROUP '{}'", spec.name);

    if !spec.classifiers.is_empty() {
        let clauses: Vec<String> = spec.classifiers.iter().map(condition_clause).collect();
        statement.push_str(" TO ");
        statement.push_str(&clauses.join(", "));
    }

    if let Some(properties) = property_list(spec) {
        statement.push_str(" WITH (");
        statement.push_str(&properties);
        statement.push(')');
    }

    statement
}

/// Build the statement that restates the set properties of a group.
///
/// Returns `None` when no property is set.
pub fn build_alter_properties(name: &str, spec: &ResourceGroupSpec) -> Option<String> {
    property_list(spec).map(|properties| format!("ALTER RESOURCE GROUP '{name}' WITH ({properties})"))
}

/// Build the statement that attaches one classifier to a group.
pub fn build_add_classifier(name: &str, classifier: &Classifier) -> String {
    format!("ALTER RESOURCE GROUP '{name}' ADD {}", condition_clause(classifier))
}

/// Build the statement that detaches a classifier by its database id.
pub fn build_drop_classifier(name: &str, classifier_id: i64) -> String {
    format!("ALTER RESOURCE GROUP '{name}' DROP ({classifier_id})")
}

/// Build the statement that drops a group.
pub fn build_drop(name: &str) -> String {
    format!("DROP RESOURCE GROUP '{name}'")
}

/// Build the introspection statement for a group.
pub fn build_show(name: &str) -> String {
    format!("SHOW RESOURCE GROUP '{name}'")
}

/// Comma-joined `'key' = 'value'` pairs, or `None` if nothing is set.
fn property_list(spec: &ResourceGroupSpec) -> Option<String> {
    let pairs: Vec<String> = spec
        .properties()
        .into_iter()
        .map(|(property, value)| format!("'{property}' = '{value}'"))
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join(", "))
    }
}

/// Parenthesized `key='value'` conditions of one classifier.
fn condition_clause(classifier: &Classifier) -> String {
    let conditions: Vec<String> = classifier
        .conditions()
        .into_iter()
        .map(|(key, value)| format!("{key}='{value}'"))
        .collect();
    format!("({})", conditions.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Property, PropertyValue};

    #[test]
    fn test_bare_create() {
        let spec = ResourceGroupSpec::new("rg1");
        assert_eq!(build_create(&spec), "CREATE RESOURCE GROUP 'rg1'");
    }

    #[test]
    fn test_create_with_properties_and_classifiers() {
        let spec = ResourceGroupSpec {
            cpu_weight: Some(4),
            mem_limit: Some("80%".to_string()),
            big_query_mem_limit: Some(1_073_741_824),
            classifiers: vec![
                Classifier::new().with_user("etl").with_query_type("insert"),
                Classifier::new().with_role("analyst"),
            ],
            ..ResourceGroupSpec::new("rg_etl")
        };

        assert_eq!(
            build_create(&spec),
            "CREATE RESOURCE GROUP 'rg_etl' \
             TO (user='etl', query_type='insert'), (role='analyst') \
             WITH ('cpu_weight' = '4', 'mem_limit' = '80.0%', 'big_query_mem_limit' = '1073741824')"
        );
    }

    #[test]
    fn test_create_is_independent_of_insertion_order() {
        let a = ResourceGroupSpec::new("rg1")
            .with(Property::ConcurrencyLimit, PropertyValue::Int(10))
            .unwrap()
            .with(Property::CpuWeight, PropertyValue::Int(2))
            .unwrap()
            .with(Property::MemLimit, PropertyValue::Text("50%".into()))
            .unwrap();
        let b = ResourceGroupSpec::new("rg1")
            .with(Property::MemLimit, PropertyValue::Text("50%".into()))
            .unwrap()
            .with(Property::CpuWeight, PropertyValue::Int(2))
            .unwrap()
            .with(Property::ConcurrencyLimit, PropertyValue::Int(10))
            .unwrap();

        assert_eq!(build_create(&a), build_create(&b));
        assert_eq!(
            build_create(&a),
            "CREATE RESOURCE GROUP 'rg1' WITH ('cpu_weight' = '2', 'mem_limit' = '50.0%', 'concurrency_limit' = '10')"
        );
    }

    #[test]
    fn test_create_renders_zero() {
        let spec = ResourceGroupSpec {
            exclusive_cpu_cores: Some(0),
            ..ResourceGroupSpec::new("rg1")
        };
        assert_eq!(
            build_create(&spec),
            "CREATE RESOURCE GROUP 'rg1' WITH ('exclusive_cpu_cores' = '0')"
        );
    }

    #[test]
    fn test_alter_properties() {
        let spec = ResourceGroupSpec {
            max_cpu_cores: Some(8),
            big_query_cpu_second_limit: Some(300),
            ..ResourceGroupSpec::new("ignored")
        };
        assert_eq!(
            build_alter_properties("rg1", &spec).as_deref(),
            Some("ALTER RESOURCE GROUP 'rg1' WITH ('max_cpu_cores' = '8', 'big_query_cpu_second_limit' = '300')")
        );
    }

    #[test]
    fn test_alter_properties_none_when_unset() {
        let spec = ResourceGroupSpec::new("rg1").with_classifier(Classifier::new().with_user("a"));
        assert_eq!(build_alter_properties("rg1", &spec), None);
    }

    #[test]
    fn test_add_classifier_omits_id() {
        let classifier = Classifier::new()
            .with_id(42)
            .with_source_ip("192.168.0.0/24")
            .with_db("sales");
        assert_eq!(
            build_add_classifier("rg1", &classifier),
            "ALTER RESOURCE GROUP 'rg1' ADD (source_ip='192.168.0.0/24', db='sales')"
        );
    }

    #[test]
    fn test_drop_statements() {
        assert_eq!(build_drop_classifier("rg1", 7), "ALTER RESOURCE GROUP 'rg1' DROP (7)");
        assert_eq!(build_drop("rg1"), "DROP RESOURCE GROUP 'rg1'");
        assert_eq!(build_show("rg1"), "SHOW RESOURCE GROUP 'rg1'");
    }

    #[test]
    fn test_empty_classifier_renders_empty_clause() {
        assert_eq!(
            build_add_classifier("rg1", &Classifier::new()),
            "ALTER RESOURCE GROUP 'rg1' ADD ()"
        );
    }
}
