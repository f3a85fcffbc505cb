//! Drift detection and convergence planning for resource groups.
//!
//! Compares an observed [`Snapshot`] against a desired spec and produces a
//! [`Plan`] of changes. Two strategies are supported:
//! - [`Strategy::InPlace`]: drop stale classifiers, restate the desired
//!   properties, then add new classifiers (always in that order)
//! - [`Strategy::Recreate`]: drop the whole group and create it again
//!
//! Properties left unset in the desired spec are not managed and never
//! count as drift.

use crate::error::{Error, Result, StatementKind};
use crate::snapshot::Snapshot;
use crate::statement;
use crate::types::{Classifier, Property, PropertyValue, ResourceGroupSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a drifted group is brought back to its desired state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Alter the existing group
    #[default]
    InPlace,
    /// Drop and recreate the group (not atomic)
    Recreate,
}

impl Strategy {
    /// Name used in configuration and on the command line.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InPlace => "in-place",
            Self::Recreate => "recreate",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "in-place" | "inplace" | "in_place" => Ok(Self::InPlace),
            "recreate" | "delete-and-recreate" => Ok(Self::Recreate),
            other => Err(Error::InvalidValue {
                field: "strategy",
                message: format!("unknown strategy '{other}' (expected in-place or recreate)"),
            }),
        }
    }
}

/// A property whose observed value differs from the desired one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDrift {
    /// Drifted property
    pub property: Property,
    /// Value reported by the server, if any
    pub observed: Option<PropertyValue>,
    /// Desired value
    pub desired: PropertyValue,
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Create the group with its full desired state
    CreateGroup(ResourceGroupSpec),
    /// Drop the group
    DropGroup,
    /// Detach an observed classifier
    DropClassifier {
        /// Database id used to target the drop
        id: i64,
        /// The classifier being removed
        classifier: Classifier,
    },
    /// Restate the desired property set
    AlterProperties {
        /// Managed properties of the desired spec
        desired: ResourceGroupSpec,
        /// Properties that differ
        drift: Vec<PropertyDrift>,
    },
    /// Attach a desired classifier
    AddClassifier(Classifier),
}

impl Change {
    /// Category of the statement this change runs.
    pub fn kind(&self) -> StatementKind {
        match self {
            Change::CreateGroup(_) => StatementKind::Create,
            Change::DropGroup => StatementKind::DropGroup,
            Change::DropClassifier { .. } => StatementKind::DropClassifier,
            Change::AlterProperties { .. } => StatementKind::AlterProperties,
            Change::AddClassifier(_) => StatementKind::AddClassifier,
        }
    }

    /// Render the statement for `group`.
    pub fn statement(&self, group: &str) -> String {
        match self {
            Change::CreateGroup(spec) => statement::build_create(spec),
            Change::DropGroup => statement::build_drop(group),
            Change::DropClassifier { id, .. } => statement::build_drop_classifier(group, *id),
            // Only planned when the desired spec has properties.
            Change::AlterProperties { desired, .. } => {
                statement::build_alter_properties(group, desired).unwrap_or_default()
            }
            Change::AddClassifier(classifier) => statement::build_add_classifier(group, classifier),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::CreateGroup(spec) => write!(
                f,
                "create group ({} properties, {} classifiers)",
                spec.properties().len(),
                spec.classifiers.len()
            ),
            Change::DropGroup => f.write_str("drop group"),
            Change::DropClassifier { classifier, .. } => write!(f, "drop classifier {classifier}"),
            Change::AlterProperties { drift, .. } => {
                let parts: Vec<String> = drift
                    .iter()
                    .map(|d| match &d.observed {
                        Some(observed) => format!("{} {} -> {}", d.property, observed, d.desired),
                        None => format!("{} -> {}", d.property, d.desired),
                    })
                    .collect();
                write!(f, "alter properties: {}", parts.join(", "))
            }
            Change::AddClassifier(classifier) => write!(f, "add classifier {classifier}"),
        }
    }
}

/// The ordered changes that converge one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Group name
    pub group: String,
    /// Strategy the plan was computed with
    pub strategy: Strategy,
    /// Changes in execution order
    pub changes: Vec<Change>,
    /// Desired properties the server has no column for; never compared
    pub unverified: Vec<Property>,
}

impl Plan {
    /// Whether the group has already converged.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Statements in execution order, with their categories.
    pub fn statements(&self) -> Vec<(StatementKind, String)> {
        self.changes
            .iter()
            .map(|change| (change.kind(), change.statement(&self.group)))
            .collect()
    }
}

/// Plan the changes that take `observed` to `desired`.
///
/// With no observed snapshot the plan creates the group.
pub fn reconcile(
    observed: Option<&Snapshot>,
    desired: &ResourceGroupSpec,
    strategy: Strategy,
) -> Result<Plan> {
    validate(desired)?;

    let desired = desired.without_ids();
    let mut plan = Plan {
        group: desired.name.clone(),
        strategy,
        changes: Vec::new(),
        unverified: Vec::new(),
    };

    let Some(observed) = observed else {
        plan.changes.push(Change::CreateGroup(desired));
        return Ok(plan);
    };

    plan.unverified = unverified_properties(observed, &desired);
    if !plan.unverified.is_empty() {
        let keys: Vec<&str> = plan.unverified.iter().map(Property::key).collect();
        log::warn!(
            "Resource group '{}': server does not report {}; drift in these properties cannot be detected",
            desired.name,
            keys.join(", ")
        );
    }

    let drift = property_drift(observed, &desired);
    let (stale, missing) = diff_classifiers(observed.classifiers(), &desired.classifiers);

    if drift.is_empty() && stale.is_empty() && missing.is_empty() {
        log::debug!("Resource group '{}' has no drift", desired.name);
        return Ok(plan);
    }

    match strategy {
        Strategy::InPlace => {
            for classifier in stale {
                let id = classifier.id.ok_or_else(|| Error::UnidentifiedClassifier {
                    group: desired.name.clone(),
                    classifier: classifier.to_string(),
                })?;
                plan.changes.push(Change::DropClassifier {
                    id,
                    classifier: classifier.clone(),
                });
            }
            if !drift.is_empty() {
                plan.changes.push(Change::AlterProperties {
                    desired: managed_properties(&desired),
                    drift,
                });
            }
            for classifier in missing {
                plan.changes.push(Change::AddClassifier(classifier.clone()));
            }
        }
        Strategy::Recreate => {
            plan.changes.push(Change::DropGroup);
            plan.changes.push(Change::CreateGroup(desired));
        }
    }

    Ok(plan)
}

/// Reject specs that would render invalid or unsafe statements.
pub fn validate(spec: &ResourceGroupSpec) -> Result<()> {
    if spec.name.trim().is_empty() {
        return Err(Error::InvalidValue {
            field: "name",
            message: "resource group name cannot be empty".to_string(),
        });
    }
    check_literal(&spec.name, "name", &spec.name)?;
    if let Some(mem_limit) = &spec.mem_limit {
        check_literal(&spec.name, "mem_limit", mem_limit)?;
    }

    for (index, classifier) in spec.classifiers.iter().enumerate() {
        if classifier.is_empty() {
            return Err(Error::EmptyClassifier {
                group: spec.name.clone(),
                index,
            });
        }
        for (key, value) in classifier.conditions() {
            check_literal(&spec.name, key, value)?;
        }
    }

    Ok(())
}

fn check_literal(group: &str, field: &'static str, value: &str) -> Result<()> {
    if value.contains('\'') || value.contains('\\') {
        return Err(Error::UnsafeLiteral {
            group: group.to_string(),
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Desired properties the server has no column for.
fn unverified_properties(observed: &Snapshot, desired: &ResourceGroupSpec) -> Vec<Property> {
    desired
        .properties()
        .into_iter()
        .map(|(property, _)| property)
        .filter(|property| !observed.reports(*property))
        .collect()
}

/// Desired properties the server reports and that differ from observed.
fn property_drift(observed: &Snapshot, desired: &ResourceGroupSpec) -> Vec<PropertyDrift> {
    desired
        .properties()
        .into_iter()
        .filter(|(property, _)| observed.reports(*property))
        .filter_map(|(property, value)| {
            let current = observed.spec.get(property);
            (current.as_ref() != Some(&value)).then_some(PropertyDrift {
                property,
                observed: current,
                desired: value,
            })
        })
        .collect()
}

/// Match classifiers one-to-one, returning (observed only, desired only).
fn diff_classifiers<'a>(
    observed: &'a [Classifier],
    desired: &'a [Classifier],
) -> (Vec<&'a Classifier>, Vec<&'a Classifier>) {
    let mut matched = vec![false; observed.len()];
    let mut missing = Vec::new();

    for wanted in desired {
        let hit = observed
            .iter()
            .enumerate()
            .find(|(i, have)| !matched[*i] && have.matches(wanted));
        match hit {
            Some((i, _)) => matched[i] = true,
            None => missing.push(wanted),
        }
    }

    let stale = observed
        .iter()
        .zip(&matched)
        .filter(|(_, m)| !**m)
        .map(|(c, _)| c)
        .collect();

    (stale, missing)
}

fn managed_properties(desired: &ResourceGroupSpec) -> ResourceGroupSpec {
    ResourceGroupSpec {
        classifiers: Vec::new(),
        ..desired.clone()
    }
}
