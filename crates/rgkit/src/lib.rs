//! # rgkit
//!
//! Pure Rust library for managing database resource groups.
//!
//! This crate provides functionality for:
//! - Rendering `CREATE`/`ALTER`/`DROP RESOURCE GROUP` statements
//! - Decoding `SHOW RESOURCE GROUP` output into structured snapshots
//! - Planning the changes that converge a group to its desired state
//! - Running those changes over a MySQL-protocol connection
//!
//! ## Example
//!
//! ```no_run
//! use rgkit::{Classifier, Client, ConnectOptions, ResourceGroupSpec, Strategy};
//!
//! let options = ConnectOptions::new("fe.example.com", "root", "secret");
//! let mut client = Client::connect(&options).expect("connection failed");
//!
//! let desired = ResourceGroupSpec {
//!     cpu_weight: Some(4),
//!     mem_limit: Some("80%".to_string()),
//!     ..ResourceGroupSpec::new("rg_etl")
//! }
//! .with_classifier(Classifier::new().with_user("etl"));
//!
//! let plan = client.plan(&desired, Strategy::InPlace).expect("plan failed");
//! for change in &plan.changes {
//!     println!("{change}");
//! }
//! client.apply(&plan).expect("apply failed");
//! ```
//!
//! The client holds no cached state: every read re-queries the database,
//! and no statement is ever retried.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod reconcile;
pub mod snapshot;
pub mod statement;
pub mod types;

pub use backend::mysql::{ConnectOptions, DEFAULT_PORT};
pub use error::{DriverError, Error, ErrorCategory, Result, StatementKind};
pub use reconcile::{Change, Plan, PropertyDrift, Strategy};
pub use snapshot::Snapshot;
pub use types::{
    Classifier, Property, PropertyValue, ResourceGroupSpec, canonicalize_mem_limit, parse_byte_size,
};

use backend::{Backend, mysql::MysqlBackend};

/// High-level client for resource group operations.
///
/// The client owns one connection and provides the create, read, update,
/// delete and import operations on top of it.
pub struct Client {
    backend: Box<dyn Backend>,
}

impl Client {
    /// Connect to a database frontend.
    pub fn connect(options: &ConnectOptions) -> Result<Self> {
        let backend = MysqlBackend::connect(options)?;
        Ok(Self {
            backend: Box::new(backend),
        })
    }

    /// Create a client with a custom backend (useful for testing).
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    // =========================================================================
    // Lifecycle Operations
    // =========================================================================

    /// Create a group with its full desired state.
    pub fn create(&mut self, spec: &ResourceGroupSpec) -> Result<()> {
        reconcile::validate(spec)?;
        let spec = spec.without_ids();
        self.run(&spec.name, &Change::CreateGroup(spec.clone()), 0)
    }

    /// Read the observed state of a group, or `None` if it does not exist.
    pub fn read(&mut self, name: &str) -> Result<Option<Snapshot>> {
        reconcile::validate(&ResourceGroupSpec::new(name))?;

        let query = statement::build_show(name);
        log::debug!("Query: {query}");

        let rows = self.backend.query(&query).map_err(|source| Error::Query {
            group: name.to_string(),
            source,
        })?;
        let snapshot = snapshot::parse_rows(name, rows).map_err(|source| Error::Query {
            group: name.to_string(),
            source,
        })?;

        if snapshot.is_none() {
            log::debug!("Resource group '{name}' not found");
        }
        Ok(snapshot)
    }

    /// Read an existing group for adoption into managed state.
    pub fn import(&mut self, name: &str) -> Result<Snapshot> {
        self.read(name)?.ok_or_else(|| Error::NotFound {
            name: name.to_string(),
        })
    }

    /// Compute the changes that converge a group, without running them.
    pub fn plan(&mut self, desired: &ResourceGroupSpec, strategy: Strategy) -> Result<Plan> {
        reconcile::validate(desired)?;
        let observed = self.read(&desired.name)?;
        reconcile::reconcile(observed.as_ref(), desired, strategy)
    }

    /// Run a plan. Returns the number of statements executed.
    pub fn apply(&mut self, plan: &Plan) -> Result<usize> {
        self.apply_with_callback(plan, |_, _| {})
    }

    /// Run a plan, calling `on_step` before each change.
    ///
    /// Stops at the first failure; the error reports how many changes had
    /// already been applied.
    pub fn apply_with_callback<F>(&mut self, plan: &Plan, mut on_step: F) -> Result<usize>
    where
        F: FnMut(usize, &Change),
    {
        for (index, change) in plan.changes.iter().enumerate() {
            on_step(index, change);
            self.run(&plan.group, change, index)?;
        }
        Ok(plan.len())
    }

    /// Plan and apply in one step, returning the plan that was applied.
    pub fn update(&mut self, desired: &ResourceGroupSpec, strategy: Strategy) -> Result<Plan> {
        let plan = self.plan(desired, strategy)?;
        self.apply(&plan)?;
        Ok(plan)
    }

    /// Drop a group.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        reconcile::validate(&ResourceGroupSpec::new(name))?;
        self.run(name, &Change::DropGroup, 0)
    }

    fn run(&mut self, group: &str, change: &Change, completed: usize) -> Result<()> {
        let kind = change.kind();
        let statement = change.statement(group);

        log::info!("Running {kind} for resource group '{group}'");
        log::debug!("Statement: {statement}");

        self.backend
            .execute(&statement)
            .map_err(|source| Error::Statement {
                kind,
                group: group.to_string(),
                completed,
                source,
            })
    }
}
