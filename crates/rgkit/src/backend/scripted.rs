//! In-memory backend double that records statements and replays scripted results.

use crate::backend::{Backend, Rows, TextRow};
use crate::error::DriverError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Script {
    executed: Vec<String>,
    queries: Vec<String>,
    results: HashMap<String, VecDeque<Result<Vec<TextRow>, DriverError>>>,
    failures: HashMap<String, DriverError>,
}

/// Handle for inspecting a [`ScriptedBackend`] after it moved into a client.
#[derive(Debug, Clone, Default)]
pub struct ScriptHandle(Arc<Mutex<Script>>);

impl ScriptHandle {
    pub fn executed(&self) -> Vec<String> {
        self.0.lock().unwrap().executed.clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.0.lock().unwrap().queries.clone()
    }
}

/// Backend that records executed statements and answers queries from a script.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: ScriptHandle,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> ScriptHandle {
        self.script.clone()
    }

    /// Queue rows for the next run of `statement`.
    pub fn on_query(self, statement: &str, rows: Vec<TextRow>) -> Self {
        self.push_result(statement, Ok(rows))
    }

    /// Queue a failure for the next run of query `statement`.
    pub fn on_query_error(self, statement: &str, error: DriverError) -> Self {
        self.push_result(statement, Err(error))
    }

    /// Fail every execution of `statement`.
    pub fn fail_on(self, statement: &str, error: DriverError) -> Self {
        self.script
            .0
            .lock()
            .unwrap()
            .failures
            .insert(statement.to_string(), error);
        self
    }

    fn push_result(self, statement: &str, result: Result<Vec<TextRow>, DriverError>) -> Self {
        self.script
            .0
            .lock()
            .unwrap()
            .results
            .entry(statement.to_string())
            .or_default()
            .push_back(result);
        self
    }
}

impl Backend for ScriptedBackend {
    fn execute(&mut self, statement: &str) -> Result<(), DriverError> {
        let mut script = self.script.0.lock().unwrap();
        if let Some(error) = script.failures.get(statement) {
            return Err(error.clone());
        }
        script.executed.push(statement.to_string());
        Ok(())
    }

    fn query(&mut self, statement: &str) -> Result<Rows<'_>, DriverError> {
        let mut script = self.script.0.lock().unwrap();
        script.queries.push(statement.to_string());
        let rows = script
            .results
            .get_mut(statement)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(Vec::new()))?;
        Ok(Box::new(rows.into_iter().map(Ok)))
    }
}
