//! Forward and backward navigation over the step graph

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

use super::branch;
use super::graph::{BackTarget, GraphError, Signal, StepGraph};
use super::step::Step;
use crate::store::{Document, StateStore, StoreError};
use crate::validation::{schema_for, FormState, ValidationResult};

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("Step is not valid: {}", describe(.0))]
    Invalid(ValidationResult),
    #[error("Step '{0}' is not active")]
    Inactive(String),
    #[error("Step '{0}' is completed by submitting the survey")]
    SubmitRequired(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("Failed to save answers: {0}")]
    Store(#[from] StoreError),
}

fn describe(result: &ValidationResult) -> String {
    result
        .errors
        .iter()
        .map(|(field, reason)| format!("{field}: {reason}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A completed forward move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub signal: Signal,
}

/// The step currently mounted, and whether its actions are still enabled
#[derive(Debug, Clone, PartialEq, Eq)]
struct Mounted {
    path: String,
    active: bool,
}

/// Drives one wizard session over an injected store
pub struct Wizard<S: StateStore> {
    graph: StepGraph,
    store: S,
    mounted: Option<Mounted>,
    history: Vec<String>,
}

impl<S: StateStore> Wizard<S> {
    pub fn new(graph: StepGraph, store: S) -> Self {
        Self {
            graph,
            store,
            mounted: None,
            history: Vec::new(),
        }
    }

    pub fn graph(&self) -> &StepGraph {
        &self.graph
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Path of the mounted step, if any
    pub fn current(&self) -> Option<&str> {
        self.mounted.as_ref().map(|m| m.path.as_str())
    }

    /// Whether the mounted step still accepts actions
    pub fn is_active(&self, path: &str) -> bool {
        self.mounted
            .as_ref()
            .is_some_and(|m| m.path == path && m.active)
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Mount `path` and return its form, seeded from the store group
    pub fn enter(&mut self, path: &str) -> Result<FormState, NavigationError> {
        self.enter_with_params(path, &BTreeMap::new())
    }

    /// Mount `path`, overlaying declared prefill parameters on the store defaults
    pub fn enter_with_params(
        &mut self,
        path: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<FormState, NavigationError> {
        let step = self.graph.step(path)?;
        let mut defaults = self.store.read(step.store_key()).unwrap_or_default();

        for (param, field) in &step.props.prefill {
            if let Some(value) = params.get(param).filter(|v| !v.is_empty()) {
                defaults.insert(field.clone(), Value::String(value.clone()));
            }
        }

        let form = FormState::new(schema_for(step), Some(&defaults));

        if self.history.last().map(String::as_str) != Some(path) {
            self.history.push(path.to_string());
        }
        self.mounted = Some(Mounted {
            path: path.to_string(),
            active: true,
        });
        debug!(step = path, valid = form.can_advance(), "Entered step");
        Ok(form)
    }

    fn mounted_step(&self, path: &str) -> Result<&Step, NavigationError> {
        if !self.is_active(path) {
            return Err(NavigationError::Inactive(path.to_string()));
        }
        Ok(self.graph.step(path)?)
    }

    /// Validate `values` for the mounted step without side effects
    pub fn check(&self, path: &str, values: &Document) -> Result<ValidationResult, NavigationError> {
        let step = self.graph.step(path)?;
        Ok(schema_for(step).validate(values))
    }

    /// Forward cycle: validate, merge into the store, deactivate, resolve.
    ///
    /// The store write always lands before the transition is returned; a
    /// failed validation leaves both the store and the mounted step untouched.
    /// The submitting step is refused here and must go through the
    /// submission aggregator.
    pub fn submit_step(
        &mut self,
        path: &str,
        values: Document,
    ) -> Result<Transition, NavigationError> {
        let step = self.mounted_step(path)?;
        if step.props.submits {
            return Err(NavigationError::SubmitRequired(path.to_string()));
        }
        let store_key = step.store_key().to_string();

        let result = schema_for(step).validate(&values);
        if !result.is_valid() {
            debug!(step = path, errors = %describe(&result), "Validation blocked navigation");
            return Err(NavigationError::Invalid(result));
        }

        let signal = branch::decide(step, &values);
        self.store.update(&store_key, values)?;
        self.deactivate(path);

        let to = self.graph.resolve(path, &signal)?.path.clone();
        info!(from = path, to = %to, ?signal, "Advancing");
        Ok(Transition {
            from: path.to_string(),
            to,
            signal,
        })
    }

    /// Submit a form built with [`Wizard::enter`]
    pub fn submit_form(&mut self, path: &str, form: FormState) -> Result<Transition, NavigationError> {
        self.submit_step(path, form.into_values())
    }

    /// Move backwards without validating or touching the store.
    ///
    /// Returns the destination, or `None` when the step has no predecessor
    /// and history is exhausted.
    pub fn go_back(&mut self, path: &str) -> Result<Option<String>, NavigationError> {
        let target = self.graph.back(path)?;
        self.deactivate(path);

        let destination = match target {
            BackTarget::Step(prev) => Some(prev),
            BackTarget::History => {
                if self.history.last().map(String::as_str) == Some(path) {
                    self.history.pop();
                }
                self.history.last().cloned()
            }
        };
        debug!(from = path, to = ?destination, "Going back");
        Ok(destination)
    }

    /// Disable the mounted step's actions until it is entered again
    pub fn deactivate(&mut self, path: &str) {
        if let Some(mounted) = self.mounted.as_mut() {
            if mounted.path == path {
                mounted.active = false;
            }
        }
    }
}
