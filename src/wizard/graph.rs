//! Immutable step table with link validation and successor resolution

use std::collections::HashMap;
use thiserror::Error;

use super::step::{BranchKey, Step};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Invalid step graph: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("Unknown step '{0}'")]
    UnknownStep(String),
    #[error("Step '{step}' has no alternate successor '{branch}'")]
    UnknownBranch { step: String, branch: BranchKey },
    #[error("Step '{0}' has no successor")]
    NoSuccessor(String),
}

/// Outcome of a forward submission, used to pick the successor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Follow `next_step`
    Default,
    /// Follow the named entry of `other_steps`
    Branch(BranchKey),
}

/// Where backward navigation leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackTarget {
    Step(String),
    /// No `previous_step`; defer to the caller's history
    History,
}

#[derive(Debug, Clone)]
pub struct StepGraph {
    steps: Vec<Step>,
    index: HashMap<String, usize>,
}

impl StepGraph {
    /// Build the graph, rejecting duplicate paths and dangling links
    pub fn new(steps: Vec<Step>) -> Result<Self, GraphError> {
        let mut errors = Vec::new();
        let mut index = HashMap::with_capacity(steps.len());

        for (i, step) in steps.iter().enumerate() {
            if index.insert(step.path.clone(), i).is_some() {
                errors.push(format!("Duplicate step path '{}'", step.path));
            }
        }

        for step in &steps {
            for (label, target) in step.links() {
                if !index.contains_key(target) {
                    errors.push(format!(
                        "Step '{}' {} references unknown step '{}'",
                        step.path, label, target
                    ));
                }
            }

            if step.props.next_step.is_none() && step.props.other_steps.is_empty() {
                errors.push(format!("Step '{}' has no successor", step.path));
            }
        }

        if errors.is_empty() {
            Ok(Self { steps, index })
        } else {
            Err(GraphError::Invalid(errors))
        }
    }

    pub fn get(&self, path: &str) -> Option<&Step> {
        self.index.get(path).map(|&i| &self.steps[i])
    }

    pub fn step(&self, path: &str) -> Result<&Step, GraphError> {
        self.get(path)
            .ok_or_else(|| GraphError::UnknownStep(path.to_string()))
    }

    /// Entry point of the wizard
    pub fn first(&self) -> Option<&Step> {
        self.steps.first()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Successor of `current` under `signal`
    pub fn resolve(&self, current: &str, signal: &Signal) -> Result<&Step, GraphError> {
        let step = self.step(current)?;
        let target = match signal {
            Signal::Default => step
                .props
                .next_step
                .as_deref()
                .ok_or_else(|| GraphError::NoSuccessor(current.to_string()))?,
            Signal::Branch(key) => step.props.other_steps.get(key).map(String::as_str).ok_or_else(
                || GraphError::UnknownBranch {
                    step: current.to_string(),
                    branch: key.clone(),
                },
            )?,
        };
        self.step(target)
    }

    /// Predecessor of `current`
    pub fn back(&self, current: &str) -> Result<BackTarget, GraphError> {
        let step = self.step(current)?;
        Ok(match step.props.previous_step {
            Some(ref prev) => BackTarget::Step(prev.clone()),
            None => BackTarget::History,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear() -> Vec<Step> {
        vec![
            Step::new("/a", "A", "g").next("/b"),
            Step::new("/b", "B", "g")
                .previous("/a")
                .next("/c")
                .other("alt", "/d"),
            Step::new("/c", "C", "g").previous("/b").next("/a"),
            Step::new("/d", "D", "g").previous("/b").next("/c"),
        ]
    }

    #[test]
    fn test_valid_graph_builds() {
        let graph = StepGraph::new(linear()).unwrap();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.first().unwrap().path, "/a");
    }

    #[test]
    fn test_validation_catches_dangling_next_step() {
        let steps = vec![Step::new("/a", "A", "g").next("/nowhere")];
        let err = StepGraph::new(steps).unwrap_err();
        match err {
            GraphError::Invalid(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("next_step references unknown step '/nowhere'"));
            }
            other => panic!("Expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_catches_dangling_branch_and_previous() {
        let steps = vec![Step::new("/a", "A", "g")
            .previous("/gone")
            .next("/a")
            .other("alt", "/missing")];
        let GraphError::Invalid(errors) = StepGraph::new(steps).unwrap_err() else {
            panic!("Expected Invalid");
        };
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("other_steps.alt")));
        assert!(errors.iter().any(|e| e.contains("previous_step")));
    }

    #[test]
    fn test_validation_catches_duplicate_paths() {
        let steps = vec![
            Step::new("/a", "A", "g").next("/a"),
            Step::new("/a", "A2", "g").next("/a"),
        ];
        let GraphError::Invalid(errors) = StepGraph::new(steps).unwrap_err() else {
            panic!("Expected Invalid");
        };
        assert!(errors[0].contains("Duplicate step path '/a'"));
    }

    #[test]
    fn test_validation_catches_step_without_successor() {
        let steps = vec![Step::new("/a", "A", "g")];
        let GraphError::Invalid(errors) = StepGraph::new(steps).unwrap_err() else {
            panic!("Expected Invalid");
        };
        assert!(errors[0].contains("has no successor"));
    }

    #[test]
    fn test_resolve_default_and_branch() {
        let graph = StepGraph::new(linear()).unwrap();
        assert_eq!(graph.resolve("/b", &Signal::Default).unwrap().path, "/c");
        assert_eq!(
            graph
                .resolve("/b", &Signal::Branch("alt".to_string()))
                .unwrap()
                .path,
            "/d"
        );
    }

    #[test]
    fn test_resolve_is_pure() {
        let graph = StepGraph::new(linear()).unwrap();
        let first = graph.resolve("/b", &Signal::Default).unwrap().path.clone();
        let second = graph.resolve("/b", &Signal::Default).unwrap().path.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_unknown_branch() {
        let graph = StepGraph::new(linear()).unwrap();
        let err = graph
            .resolve("/a", &Signal::Branch("alt".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownBranch {
                step: "/a".to_string(),
                branch: "alt".to_string()
            }
        );
    }

    #[test]
    fn test_resolve_unknown_step() {
        let graph = StepGraph::new(linear()).unwrap();
        assert_eq!(
            graph.resolve("/zzz", &Signal::Default).unwrap_err(),
            GraphError::UnknownStep("/zzz".to_string())
        );
    }

    #[test]
    fn test_back_uses_previous_or_history() {
        let graph = StepGraph::new(linear()).unwrap();
        assert_eq!(graph.back("/b").unwrap(), BackTarget::Step("/a".to_string()));
        assert_eq!(graph.back("/a").unwrap(), BackTarget::History);
    }
}
