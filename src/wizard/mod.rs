//! Step graph, branch decisions and navigation

pub mod branch;
pub mod confirmation;
pub mod controller;
pub mod definitions;
pub mod graph;
pub mod step;

pub use confirmation::ConfirmationScreen;
pub use controller::{NavigationError, Transition, Wizard};
pub use graph::{BackTarget, GraphError, Signal, StepGraph};
pub use step::{Step, StepMetadata, StepProps};

/// The survey graph, validated
pub fn survey_graph() -> Result<StepGraph, GraphError> {
    StepGraph::new(definitions::survey_steps())
}
