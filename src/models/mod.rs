// Models module for data structures
pub mod finding;
pub mod rule;
pub mod workflow;
