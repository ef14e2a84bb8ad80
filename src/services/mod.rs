// Services module for business logic
pub mod config_resolver;
pub mod engine;
pub mod output_writer;
pub mod pipeline_runner;
pub mod rule_tester;
