// Shared utilities: errors, logging, constants, environment and path helpers
pub mod constants;
pub mod environment;
pub mod error;
pub mod logger;
pub mod paths;
