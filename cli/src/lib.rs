pub mod commands;
pub mod output;
mod params;

pub use params::{DEFAULT_NAMESPACE, ParameterInput, resolve_parameters, starting_cursor};
