pub mod args;
pub mod config;
pub mod distribution;
pub mod errors;
pub mod output;
pub mod params;
pub mod runner;
pub mod runners;
pub mod search;
pub mod submit;
pub mod value;
pub use anyhow;
pub use errors::{Error, ErrorKind, Result};
pub use params::{Field, ParameterSet};
pub use value::Value;
