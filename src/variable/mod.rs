pub mod capture;
pub mod path;
pub mod resolver;
pub mod types;

pub use capture::{CaptureSource, VariableCapture, extract};
pub use path::PathExpr;
pub use resolver::{RequestDefaults, VariableResolver};
pub use types::{Constants, ExecutionContext, ExtractError, Scope};
