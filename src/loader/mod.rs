pub mod file;
pub mod types;

pub use file::{CaseLoader, FileLoader};
pub use types::{LoadError, RequestTemplate, Step, TestCase};
