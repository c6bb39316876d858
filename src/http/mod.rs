pub mod client;
pub mod dispatcher;
pub mod request;
pub mod response;
pub mod serialization;
pub mod types;

pub use client::{DispatchError, HttpTransport, Transport, TransportSettings};
pub use dispatcher::{Dispatched, Dispatcher, TokenBinding};
pub use request::{RequestBody, ResolvedRequest};
pub use response::Response;
pub use types::{Method, Status};
