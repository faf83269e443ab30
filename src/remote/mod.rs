pub mod dispatcher;
pub mod error;
pub mod http;
pub mod mock;
pub mod transport;
pub mod types;

pub use dispatcher::{RequestDispatcher, StreamHandle};
pub use error::TransportError;
pub use http::{HttpClient, HttpConfig, HttpTransport};
pub use transport::{ByteStream, Transport};
pub use types::Endpoint;
