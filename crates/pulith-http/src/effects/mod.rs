//! I/O operations: transport, dispatch, redirects, body reads.
//!
//! Everything here is async and runs on tokio. The network itself sits
//! behind [`Transport`].

mod agent;
mod client;
mod deadline;
mod dispatch;
mod transport;
mod reader;
mod redirect;

pub use agent::Agent;
pub use client::Client;
pub use deadline::{DeadlineError, with_deadline};
pub use dispatch::dispatch;
pub use transport::{Body, BoxStream, OutgoingBody, Response, ResponseHead, Transport, TransportRequest};
pub use reader::{Content, read, read_stream};
pub use redirect::{RedirectState, follow_redirects};

#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
