mod client;
mod envelope;
mod error;
pub mod supabase;
mod transport;

pub use client::ApiClient;
pub use envelope::Envelope;
pub use error::ApiError;
pub use transport::{ApiRequest, Body, HttpTransport, Method, RawResponse, Transport};

#[cfg(test)]
pub(crate) use client::tests::ScriptedTransport;
