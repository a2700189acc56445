pub mod client;
pub mod normalize;
pub mod response;
pub mod summary;

pub use client::*;
pub use normalize::*;
pub use response::*;
pub use summary::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No analysis endpoint reachable (last tried {endpoint}): {reason}")]
    Network { endpoint: String, reason: String },

    #[error("Analysis service returned error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("Malformed analysis response: {0}")]
    MalformedResponse(String),
}
