pub mod fetch;

pub use fetch::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("No plan PDF link on {0}")]
    NoPlanLink(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
