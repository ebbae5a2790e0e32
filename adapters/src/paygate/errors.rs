use thiserror::Error;

#[derive(Error, Debug)]
pub enum PayGateError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected the request: code {code}")]
    Rejected { code: String },

    #[error("invalid response from payment gateway")]
    InvalidResponse,
}
