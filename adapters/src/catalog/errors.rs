use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid price rule from catalog: {0}")]
    InvalidRule(String),
}
