use thiserror::Error;

use crate::xml::XmlError;

/// Errors that prevent a manifest from being parsed at all. Problems inside
/// individual tags are handled leniently and never surface here.
#[derive(Debug, Error)]
pub enum MpdError {
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    #[error("expected MPD root element, found <{found}>")]
    UnexpectedRoot { found: String },
}
