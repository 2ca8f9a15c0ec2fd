use thiserror::Error;

/// Errors raised while fetching or reading the unread-count feed.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Connection, TLS or body read failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The feed body is not well-formed XML.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The feed body carries no `fullcount` element.
    #[error("feed has no fullcount element")]
    MissingCount,

    /// The `fullcount` element is not a non-negative integer.
    #[error("malformed fullcount value: '{0}'")]
    MalformedCount(String),
}
