#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no segments found in playlist")]
    Empty,

    #[error("cannot resolve URI `{uri}`: {reason}")]
    UnresolvableUri { uri: String, reason: String },

    #[error("unsupported encryption method `{method}`")]
    UnsupportedEncryption { method: String },
}
