use keel_utils::error::FileSystemError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DownloadError {
    #[error("Invalid URL: {url}")]
    #[diagnostic(code(keel_dl::invalid_url))]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid image reference: {0}")]
    #[diagnostic(
        code(keel_dl::invalid_reference),
        help("Registry mirrors look like 'registry.example.com/namespace/repository'")
    )]
    InvalidReference(String),

    #[error(transparent)]
    #[diagnostic(
        code(keel_dl::network),
        help("Check your internet connection or try again later")
    )]
    Network(#[from] Box<ureq::Error>),

    #[error("HTTP {status}: {url}")]
    #[diagnostic(code(keel_dl::http_error))]
    HttpError { status: u16, url: String },

    #[error("Error while {action}: {source}")]
    #[diagnostic(code(keel_dl::io))]
    Io {
        action: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(keel_dl::fs))]
    FileSystem(#[from] FileSystemError),

    #[error("'{file}' is not available from any mirror")]
    #[diagnostic(
        code(keel_dl::not_found),
        help("Tried:\n{}", .tried.join("\n"))
    )]
    NotFound { file: String, tried: Vec<String> },

    #[error("'{file}' not found in image {reference}")]
    #[diagnostic(code(keel_dl::layer_not_found))]
    LayerNotFound { reference: String, file: String },

    #[error("Refusing to download '{0}': not a plain file name")]
    #[diagnostic(
        code(keel_dl::invalid_file_name),
        help("Repository files must be named without directories or '..'")
    )]
    InvalidFileName(String),

    #[error("Invalid response from server")]
    #[diagnostic(code(keel_dl::invalid_response))]
    InvalidResponse,
}

pub type Result<T> = std::result::Result<T, DownloadError>;

impl From<ureq::Error> for DownloadError {
    fn from(e: ureq::Error) -> Self {
        Self::Network(Box::new(e))
    }
}

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            DownloadError::Io {
                action: context(),
                source: err,
            }
        })
    }
}
