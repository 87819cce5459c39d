//! Transport clients used to fetch repository files from mirrors.

pub mod client;
pub mod error;
pub mod http;
pub mod http_client;
pub mod local;
pub mod oci;

pub use client::{client_for, Client, RepoData, Transport};
pub use error::{DownloadError, Result};
