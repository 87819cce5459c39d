use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use base64::prelude::{Engine as _, BASE64_STANDARD};
use keel_utils::path::is_plain_file_name;

use crate::{
    error::{DownloadError, Result},
    http::HttpClient,
    local::LocalClient,
    oci::OciClient,
};

/// Fetches named files from a repository's mirrors.
pub trait Client: Send + Sync {
    /// Downloads `name` into the client's working directory and returns the
    /// local path.
    fn download_file(&self, name: &str) -> Result<PathBuf>;
}

/// How a repository is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Local,
    Http,
    Oci,
}

/// Connection details of a repository.
#[derive(Debug, Clone, Default)]
pub struct RepoData {
    /// Mirrors, tried in order.
    pub urls: Vec<String>,
    /// Opaque credentials; `token` for bearer auth, `username`/`password` or a
    /// pre-encoded `auth` for basic auth.
    pub authentication: HashMap<String, String>,
}

impl RepoData {
    pub fn new(urls: Vec<String>, authentication: HashMap<String, String>) -> Self {
        Self {
            urls,
            authentication,
        }
    }

    /// Value for the `Authorization` header, if credentials are configured.
    pub fn authorization(&self) -> Option<String> {
        let auth = &self.authentication;
        if let Some(token) = auth.get("token") {
            return Some(format!("Bearer {token}"));
        }
        if let Some(encoded) = auth.get("auth") {
            return Some(format!("Basic {encoded}"));
        }
        match (auth.get("username"), auth.get("password")) {
            (Some(user), Some(pass)) => {
                Some(format!(
                    "Basic {}",
                    BASE64_STANDARD.encode(format!("{user}:{pass}"))
                ))
            }
            _ => None,
        }
    }
}

/// Where `name` lands inside `workdir`. Names reaching outside it are
/// rejected.
pub(crate) fn target_path(workdir: &Path, name: &str) -> Result<PathBuf> {
    if !is_plain_file_name(name) {
        return Err(DownloadError::InvalidFileName(name.to_string()));
    }
    Ok(workdir.join(name))
}

/// Builds the client for `transport`, downloading into `workdir`.
pub fn client_for(transport: Transport, data: RepoData, workdir: &Path) -> Box<dyn Client> {
    let workdir = workdir.to_path_buf();
    match transport {
        Transport::Local => Box::new(LocalClient::new(data, workdir)),
        Transport::Http => Box::new(HttpClient::new(data, workdir)),
        Transport::Oci => Box::new(OciClient::new(data, workdir)),
    }
}
