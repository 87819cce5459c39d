use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use keel_utils::fs::ensure_dir_exists;
use tracing::{debug, warn};
use ureq::http::header::AUTHORIZATION;
use url::Url;

use crate::{
    client::{target_path, Client, RepoData},
    error::{DownloadError, ErrorContext, Result},
    http_client::SHARED_AGENT,
};

/// Downloads repository files over HTTP(S), trying mirrors in order.
pub struct HttpClient {
    data: RepoData,
    workdir: PathBuf,
}

impl HttpClient {
    pub fn new(data: RepoData, workdir: PathBuf) -> Self {
        Self {
            data,
            workdir,
        }
    }

    fn fetch(&self, url: &str, target: &Path) -> Result<()> {
        let mut req = SHARED_AGENT.get(url);
        if let Some(auth) = self.data.authorization() {
            req = req.header(AUTHORIZATION, &auth);
        }

        let resp = req.call()?;
        if !resp.status().is_success() {
            return Err(DownloadError::HttpError {
                status: resp.status().as_u16(),
                url: url.to_string(),
            });
        }

        let part = target.with_extension("part");
        let mut file =
            File::create(&part).with_context(|| format!("creating {}", part.display()))?;
        let mut reader = resp.into_body().into_reader();
        io::copy(&mut reader, &mut file)
            .with_context(|| format!("downloading {url}"))?;
        fs::rename(&part, target)
            .with_context(|| format!("moving {} into place", part.display()))?;
        Ok(())
    }
}

/// `<mirror>/<name>`, validated as an absolute URL.
pub fn mirror_url(mirror: &str, name: &str) -> Result<String> {
    let url = format!("{}/{}", mirror.trim_end_matches('/'), name);
    Url::parse(&url).map_err(|err| {
        DownloadError::InvalidUrl {
            url: url.clone(),
            source: err,
        }
    })?;
    Ok(url)
}

impl Client for HttpClient {
    fn download_file(&self, name: &str) -> Result<PathBuf> {
        let target = target_path(&self.workdir, name)?;
        ensure_dir_exists(&self.workdir)?;
        let mut tried = Vec::new();

        for mirror in &self.data.urls {
            let url = mirror_url(mirror, name)?;
            match self.fetch(&url, &target) {
                Ok(()) => {
                    debug!(url = %url, path = %target.display(), "downloaded repository file");
                    return Ok(target);
                }
                Err(err) => {
                    warn!(url = %url, error = %err, "mirror failed, trying next");
                    tried.push(format!("{url}: {err}"));
                }
            }
        }

        Err(DownloadError::NotFound {
            file: name.to_string(),
            tried,
        })
    }
}
