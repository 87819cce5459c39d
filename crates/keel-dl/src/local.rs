use std::path::{Path, PathBuf};

use keel_utils::fs::copy_file;
use tracing::debug;

use crate::{
    client::{target_path, Client, RepoData},
    error::{DownloadError, Result},
};

/// Copies files out of repositories living on a filesystem.
pub struct LocalClient {
    data: RepoData,
    workdir: PathBuf,
}

impl LocalClient {
    pub fn new(data: RepoData, workdir: PathBuf) -> Self {
        Self {
            data,
            workdir,
        }
    }
}

fn mirror_path(url: &str) -> &Path {
    Path::new(url.strip_prefix("file://").unwrap_or(url))
}

impl Client for LocalClient {
    fn download_file(&self, name: &str) -> Result<PathBuf> {
        let target = target_path(&self.workdir, name)?;

        for url in &self.data.urls {
            let source = mirror_path(url).join(name);
            if !source.is_file() {
                debug!(mirror = %url, file = name, "file not present on mirror");
                continue;
            }
            copy_file(&source, &target)?;
            debug!(from = %source.display(), to = %target.display(), "copied repository file");
            return Ok(target);
        }

        Err(DownloadError::NotFound {
            file: name.to_string(),
            tried: self.data.urls.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_first_mirror_with_file_wins() {
        let root = tempfile::tempdir().unwrap();
        let empty = root.path().join("empty");
        let full = root.path().join("full");
        fs::create_dir_all(&empty).unwrap();
        fs::create_dir_all(&full).unwrap();
        fs::write(full.join("repository.json"), "{}").unwrap();

        let workdir = root.path().join("work");
        let client = LocalClient::new(
            RepoData::new(
                vec![
                    empty.display().to_string(),
                    format!("file://{}", full.display()),
                ],
                Default::default(),
            ),
            workdir.clone(),
        );

        let path = client.download_file("repository.json").unwrap();
        assert_eq!(path, workdir.join("repository.json"));
        assert_eq!(fs::read_to_string(path).unwrap(), "{}");
    }

    #[test]
    fn test_missing_everywhere() {
        let root = tempfile::tempdir().unwrap();
        let client = LocalClient::new(
            RepoData::new(vec![root.path().display().to_string()], Default::default()),
            root.path().join("work"),
        );
        assert!(matches!(
            client.download_file("tree.tar.gz"),
            Err(DownloadError::NotFound { tried, .. }) if tried.len() == 1
        ));
    }
}
