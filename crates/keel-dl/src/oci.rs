//! Pulls single files out of container images through the OCI distribution
//! API.
//!
//! Repository files published to a registry live in images tagged
//! `<mirror>:<filename>`, whose root filesystem contains the file.

use std::{
    collections::HashMap,
    fmt,
    fs::{self, File},
    io::{self, BufReader, Read, Seek},
    path::{Path, PathBuf},
};

use flate2::read::GzDecoder;
use keel_utils::fs::{ensure_dir_exists, safe_remove};
use serde::Deserialize;
use tracing::{debug, trace, warn};
use ureq::{
    http::{
        header::{ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE},
        Response, StatusCode,
    },
    Body,
};
use url::Url;

use crate::{
    client::{target_path, Client, RepoData},
    error::{DownloadError, ErrorContext, Result},
    http_client::SHARED_AGENT,
};

const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json, \
    application/vnd.oci.image.index.v1+json, \
    application/vnd.docker.distribution.manifest.v2+json, \
    application/vnd.docker.distribution.manifest.list.v2+json";

const DOCKER_HUB: &str = "docker.io";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    /// Parses `[registry/]repository[:tag]`. References without a registry
    /// host resolve to Docker Hub.
    pub fn parse(reference: &str) -> Result<Self> {
        let invalid = || DownloadError::InvalidReference(reference.to_string());
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let (name, tag) = match trimmed.rsplit_once(':') {
            Some((name, tag)) if !tag.contains('/') => (name, tag),
            _ => (trimmed, "latest"),
        };
        if name.is_empty() || tag.is_empty() {
            return Err(invalid());
        }

        let (registry, repository) = match name.split_once('/') {
            Some((host, rest))
                if host.contains('.') || host.contains(':') || host == "localhost" =>
            {
                (host.to_string(), rest.to_string())
            }
            Some(_) => (DOCKER_HUB.to_string(), name.to_string()),
            None => (DOCKER_HUB.to_string(), format!("library/{name}")),
        };
        if repository.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            registry,
            repository,
            tag: tag.to_string(),
        })
    }

    /// Base URL of the registry's v2 API.
    pub fn api_base(&self) -> String {
        if self.registry == DOCKER_HUB {
            return "https://registry-1.docker.io/v2".to_string();
        }
        let plain = self.registry.starts_with("localhost") || self.registry.starts_with("127.");
        let scheme = if plain { "http" } else { "https" };
        format!("{scheme}://{}/v2", self.registry)
    }

    fn manifest_url(&self, reference: &str) -> String {
        format!("{}/{}/manifests/{reference}", self.api_base(), self.repository)
    }

    fn blob_url(&self, digest: &str) -> String {
        format!("{}/{}/blobs/{digest}", self.api_base(), self.repository)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Manifest {
    #[serde(rename = "mediaType", default)]
    media_type: String,
    #[serde(default)]
    layers: Vec<Descriptor>,
    #[serde(default)]
    manifests: Vec<PlatformDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
struct Descriptor {
    digest: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PlatformDescriptor {
    digest: String,
    #[serde(default)]
    platform: Option<Platform>,
}

#[derive(Debug, Clone, Deserialize)]
struct Platform {
    os: String,
    architecture: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

fn oci_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

/// Picks the manifest for the running platform out of an image index,
/// falling back to the first entry.
fn select_platform<'a>(manifests: &'a [PlatformDescriptor], arch: &str) -> Option<&'a str> {
    manifests
        .iter()
        .find(|m| {
            m.platform
                .as_ref()
                .is_some_and(|p| p.os == "linux" && p.architecture == arch)
        })
        .or_else(|| manifests.first())
        .map(|m| m.digest.as_str())
}

/// Parses the parameters of a `Bearer` `WWW-Authenticate` challenge.
fn parse_challenge(header: &str) -> Option<HashMap<String, String>> {
    let params = header.trim().strip_prefix("Bearer ")?;
    let mut out = HashMap::new();
    let mut chars = params.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| *c == ',' || c.is_whitespace()) {
            chars.next();
        }
        let key: String = chars.by_ref().take_while(|c| *c != '=').collect();
        if key.is_empty() {
            break;
        }
        let value: String = if chars.peek() == Some(&'"') {
            chars.next();
            chars.by_ref().take_while(|c| *c != '"').collect()
        } else {
            chars.by_ref().take_while(|c| *c != ',').collect()
        };
        out.insert(key.trim().to_string(), value);
    }

    Some(out)
}

/// Looks for `name` inside a layer blob (plain or gzip-compressed tar) and
/// extracts it to `target`. Returns whether the file was found.
fn extract_from_layer(blob: &Path, name: &str, target: &Path) -> Result<bool> {
    let mut file = File::open(blob).with_context(|| format!("opening layer {}", blob.display()))?;
    let mut magic = [0u8; 2];
    let gzip = file.read_exact(&mut magic).is_ok() && magic == [0x1f, 0x8b];
    file.rewind()
        .with_context(|| format!("reading layer {}", blob.display()))?;

    let reader: Box<dyn Read> = if gzip {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut archive = tar::Archive::new(reader);
    let entries = archive
        .entries()
        .with_context(|| format!("reading layer {}", blob.display()))?;

    for entry in entries {
        let mut entry = entry.with_context(|| format!("reading layer {}", blob.display()))?;
        let path = entry
            .path()
            .with_context(|| format!("reading layer {}", blob.display()))?
            .to_string_lossy()
            .into_owned();
        let normalized = path.trim_start_matches("./").trim_start_matches('/');
        trace!(entry = normalized, "layer entry");

        if normalized == name {
            let mut out =
                File::create(target).with_context(|| format!("creating {}", target.display()))?;
            io::copy(&mut entry, &mut out)
                .with_context(|| format!("extracting {name} from layer"))?;
            return Ok(true);
        }
    }

    Ok(false)
}

/// Downloads repository files stored as single-file images in a registry.
pub struct OciClient {
    data: RepoData,
    workdir: PathBuf,
}

impl OciClient {
    pub fn new(data: RepoData, workdir: PathBuf) -> Self {
        Self {
            data,
            workdir,
        }
    }

    fn get(
        &self,
        url: &str,
        accept: Option<&str>,
        auth: &Option<String>,
    ) -> Result<Response<Body>> {
        let mut req = SHARED_AGENT.get(url);
        if let Some(accept) = accept {
            req = req.header(ACCEPT, accept);
        }
        if let Some(auth) = auth {
            req = req.header(AUTHORIZATION, auth);
        }
        Ok(req.call()?)
    }

    /// GET with one retry after answering a bearer token challenge.
    fn get_authorized(
        &self,
        url: &str,
        accept: Option<&str>,
        auth: &mut Option<String>,
    ) -> Result<Response<Body>> {
        let resp = self.get(url, accept, auth)?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        let challenge = resp
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|h| h.to_str().ok())
            .and_then(parse_challenge);
        let Some(challenge) = challenge else {
            return Ok(resp);
        };

        *auth = Some(format!("Bearer {}", self.fetch_token(&challenge)?));
        self.get(url, accept, auth)
    }

    fn fetch_token(&self, challenge: &HashMap<String, String>) -> Result<String> {
        let realm = challenge
            .get("realm")
            .ok_or(DownloadError::InvalidResponse)?;
        let params: Vec<(&str, &str)> = ["service", "scope"]
            .iter()
            .filter_map(|key| challenge.get(*key).map(|v| (*key, v.as_str())))
            .collect();
        let url = Url::parse_with_params(realm, &params).map_err(|err| {
            DownloadError::InvalidUrl {
                url: realm.clone(),
                source: err,
            }
        })?;

        let basic = self
            .data
            .authorization()
            .filter(|auth| auth.starts_with("Basic "));
        let mut resp = self.get(url.as_str(), None, &basic)?;
        if !resp.status().is_success() {
            return Err(DownloadError::HttpError {
                status: resp.status().as_u16(),
                url: url.to_string(),
            });
        }

        let token: TokenResponse = resp
            .body_mut()
            .read_json()
            .map_err(|_| DownloadError::InvalidResponse)?;
        token
            .token
            .or(token.access_token)
            .ok_or(DownloadError::InvalidResponse)
    }

    fn fetch_manifest(
        &self,
        image: &ImageReference,
        reference: &str,
        auth: &mut Option<String>,
    ) -> Result<Manifest> {
        let url = image.manifest_url(reference);
        let mut resp = self.get_authorized(&url, Some(MANIFEST_ACCEPT), auth)?;
        if !resp.status().is_success() {
            return Err(DownloadError::HttpError {
                status: resp.status().as_u16(),
                url,
            });
        }
        resp.body_mut()
            .read_json()
            .map_err(|_| DownloadError::InvalidResponse)
    }

    fn download_blob(
        &self,
        image: &ImageReference,
        digest: &str,
        auth: &mut Option<String>,
    ) -> Result<PathBuf> {
        let url = image.blob_url(digest);
        let resp = self.get_authorized(&url, None, auth)?;
        if !resp.status().is_success() {
            return Err(DownloadError::HttpError {
                status: resp.status().as_u16(),
                url,
            });
        }

        let path = self.workdir.join(format!("{}.layer", digest.replace(':', "-")));
        let mut file =
            File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        io::copy(&mut resp.into_body().into_reader(), &mut file)
            .with_context(|| format!("downloading {url}"))?;
        Ok(path)
    }

    fn pull_file(&self, image: &ImageReference, name: &str) -> Result<PathBuf> {
        let mut auth = self.data.authorization();
        let mut manifest = self.fetch_manifest(image, &image.tag, &mut auth)?;

        if !manifest.manifests.is_empty() {
            let digest = select_platform(&manifest.manifests, oci_arch())
                .ok_or(DownloadError::InvalidResponse)?
                .to_string();
            debug!(image = %image, digest = %digest, "resolved image index");
            manifest = self.fetch_manifest(image, &digest, &mut auth)?;
        }
        trace!(
            image = %image,
            media_type = %manifest.media_type,
            layers = manifest.layers.len(),
            "fetched manifest"
        );

        let target = target_path(&self.workdir, name)?;
        // Upper layers shadow lower ones.
        for layer in manifest.layers.iter().rev() {
            let blob = self.download_blob(image, &layer.digest, &mut auth)?;
            let found = extract_from_layer(&blob, name, &target);
            safe_remove(&blob)?;
            if found? {
                return Ok(target);
            }
        }

        Err(DownloadError::LayerNotFound {
            reference: image.to_string(),
            file: name.to_string(),
        })
    }
}

impl Client for OciClient {
    fn download_file(&self, name: &str) -> Result<PathBuf> {
        target_path(&self.workdir, name)?;
        ensure_dir_exists(&self.workdir)?;
        let mut tried = Vec::new();

        for mirror in &self.data.urls {
            let image = ImageReference::parse(&format!("{mirror}:{name}"))?;
            match self.pull_file(&image, name) {
                Ok(path) => {
                    debug!(image = %image, path = %path.display(), "pulled repository file");
                    return Ok(path);
                }
                Err(err) => {
                    warn!(image = %image, error = %err, "registry mirror failed, trying next");
                    tried.push(format!("{image}: {err}"));
                }
            }
        }

        // Leftovers from failed pulls.
        if let Ok(entries) = fs::read_dir(&self.workdir) {
            for entry in entries.flatten() {
                if entry.path().extension().is_some_and(|ext| ext == "layer") {
                    let _ = safe_remove(entry.path());
                }
            }
        }

        Err(DownloadError::NotFound {
            file: name.to_string(),
            tried,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn test_parse_reference() {
        let r = ImageReference::parse("quay.io/keel/main:repository.json").unwrap();
        assert_eq!(r.registry, "quay.io");
        assert_eq!(r.repository, "keel/main");
        assert_eq!(r.tag, "repository.json");
        assert_eq!(r.api_base(), "https://quay.io/v2");

        let r = ImageReference::parse("localhost:5000/repo:tree.tar.gz").unwrap();
        assert_eq!(r.registry, "localhost:5000");
        assert_eq!(r.repository, "repo");
        assert_eq!(r.api_base(), "http://localhost:5000/v2");

        let r = ImageReference::parse("keel/main").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.tag, "latest");

        let r = ImageReference::parse("alpine:3.20").unwrap();
        assert_eq!(r.repository, "library/alpine");
        assert_eq!(r.to_string(), "docker.io/library/alpine:3.20");

        assert!(ImageReference::parse("").is_err());
        assert!(ImageReference::parse("repo:").is_err());
    }

    #[test]
    fn test_parse_challenge() {
        let params = parse_challenge(
            r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:keel/main:pull,push""#,
        )
        .unwrap();
        assert_eq!(params["realm"], "https://auth.docker.io/token");
        assert_eq!(params["service"], "registry.docker.io");
        assert_eq!(params["scope"], "repository:keel/main:pull,push");

        assert!(parse_challenge("Basic realm=\"x\"").is_none());
    }

    #[test]
    fn test_select_platform() {
        let manifests = vec![
            PlatformDescriptor {
                digest: "sha256:arm".into(),
                platform: Some(Platform {
                    os: "linux".into(),
                    architecture: "arm64".into(),
                }),
            },
            PlatformDescriptor {
                digest: "sha256:amd".into(),
                platform: Some(Platform {
                    os: "linux".into(),
                    architecture: "amd64".into(),
                }),
            },
        ];
        assert_eq!(select_platform(&manifests, "amd64"), Some("sha256:amd"));
        assert_eq!(select_platform(&manifests, "riscv64"), Some("sha256:arm"));
        assert_eq!(select_platform(&[], "amd64"), None);
    }

    fn layer(dir: &Path, gzip: bool) -> PathBuf {
        let content = dir.join("content");
        fs::create_dir_all(&content).unwrap();
        fs::write(content.join("repository.json"), "{\"revision\":4}").unwrap();

        let path = dir.join(if gzip { "layer.tar.gz" } else { "layer.tar" });
        let file = File::create(&path).unwrap();
        let writer: Box<dyn io::Write> = if gzip {
            Box::new(flate2::write::GzEncoder::new(file, flate2::Compression::default()))
        } else {
            Box::new(file)
        };
        let mut builder = tar::Builder::new(writer);
        builder.append_dir_all(".", &content).unwrap();
        builder.into_inner().unwrap().flush().unwrap();
        path
    }

    #[test]
    fn test_extract_from_layer() {
        for gzip in [false, true] {
            let dir = tempfile::tempdir().unwrap();
            let blob = layer(dir.path(), gzip);
            let target = dir.path().join("out.json");

            assert!(extract_from_layer(&blob, "repository.json", &target).unwrap());
            assert_eq!(fs::read_to_string(&target).unwrap(), "{\"revision\":4}");
            assert!(!extract_from_layer(&blob, "tree.tar.gz", &target).unwrap());
        }
    }
}
