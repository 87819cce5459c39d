use std::{fs, path::Path, sync::Arc};

use keel_config::environment::Environment;
use keel_events::{EventSinkHandle, KeelEvent};
use keel_package::{ArtifactIndex, PackageArtifact, PackageDatabase, RecipeKind};
use keel_utils::{fs::copy_file, hash::BLAKE3, time::unix_timestamp};
use tracing::{debug, info};

use super::{collect_artifacts, RepositoryGenerator};
use crate::{
    backend::CompilerBackend,
    error::{ErrorContext, Result, StepContext},
    repository::{SystemRepository, COMPILER_TREE_KEY, META_KEY, REPOSITORY_SPEC_FILE, TREE_KEY},
};

const DIGEST_PREFIX_LEN: usize = 12;

/// Publishes repositories as container images: one image per bundle tagged
/// `<prefix>:<filename>`, plus `<prefix>:repository.json` for the spec.
pub struct ImageGenerator {
    env: Environment,
    events: EventSinkHandle,
    backend: Arc<dyn CompilerBackend>,
    image_prefix: String,
    push_images: bool,
    force: bool,
}

fn image_tag(prefix: &str, name: &str) -> String {
    format!("{prefix}:{name}")
}

/// Renames a freshly hashed bundle to `<stem>-<digest>.<ext>` and records the
/// new name. Identical content always maps to the same tag.
fn content_address(
    repo: &mut SystemRepository,
    key: &str,
    mut artifact: PackageArtifact,
) -> Result<PackageArtifact> {
    let Some(digest) = artifact.checksums.get(BLAKE3) else {
        return Ok(artifact);
    };
    let short = &digest[..DIGEST_PREFIX_LEN.min(digest.len())];

    let name = artifact.file_name();
    let addressed = match name.split_once('.') {
        Some((stem, ext)) => format!("{stem}-{short}.{ext}"),
        None => format!("{name}-{short}"),
    };

    let path = artifact.path.with_file_name(&addressed);
    fs::rename(&artifact.path, &path)
        .with_context(|| format!("renaming {} to {addressed}", artifact.path.display()))?;
    artifact.path = path;

    let mut file = repo.repository_file(key)?.clone();
    file.file_name = addressed;
    repo.set_repository_file(key, file);
    Ok(artifact)
}

impl ImageGenerator {
    pub fn new(
        env: Environment,
        events: EventSinkHandle,
        backend: Arc<dyn CompilerBackend>,
        image_prefix: &str,
        push_images: bool,
        force: bool,
    ) -> Self {
        Self {
            env,
            events,
            backend,
            image_prefix: image_prefix.to_string(),
            push_images,
            force,
        }
    }

    fn build_and_push(&self, image: &str, context: &Path) -> Result<()> {
        debug!(image, "building image");
        self.backend
            .build_image(image, context)
            .step(|| format!("building image {image}"))?;
        if self.push_images {
            self.backend
                .push(image)
                .step(|| format!("pushing image {image}"))?;
        }
        Ok(())
    }

    /// Publishes a bundle unless an image with its (content-addressed) tag
    /// already exists.
    fn push_bundle(&self, prefix: &str, artifact: &PackageArtifact) -> Result<()> {
        let name = artifact.file_name();
        let image = image_tag(prefix, &name);
        if self.backend.image_available(&image) && !self.force {
            info!("Image {image} already present, skipping");
            return Ok(());
        }

        let context = self.env.temp_dir("bundle")?;
        copy_file(&artifact.path, context.path().join(&name))?;
        self.build_and_push(&image, context.path())
    }
}

impl RepositoryGenerator for ImageGenerator {
    fn initialize(&self, source: &Path, db: &dyn PackageDatabase) -> Result<ArtifactIndex> {
        let mut index = ArtifactIndex::new();

        for artifact in collect_artifacts(source, db)? {
            let image = image_tag(&self.image_prefix, &artifact.package.image_id());
            if self.backend.image_available(&image) && !self.force {
                info!("Image {image} already present, skipping. Use --force-push to override");
            } else {
                let rootfs = self.env.temp_dir("rootfs")?;
                artifact
                    .unpack(rootfs.path())
                    .step(|| format!("unpacking {}", artifact.path.display()))?;
                self.build_and_push(&image, rootfs.path())?;
            }
            index.push(artifact);
        }

        Ok(index)
    }

    fn generate(
        &self,
        repo: &mut SystemRepository,
        destination: &str,
        reset_revision: bool,
    ) -> Result<()> {
        let prefix = destination;
        let spec_image = image_tag(prefix, REPOSITORY_SPEC_FILE);
        repo.last_update = unix_timestamp();

        let previous = self.env.temp_dir("repo")?;
        if self.backend.image_available(&spec_image) {
            self.backend
                .download_image(&spec_image)
                .step(|| format!("downloading {spec_image}"))?;
            self.backend
                .extract_rootfs(&spec_image, previous.path())
                .step(|| format!("extracting {spec_image}"))?;
        }
        repo.bump_revision(previous.path().join(REPOSITORY_SPEC_FILE), reset_revision)?;

        info!(
            "For repository {} creating revision {} and last update {}",
            repo.name, repo.revision, repo.last_update
        );

        self.events.emit(KeelEvent::RepositoryPreBuild {
            snapshot: repo.snapshot(),
            path: spec_image.clone(),
        });

        let bundles = self.env.temp_dir("bundles")?;
        for (kind, key) in [
            (RecipeKind::Installer, TREE_KEY),
            (RecipeKind::Compiler, COMPILER_TREE_KEY),
        ] {
            let artifact = repo
                .add_tree(&self.env, kind, bundles.path())
                .step(|| format!("adding the {key} bundle"))?;
            let artifact = content_address(repo, key, artifact)?;
            self.push_bundle(prefix, &artifact)
                .step(|| format!("publishing the {key} bundle"))?;
        }

        let artifact = repo
            .add_metadata_file(&self.env, bundles.path())
            .step(|| "adding the repository metadata".to_string())?;
        let artifact = content_address(repo, META_KEY, artifact)?;
        self.push_bundle(prefix, &artifact)
            .step(|| "publishing the repository metadata".to_string())?;

        let spec_dir = self.env.temp_dir("spec")?;
        repo.write_spec_file(spec_dir.path().join(REPOSITORY_SPEC_FILE))?;
        self.build_and_push(&spec_image, spec_dir.path())
            .step(|| "publishing the repository spec".to_string())?;

        self.events.emit(KeelEvent::RepositoryPostBuild {
            snapshot: repo.snapshot(),
            path: prefix.to_string(),
        });
        Ok(())
    }
}
