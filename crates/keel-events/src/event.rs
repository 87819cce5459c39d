use std::collections::BTreeMap;

/// All event types emitted by keel operations.
#[derive(Debug, Clone)]
pub enum KeelEvent {
    /// A publish cycle is about to write bundles for a repository.
    RepositoryPreBuild {
        snapshot: RepositorySnapshot,
        /// Destination directory or spec image tag.
        path: String,
    },
    /// A publish cycle completed.
    RepositoryPostBuild {
        snapshot: RepositorySnapshot,
        /// Destination directory or image prefix.
        path: String,
    },
    /// Repository sync progress.
    SyncProgress { repo_name: String, stage: SyncStage },
}

/// Point-in-time view of a repository handed to build observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositorySnapshot {
    pub name: String,
    pub description: String,
    pub repo_type: String,
    pub urls: Vec<String>,
    pub priority: i32,
    pub revision: u64,
    pub last_update: String,
    /// Logical file key to published filename.
    pub files: BTreeMap<String, String>,
}

/// Repository sync stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStage {
    /// Fetching the remote spec document.
    Fetching,
    /// Cached revision and timestamp match the remote one.
    UpToDate,
    /// Downloading a bundle.
    Downloading { file: String },
    /// Verifying a bundle checksum.
    Verifying { file: String },
    /// Unpacking verified bundles into the cache.
    Unpacking,
    /// Sync complete.
    Complete {
        revision: u64,
        package_count: usize,
    },
}
