use std::{sync::mpsc::Receiver, thread::JoinHandle};

use keel_events::{KeelEvent, SyncStage};
use nu_ansi_term::Color::{Cyan, Magenta};
use tracing::{debug, info};

use crate::utils::Colored;

/// Handle to the event handler thread.
///
/// The context holding the channel sender must be dropped before calling
/// [`finish`](EventGuard::finish), otherwise the thread waits forever.
pub struct EventGuard {
    handle: Option<JoinHandle<()>>,
}

impl EventGuard {
    pub fn finish(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

fn describe(repo_name: &str, stage: &SyncStage) -> Option<String> {
    let repo = Colored(Magenta, repo_name);
    match stage {
        SyncStage::Fetching => Some(format!("[{repo}] Fetching repository spec")),
        SyncStage::Downloading {
            file,
        } => Some(format!("[{repo}] Downloading {}", Colored(Cyan, file))),
        SyncStage::Verifying {
            file,
        } => Some(format!("[{repo}] Verifying {file}")),
        SyncStage::Unpacking => Some(format!("[{repo}] Unpacking bundles")),
        SyncStage::UpToDate => None,
        SyncStage::Complete {
            revision,
            package_count,
        } => {
            Some(format!(
                "[{repo}] Revision {revision}, {package_count} packages"
            ))
        }
    }
}

pub fn spawn_event_handler(receiver: Receiver<KeelEvent>) -> EventGuard {
    let handle = std::thread::spawn(move || {
        while let Ok(event) = receiver.recv() {
            match event {
                KeelEvent::SyncProgress {
                    repo_name,
                    stage,
                } => {
                    if let Some(message) = describe(&repo_name, &stage) {
                        debug!("{message}");
                    }
                }
                KeelEvent::RepositoryPreBuild {
                    snapshot,
                    path,
                } => {
                    info!(
                        "[{}] Publishing revision {} to {}",
                        Colored(Magenta, &snapshot.name),
                        snapshot.revision,
                        path
                    );
                }
                KeelEvent::RepositoryPostBuild {
                    snapshot,
                    path,
                } => {
                    for (key, file) in &snapshot.files {
                        debug!("[{}] {key}: {file}", snapshot.name);
                    }
                    info!(
                        "[{}] Published revision {} to {}",
                        Colored(Magenta, &snapshot.name),
                        snapshot.revision,
                        path
                    );
                }
            }
        }
    });

    EventGuard {
        handle: Some(handle),
    }
}
