mod event;
mod sink;

use std::sync::Arc;

pub use event::*;
pub use sink::*;

/// Shared handle to an event sink.
pub type EventSinkHandle = Arc<dyn EventSink>;

/// Handle to a sink that discards everything.
pub fn null_sink() -> EventSinkHandle {
    Arc::new(NullSink)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn snapshot(revision: u64) -> RepositorySnapshot {
        RepositorySnapshot {
            name: "main".into(),
            repo_type: "disk".into(),
            revision,
            ..Default::default()
        }
    }

    #[test]
    fn test_null_sink() {
        null_sink().emit(KeelEvent::SyncProgress {
            repo_name: "main".into(),
            stage: SyncStage::Fetching,
        });
    }

    #[test]
    fn test_channel_sink() {
        let (sink, rx) = ChannelSink::new();
        sink.emit(KeelEvent::SyncProgress {
            repo_name: "main".into(),
            stage: SyncStage::Fetching,
        });
        sink.emit(KeelEvent::SyncProgress {
            repo_name: "main".into(),
            stage: SyncStage::Complete {
                revision: 3,
                package_count: 12,
            },
        });

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            KeelEvent::SyncProgress {
                stage: SyncStage::Complete { revision: 3, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_channel_sink_receiver_dropped() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(KeelEvent::SyncProgress {
            repo_name: "orphaned".into(),
            stage: SyncStage::Unpacking,
        });
    }

    #[test]
    fn test_collector_sink() {
        let sink = CollectorSink::default();
        assert!(sink.is_empty());

        sink.emit(KeelEvent::RepositoryPreBuild {
            snapshot: snapshot(1),
            path: "/srv/repo".into(),
        });
        sink.emit(KeelEvent::RepositoryPostBuild {
            snapshot: snapshot(1),
            path: "/srv/repo".into(),
        });

        assert_eq!(sink.len(), 2);
        assert!(matches!(
            &sink.events()[0],
            KeelEvent::RepositoryPreBuild { snapshot, .. } if snapshot.revision == 1
        ));
    }

    #[test]
    fn test_fanout_sink_invokes_handlers_in_order() {
        let first = Arc::new(CollectorSink::default());
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();

        let fanout = FanoutSink::new()
            .with(first.clone())
            .with(Arc::new(FnSink(move |_: &KeelEvent| {
                seen.fetch_add(1, Ordering::SeqCst);
            })));

        let handle: EventSinkHandle = Arc::new(fanout);
        handle.emit(KeelEvent::SyncProgress {
            repo_name: "main".into(),
            stage: SyncStage::UpToDate,
        });

        assert_eq!(first.len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_sink_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NullSink>();
        assert_send_sync::<ChannelSink>();
        assert_send_sync::<CollectorSink>();
        assert_send_sync::<FanoutSink>();
    }
}
