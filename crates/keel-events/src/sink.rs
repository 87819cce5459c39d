use std::sync::{
    mpsc::{self, Receiver, Sender},
    Arc, Mutex, PoisonError,
};

use crate::{EventSinkHandle, KeelEvent};

/// Consumer of events emitted by keel operations.
///
/// Sinks are invoked synchronously on the emitting thread.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: KeelEvent);
}

/// No-op event sink for headless operation.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: KeelEvent) {}
}

/// Forwards events into an mpsc channel for asynchronous consumers.
pub struct ChannelSink {
    sender: Sender<KeelEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<KeelEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender,
            },
            receiver,
        )
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: KeelEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.sender.send(event);
    }
}

/// Stores every event; mostly useful in tests.
#[derive(Default)]
pub struct CollectorSink {
    events: Mutex<Vec<KeelEvent>>,
}

impl CollectorSink {
    pub fn events(&self) -> Vec<KeelEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for CollectorSink {
    fn emit(&self, event: KeelEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: Fn(&KeelEvent) + Send + Sync,
{
    fn emit(&self, event: KeelEvent) {
        (self.0)(&event)
    }
}

/// Delivers each event to every registered handler, in registration order.
#[derive(Default)]
pub struct FanoutSink {
    handlers: Mutex<Vec<EventSinkHandle>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: EventSinkHandle) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    pub fn with(self, handler: EventSinkHandle) -> Self {
        self.register(handler);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: KeelEvent) {
        let handlers: Vec<Arc<dyn EventSink>> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for handler in handlers {
            handler.emit(event.clone());
        }
    }
}
