use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{
    EventBus, EventHandler, EventKind, Host, HostContext, HostEvent, PinError, Subscription,
};

/// In-memory host counting the calls a frame makes.
pub struct FakeHost {
    pub context: Option<HostContext>,
    pub pin_result: Result<(), PinError>,
    pub pin_requests: AtomicUsize,
    pub ready_calls: AtomicUsize,
    pub bus: EventBus,
}

impl FakeHost {
    pub fn new(context: Option<HostContext>, pin_result: Result<(), PinError>) -> Arc<Self> {
        Arc::new(Self {
            context,
            pin_result,
            pin_requests: AtomicUsize::new(0),
            ready_calls: AtomicUsize::new(0),
            bus: EventBus::new(),
        })
    }

    /// A host where the frame is not added yet and pinning succeeds.
    pub fn not_added() -> Arc<Self> {
        Self::new(Some(HostContext::default()), Ok(()))
    }

    pub fn ready_calls(&self) -> usize {
        self.ready_calls.load(Ordering::SeqCst)
    }

    pub fn pin_requests(&self) -> usize {
        self.pin_requests.load(Ordering::SeqCst)
    }
}

impl Host for FakeHost {
    async fn context(&self) -> Option<HostContext> {
        self.context.clone()
    }

    async fn request_pin(&self) -> Result<(), PinError> {
        self.pin_requests.fetch_add(1, Ordering::SeqCst);
        if self.pin_result.is_ok() {
            self.bus.emit(&HostEvent::PinAdded {
                notifications: None,
            });
        }
        self.pin_result.clone()
    }

    async fn signal_ready(&self) {
        self.ready_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn on_event(&self, kind: EventKind, handler: EventHandler) -> Subscription {
        self.bus.subscribe(kind, handler)
    }
}
