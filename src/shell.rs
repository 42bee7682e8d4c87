use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::host::{EventKind, Host, HostContext, HostEvent, PinError, SafeAreaInsets, Subscription};

/// What the shell learned from the host, as shown around the quiz.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellView {
    pub context: Option<HostContext>,
    pub added: bool,
    pub pin_status: Option<String>,
    pub notifications_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A host answered; listeners are registered and ready was signalled.
    Attached,
    /// No host around, the frame runs on its own.
    Detached,
    AlreadyLoaded,
}

fn lock(view: &Mutex<ShellView>) -> MutexGuard<'_, ShellView> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Host integration around a quiz: context, pinning, events and readiness.
pub struct FrameShell<H: Host> {
    host: Arc<H>,
    view: Arc<Mutex<ShellView>>,
    subscriptions: Vec<Subscription>,
    loaded: bool,
    ready_signalled: bool,
}

impl<H: Host> FrameShell<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self {
            host,
            view: Arc::new(Mutex::new(ShellView::default())),
            subscriptions: Vec::new(),
            loaded: false,
            ready_signalled: false,
        }
    }

    pub async fn load(&mut self) -> LoadOutcome {
        if self.loaded {
            return LoadOutcome::AlreadyLoaded;
        }
        self.loaded = true;

        let Some(context) = self.host.context().await else {
            info!("No host context, running without host integration");
            return LoadOutcome::Detached;
        };

        let added = context.added;
        {
            let mut view = lock(&self.view);
            view.added = added;
            view.context = Some(context);
        }

        // listeners go first, the host may answer a pin request with an event
        for kind in EventKind::ALL {
            let view = self.view.clone();
            let subscription = self
                .host
                .on_event(kind, Box::new(move |event| apply_event(&view, event)));
            self.subscriptions.push(subscription);
        }

        // prompt for a pin when the frame isn't added yet
        if !added {
            // the outcome is kept as `pin_status`
            let _ = self.request_pin().await;
        }

        if !self.ready_signalled {
            info!("Signalling ready");
            self.host.signal_ready().await;
            self.ready_signalled = true;
        }

        LoadOutcome::Attached
    }

    /// Asks the host to pin the frame and records the outcome as a status line.
    pub async fn request_pin(&self) -> Result<(), PinError> {
        let result = self.host.request_pin().await;
        match &result {
            Ok(()) => {
                debug!("Pin request accepted");
                lock(&self.view).pin_status = None;
            }
            Err(err) => {
                warn!("Pin request failed: {}", err);
                lock(&self.view).pin_status = Some(err.to_string());
            }
        }
        result
    }

    pub fn view(&self) -> ShellView {
        lock(&self.view).clone()
    }

    pub fn is_ready(&self) -> bool {
        self.ready_signalled
    }

    /// Padding to keep clear of host chrome; zero when the host reports none.
    pub fn safe_area_insets(&self) -> SafeAreaInsets {
        lock(&self.view)
            .context
            .as_ref()
            .and_then(|c| c.safe_area_insets)
            .unwrap_or_default()
    }

    pub fn listener_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Unregisters every host listener.
    pub fn teardown(&mut self) {
        if self.listener_count() > 0 {
            debug!("Releasing {} host listener(s)", self.listener_count());
        }
        self.subscriptions.clear();
    }
}

impl<H: Host> Drop for FrameShell<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn apply_event(view: &Mutex<ShellView>, event: &HostEvent) {
    let mut view = lock(view);
    match event {
        HostEvent::PinAdded { notifications } => {
            info!("Frame added");
            view.added = true;
            view.pin_status = None;
            if notifications.is_some() {
                view.notifications_enabled = true;
            }
        }
        HostEvent::PinRejected { reason } => {
            info!("Frame add rejected: {}", reason);
        }
        HostEvent::Removed => {
            info!("Frame removed");
            view.added = false;
        }
        HostEvent::NotificationsEnabled { notifications } => {
            info!("Notifications enabled: {:?}", notifications);
            view.notifications_enabled = true;
        }
        HostEvent::NotificationsDisabled => {
            info!("Notifications disabled");
            view.notifications_enabled = false;
        }
        HostEvent::PrimaryActionInvoked => {
            info!("Primary action invoked");
        }
    }
}
