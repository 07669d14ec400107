use std::sync::Arc;
use tokio::sync::watch;

/// Owner side of a cancellation signal shared by every task of a service.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Cheap-to-clone listener; resolves once the trigger fires or is dropped.
#[derive(Clone, Debug)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
    // keeps the sender of a `never` listener alive
    _owner: Option<Arc<watch::Sender<bool>>>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx, _owner: None })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
            _owner: None,
        }
    }
}

impl Shutdown {
    /// A listener that never fires.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _owner: Some(Arc::new(tx)),
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // an error means the trigger was dropped, which also ends the service
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}
