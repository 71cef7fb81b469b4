use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

/// One-shot latch readable by any number of waiters.
///
/// Firing drops the only sender, which disconnects the channel; every current
/// and future `recv` on [`receiver`](Signal::receiver) then returns at once.
pub(crate) struct Signal {
    sender: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
}

impl Signal {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = bounded(0);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    /// Returns true only for the call that actually fired the latch.
    pub(crate) fn fire(&self) -> bool {
        self.sender.lock().take().is_some()
    }

    pub(crate) fn is_fired(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}

/// Fires the wrapped signal when dropped, including on unwind.
pub(crate) struct FireOnDrop<'a>(pub(crate) &'a Signal);

impl Drop for FireOnDrop<'_> {
    fn drop(&mut self) {
        self.0.fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_is_one_shot() {
        let signal = Signal::new();
        assert!(!signal.is_fired());
        assert!(signal.fire());
        assert!(!signal.fire());
        assert!(signal.is_fired());
        assert!(signal.receiver().recv().is_err());
    }

    #[test]
    fn test_guard_fires_on_drop() {
        let signal = Signal::new();
        {
            let _guard = FireOnDrop(&signal);
        }
        assert!(signal.is_fired());
    }
}
