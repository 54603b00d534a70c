use std::sync::atomic::{AtomicU32, Ordering};

use futures::task;

/// The credit we granted to the peer: data received consumes it,
/// and it is replenished with `SSH_MSG_CHANNEL_WINDOW_ADJUST`
/// once it falls below half the initial grant.
pub(crate) struct LocalWindow {
    inner: AtomicU32,
    initial: u32,
    threshold: u32,
}

impl LocalWindow {
    pub fn new(initial: u32) -> Self {
        Self {
            inner: initial.into(),
            initial,
            threshold: initial / 2,
        }
    }

    /// The credit to hand back to the peer, when the window ran
    /// low enough to warrant an adjustment.
    pub fn adjustable(&self) -> Option<u32> {
        let previous = self
            .inner
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |window| {
                (window <= self.threshold).then_some(self.initial)
            })
            .ok();

        previous.map(|previous| self.initial - previous)
    }

    /// Account for received data, reporting the excess when the
    /// peer overran the window we granted.
    pub fn consume(&self, size: u32) -> Result<(), u32> {
        let previous = self.inner.fetch_sub(size, Ordering::SeqCst);

        if size > previous {
            Err(size - previous)
        } else {
            Ok(())
        }
    }
}

/// The credit the peer granted us, reserved before sending data
/// and replenished by the peer's window adjustments.
pub(crate) struct RemoteWindow {
    inner: AtomicU32,
    waker: task::AtomicWaker,
}

impl RemoteWindow {
    pub fn replenish(&self, bytes_to_add: u32) {
        self.inner.fetch_add(bytes_to_add, Ordering::SeqCst);
        self.waker.wake();
    }

    fn try_reserve(&self, mut amount: u32) -> Option<u32> {
        let reserved = self
            .inner
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |window| {
                if amount <= window {
                    Some(window - amount)
                } else {
                    amount = window;

                    (amount > 0).then_some(0)
                }
            })
            .is_ok();

        reserved.then_some(amount)
    }

    /// Reserve up to `amount` bytes of credit, suspending until the
    /// peer extends the window when it is exhausted.
    pub fn poll_reserve(&self, cx: &mut task::Context, amount: u32) -> task::Poll<u32> {
        if let Some(size) = self.try_reserve(amount) {
            task::Poll::Ready(size)
        } else {
            tracing::debug!("Peer channel window is exhausted, awaiting an extension");

            self.waker.register(cx.waker());

            // Re-check after registration, the window may have been
            // replenished in between.
            match self.try_reserve(amount) {
                Some(size) => task::Poll::Ready(size),
                None => task::Poll::Pending,
            }
        }
    }
}

impl From<u32> for RemoteWindow {
    fn from(value: u32) -> Self {
        Self {
            inner: value.into(),
            waker: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_reports_window_overruns() {
        let window = LocalWindow::new(16);

        window.consume(16).expect("within the grant");
        window.consume(1).expect_err("one byte past the grant");
    }

    #[test]
    fn it_adjusts_once_half_consumed() {
        let window = LocalWindow::new(16);

        window.consume(4).unwrap();
        assert_eq!(window.adjustable(), None);

        window.consume(8).unwrap();
        assert_eq!(window.adjustable(), Some(12));
        assert_eq!(window.adjustable(), None);
    }

    #[test]
    fn it_reserves_no_more_than_the_remote_grant() {
        let window = RemoteWindow::from(8);

        assert_eq!(window.try_reserve(6), Some(6));
        assert_eq!(window.try_reserve(6), Some(2));
        assert_eq!(window.try_reserve(6), None);

        window.replenish(6);
        assert_eq!(window.try_reserve(6), Some(6));
    }
}
