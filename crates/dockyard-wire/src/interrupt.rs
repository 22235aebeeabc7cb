//! Waking a thread parked inside a blocking read.
//!
//! A reader blocked on a silent connection only returns when bytes arrive or
//! the connection goes away. Closing a stream from a supervising thread
//! therefore needs a way to make the pending read return. Whoever owns the
//! socket supplies that as an [`Interrupt`], typically by shutting the
//! socket down:
//!
//! ```
//! use std::net::{Shutdown, TcpStream};
//! use std::sync::Arc;
//! use dockyard_wire::Interrupt;
//!
//! fn interrupt_for(socket: &TcpStream) -> std::io::Result<Arc<dyn Interrupt>> {
//!     let handle = socket.try_clone()?;
//!     Ok(Arc::new(move || {
//!         if let Err(e) = handle.shutdown(Shutdown::Both) {
//!             tracing::debug!(error = %e, "socket already shut down");
//!         }
//!     }))
//! }
//! ```

use std::sync::Arc;

/// Makes pending and future reads on a physical stream return promptly.
///
/// Called while internal locks are held, so implementations must not block
/// and must tolerate being called more than once.
pub trait Interrupt: Send + Sync {
    /// Unblock the stream.
    fn interrupt(&self);
}

impl<F> Interrupt for F
where
    F: Fn() + Send + Sync,
{
    fn interrupt(&self) {
        self();
    }
}

/// Shared handle to an [`Interrupt`].
pub type InterruptHandle = Arc<dyn Interrupt>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_is_interrupt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle: InterruptHandle = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handle.interrupt();
        handle.interrupt();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
