//! Mutually exclusive access to the input device
//!
//! The interpreter's input builtins and the interrupt scanner both drive
//! the same mouse and keyboard. Every device action goes through an
//! [`InputSession`], and only one session exists at a time.

use crate::capability::InputController;
use parking_lot::{Mutex, MutexGuard};
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Single funnel for device input
pub struct InputGate {
    device: Arc<dyn InputController>,
    lock: Mutex<()>,
}

impl InputGate {
    pub fn new(device: Arc<dyn InputController>) -> Self {
        Self {
            device,
            lock: Mutex::new(()),
        }
    }

    /// Block until the device is free and hold it for the session's lifetime
    pub fn acquire(&self) -> InputSession<'_> {
        let guard = self.lock.lock();
        trace!("Input gate acquired");
        InputSession {
            _guard: guard,
            device: self.device.as_ref(),
        }
    }

    /// Like [`acquire`](Self::acquire) but gives up after `timeout`
    pub fn try_acquire_for(&self, timeout: Duration) -> Option<InputSession<'_>> {
        let guard = self.lock.try_lock_for(timeout)?;
        Some(InputSession {
            _guard: guard,
            device: self.device.as_ref(),
        })
    }

    /// Whether some actor currently holds the device
    pub fn is_busy(&self) -> bool {
        self.lock.is_locked()
    }
}

impl std::fmt::Debug for InputGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputGate")
            .field("busy", &self.is_busy())
            .finish()
    }
}

/// Exclusive handle on the input device; released on drop
pub struct InputSession<'a> {
    _guard: MutexGuard<'a, ()>,
    device: &'a dyn InputController,
}

impl<'a> Deref for InputSession<'a> {
    type Target = dyn InputController + 'a;

    fn deref(&self) -> &Self::Target {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InputAction, RecordingInput};
    use crate::MouseButton;

    #[test]
    fn test_session_forwards_to_device() {
        let device = Arc::new(RecordingInput::new());
        let gate = InputGate::new(device.clone());

        {
            let session = gate.acquire();
            assert!(gate.is_busy());
            session.click(10, 20, MouseButton::Left, 1).unwrap();
        }

        assert!(!gate.is_busy());
        assert_eq!(
            device.actions(),
            vec![InputAction::Click {
                x: 10,
                y: 20,
                button: MouseButton::Left,
                count: 1
            }]
        );
    }

    #[test]
    fn test_try_acquire_times_out_while_held() {
        let gate = InputGate::new(Arc::new(RecordingInput::new()));
        let _held = gate.acquire();
        assert!(gate.try_acquire_for(Duration::from_millis(10)).is_none());
    }
}
