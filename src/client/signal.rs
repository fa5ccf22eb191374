// ABOUTME: Single-slot completion signal bridging the modem's send-status notification into the submit loop
// ABOUTME: Arming enforces one submission in flight per session; the handler writes, the poll loop reads

use crate::client::error::{GsmError, GsmResult};
use crate::datatypes::DeviceErrorCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, warn};

/// State of the submission currently in flight
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SubmissionOutcome {
    /// No notification yet
    #[default]
    Pending,
    /// The network accepted the message and assigned `reference`
    Success { reference: u8 },
    /// The device reported a failure
    Failed(DeviceErrorCode),
}

/// Send status as delivered by the device after PDU input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendStatus {
    /// `+CMGS: <mr>`
    Accepted { reference: u8 },
    /// `+CMS ERROR`, `+CME ERROR` or a bare `ERROR`
    Rejected(DeviceErrorCode),
}

impl SendStatus {
    /// Numeric form of the status, 0 for success.
    pub fn code(&self) -> u16 {
        match self {
            SendStatus::Accepted { .. } => 0,
            SendStatus::Rejected(error) => error.code().unwrap_or(500),
        }
    }
}

impl From<SendStatus> for SubmissionOutcome {
    fn from(status: SendStatus) -> Self {
        match status {
            SendStatus::Accepted { reference } => SubmissionOutcome::Success { reference },
            SendStatus::Rejected(error) => SubmissionOutcome::Failed(error),
        }
    }
}

#[derive(Debug)]
struct Slot {
    outcome: watch::Sender<SubmissionOutcome>,
    armed: AtomicBool,
}

/// Per-session completion signal.
///
/// Holds the latest `SubmissionOutcome`. There is no queue: a second
/// notification overwrites the first. `arm` hands out a guard that is the
/// only way to start a submission, so two submissions can never share the
/// slot.
#[derive(Clone, Debug)]
pub struct CompletionSignal {
    slot: Arc<Slot>,
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (outcome, _) = watch::channel(SubmissionOutcome::Pending);
        CompletionSignal {
            slot: Arc::new(Slot {
                outcome,
                armed: AtomicBool::new(false),
            }),
        }
    }

    /// Resets the slot to `Pending` and claims it for one submission.
    pub fn arm(&self) -> GsmResult<SubmissionGuard> {
        if self
            .slot
            .armed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(GsmError::SubmissionInFlight);
        }

        self.slot.outcome.send_replace(SubmissionOutcome::Pending);
        Ok(SubmissionGuard {
            slot: Arc::clone(&self.slot),
            outcome: self.slot.outcome.subscribe(),
        })
    }

    pub fn is_armed(&self) -> bool {
        self.slot.armed.load(Ordering::Acquire)
    }

    /// Last recorded outcome.
    pub fn outcome(&self) -> SubmissionOutcome {
        *self.slot.outcome.borrow()
    }

    /// Handler to register on the device connection.
    pub fn handler(&self) -> SendStatusHandler {
        SendStatusHandler {
            slot: Arc::clone(&self.slot),
        }
    }
}

/// Claim on the completion slot for the duration of one submission.
///
/// Dropping it releases the slot, whichever way the submission ended.
#[derive(Debug)]
pub struct SubmissionGuard {
    slot: Arc<Slot>,
    outcome: watch::Receiver<SubmissionOutcome>,
}

impl SubmissionGuard {
    pub fn outcome(&self) -> SubmissionOutcome {
        *self.outcome.borrow()
    }
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        self.slot.armed.store(false, Ordering::Release);
    }
}

/// Writer side of the completion signal, invoked by the connection when the
/// reply to submitted PDU input arrives.
#[derive(Clone, Debug)]
pub struct SendStatusHandler {
    slot: Arc<Slot>,
}

impl SendStatusHandler {
    pub fn on_send_status(&self, status: SendStatus) {
        if !self.slot.armed.load(Ordering::Acquire) {
            warn!(code = status.code(), "dropping send status with no submission in flight");
            return;
        }

        debug!(code = status.code(), "send status received");
        self.slot.outcome.send_replace(status.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_zero_is_success() {
        assert_eq!(SendStatus::Accepted { reference: 9 }.code(), 0);
        assert_eq!(SendStatus::Rejected(DeviceErrorCode::Cms(38)).code(), 38);
        assert_eq!(SendStatus::Rejected(DeviceErrorCode::Unspecified).code(), 500);
    }

    #[test]
    fn arming_resets_stale_outcome() {
        let signal = CompletionSignal::new();
        let handler = signal.handler();

        let guard = signal.arm().unwrap();
        handler.on_send_status(SendStatus::Accepted { reference: 1 });
        assert_eq!(guard.outcome(), SubmissionOutcome::Success { reference: 1 });
        drop(guard);

        let guard = signal.arm().unwrap();
        assert_eq!(guard.outcome(), SubmissionOutcome::Pending);
    }

    #[test]
    fn second_arm_is_rejected_until_guard_drops() {
        let signal = CompletionSignal::new();
        let guard = signal.arm().unwrap();

        assert!(matches!(signal.arm(), Err(GsmError::SubmissionInFlight)));
        assert!(signal.is_armed());

        drop(guard);
        assert!(!signal.is_armed());
        assert!(signal.arm().is_ok());
    }

    #[test]
    fn notification_without_submission_is_dropped() {
        let signal = CompletionSignal::new();
        signal
            .handler()
            .on_send_status(SendStatus::Rejected(DeviceErrorCode::Cms(38)));
        assert_eq!(signal.outcome(), SubmissionOutcome::Pending);
    }

    #[test]
    fn later_notification_overwrites_earlier() {
        let signal = CompletionSignal::new();
        let handler = signal.handler();
        let guard = signal.arm().unwrap();

        handler.on_send_status(SendStatus::Rejected(DeviceErrorCode::Cms(38)));
        handler.on_send_status(SendStatus::Accepted { reference: 4 });
        assert_eq!(guard.outcome(), SubmissionOutcome::Success { reference: 4 });
    }

    #[tokio::test]
    async fn guard_sees_notification_from_another_task() {
        let signal = CompletionSignal::new();
        let handler = signal.handler();
        let guard = signal.arm().unwrap();

        tokio::spawn(async move {
            handler.on_send_status(SendStatus::Accepted { reference: 2 });
        })
        .await
        .unwrap();

        assert_eq!(guard.outcome(), SubmissionOutcome::Success { reference: 2 });
    }
}
