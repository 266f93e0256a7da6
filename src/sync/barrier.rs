use crate::errors::{SyncErrorType, SyncResult};
use crate::exec::completion::{Completion, Promise};

use log::*;
use parking_lot::Mutex;

use std::fmt;
use std::mem;

struct Phase {
    number: u64,
    remaining: usize,
    promise: Promise<u64>,
    completion: Completion<u64>,
}

impl Phase {
    fn new(number: u64, participants: usize) -> Self {
        let (promise, completion) = Promise::new();
        Self {
            number,
            remaining: participants,
            promise,
            completion,
        }
    }
}

///
/// Reusable barrier for a fixed number of participants.
///
/// Every participant calls [AsyncBarrier::signal_and_wait] once per phase and gets a
/// completion which resolves, for all of them at once, with the number of the phase
/// when its last participant signals. The next phase starts right away.
pub struct AsyncBarrier {
    participants: usize,
    phase: Mutex<Phase>,
}

impl AsyncBarrier {
    pub fn new(participants: usize) -> SyncResult<Self> {
        if participants == 0 {
            return Err(SyncErrorType::InvalidArgument(
                "barrier needs at least one participant".into(),
            ));
        }

        Ok(Self {
            participants,
            phase: Mutex::new(Phase::new(0, participants)),
        })
    }

    ///
    /// Signal arrival in the current phase and get a handle for its completion.
    ///
    /// Signals beyond the participant count of a phase count toward the following phase.
    pub fn signal_and_wait(&self) -> Completion<u64> {
        let mut phase = self.phase.lock();
        let completion = phase.completion.clone();

        phase.remaining -= 1;
        if phase.remaining == 0 {
            let next = Phase::new(phase.number + 1, self.participants);
            let finished = mem::replace(&mut *phase, next);
            drop(phase);

            trace!("barrier phase {} completed", finished.number);
            let _ = finished.promise.fulfil(finished.number);
        }

        completion
    }

    pub fn participant_count(&self) -> usize {
        self.participants
    }

    ///
    /// Participants still expected in the current phase.
    pub fn remaining_count(&self) -> usize {
        self.phase.lock().remaining
    }

    pub fn current_phase(&self) -> u64 {
        self.phase.lock().number
    }
}

impl fmt::Debug for AsyncBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = self.phase.lock();
        f.debug_struct("AsyncBarrier")
            .field("participants", &self.participants)
            .field("phase", &phase.number)
            .field("remaining", &phase.remaining)
            .finish()
    }
}
