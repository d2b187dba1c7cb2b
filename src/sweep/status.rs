//! Angle set status and the transition function driving it.
//!
//! [`next_status`] is the only place transitions are decided; the angle set
//! gathers a [`PollSummary`] and applies the result.

use std::fmt;

/// Lifecycle of one angle set during one sweep.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AngleSetStatus {
    /// Work remains and nothing is known to be ready.
    NotFinished,
    /// Waiting on upstream messages or boundary data.
    Receiving,
    /// Ready tasks exist, boundaries are ready and the set is admitted.
    ReadyToExecute,
    /// Running the ready tasks.
    Execute,
    /// Outbound messages still in flight.
    MessagesPending,
    /// All posted sends completed.
    MessagesSent,
    /// Ready, but not admitted by the scheduler's throttle.
    NoExecIfReady,
    /// Every task executed and every message completed. Terminal.
    Finished,
}

impl fmt::Display for AngleSetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AngleSetStatus::NotFinished => "NOT_FINISHED",
            AngleSetStatus::Receiving => "RECEIVING",
            AngleSetStatus::ReadyToExecute => "READY_TO_EXECUTE",
            AngleSetStatus::Execute => "EXECUTE",
            AngleSetStatus::MessagesPending => "MESSAGES_PENDING",
            AngleSetStatus::MessagesSent => "MESSAGES_SENT",
            AngleSetStatus::NoExecIfReady => "NO_EXEC_IF_READY",
            AngleSetStatus::Finished => "FINISHED",
        };
        f.write_str(s)
    }
}

/// Observations an angle set makes before deciding its next status.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Every task has executed.
    pub all_tasks_done: bool,
    /// At least one unexecuted task has no unresolved dependency.
    pub ready_tasks: bool,
    /// Boundary data this set reads is available.
    pub boundaries_ready: bool,
    /// The scheduler admits this set for execution.
    pub admitted: bool,
    pub sends_outstanding: bool,
    pub receives_outstanding: bool,
}

/// Decide the status following `current` given `s`.
pub fn next_status(current: AngleSetStatus, s: &PollSummary) -> AngleSetStatus {
    use AngleSetStatus::*;

    let waiting = || {
        if s.all_tasks_done {
            if s.sends_outstanding { MessagesPending } else { Finished }
        } else if s.ready_tasks && s.boundaries_ready {
            if s.admitted { ReadyToExecute } else { NoExecIfReady }
        } else {
            Receiving
        }
    };

    match current {
        Finished => Finished,
        NotFinished | Receiving | NoExecIfReady => waiting(),
        ReadyToExecute => {
            if !s.all_tasks_done && s.ready_tasks && s.boundaries_ready && s.admitted {
                Execute
            } else {
                waiting()
            }
        }
        Execute => {
            if s.sends_outstanding {
                MessagesPending
            } else {
                MessagesSent
            }
        }
        MessagesPending => {
            if s.sends_outstanding {
                MessagesPending
            } else {
                MessagesSent
            }
        }
        MessagesSent => {
            if s.all_tasks_done && !s.sends_outstanding && !s.receives_outstanding {
                Finished
            } else {
                NotFinished
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AngleSetStatus::*;
    use super::*;

    fn ready(admitted: bool) -> PollSummary {
        PollSummary {
            ready_tasks: true,
            boundaries_ready: true,
            admitted,
            ..Default::default()
        }
    }

    #[test]
    fn finished_is_terminal() {
        assert_eq!(next_status(Finished, &ready(true)), Finished);
    }

    #[test]
    fn ready_path_reaches_execute() {
        assert_eq!(next_status(NotFinished, &ready(true)), ReadyToExecute);
        assert_eq!(next_status(ReadyToExecute, &ready(true)), Execute);
        assert_eq!(next_status(NotFinished, &ready(false)), NoExecIfReady);
        assert_eq!(next_status(ReadyToExecute, &ready(false)), NoExecIfReady);
    }

    #[test]
    fn boundary_wait_keeps_receiving() {
        let s = PollSummary {
            boundaries_ready: false,
            ..ready(true)
        };
        assert_eq!(next_status(NotFinished, &s), Receiving);
    }

    #[test]
    fn messages_drain_before_finish() {
        let pending = PollSummary {
            all_tasks_done: true,
            sends_outstanding: true,
            ..Default::default()
        };
        assert_eq!(next_status(Execute, &pending), MessagesPending);
        assert_eq!(next_status(MessagesPending, &pending), MessagesPending);
        let done = PollSummary {
            all_tasks_done: true,
            ..Default::default()
        };
        assert_eq!(next_status(MessagesPending, &done), MessagesSent);
        assert_eq!(next_status(MessagesSent, &done), Finished);
        assert_eq!(next_status(MessagesSent, &PollSummary::default()), NotFinished);
        assert_eq!(next_status(Receiving, &done), Finished);
    }
}
