use std::time::Duration;

use crate::light::transition_time;

/// What a running job pulses: the hue and the dim/bright interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseJob {
    pub hue: u16,
    pub pulse_time: Duration,
}

impl PulseJob {
    pub fn new(hue: u16, pulse_time: Duration) -> Self {
        Self { hue, pulse_time }
    }

    /// Transition time sent with every dim/bright call, in deciseconds.
    pub fn transition_time(&self) -> u16 {
        transition_time(self.pulse_time)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PulseState {
    #[default]
    Idle,
    Running(PulseJob),
}

impl PulseState {
    pub fn is_running(&self) -> bool {
        matches!(self, PulseState::Running(_))
    }
}

// ----------------------------------------------------------------------------
// INTENT - Commands sent by the trigger server
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseIntent {
    Start(PulseJob),
    /// End the job (if any) and flash `hue`.
    Halt { hue: u16 },
}

// ----------------------------------------------------------------------------
// EVENTS - Things that happened (past tense)
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseEvent {
    JobStarted(PulseJob),
    StartIgnored { running: PulseJob },
    JobHalted { hue: u16, was_running: bool },
}

// ----------------------------------------------------------------------------
// STATE MACHINE - Pure function: (State, Intent) -> (State, Vec<Event>)
// ----------------------------------------------------------------------------

pub struct PulseStateMachine;

impl PulseStateMachine {
    pub fn transition(state: PulseState, intent: PulseIntent) -> (PulseState, Vec<PulseEvent>) {
        match (state, intent) {
            (PulseState::Idle, PulseIntent::Start(job)) => {
                (PulseState::Running(job), vec![PulseEvent::JobStarted(job)])
            }
            (PulseState::Running(running), PulseIntent::Start(_)) => {
                (state, vec![PulseEvent::StartIgnored { running }])
            }
            // Halting never checks whether a job exists; the terminal colour is always shown.
            (state, PulseIntent::Halt { hue }) => (
                PulseState::Idle,
                vec![PulseEvent::JobHalted {
                    hue,
                    was_running: state.is_running(),
                }],
            ),
        }
    }
}
