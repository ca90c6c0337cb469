use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, warn};

use super::state::{PulseEvent, PulseIntent, PulseJob, PulseState, PulseStateMachine};
use crate::light::LightController;

/// Owns the job state and drives the light. The only place the state is mutated.
pub struct PulseActor {
    state: PulseState,
    light: LightController,
    /// Delay before the terminal colour, and again before the default restore.
    halt_delay: Duration,
    intent_rx: mpsc::UnboundedReceiver<PulseIntent>,
}

/// Cloneable sender side used by the trigger server.
#[derive(Debug, Clone)]
pub struct PulseHandle {
    intent_tx: mpsc::UnboundedSender<PulseIntent>,
}

impl PulseHandle {
    pub fn start(&self, job: PulseJob) {
        self.send(PulseIntent::Start(job));
    }

    pub fn halt(&self, hue: u16) {
        self.send(PulseIntent::Halt { hue });
    }

    fn send(&self, intent: PulseIntent) {
        if self.intent_tx.send(intent).is_err() {
            error!("Pulse worker is gone, dropping {:?}", intent);
        }
    }
}

impl PulseActor {
    pub fn new(light: LightController, halt_delay: Duration) -> (Self, PulseHandle) {
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();

        let actor = Self {
            state: PulseState::default(),
            light,
            halt_delay,
            intent_rx,
        };

        (actor, PulseHandle { intent_tx })
    }

    /// Run until every [`PulseHandle`] is dropped.
    ///
    /// Commands are only observed between pulse cycles, so a halt never cuts a
    /// cycle short.
    pub async fn run(mut self) {
        loop {
            match self.state {
                PulseState::Idle => match self.intent_rx.recv().await {
                    Some(intent) => self.process_intent(intent),
                    None => break,
                },
                PulseState::Running(_) => {
                    if !self.drain_pending() {
                        break;
                    }
                    if let PulseState::Running(job) = self.state {
                        self.pulse(job).await;
                    }
                }
            }
        }
        debug!("Pulse worker stopped, command channel closed");
    }

    /// Apply every queued command. Returns false once the channel is closed.
    fn drain_pending(&mut self) -> bool {
        loop {
            match self.intent_rx.try_recv() {
                Ok(intent) => self.process_intent(intent),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn process_intent(&mut self, intent: PulseIntent) {
        let (new_state, events) = PulseStateMachine::transition(self.state, intent);
        self.state = new_state;

        for event in events {
            self.handle_side_effect(event);
        }
    }

    fn handle_side_effect(&self, event: PulseEvent) {
        match event {
            PulseEvent::JobStarted(job) => {
                info!(
                    hue = job.hue,
                    pulse_ms = job.pulse_time.as_millis() as u64,
                    "Initiating job"
                );
            }
            PulseEvent::StartIgnored { running } => {
                debug!(hue = running.hue, "Job already running, start ignored");
            }
            PulseEvent::JobHalted { hue, was_running } => {
                info!(hue, was_running, "Halting job");
                self.spawn_halt_sequence(hue);
            }
        }
    }

    /// One dim -> wait -> bright -> wait cycle.
    async fn pulse(&self, job: PulseJob) {
        let transition = job.transition_time();

        if let Err(err) = self.light.dim(job.hue, transition).await {
            warn!("Failed to dim light: {}", err);
        }
        tokio::time::sleep(job.pulse_time).await;

        if let Err(err) = self.light.bright(job.hue, transition).await {
            warn!("Failed to brighten light: {}", err);
        }
        tokio::time::sleep(job.pulse_time).await;
    }

    /// Terminal colour after one interval, default state after another.
    ///
    /// Runs detached so the worker is free for the next command straight away.
    /// Not cancellable: a job started in the meantime can still be overwritten
    /// by either call.
    fn spawn_halt_sequence(&self, hue: u16) {
        let light = self.light.clone();
        let delay = self.halt_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = light.terminal(hue).await {
                warn!("Failed to set terminal colour {}: {}", hue, err);
            }

            tokio::time::sleep(delay).await;
            if let Err(err) = light.restore_default().await {
                warn!("Failed to restore default light state: {}", err);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PulseError, Result};
    use crate::light::{Lamp, LightState};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    const PULSE: Duration = Duration::from_millis(1000);
    const BRI_LO: u8 = 20;
    const BRI_HI: u8 = 254;

    #[derive(Default)]
    struct RecordingLamp {
        started: Mutex<Option<Instant>>,
        calls: Mutex<Vec<(u64, LightState)>>,
        fail: bool,
    }

    impl RecordingLamp {
        fn calls(&self) -> Vec<(u64, LightState)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Lamp for RecordingLamp {
        async fn set_state(&self, state: &LightState) -> Result<()> {
            let started = *self.started.lock().unwrap().get_or_insert_with(Instant::now);
            let at = started.elapsed().as_millis() as u64;
            self.calls.lock().unwrap().push((at, state.clone()));

            if self.fail {
                Err(PulseError::BridgeRejected("device is set to off".into()))
            } else {
                Ok(())
            }
        }
    }

    fn default_state() -> LightState {
        LightState {
            on: Some(true),
            hue: Some(8402),
            bri: Some(200),
            sat: Some(140),
            transitiontime: None,
        }
    }

    fn spawn_worker(lamp: Arc<RecordingLamp>) -> PulseHandle {
        *lamp.started.lock().unwrap() = Some(Instant::now());
        let light = LightController::new(lamp, BRI_LO, BRI_HI, default_state());
        let (actor, handle) = PulseActor::new(light, PULSE);
        tokio::spawn(actor.run());
        handle
    }

    fn dim(hue: u16, transitiontime: u16) -> LightState {
        LightState {
            on: Some(true),
            hue: Some(hue),
            bri: Some(BRI_LO),
            sat: None,
            transitiontime: Some(transitiontime),
        }
    }

    fn bright(hue: u16, transitiontime: u16) -> LightState {
        LightState {
            bri: Some(BRI_HI),
            ..dim(hue, transitiontime)
        }
    }

    fn terminal(hue: u16) -> LightState {
        LightState {
            on: Some(true),
            hue: Some(hue),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_halt_waits_for_cycle_then_flashes_and_restores() {
        let lamp = Arc::new(RecordingLamp::default());
        let handle = spawn_worker(lamp.clone());

        handle.start(PulseJob::new(100, PULSE));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.halt(25500);
        tokio::time::sleep(Duration::from_millis(5000)).await;

        assert_eq!(
            lamp.calls(),
            vec![
                (0, dim(100, 10)),
                (1000, bright(100, 10)),
                (3000, terminal(25500)),
                (4000, default_state()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_starts_keep_a_single_loop() {
        let lamp = Arc::new(RecordingLamp::default());
        let handle = spawn_worker(lamp.clone());

        handle.start(PulseJob::new(100, PULSE));
        handle.start(PulseJob::new(100, PULSE));
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.start(PulseJob::new(46920, Duration::from_millis(500)));
        tokio::time::sleep(Duration::from_millis(3400)).await;

        assert_eq!(
            lamp.calls(),
            vec![
                (0, dim(100, 10)),
                (1000, bright(100, 10)),
                (2000, dim(100, 10)),
                (3000, bright(100, 10)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_halt_while_idle_flashes_without_pulsing() {
        let lamp = Arc::new(RecordingLamp::default());
        let handle = spawn_worker(lamp.clone());

        handle.halt(0);
        tokio::time::sleep(Duration::from_millis(3000)).await;

        assert_eq!(lamp.calls(), vec![(1000, terminal(0)), (2000, default_state())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frontend_cadence() {
        let lamp = Arc::new(RecordingLamp::default());
        let handle = spawn_worker(lamp.clone());

        handle.start(PulseJob::new(46920, Duration::from_millis(500)));
        tokio::time::sleep(Duration::from_millis(1900)).await;

        assert_eq!(
            lamp.calls(),
            vec![
                (0, dim(46920, 5)),
                (500, bright(46920, 5)),
                (1000, dim(46920, 5)),
                (1500, bright(46920, 5)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_can_start_again_after_halt() {
        let lamp = Arc::new(RecordingLamp::default());
        let handle = spawn_worker(lamp.clone());

        handle.start(PulseJob::new(100, PULSE));
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.halt(0);
        // Terminal at 3000, restore at 4000.
        tokio::time::sleep(Duration::from_millis(4000)).await;
        handle.start(PulseJob::new(200, PULSE));
        tokio::time::sleep(Duration::from_millis(500)).await;

        let calls = lamp.calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[2], (3000, terminal(0)));
        assert_eq!(calls[3], (4000, default_state()));
        assert_eq!(calls[4], (4500, dim(200, 10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_failures_do_not_stop_the_loop() {
        let lamp = Arc::new(RecordingLamp {
            fail: true,
            ..Default::default()
        });
        let handle = spawn_worker(lamp.clone());

        handle.start(PulseJob::new(100, PULSE));
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(lamp.calls().len(), 4);

        handle.halt(0);
        tokio::time::sleep(Duration::from_millis(3000)).await;
        let calls = lamp.calls();
        assert_eq!(calls[calls.len() - 2].1, terminal(0));
        assert_eq!(calls[calls.len() - 1].1, default_state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_halts_does_not_delay_next_start() {
        let lamp = Arc::new(RecordingLamp::default());
        let handle = spawn_worker(lamp.clone());

        for _ in 0..5 {
            handle.halt(0);
        }
        handle.start(PulseJob::new(100, PULSE));
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let calls = lamp.calls();
        assert_eq!(calls[0], (0, dim(100, 10)));

        let terminals: Vec<u64> = calls
            .iter()
            .filter(|(_, state)| *state == terminal(0))
            .map(|(at, _)| *at)
            .collect();
        assert_eq!(terminals, vec![1000; 5]);

        let restores = calls.iter().filter(|(_, state)| *state == default_state()).count();
        assert_eq!(restores, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_exits_when_handles_are_dropped() {
        let lamp = Arc::new(RecordingLamp::default());
        let light = LightController::new(lamp, BRI_LO, BRI_HI, default_state());
        let (actor, handle) = PulseActor::new(light, PULSE);
        let worker = tokio::spawn(actor.run());

        handle.start(PulseJob::new(100, PULSE));
        drop(handle);

        let finished = tokio::time::timeout(Duration::from_secs(10), worker).await;
        assert!(finished.is_ok());
    }
}
