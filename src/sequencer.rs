// Execution loop: drains the command queue one timed command at a time
//
// Every command is preceded by the inter-command pause, driven for its
// duration, then both motors are stopped before the next one is taken.
// The loop takes `&mut self` for the whole run, so nothing else can touch
// the queue or the motors while a command is in flight.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::{Calibration, INTER_COMMAND_PAUSE};
use crate::error::{ActuatorError, Result, SequencerError};
use crate::messages::{LoopState, PlannedStep, SequencerStatus};
use crate::motor::{Actuator, Direction, MotorPair, PrimitiveCommand, ReverseRule, translate};
use crate::queue::CommandQueue;
use crate::timer::{StopSignal, Timer};

/// Outcome of one drained run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunReport {
    pub executed: usize,
    /// Sum of commanded motion time, pauses excluded
    pub motion_ms: f64,
}

pub struct Sequencer<A, T> {
    queue: CommandQueue,
    motors: MotorPair<A>,
    timer: T,
    calibration: Calibration,
    reverse: ReverseRule,
    pause: Duration,
    state: LoopState,
    executed: usize,
}

impl<A: Actuator, T: Timer> Sequencer<A, T> {
    /// Validates calibration up front; a bad constant never reaches the loop
    pub fn new(actuator: A, timer: T, calibration: Calibration) -> Result<Self> {
        calibration.validate()?;
        Ok(Self {
            queue: CommandQueue::new(),
            motors: MotorPair::new(actuator, calibration.motor_power),
            timer,
            calibration,
            reverse: ReverseRule::default(),
            pause: INTER_COMMAND_PAUSE,
            state: LoopState::Idle,
            executed: 0,
        })
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_reverse_rule(mut self, reverse: ReverseRule) -> Self {
        self.reverse = reverse;
        self
    }

    /// Brake both motors before accepting plans
    pub async fn initialize(&mut self) -> Result<()> {
        self.motors.initialize().await?;
        Ok(())
    }

    /// Translate and append a plan; does not start execution
    ///
    /// Either every step is enqueued or none is.
    pub fn set_queue(&mut self, steps: &[PlannedStep]) -> Result<usize> {
        if self.state == LoopState::Running {
            return Err(SequencerError::Busy);
        }

        let mut commands = Vec::with_capacity(steps.len() * 2);
        for (index, step) in steps.iter().enumerate() {
            let translated = translate(step, &self.calibration, self.reverse)
                .map_err(|source| SequencerError::InvalidStep { index, source })?;
            commands.extend(translated);
        }

        let added = commands.len();
        self.queue.extend(commands);
        info!(
            "Set queue: {} step(s) -> {} command(s), {} queued",
            steps.len(),
            added,
            self.queue.len()
        );
        Ok(added)
    }

    /// Drain the queue; a no-op when it is empty
    ///
    /// On an actuator fault or an emergency stop the motors are stopped,
    /// the rest of the queue is discarded and the error is returned.
    pub async fn run_queue(&mut self, stop: &StopSignal) -> Result<RunReport> {
        if self.queue.is_empty() {
            return Ok(RunReport::default());
        }

        info!("Running queue of {} command(s)", self.queue.len());
        self.state = LoopState::Running;
        let result = self.drain(stop).await;
        self.state = LoopState::Idle;

        match result {
            Ok(report) => {
                info!(
                    "Queue drained: {} command(s), {:.1}ms of motion",
                    report.executed, report.motion_ms
                );
                Ok(report)
            }
            Err(e) => {
                let discarded = self.queue.clear();
                error!("Run aborted ({} command(s) discarded): {}", discarded, e);
                Err(e)
            }
        }
    }

    async fn drain(&mut self, stop: &StopSignal) -> Result<RunReport> {
        let mut report = RunReport::default();

        while !self.queue.is_empty() {
            if !self.wait_unless_stopped(self.pause, stop).await {
                return Err(SequencerError::Cancelled {
                    remaining: self.queue.len(),
                });
            }

            let command = self.queue.dequeue()?;
            // Resolve the settle time before any motor moves
            let settle = command.duration()?;
            if let Err(e) = self.move_command(&command).await {
                self.motors.stop_best_effort().await;
                return Err(e);
            }

            if command.direction != Direction::Stop {
                self.motor_duration(settle, stop).await?;
            }

            self.executed += 1;
            report.executed += 1;
            report.motion_ms += command.duration_ms;
        }

        Ok(report)
    }

    /// Issue one command to the motors; STOP takes effect immediately
    pub async fn move_command(&mut self, command: &PrimitiveCommand) -> Result<()> {
        info!(
            "Direction: {}, Duration: {:.1}ms",
            command.direction, command.duration_ms
        );
        self.motors.apply(command.direction).await?;
        Ok(())
    }

    /// Let the current motion run for `duration`, then stop both channels
    async fn motor_duration(&mut self, duration: Duration, stop: &StopSignal) -> Result<()> {
        let completed = self.wait_unless_stopped(duration, stop).await;
        if !completed {
            warn!("Emergency stop during motion");
            self.motors.stop_best_effort().await;
            return Err(SequencerError::Cancelled {
                remaining: self.queue.len(),
            });
        }

        if let Err(e) = self.motors.stop().await {
            self.motors.stop_best_effort().await;
            return Err(SequencerError::ActuatorFault(e));
        }
        Ok(())
    }

    /// `true` if the full delay elapsed, `false` if stopped first
    async fn wait_unless_stopped(&self, delay: Duration, stop: &StopSignal) -> bool {
        if stop.is_triggered() {
            return false;
        }
        debug!("Waiting {:?}", delay);
        tokio::select! {
            biased;
            _ = stop.triggered() => false,
            _ = self.timer.after(delay) => true,
        }
    }

    /// Idle emergency stop: stop both channels and discard every queued command
    ///
    /// Returns how many commands were discarded.
    pub async fn emergency_stop(&mut self) -> usize {
        self.motors.stop_best_effort().await;
        let discarded = self.queue.clear();
        if discarded > 0 {
            warn!("Emergency stop: {} queued command(s) discarded", discarded);
        }
        discarded
    }

    /// Stop both channels outside of a run, e.g. on shutdown
    pub async fn halt(&mut self) -> std::result::Result<(), ActuatorError> {
        self.motors.stop().await
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn status(&self, last_error: Option<String>) -> SequencerStatus {
        SequencerStatus {
            state: self.state,
            queued: self.queue.len(),
            executed: self.executed,
            last_error,
        }
    }

    pub fn actuator(&self) -> &A {
        self.motors.actuator()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranslateError;
    use crate::motor::{Channel, Rotation};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Wait(Duration),
        Drive(Channel, Rotation, u8),
        Stop(Channel),
        Brake(Channel),
    }

    type Log = Arc<Mutex<Vec<Event>>>;

    struct RecordingActuator {
        log: Log,
        fail_drives_after: Option<usize>,
        drives: usize,
    }

    impl Actuator for RecordingActuator {
        async fn drive(
            &mut self,
            channel: Channel,
            rotation: Rotation,
            power: u8,
        ) -> std::result::Result<(), ActuatorError> {
            if self.fail_drives_after.is_some_and(|limit| self.drives >= limit) {
                return Err(ActuatorError::Rejected {
                    channel: channel.name(),
                    reason: "driver overheated".to_string(),
                });
            }
            self.drives += 1;
            self.log
                .lock()
                .unwrap()
                .push(Event::Drive(channel, rotation, power));
            Ok(())
        }

        async fn stop(&mut self, channel: Channel) -> std::result::Result<(), ActuatorError> {
            self.log.lock().unwrap().push(Event::Stop(channel));
            Ok(())
        }

        async fn brake(&mut self, channel: Channel) -> std::result::Result<(), ActuatorError> {
            self.log.lock().unwrap().push(Event::Brake(channel));
            Ok(())
        }
    }

    /// Records requested delays and completes immediately
    struct RecordingTimer {
        log: Log,
        stop_on_wait: Option<(usize, StopSignal)>,
    }

    impl Timer for RecordingTimer {
        fn after(&self, duration: Duration) -> impl std::future::Future<Output = ()> {
            let mut log = self.log.lock().unwrap();
            log.push(Event::Wait(duration));
            let waits = log.iter().filter(|e| matches!(e, Event::Wait(_))).count();
            let stopping = match &self.stop_on_wait {
                Some((nth, stop)) if *nth == waits => {
                    stop.trigger();
                    true
                }
                _ => false,
            };
            async move {
                if stopping {
                    std::future::pending::<()>().await
                }
            }
        }
    }

    fn scenario_calibration() -> Calibration {
        Calibration {
            rotational_speed_right: 0.1,
            rotational_speed_left: 0.1,
            forward_speed: 0.00089,
            motor_power: 255,
        }
    }

    fn sequencer(log: &Log) -> Sequencer<RecordingActuator, RecordingTimer> {
        sequencer_with(log, None, None)
    }

    fn sequencer_with(
        log: &Log,
        fail_drives_after: Option<usize>,
        stop_on_wait: Option<(usize, StopSignal)>,
    ) -> Sequencer<RecordingActuator, RecordingTimer> {
        let actuator = RecordingActuator {
            log: log.clone(),
            fail_drives_after,
            drives: 0,
        };
        let timer = RecordingTimer {
            log: log.clone(),
            stop_on_wait,
        };
        Sequencer::new(actuator, timer, scenario_calibration()).unwrap()
    }

    fn ms(value: f64) -> Duration {
        Duration::from_secs_f64(value / 1000.0)
    }

    fn stops() -> [Event; 2] {
        [Event::Stop(Channel::Left), Event::Stop(Channel::Right)]
    }

    #[test]
    fn test_invalid_calibration_fails_fast() {
        let log = Log::default();
        let actuator = RecordingActuator {
            log: log.clone(),
            fail_drives_after: None,
            drives: 0,
        };
        let timer = RecordingTimer {
            log,
            stop_on_wait: None,
        };
        let calibration = Calibration {
            rotational_speed_right: 0.0,
            ..scenario_calibration()
        };
        assert!(matches!(
            Sequencer::new(actuator, timer, calibration),
            Err(SequencerError::InvalidCalibration { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_empty_queue_is_noop() {
        let log = Log::default();
        let mut seq = sequencer(&log);
        let stop = StopSignal::new();

        for _ in 0..3 {
            let report = seq.run_queue(&stop).await.unwrap();
            assert_eq!(report, RunReport::default());
        }
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(seq.state(), LoopState::Idle);
        assert_eq!(seq.status(None), SequencerStatus::default());
    }

    #[tokio::test]
    async fn test_left_turn_scenario() {
        let log = Log::default();
        let mut seq = sequencer(&log);
        seq.set_queue(&[PlannedStep {
            angle: 90.0,
            distance: 0.0,
        }])
        .unwrap();
        assert_eq!(seq.queued(), 1);

        let report = seq.run_queue(&StopSignal::new()).await.unwrap();
        assert_eq!(report.executed, 1);
        assert_eq!(report.motion_ms, 90.0 / 0.1);

        let mut expected = vec![
            Event::Wait(INTER_COMMAND_PAUSE),
            Event::Drive(Channel::Left, Rotation::Reverse, 255),
            Event::Drive(Channel::Right, Rotation::Forward, 255),
            Event::Wait(ms(90.0 / 0.1)),
        ];
        expected.extend(stops());
        assert_eq!(*log.lock().unwrap(), expected);
        assert_eq!(seq.state(), LoopState::Idle);
        assert!(seq.is_empty());
    }

    #[tokio::test]
    async fn test_forward_scenario() {
        let log = Log::default();
        let mut seq = sequencer(&log);
        seq.set_queue(&[PlannedStep {
            angle: 0.0,
            distance: 1.0,
        }])
        .unwrap();

        let report = seq.run_queue(&StopSignal::new()).await.unwrap();
        assert!((report.motion_ms - 1123.6).abs() < 0.01);

        let log = log.lock().unwrap();
        assert_eq!(log[1], Event::Drive(Channel::Left, Rotation::Forward, 255));
        assert_eq!(log[2], Event::Drive(Channel::Right, Rotation::Forward, 255));
        assert_eq!(log[3], Event::Wait(ms(1.0 / 0.00089)));
    }

    #[tokio::test]
    async fn test_turn_then_forward_with_pause_between() {
        let log = Log::default();
        let mut seq = sequencer(&log);
        let added = seq
            .set_queue(&[PlannedStep {
                angle: -45.0,
                distance: 2.0,
            }])
            .unwrap();
        assert_eq!(added, 2);

        seq.run_queue(&StopSignal::new()).await.unwrap();

        let mut expected = vec![
            Event::Wait(INTER_COMMAND_PAUSE),
            Event::Drive(Channel::Left, Rotation::Forward, 255),
            Event::Drive(Channel::Right, Rotation::Reverse, 255),
            Event::Wait(ms(45.0 / 0.1)),
        ];
        expected.extend(stops());
        expected.extend([
            Event::Wait(INTER_COMMAND_PAUSE),
            Event::Drive(Channel::Left, Rotation::Forward, 255),
            Event::Drive(Channel::Right, Rotation::Forward, 255),
            Event::Wait(ms(2.0 / 0.00089)),
        ]);
        expected.extend(stops());
        assert_eq!(*log.lock().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_steps_execute_in_submission_order() {
        let log = Log::default();
        let mut seq = sequencer(&log).with_pause(Duration::from_millis(5));
        seq.set_queue(&[
            PlannedStep {
                angle: 10.0,
                distance: 0.0,
            },
            PlannedStep {
                angle: 0.0,
                distance: -1.0,
            },
        ])
        .unwrap();
        seq.set_queue(&[PlannedStep {
            angle: -20.0,
            distance: 0.0,
        }])
        .unwrap();

        let report = seq.run_queue(&StopSignal::new()).await.unwrap();
        assert_eq!(report.executed, 3);

        let left_drives: Vec<Rotation> = log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Event::Drive(Channel::Left, rotation, _) => Some(*rotation),
                _ => None,
            })
            .collect();
        // LEFT, BACKWARD, RIGHT
        assert_eq!(
            left_drives,
            [Rotation::Reverse, Rotation::Reverse, Rotation::Forward]
        );
        assert_eq!(
            log.lock().unwrap()[0],
            Event::Wait(Duration::from_millis(5))
        );
    }

    #[tokio::test]
    async fn test_invalid_step_enqueues_nothing() {
        let log = Log::default();
        let mut seq = sequencer(&log);
        let result = seq.set_queue(&[
            PlannedStep {
                angle: 90.0,
                distance: 1.0,
            },
            PlannedStep {
                angle: f64::NAN,
                distance: 0.0,
            },
        ]);
        assert!(matches!(
            result,
            Err(SequencerError::InvalidStep { index: 1, .. })
        ));
        assert!(seq.is_empty());
    }

    #[tokio::test]
    async fn test_actuator_fault_aborts_and_stops() {
        let log = Log::default();
        let mut seq = sequencer_with(&log, Some(2), None);
        seq.set_queue(&[
            PlannedStep {
                angle: 90.0,
                distance: 0.0,
            },
            PlannedStep {
                angle: 0.0,
                distance: 1.0,
            },
            PlannedStep {
                angle: 0.0,
                distance: 1.0,
            },
        ])
        .unwrap();

        let result = seq.run_queue(&StopSignal::new()).await;
        assert!(matches!(result, Err(SequencerError::ActuatorFault(_))));
        assert!(seq.is_empty());
        assert_eq!(seq.state(), LoopState::Idle);

        let log = log.lock().unwrap();
        assert_eq!(&log[log.len() - 2..], &stops());
        // Second command never started a drive
        let drives = log.iter().filter(|e| matches!(e, Event::Drive(..))).count();
        assert_eq!(drives, 2);
    }

    #[tokio::test]
    async fn test_stop_before_dequeue_cancels() {
        let log = Log::default();
        let mut seq = sequencer(&log);
        seq.set_queue(&[PlannedStep {
            angle: 0.0,
            distance: 1.0,
        }])
        .unwrap();

        let stop = StopSignal::new();
        stop.trigger();
        let result = seq.run_queue(&stop).await;
        assert!(matches!(
            result,
            Err(SequencerError::Cancelled { remaining: 1 })
        ));
        assert!(log.lock().unwrap().is_empty());
        assert!(seq.is_empty());
    }

    #[tokio::test]
    async fn test_stop_during_motion_halts_motors() {
        let log = Log::default();
        let stop = StopSignal::new();
        // Second wait is the settle timer of the first command
        let mut seq = sequencer_with(&log, None, Some((2, stop.clone())));
        seq.set_queue(&[PlannedStep {
            angle: 45.0,
            distance: 1.0,
        }])
        .unwrap();

        let result = seq.run_queue(&stop).await;
        assert!(matches!(
            result,
            Err(SequencerError::Cancelled { remaining: 1 })
        ));

        let log = log.lock().unwrap();
        assert_eq!(&log[log.len() - 2..], &stops());
        assert_eq!(log.len(), 6);
        assert!(seq.is_empty());
    }

    #[tokio::test]
    async fn test_queue_can_be_rearmed_after_drain() {
        let log = Log::default();
        let mut seq = sequencer(&log);
        let stop = StopSignal::new();
        let step = PlannedStep {
            angle: 0.0,
            distance: 0.5,
        };

        seq.set_queue(&[step]).unwrap();
        seq.run_queue(&stop).await.unwrap();
        seq.set_queue(&[step]).unwrap();
        seq.run_queue(&stop).await.unwrap();

        assert_eq!(seq.status(None).executed, 2);
    }

    #[tokio::test]
    async fn test_oversized_step_rejected_before_motion() {
        let log = Log::default();
        let mut seq = sequencer(&log);
        let result = seq.set_queue(&[PlannedStep {
            angle: 0.0,
            distance: 1e20,
        }]);
        assert!(matches!(
            result,
            Err(SequencerError::InvalidStep {
                index: 0,
                source: TranslateError::DurationOutOfRange { .. }
            })
        ));
        assert!(seq.is_empty());

        let report = seq.run_queue(&StopSignal::new()).await.unwrap();
        assert_eq!(report, RunReport::default());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_untimeable_command_never_drives() {
        let log = Log::default();
        let mut seq = sequencer(&log);
        seq.queue
            .enqueue(PrimitiveCommand::new(Direction::Forward, f64::MAX));
        seq.queue
            .enqueue(PrimitiveCommand::new(Direction::Left, 100.0));

        let result = seq.run_queue(&StopSignal::new()).await;
        assert!(matches!(result, Err(SequencerError::InvalidCommand(_))));
        assert!(seq.is_empty());
        assert_eq!(seq.state(), LoopState::Idle);
        assert!(
            !log.lock()
                .unwrap()
                .iter()
                .any(|e| matches!(e, Event::Drive(..)))
        );
    }

    #[tokio::test]
    async fn test_idle_emergency_stop_discards_queue() {
        let log = Log::default();
        let mut seq = sequencer(&log);
        seq.set_queue(&[PlannedStep {
            angle: 0.0,
            distance: 1.0,
        }])
        .unwrap();

        assert_eq!(seq.emergency_stop().await, 1);
        assert!(seq.is_empty());
        assert_eq!(*log.lock().unwrap(), stops());

        // A later trigger finds nothing to run
        let report = seq.run_queue(&StopSignal::new()).await.unwrap();
        assert_eq!(report.executed, 0);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_initialize_brakes_motors() {
        let log = Log::default();
        let mut seq = sequencer(&log);
        seq.initialize().await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            [Event::Brake(Channel::Left), Event::Brake(Channel::Right)]
        );
    }
}
