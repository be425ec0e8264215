//! [`Session`] – the read → classify → dispatch loop.
//!
//! A session owns the controller link for its whole duration.  Each cycle it
//!
//! 1. drains pending operator input (drive keys, stop) without blocking;
//! 2. polls the [`LineSource`] for one line, treating a timeout as a no-op;
//! 3. feeds the line to the [`TelemetryDecoder`] and turns the result into
//!    [`Event`]s for the consumer.
//!
//! It ends on `END`, on a controller warning while driving, or on
//! [`OperatorInput::Stop`].  A stop aborts immediately: the stop byte is
//! written, incomplete groups are discarded and reported, and the outcome is
//! [`SessionOutcome::Aborted`].
//!
//! The loop is blocking and is meant to run under
//! `tokio::task::spawn_blocking`; events go out with
//! [`Sender::blocking_send`][tokio::sync::mpsc::Sender::blocking_send].
//!
//! # Example
//!
//! ```rust
//! use rover_hal::{LineReader, SimTransport};
//! use rover_runtime::session::{Session, SessionConfig};
//! use rover_types::{SessionMode, SessionOutcome};
//! use tokio::sync::mpsc;
//!
//! let sim = SimTransport::new("sim").with_lines(&["DD,90", "Start,80", "DIS,150", "END"]);
//! let mut session = Session::new(LineReader::new(sim), SessionConfig::default());
//! let (events, _rx) = mpsc::channel(64);
//! let (_stop, mut input) = mpsc::channel(1);
//!
//! let report = session.run(SessionMode::Scan, &events, &mut input).unwrap();
//! assert_eq!(report.outcome, SessionOutcome::Completed);
//! assert_eq!(report.series.samples().len(), 1);
//! ```

use std::time::Duration;

use rover_decoder::{map_sample, Decoded, Flush, GroupKind, PoseAccumulator, TelemetryDecoder};
use rover_hal::LineSource;
use rover_types::{
    DriveCommand, Event, EventPayload, FaultKind, FaultReport, Facing, ObjectSegment, Pose,
    RoverError, ScanSample, ScanSeries, SensorStatus, SessionMode, SessionOutcome,
};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, instrument, warn};

const EVENT_SOURCE: &str = "rover-runtime::session";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tunables for [`Session`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// How long one poll of the line source may block.
    pub read_timeout: Duration,
    /// Pose the robot is assumed to start from.
    pub start_pose: Pose,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(50),
            start_pose: Pose::at(1.0, 1.0, Facing::N),
        }
    }
}

/// Operator input delivered to a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorInput {
    /// Write one drive byte (drive sessions only).
    Drive(DriveCommand),
    /// Abort the session now.
    Stop,
}

/// What a finished session leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub mode: SessionMode,
    pub outcome: SessionOutcome,
    pub series: ScanSeries,
    pub status: SensorStatus,
    pub pose: Pose,
    pub objects: Vec<ObjectSegment>,
    pub faults: Vec<FaultReport>,
    pub goal_reached: bool,
    pub lines_read: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Drives one [`LineSource`] through consecutive sessions.
///
/// The decoder's series is cleared at the start of every run; the pose
/// carries over between runs until [`Session::reset_pose`] is called.
pub struct Session<L: LineSource> {
    link: L,
    config: SessionConfig,
    decoder: TelemetryDecoder,
    pose: PoseAccumulator,
    status: SensorStatus,
}

/// Per-run bookkeeping.
struct RunState {
    mode: SessionMode,
    objects: Vec<ObjectSegment>,
    faults: Vec<FaultReport>,
    goal_reached: bool,
    lines_read: usize,
}

enum Step {
    Continue,
    Finish(SessionOutcome, Option<Flush>),
}

impl<L: LineSource> Session<L> {
    pub fn new(link: L, config: SessionConfig) -> Self {
        Self {
            link,
            config,
            decoder: TelemetryDecoder::new(),
            pose: PoseAccumulator::new(config.start_pose),
            status: SensorStatus::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn pose(&self) -> Pose {
        self.pose.pose()
    }

    pub fn status(&self) -> &SensorStatus {
        &self.status
    }

    /// Borrow the underlying line source.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Return the pose to the configured start.
    pub fn reset_pose(&mut self) {
        self.pose.reset(self.config.start_pose);
    }

    /// Run one session to completion.
    ///
    /// Scan sessions write the start byte first.  Drive sessions forward
    /// every [`OperatorInput::Drive`] to the controller; in other modes drive
    /// input is ignored.  A closed input channel is never a stop request.
    ///
    /// # Errors
    ///
    /// - [`RoverError::Transport`] if the link fails; the session is over.
    /// - [`RoverError::Channel`] if the event receiver was dropped.
    #[instrument(skip_all, fields(mode = ?mode))]
    pub fn run(
        &mut self,
        mode: SessionMode,
        events: &mpsc::Sender<Event>,
        input: &mut mpsc::Receiver<OperatorInput>,
    ) -> Result<SessionReport, RoverError> {
        info!("session started");
        self.link.restart();
        self.decoder.reset();
        if mode == SessionMode::Scan {
            self.link.send_control(DriveCommand::Space)?;
        }

        let mut run = RunState {
            mode,
            objects: Vec::new(),
            faults: Vec::new(),
            goal_reached: false,
            lines_read: 0,
        };
        let mut input_open = true;

        let (outcome, flush) = loop {
            if input_open {
                match input.try_recv() {
                    Ok(OperatorInput::Stop) => {
                        let flush = self.abort(&mut run, events)?;
                        break (SessionOutcome::Aborted, Some(flush));
                    }
                    Ok(OperatorInput::Drive(command)) => self.forward_drive(mode, command)?,
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        debug!("operator input closed");
                        input_open = false;
                    }
                }
            }

            let Some(line) = self.link.next_line(self.config.read_timeout)? else {
                continue;
            };
            run.lines_read += 1;
            let decoded = self.decoder.feed(&line);
            match self.handle(decoded, &mut run, events)? {
                Step::Continue => {}
                Step::Finish(outcome, flush) => break (outcome, flush),
            }
        };

        let series = match flush {
            Some(flush) => flush.series,
            None => self.decoder.series().clone(),
        };
        emit(
            events,
            EventPayload::SessionEnded { mode, outcome },
        )?;
        info!(
            ?outcome,
            lines = run.lines_read,
            samples = series.samples().len(),
            readings = series.reading_count(),
            faults = run.faults.len(),
            "session ended"
        );
        Ok(SessionReport {
            mode,
            outcome,
            series,
            status: self.status.clone(),
            pose: self.pose.pose(),
            objects: run.objects,
            faults: run.faults,
            goal_reached: run.goal_reached,
            lines_read: run.lines_read,
        })
    }

    fn forward_drive(&mut self, mode: SessionMode, command: DriveCommand) -> Result<(), RoverError> {
        if mode == SessionMode::Drive {
            self.link.send_control(command)
        } else {
            debug!(?command, ?mode, "drive input ignored outside drive mode");
            Ok(())
        }
    }

    /// Write the stop byte and discard open groups.  A sweep whose fields
    /// diverged is dropped and reported as an integrity fault.
    fn abort(
        &mut self,
        run: &mut RunState,
        events: &mpsc::Sender<Event>,
    ) -> Result<Flush, RoverError> {
        warn!("session aborted by operator");
        self.link.send_control(DriveCommand::Space)?;
        let flush = self.decoder.abort();
        for &group in &flush.discarded {
            report_discarded(group, run, events)?;
        }
        if let Some(err) = &flush.integrity {
            report_fault(FaultReport::from(err), run, events)?;
        }
        Ok(flush)
    }

    fn handle(
        &mut self,
        decoded: Decoded,
        run: &mut RunState,
        events: &mpsc::Sender<Event>,
    ) -> Result<Step, RoverError> {
        match decoded {
            Decoded::Status(update) => {
                self.status.apply(&update);
                emit(events, EventPayload::Status(update))?;
            }
            Decoded::Sample(sample) => self.place_sample(sample, run, events)?,
            Decoded::Object(object) => {
                run.objects.push(object.clone());
                emit(events, EventPayload::Object(object))?;
            }
            Decoded::Warning(warning) => {
                warn!(message = %warning.message, "controller warning");
                emit(events, EventPayload::Warning(warning))?;
                if run.mode == SessionMode::Drive {
                    return Ok(Step::Finish(SessionOutcome::Warned, None));
                }
            }
            Decoded::Heading(increment) if run.mode == SessionMode::Drive => {
                let pose = self.pose.apply(increment);
                emit(events, EventPayload::Pose(pose))?;
            }
            Decoded::Heading(increment) => {
                debug!(?increment, mode = ?run.mode, "heading ignored outside drive mode");
            }
            Decoded::Goal => {
                info!("goal reached");
                run.goal_reached = true;
                emit(events, EventPayload::Goal)?;
            }
            Decoded::Fault(fault) => report_fault(fault, run, events)?,
            Decoded::End(flush) => {
                for &group in &flush.discarded {
                    report_discarded(group, run, events)?;
                }
                if let Some(err) = &flush.integrity {
                    report_fault(FaultReport::from(err), run, events)?;
                }
                if flush.series.reading_count() > 0 {
                    emit(events, EventPayload::Sweep(flush.series.clone()))?;
                }
                return Ok(Step::Finish(SessionOutcome::Completed, Some(flush)));
            }
            Decoded::SweepReading | Decoded::Pending | Decoded::Ignored => {}
        }
        Ok(Step::Continue)
    }

    fn place_sample(
        &mut self,
        sample: ScanSample,
        run: &mut RunState,
        events: &mpsc::Sender<Event>,
    ) -> Result<(), RoverError> {
        emit(events, EventPayload::Sample(sample))?;
        match map_sample(&sample, &self.pose.pose()) {
            Ok(point) => emit(events, EventPayload::Point(point)),
            Err(err) => report_fault(FaultReport::from(&err), run, events),
        }
    }
}

fn report_discarded(
    group: GroupKind,
    run: &mut RunState,
    events: &mpsc::Sender<Event>,
) -> Result<(), RoverError> {
    report_fault(
        FaultReport::new(
            FaultKind::IncompleteGroup,
            format!("incomplete {group} group discarded"),
        ),
        run,
        events,
    )
}

fn report_fault(
    fault: FaultReport,
    run: &mut RunState,
    events: &mpsc::Sender<Event>,
) -> Result<(), RoverError> {
    debug!(kind = ?fault.kind, message = %fault.message, "fault reported");
    run.faults.push(fault.clone());
    emit(events, EventPayload::Fault(fault))
}

fn emit(events: &mpsc::Sender<Event>, payload: EventPayload) -> Result<(), RoverError> {
    events
        .blocking_send(Event::new(EVENT_SOURCE, payload))
        .map_err(|_| RoverError::Channel("event consumer disconnected".to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rover_hal::{LineReader, SimTransport};
    use rover_types::Point2;

    const TEST_TIMEOUT: Duration = Duration::from_millis(5);

    fn session(sim: &SimTransport) -> Session<LineReader<SimTransport>> {
        Session::new(
            LineReader::new(sim.clone()),
            SessionConfig {
                read_timeout: TEST_TIMEOUT,
                start_pose: Pose::at(0.0, 0.0, Facing::N),
            },
        )
    }

    fn channels() -> (
        mpsc::Sender<Event>,
        mpsc::Receiver<Event>,
        mpsc::Sender<OperatorInput>,
        mpsc::Receiver<OperatorInput>,
    ) {
        let (etx, erx) = mpsc::channel(256);
        let (itx, irx) = mpsc::channel(16);
        (etx, erx, itx, irx)
    }

    fn drain(rx: &mut mpsc::Receiver<Event>) -> Vec<EventPayload> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event.payload);
        }
        out
    }

    #[test]
    fn scan_ping_triplet_yields_sample_and_point() {
        let sim = SimTransport::new("sim").with_lines(&["DD,90", "Start,80", "DIS,150", "END"]);
        let mut s = session(&sim);
        let (etx, mut erx, _itx, mut irx) = channels();

        let report = s.run(SessionMode::Scan, &etx, &mut irx).unwrap();
        assert_eq!(report.outcome, SessionOutcome::Completed);
        assert_eq!(report.series.samples().len(), 1);
        assert!(report.faults.is_empty());
        assert_eq!(sim.written(), b" ");

        let events = drain(&mut erx);
        let EventPayload::Sample(sample) = &events[0] else {
            panic!("expected sample first, got {:?}", events[0]);
        };
        assert!((sample.angle_degrees - 85.0).abs() < 1e-9);
        assert!((sample.distance_meters - 1.5).abs() < 1e-9);
        let EventPayload::Point(Point2 { x, y }) = events[1] else {
            panic!("expected point");
        };
        assert!((x - 1.5 * 85f64.to_radians().cos()).abs() < 1e-9);
        assert!((y - 1.5 * 85f64.to_radians().sin()).abs() < 1e-9);
        assert!(matches!(
            events.last(),
            Some(EventPayload::SessionEnded {
                mode: SessionMode::Scan,
                outcome: SessionOutcome::Completed
            })
        ));
    }

    #[test]
    fn sweep_session_collects_status_readings_and_objects() {
        let sim = SimTransport::new("sim").with_lines(&[
            "BL,0", "BR,1", "S,200", "IR,100", "SON,50", "DEG,0", "IR,90", "SON,40",
            "DEG,0.0174533", "SD,10", "ED,20", "DIS,35", "END",
        ]);
        let mut s = session(&sim);
        let (etx, mut erx, _itx, mut irx) = channels();

        let report = s.run(SessionMode::Sweep, &etx, &mut irx).unwrap();
        assert_eq!(report.outcome, SessionOutcome::Completed);
        assert_eq!(report.series.reading_count(), 2);
        assert_eq!(report.status.bumper_right.as_deref(), Some("1"));
        assert_eq!(report.status.speed, Some(200.0));
        assert_eq!(report.objects.len(), 1);
        assert!(sim.written().is_empty());

        let events = drain(&mut erx);
        assert!(
            events
                .iter()
                .any(|e| matches!(e, EventPayload::Sweep(series) if series.reading_count() == 2))
        );
    }

    #[test]
    fn integrity_failure_is_reported_and_sweep_dropped() {
        let sim = SimTransport::new("sim").with_lines(&["DEG,0", "IR,1", "SON,2", "DEG,1", "END"]);
        let mut s = session(&sim);
        let (etx, mut erx, _itx, mut irx) = channels();

        let report = s.run(SessionMode::Sweep, &etx, &mut irx).unwrap();
        assert_eq!(report.series.reading_count(), 0);
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].kind, FaultKind::Integrity);
        assert!(
            !drain(&mut erx)
                .iter()
                .any(|e| matches!(e, EventPayload::Sweep(_)))
        );
    }

    #[test]
    fn malformed_line_is_reported_and_loop_continues() {
        let sim = SimTransport::new("sim").with_lines(&[
            "DD,abc", "DD,90", "Start,80", "DIS,150", "END",
        ]);
        let mut s = session(&sim);
        let (etx, _erx, _itx, mut irx) = channels();

        let report = s.run(SessionMode::Scan, &etx, &mut irx).unwrap();
        assert_eq!(report.faults[0].kind, FaultKind::Parse);
        assert_eq!(report.series.samples().len(), 1);
    }

    #[test]
    fn stop_mid_group_aborts_and_reports_discard() {
        let sim = SimTransport::new("sim").with_lines(&["DD,90", "Start,80"]);
        let mut s = session(&sim);
        let (etx, _erx, itx, mut irx) = channels();

        // Let the two lines arrive, then stop on a later poll.
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            itx.blocking_send(OperatorInput::Stop).unwrap();
        });
        let report = s.run(SessionMode::Sweep, &etx, &mut irx).unwrap();
        stopper.join().unwrap();

        assert_eq!(report.outcome, SessionOutcome::Aborted);
        assert!(report.series.samples().is_empty());
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].kind, FaultKind::IncompleteGroup);
        assert_eq!(sim.written(), b" ");
    }

    #[test]
    fn stop_during_drive_writes_stop_byte_after_drive_keys() {
        let sim = SimTransport::new("sim").with_reply(b'a', &["anglen,-15"]);
        let mut s = session(&sim);
        let (etx, _erx, itx, mut irx) = channels();
        itx.try_send(OperatorInput::Drive(DriveCommand::Forward)).unwrap();
        itx.try_send(OperatorInput::Drive(DriveCommand::TurnLeft)).unwrap();

        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            itx.blocking_send(OperatorInput::Stop).unwrap();
        });
        let report = s.run(SessionMode::Drive, &etx, &mut irx).unwrap();
        stopper.join().unwrap();

        assert_eq!(report.outcome, SessionOutcome::Aborted);
        assert_eq!(sim.written(), b"wa ");
        assert_eq!(report.pose.heading_degrees, 345.0);
        assert!(report.faults.is_empty());
    }

    #[test]
    fn stop_after_malformed_sweep_value_drops_misaligned_readings() {
        let sim = SimTransport::new("sim").with_lines(&[
            "IR,10", "SON,bad", "DEG,0.0", "IR,20", "SON,200", "DEG,1.0", "IR,30", "SON,300",
            "DEG,2.0",
        ]);
        let mut s = session(&sim);
        let (etx, _erx, itx, mut irx) = channels();

        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            itx.blocking_send(OperatorInput::Stop).unwrap();
        });
        let report = s.run(SessionMode::Sweep, &etx, &mut irx).unwrap();
        stopper.join().unwrap();

        assert_eq!(report.outcome, SessionOutcome::Aborted);
        assert_eq!(report.series.reading_count(), 0);
        assert!(report.series.check_integrity().is_ok());
        let kinds: Vec<_> = report.faults.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FaultKind::Parse, FaultKind::Integrity]);
    }

    #[test]
    fn heading_outside_drive_leaves_pose_alone() {
        let sim = SimTransport::new("sim").with_lines(&["anglep,90", "END"]);
        let mut s = session(&sim);
        let (etx, mut erx, _itx, mut irx) = channels();

        let report = s.run(SessionMode::Sweep, &etx, &mut irx).unwrap();
        assert_eq!(report.pose, Pose::at(0.0, 0.0, Facing::N));
        assert!(
            !drain(&mut erx)
                .iter()
                .any(|e| matches!(e, EventPayload::Pose(_)))
        );
    }

    #[test]
    fn disconnect_is_a_transport_error() {
        let sim = SimTransport::new("sim")
            .with_lines(&["DD,90"])
            .disconnect_when_drained();
        let mut s = session(&sim);
        let (etx, _erx, _itx, mut irx) = channels();
        assert!(matches!(
            s.run(SessionMode::Sweep, &etx, &mut irx),
            Err(RoverError::Transport(_))
        ));
    }

    #[test]
    fn dropped_event_receiver_is_a_channel_error() {
        let sim = SimTransport::new("sim").with_lines(&["BL,1", "END"]);
        let mut s = session(&sim);
        let (etx, erx, _itx, mut irx) = channels();
        drop(erx);
        assert!(matches!(
            s.run(SessionMode::Sweep, &etx, &mut irx),
            Err(RoverError::Channel(_))
        ));
    }

    #[test]
    fn drive_accumulates_heading_until_warning() {
        let sim = SimTransport::new("sim")
            .with_reply(b'd', &["anglep,90", "1200, 1300, 800, 950"])
            .with_reply(b'w', &["W,Left Impact"]);
        let mut s = session(&sim);
        let (etx, mut erx, itx, mut irx) = channels();
        itx.try_send(OperatorInput::Drive(DriveCommand::TurnRight)).unwrap();
        itx.try_send(OperatorInput::Drive(DriveCommand::Forward)).unwrap();

        let report = s.run(SessionMode::Drive, &etx, &mut irx).unwrap();
        assert_eq!(report.outcome, SessionOutcome::Warned);
        assert_eq!(report.pose.heading_degrees, 90.0);
        assert_eq!(report.pose.facing, Facing::E);
        assert_eq!(sim.written(), b"dw");

        let events = drain(&mut erx);
        assert!(events.iter().any(|e| matches!(e, EventPayload::Pose(_))));
        assert!(events.iter().any(|e| matches!(e, EventPayload::Warning(_))));
    }

    #[test]
    fn unsupported_facing_skips_point_but_keeps_sample() {
        let sim = SimTransport::new("sim").with_lines(&["DD,10", "Start,0", "DIS,100", "END"]);
        let mut s = Session::new(
            LineReader::new(sim.clone()),
            SessionConfig {
                read_timeout: TEST_TIMEOUT,
                start_pose: Pose::at(0.0, 0.0, Facing::E),
            },
        );
        let (etx, mut erx, _itx, mut irx) = channels();

        let report = s.run(SessionMode::Scan, &etx, &mut irx).unwrap();
        assert_eq!(report.series.samples().len(), 1);
        assert_eq!(report.faults[0].kind, FaultKind::UnsupportedFacing);
        assert!(
            !drain(&mut erx)
                .iter()
                .any(|e| matches!(e, EventPayload::Point(_)))
        );
    }

    #[test]
    fn goal_marker_is_flagged() {
        let sim = SimTransport::new("sim").with_lines(&["WIN", "END"]);
        let mut s = session(&sim);
        let (etx, _erx, _itx, mut irx) = channels();
        let report = s.run(SessionMode::Sweep, &etx, &mut irx).unwrap();
        assert!(report.goal_reached);
    }

    #[test]
    fn series_is_cleared_between_runs() {
        let sim = SimTransport::new("sim").with_lines(&["DD,90", "Start,80", "DIS,150", "END"]);
        let mut s = session(&sim);
        let (etx, _erx, _itx, mut irx) = channels();
        s.run(SessionMode::Scan, &etx, &mut irx).unwrap();

        sim.push_lines(&["END"]);
        let report = s.run(SessionMode::Scan, &etx, &mut irx).unwrap();
        assert!(report.series.is_empty());
    }

    #[tokio::test]
    async fn runs_on_blocking_worker_with_live_consumer() {
        let sim = SimTransport::new("sim").with_lines(&[
            "IR,1", "SON,2", "DEG,0", "IR,3", "SON,4", "DEG,0.5", "END",
        ]);
        let mut s = session(&sim);
        let (etx, mut erx) = mpsc::channel(1);
        let (_itx, mut irx) = mpsc::channel(1);

        let worker =
            tokio::task::spawn_blocking(move || s.run(SessionMode::Sweep, &etx, &mut irx));

        let mut seen = Vec::new();
        while let Some(event) = erx.recv().await {
            seen.push(event.payload);
        }
        let report = worker.await.unwrap().unwrap();
        assert_eq!(report.series.reading_count(), 2);
        assert!(matches!(
            seen.last(),
            Some(EventPayload::SessionEnded { .. })
        ));
    }
}
