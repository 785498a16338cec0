//! Player Session
//!
//! Owns one AI process for the length of a match: spawns it, runs the
//! handshake, and drives one request/reply exchange per turn under the
//! player's think-time budget.
//!
//! The budget is shared by the handshake and every turn and is never
//! reset. Only the wait for the reply is timed; whole milliseconds are
//! charged, at least one per round.
//!
//! Per-player failures never escape as errors. They set a terminal
//! [`PlayerStatus`] and are reported to the operator (tracing) and to the
//! diagnostic log; the caller always gets a usable session back.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::core::geometry::IntVec;
use crate::game::course::Course;
use crate::game::state::RacerState;
use crate::player::channel::{KillSwitch, ReadOutcome, ReplyReader};
use crate::player::hooks::{run_hook, AiCommand, HookKind};
use crate::player::protocol::{self, PlayerStatus, ProtocolFailure};
use crate::player::relay::{DiagnosticRelay, DiagnosticSink, SinkTurn};
use crate::DEFAULT_DIAGNOSTIC_LIMIT;

/// How long a child that closed its output gets to finish exiting.
const EXIT_GRACE: Duration = Duration::from_millis(250);

/// How long shutdown waits for the killed child to be reaped.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// How long shutdown lets the relay drain.
const RELAY_GRACE: Duration = Duration::from_millis(100);

/// Per-player configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Run after every wait on the child resolves.
    pub pause_command: Option<AiCommand>,
    /// Run before every turn's wait begins.
    pub resume_command: Option<AiCommand>,
    /// Byte budget for the child's stderr in the diagnostic log.
    pub diagnostic_limit: usize,
    /// Destination for the child's stderr and the judge's `[system]` lines.
    pub diagnostic_log: Option<DiagnosticSink>,
    /// Verbatim copy of everything sent to the child.
    pub input_log: Option<DiagnosticSink>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            pause_command: None,
            resume_command: None,
            diagnostic_limit: DEFAULT_DIAGNOSTIC_LIMIT,
            diagnostic_log: None,
            input_log: None,
        }
    }
}

impl SessionOptions {
    /// Read hook commands and the diagnostic limit from the environment.
    ///
    /// - `RACE_PAUSE_COMMAND`, `RACE_RESUME_COMMAND`: shell command lines,
    ///   run through `sh -c` so quoting and `$VARS` work
    /// - `RACE_DIAGNOSTIC_LIMIT`: bytes
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let command = |key: &str| lookup(key).and_then(|line| AiCommand::shell(&line));
        Self {
            pause_command: command("RACE_PAUSE_COMMAND"),
            resume_command: command("RACE_RESUME_COMMAND"),
            diagnostic_limit: lookup("RACE_DIAGNOSTIC_LIMIT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_DIAGNOSTIC_LIMIT),
            ..Default::default()
        }
    }

    /// Attach a diagnostic log.
    pub fn with_diagnostic_log(mut self, sink: DiagnosticSink) -> Self {
        self.diagnostic_log = Some(sink);
        self
    }

    /// Attach an input transcript.
    pub fn with_input_log(mut self, sink: DiagnosticSink) -> Self {
        self.input_log = Some(sink);
        self
    }
}

/// One side of a match.
pub struct PlayerSession {
    name: String,
    /// Position and velocity, updated by the caller after each turn.
    pub racer: RacerState,
    time_left: i64,
    status: PlayerStatus,
    failure: Option<ProtocolFailure>,
    child: Option<Child>,
    to_ai: Option<BufWriter<ChildStdin>>,
    replies: Option<ReplyReader<ChildStdout>>,
    relay: Option<DiagnosticRelay>,
    /// Held except while waiting on the child.
    sink_turn: Option<SinkTurn>,
    kill_switch: KillSwitch,
    options: SessionOptions,
}

impl PlayerSession {
    /// Start the AI and run the handshake.
    ///
    /// The returned session may already be terminal.
    pub async fn spawn(
        command: &AiCommand,
        course: &Course,
        start_x: i32,
        name: impl Into<String>,
        options: SessionOptions,
    ) -> Self {
        let mut session = Self {
            name: name.into(),
            racer: RacerState::at_start(start_x),
            time_left: course.think_time,
            status: PlayerStatus::Valid,
            failure: None,
            child: None,
            to_ai: None,
            replies: None,
            relay: None,
            sink_turn: None,
            kill_switch: KillSwitch::new(),
            options,
        };
        session.reclaim_sink().await;
        session.system("Try : hand shake");

        let spawned = command
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                session.fail(ProtocolFailure::SpawnFailed(format!("{command}: {e}")));
                return session;
            }
        };
        info!("player \"{}\" started `{}` (pid {:?})", session.name, command, child.id());

        if let Some(stderr) = child.stderr.take() {
            session.relay = Some(DiagnosticRelay::spawn(
                stderr,
                session.options.diagnostic_log.clone(),
                session.options.diagnostic_limit,
            ));
        }
        session.to_ai = child.stdin.take().map(BufWriter::new);
        session.replies = child
            .stdout
            .take()
            .map(|out| ReplyReader::new(out, &session.kill_switch));
        session.child = Some(child);

        if !session.send(&protocol::handshake_message(course)).await {
            return session;
        }
        let outcome = session.wait_for_reply::<1>(false).await;
        match session.judge(outcome, |[code]| protocol::validate_handshake(code)).await {
            Some(Ok(())) => session.system("Success! : hand shake"),
            Some(Err(failure)) => {
                session.system("Failed... : hand shake");
                session.fail(failure);
            }
            None => {}
        }
        session
    }

    /// Run one turn and return the requested acceleration.
    ///
    /// Returns zero without talking to the child once the session is
    /// terminal or has been terminated. On failure the status changes and
    /// the result is zero.
    pub async fn turn(&mut self, step: i32, opponent: &RacerState, course: &Course) -> IntVec {
        if !self.status.is_valid() || self.kill_switch.is_triggered() {
            return IntVec::ZERO;
        }
        self.system("================================");
        self.system(format_args!("turn: {step}"));

        let message = protocol::turn_message(step, self.time_left, &self.racer, opponent, course);
        if !self.send(&message).await {
            return IntVec::ZERO;
        }
        let outcome = self.wait_for_reply::<2>(true).await;
        match self.judge(outcome, |[ax, ay]| protocol::validate_acceleration(ax, ay)).await {
            Some(Ok(acceleration)) => acceleration,
            Some(Err(failure)) => {
                self.fail(failure);
                IntVec::ZERO
            }
            None => IntVec::ZERO,
        }
    }

    /// Kill the child and unblock any in-flight read.
    ///
    /// Idempotent; does not change the status.
    pub fn terminate(&mut self) {
        self.kill_switch.trigger();
        if let Some(child) = self.child.as_mut() {
            if let Err(e) = child.start_kill() {
                debug!("player \"{}\": kill: {}", self.name, e);
            }
        }
    }

    /// Terminate, reap the child and let the relay drain.
    pub async fn shutdown(mut self) {
        self.terminate();
        self.to_ai = None;
        self.replies = None;
        if let Some(child) = self.child.as_mut() {
            match timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!("player \"{}\" exited: {}", self.name, status),
                Ok(Err(e)) => debug!("player \"{}\": wait: {}", self.name, e),
                Err(_) => warn!("player \"{}\" did not exit after kill", self.name),
            }
        }
        // The relay cannot write while we hold the sink.
        self.sink_turn = None;
        if let Some(relay) = self.relay.take() {
            relay.finish(RELAY_GRACE).await;
        }
    }

    /// Player name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current status.
    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    /// Why the session became terminal, if it has.
    pub fn failure(&self) -> Option<&ProtocolFailure> {
        self.failure.as_ref()
    }

    /// Remaining think time (ms). Negative once overdrawn.
    pub fn time_left(&self) -> i64 {
        self.time_left
    }

    /// A handle that can stop this session's reads from elsewhere.
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill_switch.clone()
    }

    /// OS process id, while the child is running.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Write and flush `text`. Returns `false` if the session became
    /// terminal because the child would not accept input within budget.
    async fn send(&mut self, text: &str) -> bool {
        if let Some(log) = &self.options.input_log {
            if let Err(e) = log.append(text.as_bytes()) {
                warn!("input log write failed: {}", e);
            }
        }
        let budget = self.budget();
        let Some(to_ai) = self.to_ai.as_mut() else {
            return true;
        };

        let started = Instant::now();
        let written = timeout(budget, async {
            to_ai.write_all(text.as_bytes()).await?;
            to_ai.flush().await
        })
        .await;
        match written {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                // Broken pipe: the reply read will find out why.
                debug!("player \"{}\": write: {}", self.name, e);
                true
            }
            Err(_) => {
                self.charge(started);
                self.fail(ProtocolFailure::Timeout);
                false
            }
        }
    }

    /// The one timed wait of a round.
    async fn wait_for_reply<const N: usize>(&mut self, resume: bool) -> ReadOutcome<[i32; N]> {
        // Hand the diagnostic log to the relay while we wait.
        self.sink_turn = None;
        if resume {
            if let Some(hook) = &self.options.resume_command {
                run_hook(HookKind::Resume, &self.name, hook).await;
            }
        }

        let budget = self.budget();
        let started = Instant::now();
        let outcome = match self.replies.as_mut() {
            Some(replies) => replies.read_ints::<N>(budget).await,
            None => ReadOutcome::Closed,
        };
        let spent = self.charge(started);

        self.reclaim_sink().await;
        self.system(format_args!("spend time: {spent}, remain: {}", self.time_left));
        if let Some(hook) = &self.options.pause_command {
            run_hook(HookKind::Pause, &self.name, hook).await;
        }

        if matches!(outcome, ReadOutcome::TimedOut | ReadOutcome::Closed) {
            // Whatever the child writes later must not be read as a reply.
            self.replies = None;
        }
        outcome
    }

    /// Classify a read outcome: timeout, then death, then bad reply.
    ///
    /// `None` means the read was cut short by the kill switch and nothing
    /// should be concluded from it.
    async fn judge<T, R>(
        &mut self,
        outcome: ReadOutcome<T>,
        validate: impl FnOnce(T) -> Result<R, ProtocolFailure>,
    ) -> Option<Result<R, ProtocolFailure>> {
        if self.kill_switch.is_triggered() {
            return None;
        }
        let bad_reply = match outcome {
            ReadOutcome::TimedOut => return Some(Err(ProtocolFailure::Timeout)),
            ReadOutcome::Value(value) => match validate(value) {
                Ok(accepted) => return Some(Ok(accepted)),
                Err(failure) => failure,
            },
            ReadOutcome::ParseError(msg) => {
                self.system(&msg);
                ProtocolFailure::MalformedReply(msg)
            }
            ReadOutcome::Closed => {
                if let Some(exit_code) = self.exit_code(EXIT_GRACE).await {
                    return Some(Err(ProtocolFailure::ProcessTerminated { exit_code }));
                }
                ProtocolFailure::MalformedReply("input stream is closed".to_string())
            }
        };
        match self.exit_code(Duration::ZERO).await {
            Some(exit_code) => Some(Err(ProtocolFailure::ProcessTerminated { exit_code })),
            None => Some(Err(bad_reply)),
        }
    }

    /// `Some(code)` if the child has exited, waiting up to `grace` for it.
    async fn exit_code(&mut self, grace: Duration) -> Option<Option<i32>> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => return Some(status.code()),
            Ok(None) => {}
            Err(e) => {
                debug!("player \"{}\": try_wait: {}", self.name, e);
                return None;
            }
        }
        if grace.is_zero() {
            return None;
        }
        match timeout(grace, child.wait()).await {
            Ok(Ok(status)) => Some(status.code()),
            _ => None,
        }
    }

    fn budget(&self) -> Duration {
        Duration::from_millis(self.time_left.max(0) as u64)
    }

    /// Deduct the time since `started`; returns the milliseconds charged.
    fn charge(&mut self, started: Instant) -> i64 {
        let spent = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX).max(1);
        self.time_left = self.time_left.saturating_sub(spent);
        spent
    }

    async fn reclaim_sink(&mut self) {
        if let Some(sink) = &self.options.diagnostic_log {
            self.sink_turn = sink.take_turn().await;
        }
    }

    fn fail(&mut self, failure: ProtocolFailure) {
        self.status = failure.status();
        warn!("player \"{}\" {} [{}]", self.name, failure, self.status);
        self.system(format_args!("your AI : \"{}\" {}", self.name, failure));
        self.failure = Some(failure);
    }

    fn system(&self, line: impl std::fmt::Display) {
        if let Some(turn) = &self.sink_turn {
            turn.system(line);
        }
    }
}

impl std::fmt::Debug for PlayerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerSession")
            .field("name", &self.name)
            .field("racer", &self.racer)
            .field("time_left", &self.time_left)
            .field("status", &self.status)
            .field("pid", &self.pid())
            .finish()
    }
}
