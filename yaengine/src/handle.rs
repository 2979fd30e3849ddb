//! Player-side handle on the engine process

use crate::dashboard::{Dashboard, PlaybackState};
use crate::engine::run_engine;
use crate::error::{EngineError, Result};
use crate::pipeline::ClockPipeline;
use crate::protocol::{EngineCommand, EngineEvent, EngineMessage, EngineRequest, decode, encode};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info, warn};

/// Status reported when the engine output closes unexpectedly
pub const ENGINE_EXITED: &str = "engine process exited";
/// Size of the in-memory pipes of [`InProcessLauncher`]
const DUPLEX_BUFFER: usize = 64 * 1024;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// How to wait for (or force) the end of a launched engine
pub enum EngineExit {
    Process(Child),
    Task(JoinHandle<Result<()>>),
}

impl EngineExit {
    async fn wait(&mut self) {
        match self {
            EngineExit::Process(child) => match child.wait().await {
                Ok(status) => debug!(%status, "Engine process exited"),
                Err(err) => warn!("Cannot wait for engine process: {}", err),
            },
            EngineExit::Task(task) => match task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("Engine task failed: {}", err),
                Err(err) if err.is_cancelled() => {}
                Err(err) => warn!("Engine task join error: {}", err),
            },
        }
    }

    async fn kill(&mut self) {
        match self {
            EngineExit::Process(child) => {
                if let Err(err) = child.kill().await {
                    warn!("Cannot kill engine process: {}", err);
                }
            }
            EngineExit::Task(task) => task.abort(),
        }
    }
}

/// A started engine: its input, its output and how it ends
pub struct LaunchedEngine {
    pub stdin: BoxedWriter,
    pub stdout: BoxedReader,
    pub exit: EngineExit,
}

#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> Result<LaunchedEngine>;
}

/// Runs the engine as a child process speaking on its stdin/stdout
///
/// The child's stderr is forwarded to the tracing log.
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The running executable, with its `engine` sub-command
    pub fn current_exe(extra_args: Vec<String>) -> Result<Self> {
        let program = std::env::current_exe().map_err(EngineError::Launch)?;
        let mut args = vec!["engine".to_string()];
        args.extend(extra_args);
        Ok(Self::new(program, args))
    }
}

#[async_trait]
impl EngineLauncher for ProcessLauncher {
    async fn launch(&self) -> Result<LaunchedEngine> {
        info!(program = %self.program.display(), args = ?self.args, "Launching engine process");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::Launch)?;

        let stdin = child.stdin.take().ok_or(EngineError::NotRunning)?;
        let stdout = child.stdout.take().ok_or(EngineError::NotRunning)?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "yaengine::process", "{}", line);
                }
            });
        }

        Ok(LaunchedEngine {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            exit: EngineExit::Process(child),
        })
    }
}

/// Runs the engine on a task of the current runtime, over in-memory pipes
pub struct InProcessLauncher {
    tick: Duration,
}

impl InProcessLauncher {
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }
}

#[async_trait]
impl EngineLauncher for InProcessLauncher {
    async fn launch(&self) -> Result<LaunchedEngine> {
        let (player_out, engine_in) = tokio::io::duplex(DUPLEX_BUFFER);
        let (engine_out, player_in) = tokio::io::duplex(DUPLEX_BUFFER);
        let tick = self.tick;
        let task = tokio::spawn(async move {
            run_engine(engine_in, engine_out, ClockPipeline::new(), tick).await
        });
        Ok(LaunchedEngine {
            stdin: Box::new(player_out),
            stdout: Box::new(player_in),
            exit: EngineExit::Task(task),
        })
    }
}

/// Commands the engine and mirrors its dashboard
pub struct EngineHandle {
    writer: FramedWrite<BoxedWriter, LinesCodec>,
    dashboard: Dashboard,
    pump: JoinHandle<()>,
    exit: EngineExit,
    shutting_down: Arc<AtomicBool>,
}

impl EngineHandle {
    /// Launches the engine; its events are forwarded to `events`
    pub async fn spawn<T>(
        launcher: &dyn EngineLauncher,
        events: mpsc::UnboundedSender<T>,
    ) -> Result<Self>
    where
        T: From<EngineEvent> + Send + 'static,
    {
        let launched = launcher.launch().await?;
        let dashboard = Dashboard::new();
        let shutting_down = Arc::new(AtomicBool::new(false));
        let pump = tokio::spawn(pump_messages(
            launched.stdout,
            dashboard.clone(),
            shutting_down.clone(),
            events,
        ));

        Ok(Self {
            writer: FramedWrite::new(launched.stdin, LinesCodec::new()),
            dashboard,
            pump,
            exit: launched.exit,
            shutting_down,
        })
    }

    async fn send(&mut self, request: EngineRequest) -> Result<()> {
        let line = encode(&request)?;
        self.writer.send(line).await?;
        Ok(())
    }

    pub async fn command(&mut self, command: EngineCommand) -> Result<()> {
        debug!(?command, "Sending engine command");
        self.send(command.into()).await
    }

    /// Queues the media of the next track
    pub async fn enqueue(&mut self, uri: &str, duration_hint: Option<f64>) -> Result<()> {
        self.send(EngineRequest::Enqueue {
            uri: uri.to_string(),
            duration_hint,
        })
        .await
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    /// Asks the engine to stop and waits at most `timeout` before killing it
    pub async fn shutdown_and_wait(mut self, timeout: Duration) -> Result<()> {
        self.shutting_down.store(true, Ordering::SeqCst);
        if let Err(err) = self.command(EngineCommand::Shutdown).await {
            debug!("Shutdown command not delivered: {}", err);
        }
        let EngineHandle {
            mut writer,
            mut pump,
            mut exit,
            ..
        } = self;
        // closing stdin is a shutdown request too
        let _ = SinkExt::<String>::close(&mut writer).await;
        drop(writer);

        if tokio::time::timeout(timeout, exit.wait()).await.is_err() {
            warn!(timeout_ms = timeout.as_millis() as u64, "Engine did not stop in time, killing it");
            exit.kill().await;
        }
        if tokio::time::timeout(timeout, &mut pump).await.is_err() {
            pump.abort();
        }
        info!("Engine stopped");
        Ok(())
    }
}

/// Reads engine messages until its output closes
async fn pump_messages<T>(
    stdout: BoxedReader,
    dashboard: Dashboard,
    shutting_down: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<T>,
) where
    T: From<EngineEvent> + Send + 'static,
{
    let mut lines = FramedRead::new(stdout, LinesCodec::new());
    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("Cannot read engine output: {}", err);
                break;
            }
        };
        match decode::<EngineMessage>(&line) {
            Ok(EngineMessage::Dashboard { snapshot }) => dashboard.apply(snapshot),
            Ok(EngineMessage::Event { event }) => {
                if let EngineEvent::RepeatToggled(repeat) = event {
                    dashboard.set_repeat(repeat);
                }
                let _ = events.send(T::from(event));
            }
            Err(err) => warn!("Ignoring malformed engine message: {}", err),
        }
    }

    if !shutting_down.load(Ordering::SeqCst) {
        warn!("{}", ENGINE_EXITED);
        if dashboard.mark_exited(ENGINE_EXITED) {
            let _ = events.send(T::from(EngineEvent::StateChanged(PlaybackState::Err)));
        }
    }
}
