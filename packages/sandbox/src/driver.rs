// ABOUTME: Docker driver implementation using bollard over a fixed unix socket
// ABOUTME: Applies the mandatory security constraints to every container it creates

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    RestartContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::ContainerStateStatusEnum;
use bollard::Docker;
use futures::StreamExt;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use botdock_models::{BotRuntime, BotStatus};
use botdock_runtimes::runtime_config;

use crate::{Result, SandboxError};

/// The one place the platform dials Docker. A fixed socket, on purpose:
/// honoring DOCKER_HOST here would let ambient configuration redirect
/// sandbox creation to an arbitrary endpoint.
const DOCKER_SOCKET: &str = "unix:///var/run/docker.sock";

const CONNECT_TIMEOUT_SECS: u64 = 120;
const PULL_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_GRACE_SECS: i64 = 10;
const DEFAULT_TAIL_LINES: usize = 100;
const CPU_PERIOD_MICROS: i64 = 100_000;

const LABEL_BOT_ID: &str = "botdock.bot_id";
const LABEL_MANAGED: &str = "botdock.managed";

/// Everything needed to create a sandbox for one bot
#[derive(Debug, Clone)]
pub struct CreateSpec<'a> {
    pub bot_id: i64,
    pub runtime: BotRuntime,
    pub start_cmd: Option<&'a str>,
    /// Decimal fraction of one core, from the owner's plan
    pub cpu_limit: &'a str,
    /// Human-readable memory cap, from the owner's plan
    pub ram_limit: &'a str,
    /// Host directory with the bot's source, mounted read-only
    pub artifact_dir: &'a Path,
}

/// Live log line stream from a sandbox. Ends when the container exits or
/// the receiver is dropped.
pub struct LogStream {
    pub receiver: tokio::sync::mpsc::UnboundedReceiver<Result<String>>,
}

/// Defensive facade over the host Docker daemon.
///
/// The client is dialed lazily, once, and shared across all callers.
pub struct SandboxDriver {
    client: OnceCell<Docker>,
}

impl Default for SandboxDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxDriver {
    pub fn new() -> Self {
        Self {
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&Docker> {
        self.client
            .get_or_try_init(|| async {
                if std::env::var_os("DOCKER_HOST").is_some() {
                    warn!("Ignoring DOCKER_HOST; sandboxes always use {}", DOCKER_SOCKET);
                }

                let client = Docker::connect_with_unix(
                    DOCKER_SOCKET,
                    CONNECT_TIMEOUT_SECS,
                    bollard::API_DEFAULT_VERSION,
                )
                .map_err(|e| SandboxError::Connection(e.to_string()))?;

                info!("Docker client connected via {}", DOCKER_SOCKET);
                Ok(client)
            })
            .await
    }

    /// Create a container for a bot with the mandatory security constraints.
    /// Pulls the base image if it is not present. Returns the opaque handle.
    pub async fn create(&self, spec: CreateSpec<'_>) -> Result<String> {
        let client = self.client().await?;
        let runtime = runtime_config(spec.runtime);

        if !self.image_exists(runtime.image).await? {
            self.pull_image(runtime.image).await?;
        }

        let command = shell_command(runtime.build_cmd, runtime.default_start, spec.start_cmd);
        let cpu_quota = cpu_quota_micros(spec.cpu_limit)?;
        let memory = parse_ram_limit(spec.ram_limit)?;

        let mut labels = HashMap::new();
        labels.insert(LABEL_BOT_ID.to_string(), spec.bot_id.to_string());
        labels.insert(LABEL_MANAGED.to_string(), "true".to_string());

        // Source mounted read-only; all capabilities dropped; no privilege
        // escalation; bridge network only; CPU and memory capped by plan
        let host_config = bollard::models::HostConfig {
            binds: Some(vec![format!(
                "{}:{}:ro",
                spec.artifact_dir.display(),
                runtime.working_dir
            )]),
            cap_drop: Some(vec!["ALL".to_string()]),
            privileged: Some(false),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            network_mode: Some("bridge".to_string()),
            cpu_period: Some(CPU_PERIOD_MICROS),
            cpu_quota: Some(cpu_quota),
            memory: Some(memory),
            ..Default::default()
        };

        let config = Config {
            image: Some(runtime.image.to_string()),
            cmd: Some(vec!["sh".to_string(), "-c".to_string(), command]),
            working_dir: Some(runtime.working_dir.to_string()),
            labels: Some(labels),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: format!("bot-{}", spec.bot_id),
            platform: None,
        };

        let container = client
            .create_container(Some(options), config)
            .await
            .map_err(|e| SandboxError::Create(e.to_string()))?;

        info!("Created container {} for bot {}", container.id, spec.bot_id);
        Ok(container.id)
    }

    pub async fn start(&self, handle: &str) -> Result<()> {
        let client = self.client().await?;
        client
            .start_container(handle, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| map_missing(e, handle))?;

        info!("Started container {}", handle);
        Ok(())
    }

    /// Stop with a graceful timeout, after which Docker force-kills
    pub async fn stop(&self, handle: &str, grace_secs: Option<i64>) -> Result<()> {
        let client = self.client().await?;
        let options = StopContainerOptions {
            t: grace_secs.unwrap_or(DEFAULT_GRACE_SECS),
        };

        client
            .stop_container(handle, Some(options))
            .await
            .map_err(|e| map_missing(e, handle))?;

        info!("Stopped container {}", handle);
        Ok(())
    }

    pub async fn restart(&self, handle: &str, grace_secs: Option<i64>) -> Result<()> {
        let client = self.client().await?;
        let options = RestartContainerOptions {
            t: grace_secs.unwrap_or(DEFAULT_GRACE_SECS) as isize,
        };

        client
            .restart_container(handle, Some(options))
            .await
            .map_err(|e| map_missing(e, handle))?;

        info!("Restarted container {}", handle);
        Ok(())
    }

    /// Remove a container. A container that is already gone counts as
    /// removed.
    pub async fn remove(&self, handle: &str, force: bool) -> Result<()> {
        let client = self.client().await?;
        let options = RemoveContainerOptions {
            force,
            v: true,
            ..Default::default()
        };

        match client.remove_container(handle, Some(options)).await {
            Ok(()) => {
                info!("Removed container {}", handle);
                Ok(())
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                warn!("Container {} not found (already removed?)", handle);
                Ok(())
            }
            Err(e) => Err(SandboxError::Op(e.to_string())),
        }
    }

    /// Observed bot status for a container. A missing container reads as
    /// STOPPED.
    pub async fn status(&self, handle: &str) -> Result<BotStatus> {
        let client = self.client().await?;

        let inspect = match client.inspect_container(handle, None).await {
            Ok(inspect) => inspect,
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => return Ok(BotStatus::Stopped),
            Err(e) => return Err(SandboxError::Op(e.to_string())),
        };

        let state = inspect.state.unwrap_or_default();
        Ok(map_container_state(state.status, state.exit_code))
    }

    /// Last `tail` lines of container output as one blob, stdout and stderr
    /// interleaved, invalid UTF-8 replaced
    pub async fn tail_logs(&self, handle: &str, tail: Option<usize>) -> Result<String> {
        let client = self.client().await?;
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: false,
            tail: tail.unwrap_or(DEFAULT_TAIL_LINES).to_string(),
            ..Default::default()
        };

        let mut stream = client.logs(handle, Some(options));
        let mut output = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(log) => output.extend_from_slice(&log_bytes(&log)),
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                }) => return Err(SandboxError::Missing(handle.to_string())),
                Err(e) => return Err(SandboxError::Op(e.to_string())),
            }
        }

        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    /// Follow container output as a lazy stream of decoded lines, starting
    /// from now. The pump stops when the container exits, the stream
    /// errors, or the receiver is dropped.
    pub async fn follow_logs(&self, handle: &str) -> Result<LogStream> {
        let client = self.client().await?.clone();
        let handle = handle.to_string();

        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: true,
            tail: "0".to_string(),
            ..Default::default()
        };

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut stream = client.logs(&handle, Some(options));
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(item) = stream.next().await {
                match item {
                    Ok(log) => {
                        for line in split_log_lines(&mut buffer, &log_bytes(&log)) {
                            if tx.send(Ok(line)).is_err() {
                                debug!("Log subscriber for {} went away", handle);
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        error!("Error streaming logs for {}: {}", handle, e);
                        let _ = tx.send(Err(SandboxError::Op(e.to_string())));
                        return;
                    }
                }
            }

            if !buffer.is_empty() {
                let _ = tx.send(Ok(String::from_utf8_lossy(&buffer).into_owned()));
            }
        });

        Ok(LogStream { receiver: rx })
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        let client = self.client().await?;
        match client.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(SandboxError::Op(e.to_string())),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let client = self.client().await?;
        info!("Pulling image {}", image);

        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let pull = async {
            let mut stream = client.create_image(Some(options), None, None);
            while let Some(item) = stream.next().await {
                let progress = item.map_err(|e| {
                    SandboxError::Create(format!("Failed to pull image {}: {}", image, e))
                })?;
                if let Some(err) = progress.error {
                    return Err(SandboxError::Create(format!(
                        "Failed to pull image {}: {}",
                        image, err
                    )));
                }
            }
            Ok(())
        };

        match tokio::time::timeout(PULL_TIMEOUT, pull).await {
            Ok(result) => result,
            Err(_) => Err(SandboxError::Create(format!(
                "Timeout pulling image {} after {:?}",
                image, PULL_TIMEOUT
            ))),
        }
    }
}

fn map_missing(e: bollard::errors::Error, handle: &str) -> SandboxError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => SandboxError::Missing(handle.to_string()),
        other => SandboxError::Op(other.to_string()),
    }
}

fn log_bytes(log: &LogOutput) -> Vec<u8> {
    match log {
        LogOutput::StdOut { message }
        | LogOutput::StdErr { message }
        | LogOutput::Console { message }
        | LogOutput::StdIn { message } => message.to_vec(),
    }
}

/// The container entry line: run the runtime's build step (failures
/// tolerated, output folded into the log), then the start command. The
/// start command has already passed the injection deny-list.
fn shell_command(build_cmd: &str, default_start: &str, user_start: Option<&str>) -> String {
    let start = match user_start {
        Some(cmd) if !cmd.is_empty() => cmd,
        _ => default_start,
    };
    format!("{} 2>&1 || true && {}", build_cmd, start)
}

/// CPU quota in microseconds per 100ms period, from a plan's decimal core
/// fraction (e.g. "0.5" -> 50000)
fn cpu_quota_micros(cpu_limit: &str) -> Result<i64> {
    let share: f64 = cpu_limit
        .trim()
        .parse()
        .map_err(|_| SandboxError::Create(format!("Invalid CPU limit: {}", cpu_limit)))?;
    if !share.is_finite() || share <= 0.0 {
        return Err(SandboxError::Create(format!(
            "Invalid CPU limit: {}",
            cpu_limit
        )));
    }
    Ok((share * CPU_PERIOD_MICROS as f64).round() as i64)
}

/// Memory cap in bytes from a plan's human-readable size ("256m", "1g")
fn parse_ram_limit(ram_limit: &str) -> Result<i64> {
    let s = ram_limit.trim().to_lowercase();
    let (digits, multiplier) = match s.chars().last() {
        Some('k') => (&s[..s.len() - 1], 1024i64),
        Some('m') => (&s[..s.len() - 1], 1024 * 1024),
        Some('g') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s.as_str(), 1),
    };

    let value: i64 = digits
        .parse()
        .map_err(|_| SandboxError::Create(format!("Invalid RAM limit: {}", ram_limit)))?;
    if value <= 0 {
        return Err(SandboxError::Create(format!(
            "Invalid RAM limit: {}",
            ram_limit
        )));
    }
    Ok(value * multiplier)
}

/// Map a container state to the user-visible bot status. Exited and dead
/// containers crashed iff the exit code is non-zero; anything unknown or
/// missing reads as stopped.
fn map_container_state(
    status: Option<ContainerStateStatusEnum>,
    exit_code: Option<i64>,
) -> BotStatus {
    match status {
        Some(ContainerStateStatusEnum::RUNNING) => BotStatus::Running,
        Some(ContainerStateStatusEnum::CREATED) => BotStatus::Created,
        Some(ContainerStateStatusEnum::EXITED) | Some(ContainerStateStatusEnum::DEAD) => {
            if exit_code.unwrap_or(0) != 0 {
                BotStatus::Crashed
            } else {
                BotStatus::Stopped
            }
        }
        _ => BotStatus::Stopped,
    }
}

/// Append a chunk to the carry buffer and drain every complete line,
/// decoding lossily. Container output can split lines across chunks.
fn split_log_lines(buffer: &mut Vec<u8>, chunk: &[u8]) -> Vec<String> {
    buffer.extend_from_slice(chunk);

    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let rest = buffer.split_off(pos + 1);
        let mut line = std::mem::replace(buffer, rest);
        line.pop(); // trailing newline
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        lines.push(String::from_utf8_lossy(&line).into_owned());
    }
    lines
}
