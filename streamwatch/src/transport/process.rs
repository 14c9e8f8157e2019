//! Subprocess connections.

use std::process::Stdio;

use log::debug;
use tokio::process::Command;

use super::config::ProcessConfig;
use super::{Connection, InputSink};
use crate::error::{Result, TransportError};

/// Spawn the process described by `config` with all three stdio streams
/// piped.
///
/// The returned connection has `stdout` and `stderr` outputs and carries
/// the child so the endpoint can track its exit. The child is killed if its
/// handle is dropped while it still runs.
pub fn spawn(config: &ProcessConfig) -> Result<Connection> {
    let mut cmd = build_command(config);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| TransportError::Spawn {
        program: config.program.clone(),
        source,
    })?;
    debug!("spawned '{}' (pid {:?})", config.command_line(), child.id());

    let mut connection = Connection::new();
    if let Some(stdin) = child.stdin.take() {
        connection = connection.with_input(InputSink::Process(stdin));
    }
    if let Some(stdout) = child.stdout.take() {
        connection = connection.with_named_output("stdout", stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        connection = connection.with_named_output("stderr", stderr);
    }

    Ok(connection.with_child(child))
}

fn build_command(config: &ProcessConfig) -> Command {
    let mut cmd = if config.shell {
        shell_command(&config.command_line())
    } else {
        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args);
        cmd
    };

    if config.env_clear {
        cmd.env_clear();
    }
    cmd.envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    if let Some(dir) = &config.current_dir {
        cmd.current_dir(dir);
    }
    cmd
}

#[cfg(unix)]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(line);
    cmd
}

#[cfg(not(unix))]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(line);
    cmd
}
