//! Process and SSH launch configuration.

use std::path::PathBuf;

/// How to start a child process.
///
/// stdin, stdout and stderr are always piped.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Program to run (or the command line, in shell mode).
    pub program: String,

    /// Arguments after the program.
    pub args: Vec<String>,

    /// Working directory; inherits ours when `None`.
    pub current_dir: Option<PathBuf>,

    /// Extra environment variables.
    pub env: Vec<(String, String)>,

    /// Start from an empty environment instead of inheriting ours.
    pub env_clear: bool,

    /// Run through the platform shell (`sh -c` / `cmd /C`).
    pub shell: bool,
}

impl ProcessConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
            env_clear: false,
            shell: false,
        }
    }

    /// Build from an argument vector; the first element is the program.
    ///
    /// Returns `None` for an empty vector.
    pub fn from_argv<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let program = argv.next()?;
        Some(Self::new(program).args(argv))
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory (default: ours).
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Don't inherit our environment.
    pub fn env_clear(mut self) -> Self {
        self.env_clear = true;
        self
    }

    /// Run the command line through the platform shell (default: false).
    pub fn shell(mut self, shell: bool) -> Self {
        self.shell = shell;
        self
    }

    /// Program and arguments joined into one command line.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys.
    Strict,

    /// Accept and learn unknown keys, reject changed ones.
    AcceptNew,

    /// Accept all keys without checking. Test rigs talk to freshly
    /// provisioned hosts, so this is the default.
    #[default]
    Disabled,
}

impl HostKeyVerification {
    /// Value passed to `-o StrictHostKeyChecking=`.
    pub fn option_value(self) -> &'static str {
        match self {
            HostKeyVerification::Strict => "yes",
            HostKeyVerification::AcceptNew => "accept-new",
            HostKeyVerification::Disabled => "no",
        }
    }
}

/// SSH session run through the system `ssh` client.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// Username to log in as.
    pub username: String,

    /// SSH port; the client default when `None`.
    pub port: Option<u16>,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Remote command; an interactive login shell when empty.
    pub remote_command: Vec<String>,
}

impl SshConfig {
    pub fn new(username: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            port: None,
            host_key_verification: HostKeyVerification::default(),
            remote_command: Vec::new(),
        }
    }

    /// Set the SSH port (default: the client's, usually 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the host key verification mode (default: disabled).
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Run this command instead of a login shell.
    pub fn remote_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remote_command = command.into_iter().map(Into::into).collect();
        self
    }

    /// `user@host` destination.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }

    /// The `ssh` invocation for this session.
    ///
    /// `-t -t` forces a remote tty even though our stdin is a pipe.
    pub fn to_process_config(&self) -> ProcessConfig {
        let mut config = ProcessConfig::new("ssh").args([
            "-t".to_string(),
            "-t".to_string(),
            "-o".to_string(),
            format!(
                "StrictHostKeyChecking={}",
                self.host_key_verification.option_value()
            ),
            self.destination(),
        ]);
        if let Some(port) = self.port {
            config = config.arg("-p").arg(port.to_string());
        }
        config.args(self.remote_command.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_argv_without_port() {
        let config = SshConfig::new("dave", "rig01").to_process_config();
        assert_eq!(config.program, "ssh");
        assert_eq!(
            config.args,
            vec!["-t", "-t", "-o", "StrictHostKeyChecking=no", "dave@rig01"]
        );
    }

    #[test]
    fn test_ssh_argv_with_port_and_command() {
        let config = SshConfig::new("root", "10.0.0.2")
            .port(2222)
            .host_key_verification(HostKeyVerification::AcceptNew)
            .remote_command(["tail", "-f", "/var/log/messages"])
            .to_process_config();
        assert_eq!(
            config.args,
            vec![
                "-t",
                "-t",
                "-o",
                "StrictHostKeyChecking=accept-new",
                "root@10.0.0.2",
                "-p",
                "2222",
                "tail",
                "-f",
                "/var/log/messages",
            ]
        );
    }

    #[test]
    fn test_process_from_argv() {
        let config = ProcessConfig::from_argv(["./companion", "9001"]).unwrap();
        assert_eq!(config.program, "./companion");
        assert_eq!(config.args, vec!["9001"]);
        assert!(ProcessConfig::from_argv(Vec::<String>::new()).is_none());
    }
}
