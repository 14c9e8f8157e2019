//! SSH example: run commands on a remote host through the `ssh` client
//!
//! # Prerequisites
//!
//! - OpenSSH client on `PATH`
//! - Key-based login to the target (there is no password prompt handling)
//!
//! # Usage
//!
//! ```bash
//! cargo run --example ssh_session -- --host 192.168.1.1 --user admin
//! ```

use std::env;
use std::time::Duration;

use streamwatch::{ConsoleSink, Endpoint, HostKeyVerification, SshConfig, WatchOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = SshConfig::new(&args.user, &args.host);
    if let Some(port) = args.port {
        config = config.port(port);
    }
    if args.strict {
        config = config.host_key_verification(HostKeyVerification::Strict);
    }

    let mut remote = Endpoint::named(args.host.clone());
    remote.attach_ssh(&config)?;

    let options = WatchOptions::new()
        .timeout(Duration::from_secs(args.timeout))
        .fail_patterns(["Permission denied", "Connection refused", "Could not resolve"]);

    remote.send("echo __ready__").await?;
    remote.watch_for_with(r"^__ready__$", &options).await?;

    remote.send("uname -a; echo __done__").await?;
    remote.watch_for_with(r"^__done__$", &options).await?;

    remote.send("exit").await?;
    let code = remote.wait_done(Some(Duration::from_secs(args.timeout))).await?;

    ConsoleSink::global().stop().await;
    println!("\nssh exited with status {code}");
    Ok(())
}

/// Simple argument parser
struct Args {
    host: String,
    port: Option<u16>,
    user: String,
    strict: bool,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut port = None;
        let mut user = env::var("USER").unwrap_or_else(|_| "root".to_string());
        let mut strict = false;
        let mut timeout = 30u64;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    i += 1;
                    if i < args.len() {
                        host = args[i].clone();
                    }
                }
                "--port" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        port = args[i].parse().ok();
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() {
                        user = args[i].clone();
                    }
                }
                "--strict" => strict = true,
                "--timeout" | "-t" => {
                    i += 1;
                    if i < args.len() {
                        timeout = args[i].parse().unwrap_or(30);
                    }
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                }
            }
            i += 1;
        }

        Self {
            host,
            port,
            user,
            strict,
            timeout,
        }
    }

    fn print_help() {
        println!(
            r#"streamwatch ssh_session example

USAGE:
    cargo run --example ssh_session -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Target host [default: localhost]
    -p, --port <PORT>        SSH port [default: ssh client default]
    -u, --user <USER>        Username [default: $USER]
    --strict                 Verify host keys against known_hosts
    -t, --timeout <SECS>     Per-step timeout [default: 30]
    --help                   Print this help message
"#
        );
    }
}
