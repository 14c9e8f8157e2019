//! Shell example: drive a local `sh` through an endpoint
//!
//! Starts a shell, runs a few commands, waits for their output and shuts
//! the shell down, with everything echoed to the shared console.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example shell_session
//! ```
//!
//! Set `WATCHER_NOCOLOR=1` to disable colors, `RUST_LOG=debug` for library logs.

use std::time::Duration;

use streamwatch::{ConsoleSink, Endpoint, ProcessConfig, WatchOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut shell = Endpoint::named("shell");
    shell.attach_process(ProcessConfig::new("sh"))?;

    shell.send("uname -s").await?;
    let found = shell.watch_for(r"^(Linux|Darwin|\w+BSD)$").await?;
    let system = found.get(1).unwrap_or("unknown").to_string();

    // stderr gets its own queue
    shell.send("ls /definitely/not/here").await?;
    shell
        .watch_for_with(r"No such file", &WatchOptions::new().stderr())
        .await?;

    // a fail pattern stops the search on the error message
    shell.send_parts(["echo", "  step one  ", "done"]).await?;
    let options = WatchOptions::new()
        .timeout(Duration::from_secs(2))
        .fail_pattern(r"command not found");
    shell.watch_for_with(r"step one done", &options).await?;

    shell.send("exit 7").await?;
    let code = shell.wait_done(Some(Duration::from_secs(5))).await?;

    ConsoleSink::global().stop().await;
    println!("\n{system} shell exited with status {code}");
    Ok(())
}
