//! Builder for endpoints.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::Endpoint;
use crate::channel::LineTransform;
use crate::console::ConsoleSink;

static CREATED: AtomicUsize = AtomicUsize::new(0);

#[derive(Clone, Default)]
enum ConsoleChoice {
    #[default]
    Global,
    Sink(Arc<ConsoleSink>),
    Silent,
}

/// Builder for constructing endpoints.
///
/// # Example
///
/// ```rust,no_run
/// use streamwatch::{ConsoleConfig, ConsoleSink, EndpointBuilder, ProcessConfig};
///
/// # async fn example() -> Result<(), streamwatch::Error> {
/// let console = ConsoleSink::start(ConsoleConfig::default());
/// let mut server = EndpointBuilder::new()
///     .name("server")
///     .console(console.clone())
///     .build();
/// server.attach_process(ProcessConfig::new("./server").arg("--verbose"))?;
/// server.watch_for(r"listening on port (\d+)").await?;
/// console.stop().await;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct EndpointBuilder {
    name: Option<String>,
    console: ConsoleChoice,
    transform: Option<LineTransform>,
}

impl EndpointBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint name (default: `watcher:N`).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Print through `console` instead of the shared default sink.
    pub fn console(mut self, console: Arc<ConsoleSink>) -> Self {
        self.console = ConsoleChoice::Sink(console);
        self
    }

    /// Don't print this endpoint's lines anywhere.
    pub fn no_console(mut self) -> Self {
        self.console = ConsoleChoice::Silent;
        self
    }

    /// Rewrite (or drop, by returning `None`) every line before it is queued.
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(String) -> Option<String> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Build the endpoint. Nothing is attached yet.
    ///
    /// Uses [`ConsoleSink::global`] unless a console was chosen.
    pub fn build(self) -> Endpoint {
        let number = CREATED.fetch_add(1, Ordering::Relaxed);
        let name = self.name.unwrap_or_else(|| format!("watcher:{number}"));

        let console = match self.console {
            ConsoleChoice::Global => Some(ConsoleSink::global()),
            ConsoleChoice::Sink(sink) => Some(sink),
            ConsoleChoice::Silent => None,
        };

        Endpoint::new(Arc::from(name), console, self.transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_names_are_unique() {
        let a = EndpointBuilder::new().no_console().build();
        let b = EndpointBuilder::new().no_console().build();
        assert!(a.name().starts_with("watcher:"));
        assert!(b.name().starts_with("watcher:"));
        assert_ne!(a.name(), b.name());
    }

    #[tokio::test]
    async fn test_explicit_name() {
        let endpoint = EndpointBuilder::new().name("proc").no_console().build();
        assert_eq!(endpoint.name(), "proc");
        assert!(!endpoint.is_attached());
    }
}
