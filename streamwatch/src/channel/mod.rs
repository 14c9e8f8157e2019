//! Line queues and the pattern search that consumes them.
//!
//! Each attached stream gets a [`LineQueue`]: a worker task turning the
//! raw source into timestamped [`Record`]s. [`search_once`] is one drain
//! pass of the watch protocol over such a queue.

mod queue;
mod record;
mod search;

pub use queue::{LineQueue, LineTransform};
pub use record::{EOF_MARKER, Line, Record};
pub use search::{WatchMatch, search_once};
