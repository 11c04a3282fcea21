pub mod cancel;
pub mod config;
pub mod error;
pub mod event;
pub mod loader;
pub mod preferences;
pub mod severity;

pub use cancel::CancellationFlag;
pub use config::Config;
pub use error::*;
pub use event::*;
pub use loader::{CountingReader, JsonLinesLoader, RecordingLoader};
pub use preferences::Preferences;
pub use severity::Severity;
