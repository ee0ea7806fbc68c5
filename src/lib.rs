//! Segmented HTTP downloader.
//!
//! A resource is split into byte ranges that are fetched concurrently into
//! part files, then merged into the output file. The partition can be saved
//! as a short text blob and restored later to resume an interrupted download.

pub mod codec;
pub mod engine;
pub mod error;
pub mod http;
pub mod part;
pub mod progress;

pub use engine::{DownloadEngine, DownloadOutcome, EngineConfig};
pub use error::{DownloadError, Result, TransportError};
pub use http::{ByteStream, HttpClient, ReqwestClient};
pub use part::PartData;
pub use progress::{DownloadPhase, ProgressEvent};
