// Turns a parsed MPD into a flat, playback-ready manifest
pub mod error;
mod index;
pub mod manifest;
pub mod processor;
pub mod template;

// Export common types for ease of use
pub use error::BuildError;
pub use manifest::{
    ManifestInfo, PeriodInfo, SegmentIndex, SegmentMetadataInfo, SegmentReference, StreamInfo,
    StreamSetInfo,
};
pub use processor::MpdProcessor;
pub use template::{fill_url_template, resolve_url};
