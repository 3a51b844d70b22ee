// DASH MPD manifest parsing
pub mod adaptation;
pub mod attr;
pub mod error;
mod merge;
pub mod presentation;
pub mod segment_info;
pub mod xml;

// Export common types for ease of use
pub use adaptation::{AdaptationSet, ContentComponent, Representation, Role};
pub use attr::ByteRange;
pub use error::MpdError;
pub use presentation::{Mpd, Period, PresentationType};
pub use segment_info::{
    Initialization, RepresentationIndex, SegmentBase, SegmentList, SegmentTemplate,
    SegmentTimeline, SegmentUrl, TimePoint,
};

/// Parses a manifest document.
///
/// `manifest_url` is the URL the document was fetched from; it seeds the
/// base URL used to resolve relative references when the manifest carries
/// no `BaseURL` of its own.
pub fn parse_mpd(xml: &str, manifest_url: &str) -> Result<Mpd, MpdError> {
    let root = xml::parse_document(xml)?;
    if root.name() != "MPD" {
        return Err(MpdError::UnexpectedRoot {
            found: root.name().to_string(),
        });
    }
    Ok(Mpd::from_element(&root, manifest_url))
}
