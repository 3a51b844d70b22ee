//! Segment-addressing blocks: `SegmentBase`, `SegmentList` and
//! `SegmentTemplate`, plus their nested children.
//!
//! Each block parses by layering the element's explicit attributes and
//! children onto an inherited block (see [`crate::merge`]), so a
//! representation can override a single attribute of a period-level template
//! while keeping everything else.

use crate::attr::{self, ByteRange};
use crate::merge::optional_child;
use crate::xml::Element;

/// A URL plus optional byte range pointing at a representation's segment
/// index structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepresentationIndex {
    pub url: Option<String>,
    pub range: Option<ByteRange>,
}

impl RepresentationIndex {
    /// Parses a `RepresentationIndex` tag. A missing `range` attribute
    /// inherits the owning `SegmentBase`'s index range.
    fn from_element(elem: &Element, index_range: Option<ByteRange>) -> Self {
        RepresentationIndex {
            url: attr::string(elem, "sourceURL").ok(),
            range: attr::byte_range(elem, "range").ok().or(index_range),
        }
    }
}

/// Location of a representation's initialization segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Initialization {
    pub url: Option<String>,
    pub range: Option<ByteRange>,
}

impl Initialization {
    fn from_element(elem: &Element) -> Self {
        Initialization {
            url: attr::string(elem, "sourceURL").ok(),
            range: attr::byte_range(elem, "range").ok(),
        }
    }
}

/// Single-segment addressing: the media lives at the base URL and a fetched
/// index structure describes the segments inside it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentBase {
    /// Ticks per second. Must be positive for the block to be usable.
    pub timescale: Option<u64>,
    /// Offset, in ticks, subtracted from every media timestamp.
    pub presentation_time_offset: Option<u64>,
    pub index_range: Option<ByteRange>,
    pub representation_index: Option<RepresentationIndex>,
    pub initialization: Option<Initialization>,
}

impl SegmentBase {
    pub(crate) fn from_element(elem: &Element, inherited: Option<&SegmentBase>) -> Self {
        let mut base = inherited.cloned().unwrap_or_default();

        if let Ok(timescale) = attr::positive_u64(elem, "timescale") {
            base.timescale = Some(timescale);
        }
        if let Ok(offset) = attr::non_negative_u64(elem, "presentationTimeOffset") {
            base.presentation_time_offset = Some(offset);
        }
        if let Ok(range) = attr::byte_range(elem, "indexRange") {
            base.index_range = Some(range);
        }

        // Children after attributes: a RepresentationIndex without its own
        // range falls back to the indexRange in effect on this block.
        if let Some(child) = optional_child(elem, "RepresentationIndex") {
            base.representation_index =
                Some(RepresentationIndex::from_element(child, base.index_range));
        }
        if let Some(child) = optional_child(elem, "Initialization") {
            base.initialization = Some(Initialization::from_element(child));
        }

        base
    }
}

/// One entry of a `SegmentList`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentUrl {
    pub media_url: Option<String>,
    pub media_range: Option<ByteRange>,
}

impl SegmentUrl {
    fn from_element(elem: &Element) -> Self {
        SegmentUrl {
            media_url: attr::string(elem, "media").ok(),
            media_range: attr::byte_range(elem, "mediaRange").ok(),
        }
    }
}

/// Explicit per-segment addressing: one `SegmentURL` child per segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentList {
    pub timescale: Option<u64>,
    pub presentation_time_offset: Option<u64>,
    /// Fixed duration of every segment, in ticks. When absent the list may
    /// address at most one segment.
    pub segment_duration: Option<u64>,
    /// Segment numbering origin. Never zero.
    pub start_number: u64,
    pub initialization: Option<Initialization>,
    pub segment_urls: Vec<SegmentUrl>,
}

impl Default for SegmentList {
    fn default() -> Self {
        SegmentList {
            timescale: None,
            presentation_time_offset: None,
            segment_duration: None,
            start_number: 1,
            initialization: None,
            segment_urls: Vec::new(),
        }
    }
}

impl SegmentList {
    pub(crate) fn from_element(elem: &Element, inherited: Option<&SegmentList>) -> Self {
        let mut list = inherited.cloned().unwrap_or_default();

        if let Ok(timescale) = attr::positive_u64(elem, "timescale") {
            list.timescale = Some(timescale);
        }
        if let Ok(offset) = attr::non_negative_u64(elem, "presentationTimeOffset") {
            list.presentation_time_offset = Some(offset);
        }
        if let Ok(duration) = attr::positive_u64(elem, "duration") {
            list.segment_duration = Some(duration);
        }
        if let Ok(start_number) = attr::positive_u64(elem, "startNumber") {
            list.start_number = start_number;
        }

        if let Some(child) = optional_child(elem, "Initialization") {
            list.initialization = Some(Initialization::from_element(child));
        }

        // Only an element that actually carries SegmentURL children replaces
        // the inherited list; an empty re-declaration keeps it.
        let segment_urls: Vec<SegmentUrl> = elem
            .children("SegmentURL")
            .map(SegmentUrl::from_element)
            .collect();
        if !segment_urls.is_empty() {
            list.segment_urls = segment_urls;
        }

        list
    }
}

/// One `S` entry of a `SegmentTimeline`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimePoint {
    /// Explicit start time in ticks, relative to the period start.
    pub start: Option<u64>,
    /// Duration in ticks. Required for the timeline to expand.
    pub duration: Option<u64>,
    /// Additional repetitions: `r` produces `r + 1` instances.
    pub repeat: Option<u64>,
}

impl TimePoint {
    fn from_element(elem: &Element) -> Self {
        TimePoint {
            start: attr::non_negative_u64(elem, "t").ok(),
            duration: attr::non_negative_u64(elem, "d").ok(),
            repeat: attr::non_negative_u64(elem, "r").ok(),
        }
    }
}

/// An explicit, possibly irregular, list of segment timings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentTimeline {
    pub points: Vec<TimePoint>,
}

impl SegmentTimeline {
    fn from_element(elem: &Element) -> Self {
        SegmentTimeline {
            points: elem.children("S").map(TimePoint::from_element).collect(),
        }
    }
}

/// Template-generated addressing: URLs are produced by substituting
/// `$RepresentationID$`, `$Number$`, `$Bandwidth$` and `$Time$` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTemplate {
    pub timescale: Option<u64>,
    pub presentation_time_offset: Option<u64>,
    /// Fixed duration of every segment, in ticks.
    pub segment_duration: Option<u64>,
    /// Segment numbering origin. Never zero.
    pub start_number: u64,
    pub media_url_template: Option<String>,
    pub index_url_template: Option<String>,
    pub initialization_url_template: Option<String>,
    pub timeline: Option<SegmentTimeline>,
}

impl Default for SegmentTemplate {
    fn default() -> Self {
        SegmentTemplate {
            timescale: None,
            presentation_time_offset: None,
            segment_duration: None,
            start_number: 1,
            media_url_template: None,
            index_url_template: None,
            initialization_url_template: None,
            timeline: None,
        }
    }
}

impl SegmentTemplate {
    pub(crate) fn from_element(elem: &Element, inherited: Option<&SegmentTemplate>) -> Self {
        let mut template = inherited.cloned().unwrap_or_default();

        if let Ok(timescale) = attr::positive_u64(elem, "timescale") {
            template.timescale = Some(timescale);
        }
        if let Ok(offset) = attr::non_negative_u64(elem, "presentationTimeOffset") {
            template.presentation_time_offset = Some(offset);
        }
        if let Ok(duration) = attr::positive_u64(elem, "duration") {
            template.segment_duration = Some(duration);
        }
        if let Ok(start_number) = attr::positive_u64(elem, "startNumber") {
            template.start_number = start_number;
        }
        if let Ok(media) = attr::string(elem, "media") {
            template.media_url_template = Some(media);
        }
        if let Ok(index) = attr::string(elem, "index") {
            template.index_url_template = Some(index);
        }
        if let Ok(initialization) = attr::string(elem, "initialization") {
            template.initialization_url_template = Some(initialization);
        }

        if let Some(child) = optional_child(elem, "SegmentTimeline") {
            template.timeline = Some(SegmentTimeline::from_element(child));
        }

        template
    }
}
