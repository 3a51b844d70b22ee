//! The output model handed to a playback engine: periods of stream sets,
//! each stream carrying a segment index with fetchable references.

/// One resolved, fetchable media segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentReference {
    /// Start time in timescale ticks, as used by `$Time$` substitution.
    pub start_time_ticks: u64,
    /// Start time in seconds.
    pub start_time: u64,
    /// End time in seconds. `None` means the segment runs to the end of the
    /// stream.
    pub end_time: Option<u64>,
    /// Position of the segment's first byte.
    pub start_byte: u64,
    /// Position of the segment's last byte, inclusive. `None` means the
    /// segment runs to the end of the resource.
    pub end_byte: Option<u64>,
    pub url: String,
}

/// An ordered list of segment references, ascending in start time with no
/// gaps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentIndex {
    references: Vec<SegmentReference>,
}

impl SegmentIndex {
    pub fn new(references: Vec<SegmentReference>) -> Self {
        SegmentIndex { references }
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn last(&self) -> Option<&SegmentReference> {
        self.references.last()
    }

    pub fn references(&self) -> &[SegmentReference] {
        &self.references
    }
}

/// Location of an out-of-band structure (a segment index or an
/// initialization segment): a URL plus an optional byte range into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentMetadataInfo {
    pub url: String,
    pub start_byte: u64,
    pub end_byte: Option<u64>,
}

/// One playable rendition of a stream set's content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamInfo {
    /// Processor-assigned id, unique within one processing run.
    pub unique_id: u32,
    /// The representation id from the manifest.
    pub id: Option<String>,
    /// Offset, in seconds, to apply to each timestamp within each media
    /// segment put in buffer.
    pub timestamp_offset: i64,
    /// Start time of the stream's current segment, i.e. its live edge. Set
    /// only for live streams that are available.
    pub current_segment_start_time: Option<u64>,
    pub bandwidth: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mime_type: Option<String>,
    pub codecs: Option<String>,
    pub media_url: Option<String>,
    /// Where to fetch the stream's segment index structure, for strategies
    /// that resolve references lazily.
    pub segment_index_info: Option<SegmentMetadataInfo>,
    pub segment_initialization_info: Option<SegmentMetadataInfo>,
    pub segment_index: Option<SegmentIndex>,
}

/// A group of interchangeable streams, one per representation that
/// survived validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSetInfo {
    /// Processor-assigned id, unique within one processing run.
    pub unique_id: u32,
    /// The adaptation set id from the manifest.
    pub id: Option<String>,
    pub content_type: Option<String>,
    pub lang: Option<String>,
    pub main: bool,
    pub streams: Vec<StreamInfo>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodInfo {
    pub id: Option<String>,
    /// Start, in seconds, on the presentation timeline.
    pub start: u64,
    /// Duration in seconds. `None` only when it could not be inferred from
    /// any stream's segment references.
    pub duration: Option<u64>,
    pub stream_sets: Vec<StreamSetInfo>,
}

/// Everything a playback engine needs to schedule segment fetches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestInfo {
    pub live: bool,
    /// Seconds of media to buffer before playback begins.
    pub min_buffer_time: u64,
    pub periods: Vec<PeriodInfo>,
}
