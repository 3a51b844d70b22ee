use thiserror::Error;

/// Reasons a representation's segment index cannot be built. The processor
/// logs these and drops the representation; they never abort a whole run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("segment information has no timescale")]
    MissingTimescale,

    #[error("SegmentBase has neither an index range nor a RepresentationIndex with a range")]
    MissingIndexMetadata,

    #[error("no base URL is known for the representation")]
    MissingBaseUrl,

    #[error("a SegmentList without a segment duration can only have one segment")]
    AmbiguousSegmentList,

    #[error("SegmentTemplate has no media URL template")]
    MissingMediaTemplate,

    #[error("SegmentTemplate has no index URL template, timeline, or segment duration")]
    EmptySegmentTemplate,

    #[error("SegmentTimeline S element has no duration")]
    TimePointWithoutDuration,

    #[error("the period's start time is unknown")]
    UnknownPeriodStart,

    #[error("the period's duration is unknown")]
    UnknownPeriodDuration,

    #[error("segment availability for live presentations is not supported with a fixed segment duration")]
    LiveNotSupported,

    #[error("representation carries no segment information")]
    MissingSegmentInfo,
}
