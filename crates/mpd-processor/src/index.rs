//! Builds a stream's segment index from its resolved segment-addressing
//! block. One strategy is attempted per representation; failure drops only
//! that representation.

use mpd::{
    ByteRange, Initialization, Mpd, Period, PresentationType, Representation, SegmentBase,
    SegmentList, SegmentTemplate, SegmentTimeline,
};
use tracing::{debug, warn};

use crate::error::BuildError;
use crate::manifest::{SegmentIndex, SegmentMetadataInfo, SegmentReference, StreamInfo};
use crate::template::{fill_url_template, resolve_url};

/// A gap or overlap within a `SegmentTimeline` at or above this size, in
/// seconds, is logged as a content defect.
const GAP_OVERLAP_WARNING_THRESHOLD: f64 = 1.0 / 32.0;

/// One expanded timeline entry, in timescale ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimelineEntry {
    pub start: u64,
    pub end: u64,
}

fn metadata_info(url: Option<&str>, range: Option<&ByteRange>) -> SegmentMetadataInfo {
    SegmentMetadataInfo {
        url: url.unwrap_or("").to_string(),
        start_byte: range.map_or(0, |r| r.begin),
        end_byte: range.map(|r| r.end),
    }
}

fn initialization_info(initialization: &Initialization) -> SegmentMetadataInfo {
    metadata_info(initialization.url.as_deref(), initialization.range.as_ref())
}

/// Offset applied to every in-segment timestamp so the first segment aligns
/// with the start of its period.
fn timestamp_offset(presentation_time_offset: Option<u64>, timescale: u64) -> i64 {
    match presentation_time_offset {
        Some(offset) => -((offset / timescale) as i64),
        None => 0,
    }
}

/// Builds from a `SegmentBase`: the index structure at the base URL is
/// fetched and parsed later, so only its location is recorded here.
pub(crate) fn from_segment_base(
    segment_base: &SegmentBase,
    base_url: Option<&str>,
    stream: &mut StreamInfo,
) -> Result<(), BuildError> {
    let timescale = segment_base.timescale.ok_or(BuildError::MissingTimescale)?;

    let has_index_metadata = segment_base.index_range.is_some()
        || segment_base
            .representation_index
            .as_ref()
            .is_some_and(|index| index.range.is_some());
    if !has_index_metadata {
        return Err(BuildError::MissingIndexMetadata);
    }
    let media_url = base_url.ok_or(BuildError::MissingBaseUrl)?;

    stream.timestamp_offset = timestamp_offset(segment_base.presentation_time_offset, timescale);
    stream.media_url = Some(media_url.to_string());

    // Without an explicit RepresentationIndex the index lives inside the
    // media resource itself, at the indexRange offsets.
    stream.segment_index_info = Some(match &segment_base.representation_index {
        Some(index) => metadata_info(index.url.as_deref(), index.range.as_ref()),
        None => metadata_info(Some(media_url), segment_base.index_range.as_ref()),
    });
    stream.segment_initialization_info =
        segment_base.initialization.as_ref().map(initialization_info);

    Ok(())
}

/// Builds from a `SegmentList`: one reference per `SegmentURL`, in document
/// order.
pub(crate) fn from_segment_list(
    segment_list: &SegmentList,
    stream: &mut StreamInfo,
) -> Result<(), BuildError> {
    let timescale = segment_list.timescale.ok_or(BuildError::MissingTimescale)?;

    if segment_list.segment_duration.is_none() && segment_list.segment_urls.len() > 1 {
        return Err(BuildError::AmbiguousSegmentList);
    }

    stream.segment_initialization_info =
        segment_list.initialization.as_ref().map(initialization_info);

    let mut references = Vec::with_capacity(segment_list.segment_urls.len());
    let mut last_end_ticks = 0;

    for segment_url in &segment_list.segment_urls {
        let start_ticks = last_end_ticks;
        // Without a duration the single allowed segment is open-ended.
        let end_ticks = segment_list
            .segment_duration
            .map(|duration| start_ticks + duration);
        last_end_ticks = end_ticks.unwrap_or(start_ticks);

        references.push(SegmentReference {
            start_time_ticks: start_ticks,
            start_time: start_ticks / timescale,
            end_time: end_ticks.map(|end| end / timescale),
            start_byte: segment_url.media_range.map_or(0, |range| range.begin),
            end_byte: segment_url.media_range.map(|range| range.end),
            url: segment_url.media_url.clone().unwrap_or_default(),
        });
    }

    debug!(segments = references.len(), "generated segment index from SegmentList");
    stream.segment_index = Some(SegmentIndex::new(references));

    Ok(())
}

/// Builds from a `SegmentTemplate`, preferring an explicit index URL
/// template, then a `SegmentTimeline`, then a fixed segment duration.
pub(crate) fn from_segment_template(
    mpd: &Mpd,
    period: &Period,
    representation: &Representation,
    template: &SegmentTemplate,
    stream: &mut StreamInfo,
) -> Result<(), BuildError> {
    if template.index_url_template.is_some() {
        if template.timeline.is_some() {
            warn!("ignoring SegmentTimeline because an explicit segment index URL was provided");
        }
        if template.segment_duration.is_some() {
            warn!("ignoring segment duration because an explicit segment index URL was provided");
        }
        from_index_url_template(representation, template, stream)
    } else if let Some(timeline) = &template.timeline {
        if template.segment_duration.is_some() {
            warn!("ignoring segment duration because a SegmentTimeline was provided");
        }
        from_segment_timeline(mpd, period, representation, template, timeline, stream)
    } else if let Some(duration) = template.segment_duration {
        from_segment_duration(mpd, period, representation, template, duration, stream)
    } else {
        Err(BuildError::EmptySegmentTemplate)
    }
}

/// The template names an out-of-band segment index, so references are
/// resolved lazily just as with `SegmentBase`.
fn from_index_url_template(
    representation: &Representation,
    template: &SegmentTemplate,
    stream: &mut StreamInfo,
) -> Result<(), BuildError> {
    let timescale = template.timescale.ok_or(BuildError::MissingTimescale)?;
    let base_url = representation.base_url.as_deref();

    // With no timeline only one media URL exists: $Number$ is 1, $Time$ 0.
    stream.media_url = match &template.media_url_template {
        Some(media_template) => {
            let filled = fill_url_template(
                media_template,
                representation.id.as_deref(),
                1,
                representation.bandwidth,
                0,
            );
            Some(resolve_url(base_url, &filled))
        }
        None => representation.base_url.clone(),
    };

    // $Number$ and $Time$ may not legitimately appear in an index template.
    let index_template = template
        .index_url_template
        .as_deref()
        .ok_or(BuildError::EmptySegmentTemplate)?;
    let filled = fill_url_template(
        index_template,
        representation.id.as_deref(),
        0,
        representation.bandwidth,
        0,
    );
    stream.segment_index_info = Some(SegmentMetadataInfo {
        url: resolve_url(base_url, &filled),
        start_byte: 0,
        end_byte: None,
    });

    if template.initialization_url_template.is_some() {
        stream.segment_initialization_info = Some(generate_initialization(representation, template)?);
    }

    stream.timestamp_offset = timestamp_offset(template.presentation_time_offset, timescale);

    Ok(())
}

/// Expands a `SegmentTimeline` into contiguous `(start, end)` tick pairs.
///
/// Every emitted pair is adjacent to its successor: when a point declares an
/// explicit start that disagrees with the running end, the previous entry's
/// end is stretched or compressed to meet it, and the discrepancy is logged
/// when it reaches [`GAP_OVERLAP_WARNING_THRESHOLD`].
pub(crate) fn expand_timeline(
    timeline: &SegmentTimeline,
    timescale: u64,
) -> Result<Vec<TimelineEntry>, BuildError> {
    let mut entries: Vec<TimelineEntry> = Vec::new();
    let mut last_end = 0;

    for (i, point) in timeline.points.iter().enumerate() {
        let duration = point.duration.ok_or(BuildError::TimePointWithoutDuration)?;
        let repeat = point.repeat.unwrap_or(0);

        for j in 0..=repeat {
            let start = match point.start {
                // An explicit start only applies to a point's first instance.
                Some(start) if j == 0 => start,
                _ if i == 0 && j == 0 => 0,
                _ => last_end,
            };

            if let Some(previous) = entries.last_mut()
                && start != last_end
            {
                let delta = start as i64 - last_end as i64;
                if (delta as f64 / timescale as f64).abs() >= GAP_OVERLAP_WARNING_THRESHOLD {
                    warn!(
                        gap_ticks = delta,
                        "SegmentTimeline contains a large gap/overlap, the content may have errors"
                    );
                }
                // Stretch/compress the previous segment's end rather than
                // moving this one's start, which would break $Time$.
                previous.end = start;
            }

            last_end = start + duration;
            entries.push(TimelineEntry {
                start,
                end: last_end,
            });
        }
    }

    Ok(entries)
}

fn from_segment_timeline(
    mpd: &Mpd,
    period: &Period,
    representation: &Representation,
    template: &SegmentTemplate,
    timeline: &SegmentTimeline,
    stream: &mut StreamInfo,
) -> Result<(), BuildError> {
    if period.start.is_none() {
        return Err(BuildError::UnknownPeriodStart);
    }
    let timescale = template.timescale.ok_or(BuildError::MissingTimescale)?;
    let media_template = template
        .media_url_template
        .as_deref()
        .ok_or(BuildError::MissingMediaTemplate)?;

    let entries = expand_timeline(timeline, timescale)?;
    let live = mpd.presentation_type == PresentationType::Dynamic;

    // Assume the manifest only lists available segments, which lets the
    // availability window ignore @availabilityStartTime: everything from the
    // second-to-last segment minus @timeShiftBufferDepth is retained.
    let mut earliest_available: i64 = 0;
    if live && !entries.is_empty() {
        let index = entries.len().saturating_sub(2);
        earliest_available =
            (entries[index].start / timescale) as i64 - mpd.time_shift_buffer_depth as i64;
    }

    let mut references = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let scaled_start = entry.start / timescale;
        if (scaled_start as i64) < earliest_available {
            // Already fallen out of the availability window.
            continue;
        }

        let absolute_segment_number = i as u64 + template.start_number;
        let filled = fill_url_template(
            media_template,
            representation.id.as_deref(),
            absolute_segment_number,
            representation.bandwidth,
            entry.start,
        );

        references.push(SegmentReference {
            start_time_ticks: entry.start,
            start_time: scaled_start,
            end_time: Some(entry.end / timescale),
            start_byte: 0,
            end_byte: None,
            url: resolve_url(representation.base_url.as_deref(), &filled),
        });
    }

    // No references means the initialization segment is not available yet
    // either.
    if template.initialization_url_template.is_some() && !references.is_empty() {
        stream.segment_initialization_info = Some(generate_initialization(representation, template)?);
    }

    stream.timestamp_offset = timestamp_offset(template.presentation_time_offset, timescale);

    if live && let Some(last) = references.last() {
        // Start far enough behind the last segment to buffer @minBufferTime
        // seconds, but never behind the availability window.
        let mut best_available = last.start_time as i64 - mpd.min_buffer_time as i64;
        if best_available < earliest_available {
            debug!("the best available segment is no longer available");
            best_available = earliest_available;
        }
        stream.current_segment_start_time = references
            .iter()
            .find(|r| r.end_time.is_some_and(|end| end as i64 >= best_available))
            .map(|r| r.start_time);
    }

    debug!(segments = references.len(), "generated segment index from SegmentTimeline");
    stream.segment_index = Some(SegmentIndex::new(references));

    Ok(())
}

fn from_segment_duration(
    mpd: &Mpd,
    period: &Period,
    representation: &Representation,
    template: &SegmentTemplate,
    segment_duration: u64,
    stream: &mut StreamInfo,
) -> Result<(), BuildError> {
    if mpd.presentation_type == PresentationType::Dynamic {
        // The availability-window arithmetic for a live fixed-duration
        // template is not implemented.
        return Err(BuildError::LiveNotSupported);
    }
    if period.start.is_none() {
        return Err(BuildError::UnknownPeriodStart);
    }
    let timescale = template.timescale.ok_or(BuildError::MissingTimescale)?;
    let media_template = template
        .media_url_template
        .as_deref()
        .ok_or(BuildError::MissingMediaTemplate)?;

    let total_segments = optimal_segment_index_size(period, segment_duration, timescale)?;

    let mut references = Vec::with_capacity(total_segments as usize);
    for i in 0..total_segments {
        let segment_number = i + 1;
        let start_ticks = (segment_number - 1) * segment_duration;
        let end_ticks = start_ticks + segment_duration;

        let absolute_segment_number = (segment_number - 1) + template.start_number;
        // $Time$ counts from segment number one regardless of @startNumber's
        // effect on $Number$.
        let time_replacement =
            ((segment_number - 1) + (template.start_number - 1)) * segment_duration;

        let filled = fill_url_template(
            media_template,
            representation.id.as_deref(),
            absolute_segment_number,
            representation.bandwidth,
            time_replacement,
        );

        references.push(SegmentReference {
            start_time_ticks: start_ticks,
            start_time: start_ticks / timescale,
            end_time: Some(end_ticks / timescale),
            start_byte: 0,
            end_byte: None,
            url: resolve_url(representation.base_url.as_deref(), &filled),
        });
    }

    if template.initialization_url_template.is_some() && !references.is_empty() {
        stream.segment_initialization_info = Some(generate_initialization(representation, template)?);
    }

    stream.timestamp_offset = timestamp_offset(template.presentation_time_offset, timescale);

    debug!(segments = references.len(), "generated segment index from segment duration");
    stream.segment_index = Some(SegmentIndex::new(references));

    Ok(())
}

/// Smallest number of fixed-duration segments that spans the period.
fn optimal_segment_index_size(
    period: &Period,
    segment_duration: u64,
    timescale: u64,
) -> Result<u64, BuildError> {
    let duration = period.duration.ok_or(BuildError::UnknownPeriodDuration)?;
    let scaled_segment_duration = segment_duration as f64 / timescale as f64;
    let n = (duration as f64 / scaled_segment_duration).ceil() as u64;
    Ok(n.max(1))
}

/// Fills the initialization URL template. `$Number$` and `$Time$` may not
/// legitimately appear in it, so both are zero.
fn generate_initialization(
    representation: &Representation,
    template: &SegmentTemplate,
) -> Result<SegmentMetadataInfo, BuildError> {
    let initialization_template = template
        .initialization_url_template
        .as_deref()
        .ok_or(BuildError::EmptySegmentTemplate)?;

    let filled = fill_url_template(
        initialization_template,
        representation.id.as_deref(),
        0,
        representation.bandwidth,
        0,
    );

    Ok(SegmentMetadataInfo {
        url: resolve_url(representation.base_url.as_deref(), &filled),
        start_byte: 0,
        end_byte: None,
    })
}
