//! The top of the manifest tree: the `MPD` root tag and its `Period`
//! children.

use tracing::warn;

use crate::adaptation::{AdaptationSet, Inherited};
use crate::attr;
use crate::merge::{optional_child, resolve_base_url};
use crate::segment_info::{SegmentBase, SegmentList, SegmentTemplate};
use crate::xml::Element;

/// Seconds of media to buffer before playback when the manifest does not
/// say otherwise.
const DEFAULT_MIN_BUFFER_TIME: u64 = 5;

/// Default distance, in seconds, to stay behind the live edge.
const DEFAULT_SUGGESTED_PRESENTATION_DELAY: u64 = 1;

/// Whether the presentation is fixed-length or an ongoing live stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresentationType {
    #[default]
    Static,
    Dynamic,
}

impl PresentationType {
    fn from_attr(elem: &Element) -> Self {
        match elem.attr("type") {
            None | Some("static") => PresentationType::Static,
            Some("dynamic") => PresentationType::Dynamic,
            Some(other) => {
                warn!(value = other, "unknown presentation type, assuming static");
                PresentationType::Static
            }
        }
    }
}

/// One time-bounded section of the presentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Period {
    pub id: Option<String>,
    /// Start, in seconds, on the presentation timeline.
    pub start: Option<u64>,
    /// Duration in seconds.
    pub duration: Option<u64>,
    pub base_url: Option<String>,
    pub segment_base: Option<SegmentBase>,
    pub segment_list: Option<SegmentList>,
    pub segment_template: Option<SegmentTemplate>,
    pub adaptation_sets: Vec<AdaptationSet>,
}

impl Period {
    fn from_element(elem: &Element, mpd_base_url: Option<&str>) -> Self {
        let mut period = Period {
            id: attr::string(elem, "id").ok(),
            start: attr::duration_secs(elem, "start").ok(),
            duration: attr::duration_secs(elem, "duration").ok(),
            base_url: resolve_base_url(elem, mpd_base_url),
            segment_base: optional_child(elem, "SegmentBase")
                .map(|child| SegmentBase::from_element(child, None)),
            segment_list: optional_child(elem, "SegmentList")
                .map(|child| SegmentList::from_element(child, None)),
            segment_template: optional_child(elem, "SegmentTemplate")
                .map(|child| SegmentTemplate::from_element(child, None)),
            adaptation_sets: Vec::new(),
        };

        let inherited = Inherited {
            base_url: period.base_url.as_deref(),
            segment_base: period.segment_base.as_ref(),
            segment_list: period.segment_list.as_ref(),
            segment_template: period.segment_template.as_ref(),
        };
        period.adaptation_sets = elem
            .children("AdaptationSet")
            .map(|child| AdaptationSet::from_element(child, &inherited))
            .collect();

        period
    }
}

/// A parsed manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Mpd {
    pub id: Option<String>,
    pub presentation_type: PresentationType,
    /// Base for every relative URL in the tree. Seeded with the manifest's
    /// own URL so a manifest without a `BaseURL` still resolves.
    pub base_url: Option<String>,
    /// Total duration of the presentation, in seconds.
    pub media_presentation_duration: Option<u64>,
    /// Seconds of media to buffer before playback begins.
    pub min_buffer_time: u64,
    /// Polling interval, in seconds, for manifest updates. Zero means no
    /// updates are required.
    pub min_update_period: u64,
    /// Wall-clock start of the presentation, as a Unix timestamp.
    pub availability_start_time: Option<i64>,
    /// Seconds of live content the server retains past the live edge.
    pub time_shift_buffer_depth: u64,
    /// Suggested distance, in seconds, behind the live edge.
    pub suggested_presentation_delay: u64,
    pub periods: Vec<Period>,
}

impl Mpd {
    pub(crate) fn from_element(elem: &Element, manifest_url: &str) -> Self {
        let base_url = resolve_base_url(elem, Some(manifest_url));

        Mpd {
            id: attr::string(elem, "id").ok(),
            presentation_type: PresentationType::from_attr(elem),
            media_presentation_duration: attr::duration_secs(elem, "mediaPresentationDuration")
                .ok(),
            min_buffer_time: attr::duration_secs(elem, "minBufferTime")
                .unwrap_or(DEFAULT_MIN_BUFFER_TIME),
            min_update_period: attr::duration_secs(elem, "minimumUpdatePeriod").unwrap_or(0),
            availability_start_time: attr::date_secs(elem, "availabilityStartTime").ok(),
            time_shift_buffer_depth: attr::duration_secs(elem, "timeShiftBufferDepth")
                .unwrap_or(0),
            suggested_presentation_delay: attr::duration_secs(elem, "suggestedPresentationDelay")
                .unwrap_or(DEFAULT_SUGGESTED_PRESENTATION_DELAY),
            periods: elem
                .children("Period")
                .map(|child| Period::from_element(child, base_url.as_deref()))
                .collect(),
            base_url,
        }
    }
}
