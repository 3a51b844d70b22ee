//! The processing pipeline: validate segment addressing, settle period
//! durations, filter inconsistent representations, then assemble the output
//! manifest.

use mpd::{AdaptationSet, Mpd, Period, PresentationType, Representation};
use tracing::{debug, warn};

use crate::index;
use crate::manifest::{ManifestInfo, PeriodInfo, StreamInfo, StreamSetInfo};

/// Placeholder duration pad, in seconds, for a live period whose true
/// duration is unbounded. Keeps downstream seeking possible.
const LIVE_PERIOD_DURATION_PAD: u64 = 60 * 60 * 24 * 30;

/// Validates a parsed manifest, repairs what it can, and produces a
/// [`ManifestInfo`].
///
/// Stream and stream-set ids are sequences owned by the processor instance,
/// so ids never collide across manifests processed by the same instance and
/// never leak across unrelated instances.
#[derive(Debug, Default)]
pub struct MpdProcessor {
    next_stream_id: u32,
    next_stream_set_id: u32,
}

impl MpdProcessor {
    pub fn new() -> Self {
        MpdProcessor::default()
    }

    /// Processes a manifest. The tree is consumed because validation and
    /// duration calculation repair it in place.
    pub fn process(&mut self, mut mpd: Mpd) -> ManifestInfo {
        self.validate_segment_info(&mut mpd);
        self.calculate_durations(&mut mpd);
        self.filter_periods(&mut mpd);
        self.create_manifest_info(&mpd)
    }

    /// Ensures every non-text representation has exactly one of
    /// `SegmentBase`, `SegmentList` or `SegmentTemplate`.
    fn validate_segment_info(&self, mpd: &mut Mpd) {
        for period in &mut mpd.periods {
            for adaptation_set in &mut period.adaptation_sets {
                if adaptation_set.content_type.as_deref() == Some("text") {
                    continue;
                }

                adaptation_set.representations.retain_mut(|representation| {
                    let blocks = representation.segment_base.is_some() as u8
                        + representation.segment_list.is_some() as u8
                        + representation.segment_template.is_some() as u8;

                    match blocks {
                        0 => {
                            warn!(
                                id = representation.id.as_deref().unwrap_or(""),
                                "representation has no segment information, dropping"
                            );
                            false
                        }
                        1 => true,
                        _ => {
                            // Resolve by priority: base, then list, then
                            // template.
                            warn!(
                                id = representation.id.as_deref().unwrap_or(""),
                                "representation has multiple segment information sources"
                            );
                            if representation.segment_base.is_some() {
                                representation.segment_list = None;
                                representation.segment_template = None;
                            } else {
                                representation.segment_template = None;
                            }
                            true
                        }
                    }
                });
            }
        }
    }

    /// Settles each period's start and duration, and the presentation's
    /// overall duration, per ISO/IEC 23009-1 section 5.3.2.1.
    fn calculate_durations(&self, mpd: &mut Mpd) {
        if mpd.periods.is_empty() {
            return;
        }

        if mpd.periods[0].start.is_none() {
            mpd.periods[0].start = Some(0);
        }

        // @mediaPresentationDuration only applies to static presentations.
        if mpd.presentation_type != PresentationType::Static {
            mpd.media_presentation_duration = None;
        }

        // A lone period inherits the presentation's duration.
        if let Some(total) = mpd.media_presentation_duration
            && mpd.periods.len() == 1
            && mpd.periods[0].duration.is_none()
        {
            mpd.periods[0].duration = Some(total);
        }

        let mut total_duration: u64 = 0;
        // Whether |total_duration| covers every period, or only those whose
        // start and duration could be settled.
        let mut includes_all_periods = true;

        for i in 0..mpd.periods.len() {
            let previous = (i > 0).then(|| {
                let p = &mpd.periods[i - 1];
                (p.start, p.duration)
            });
            // "The Period extends until the Period.start of the next Period,
            // or until the end of the Media Presentation in the case of the
            // last Period."
            let next_start = match mpd.periods.get(i + 1) {
                Some(next) => next.start,
                None => mpd.media_presentation_duration,
            };

            let period = &mut mpd.periods[i];

            if period.start.is_none()
                && let Some((Some(previous_start), Some(previous_duration))) = previous
            {
                period.start = Some(previous_start.saturating_add(previous_duration));
            }

            if period.duration.is_none()
                && let (Some(start), Some(next_start)) = (period.start, next_start)
            {
                // A declared overall duration smaller than this period's
                // start would underflow; leave the duration unsettled.
                period.duration = next_start.checked_sub(start);
            }

            match (period.start, period.duration) {
                (Some(_), Some(duration)) => {
                    total_duration = total_duration.saturating_add(duration);
                }
                _ => includes_all_periods = false,
            }
        }

        if let Some(declared) = mpd.media_presentation_duration {
            if declared != total_duration {
                // Trust the declared value.
                warn!(
                    declared,
                    computed = total_duration,
                    "@mediaPresentationDuration does not match the total duration of all periods"
                );
            }
        } else if includes_all_periods {
            mpd.media_presentation_duration = Some(total_duration);
        } else if let Some(period) = mpd.periods.last()
            && let (Some(start), Some(duration)) = (period.start, period.duration)
        {
            warn!("some periods may not have valid start times or durations");
            mpd.media_presentation_duration = Some(start.saturating_add(duration));
        } else if mpd.presentation_type == PresentationType::Static {
            warn!(
                "@mediaPresentationDuration may not include the duration of all periods"
            );
            mpd.media_presentation_duration = Some(total_duration);
        }
    }

    /// Drops representations with inconsistent MIME types, then any
    /// adaptation set left empty.
    fn filter_periods(&self, mpd: &mut Mpd) {
        for period in &mut mpd.periods {
            period.adaptation_sets.retain_mut(|adaptation_set| {
                Self::filter_adaptation_set(adaptation_set);
                if adaptation_set.representations.is_empty() {
                    warn!(
                        id = adaptation_set.id.as_deref().unwrap_or(""),
                        "dropping adaptation set with no usable representations"
                    );
                    return false;
                }
                true
            });
        }
    }

    /// The first representation's MIME type is the set's MIME type; any
    /// representation disagreeing with it is dropped.
    fn filter_adaptation_set(adaptation_set: &mut AdaptationSet) {
        let mut desired_mime_type: Option<Option<String>> = None;

        adaptation_set.representations.retain(|representation| {
            match &desired_mime_type {
                None => {
                    desired_mime_type = Some(representation.mime_type.clone());
                    true
                }
                Some(desired) if *desired == representation.mime_type => true,
                Some(_) => {
                    warn!(
                        id = representation.id.as_deref().unwrap_or(""),
                        mime_type = representation.mime_type.as_deref().unwrap_or(""),
                        "representation has an inconsistent mime type, dropping"
                    );
                    false
                }
            }
        });
    }

    fn create_manifest_info(&mut self, mpd: &Mpd) -> ManifestInfo {
        let mut manifest = ManifestInfo {
            live: mpd.presentation_type == PresentationType::Dynamic,
            min_buffer_time: mpd.min_buffer_time,
            periods: Vec::with_capacity(mpd.periods.len()),
        };

        for period in &mpd.periods {
            let mut period_info = PeriodInfo {
                id: period.id.clone(),
                start: period.start.unwrap_or(0),
                duration: period.duration,
                stream_sets: Vec::new(),
            };

            for adaptation_set in &period.adaptation_sets {
                let mut stream_set = StreamSetInfo {
                    unique_id: self.next_stream_set_id(),
                    id: adaptation_set.id.clone(),
                    content_type: adaptation_set.content_type.clone(),
                    lang: adaptation_set.lang.clone(),
                    main: adaptation_set.main,
                    streams: Vec::new(),
                };

                // The largest reference end time seen across the set, used
                // to backfill a period duration that is still unknown.
                let mut max_last_end_time = 0;

                for representation in &adaptation_set.representations {
                    let Some(stream) = self.create_stream_info(mpd, period, representation)
                    else {
                        continue;
                    };

                    if let Some(index) = &stream.segment_index
                        && let Some(last) = index.last()
                        && let Some(end) = last.end_time
                    {
                        max_last_end_time = max_last_end_time.max(end);
                    }

                    stream_set.streams.push(stream);
                }

                period_info.stream_sets.push(stream_set);

                if period_info.duration.is_none() {
                    // For live, the real duration keeps growing with each
                    // refresh, so pad generously to keep seeking usable.
                    let pad = if manifest.live {
                        LIVE_PERIOD_DURATION_PAD
                    } else {
                        0
                    };
                    period_info.duration = Some(max_last_end_time + pad);
                }
            }

            manifest.periods.push(period_info);
        }

        manifest
    }

    /// Builds one stream. Returns `None` when the segment index cannot be
    /// built; the caller carries on with the other representations.
    fn create_stream_info(
        &mut self,
        mpd: &Mpd,
        period: &Period,
        representation: &Representation,
    ) -> Option<StreamInfo> {
        let mut stream = StreamInfo {
            unique_id: self.next_stream_id(),
            id: representation.id.clone(),
            bandwidth: representation.bandwidth,
            width: representation.width,
            height: representation.height,
            mime_type: representation.mime_type.clone(),
            codecs: representation.codecs.clone(),
            ..Default::default()
        };

        let built = if let Some(segment_base) = &representation.segment_base {
            index::from_segment_base(
                segment_base,
                representation.base_url.as_deref(),
                &mut stream,
            )
        } else if let Some(segment_list) = &representation.segment_list {
            index::from_segment_list(segment_list, &mut stream)
        } else if let Some(segment_template) = &representation.segment_template {
            index::from_segment_template(mpd, period, representation, segment_template, &mut stream)
        } else if representation
            .mime_type
            .as_deref()
            .is_some_and(|mime| mime.split('/').next() == Some("text"))
        {
            // Subtitles need nothing beyond a URL.
            stream.media_url = representation.base_url.clone();
            Ok(())
        } else {
            Err(crate::error::BuildError::MissingSegmentInfo)
        };

        match built {
            Ok(()) => Some(stream),
            Err(error) => {
                warn!(
                    id = representation.id.as_deref().unwrap_or(""),
                    %error,
                    "dropping representation"
                );
                None
            }
        }
    }

    fn next_stream_id(&mut self) -> u32 {
        self.next_stream_id += 1;
        debug!(id = self.next_stream_id, "assigned stream id");
        self.next_stream_id
    }

    fn next_stream_set_id(&mut self) -> u32 {
        self.next_stream_set_id += 1;
        self.next_stream_set_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpd::parse_mpd;

    const MANIFEST_URL: &str = "http://cdn.example.com/manifest.mpd";

    fn process(xml: &str) -> ManifestInfo {
        let mpd = parse_mpd(xml, MANIFEST_URL).unwrap();
        MpdProcessor::new().process(mpd)
    }

    #[test]
    fn empty_manifest_produces_empty_output() {
        let manifest = process(r#"<MPD type="static"/>"#);
        assert!(!manifest.live);
        assert_eq!(manifest.min_buffer_time, 5);
        assert!(manifest.periods.is_empty());
    }

    #[test]
    fn representation_without_segment_info_is_dropped() {
        let manifest = process(
            r#"<MPD type="static" mediaPresentationDuration="PT10S">
                 <Period>
                   <AdaptationSet mimeType="video/mp4">
                     <Representation id="bad" bandwidth="1"/>
                     <Representation id="good" bandwidth="2">
                       <SegmentTemplate timescale="1000" duration="2000"
                           media="seg-$Number$.m4s"/>
                     </Representation>
                   </AdaptationSet>
                 </Period>
               </MPD>"#,
        );

        let streams = &manifest.periods[0].stream_sets[0].streams;
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].id.as_deref(), Some("good"));
    }

    #[test]
    fn multiple_segment_info_sources_resolve_by_priority() {
        let manifest = process(
            r#"<MPD type="static" mediaPresentationDuration="PT10S">
                 <Period>
                   <AdaptationSet mimeType="video/mp4">
                     <Representation id="both" bandwidth="1">
                       <BaseURL>http://cdn.example.com/media.mp4</BaseURL>
                       <SegmentBase timescale="1000" indexRange="0-100"/>
                       <SegmentTemplate timescale="1000" duration="2000"
                           media="seg-$Number$.m4s"/>
                     </Representation>
                   </AdaptationSet>
                 </Period>
               </MPD>"#,
        );

        // SegmentBase wins: references are resolved lazily, so there is an
        // index location but no expanded index.
        let stream = &manifest.periods[0].stream_sets[0].streams[0];
        assert!(stream.segment_index_info.is_some());
        assert!(stream.segment_index.is_none());
    }

    #[test]
    fn oversized_period_timings_saturate_instead_of_wrapping() {
        // The first period ends past the largest representable time; the
        // second period's inferred start clamps there.
        let manifest = process(
            r#"<MPD type="static">
                 <Period start="P213503982334601D" duration="P300000D"/>
                 <Period/>
               </MPD>"#,
        );

        assert_eq!(manifest.periods[1].start, u64::MAX);
    }

    #[test]
    fn inconsistent_mime_types_are_dropped_first_wins() {
        let manifest = process(
            r#"<MPD type="static" mediaPresentationDuration="PT10S">
                 <Period>
                   <AdaptationSet>
                     <Representation id="a" mimeType="audio/mp4" bandwidth="1">
                       <SegmentTemplate timescale="1000" duration="2000" media="a-$Number$.m4s"/>
                     </Representation>
                     <Representation id="b" mimeType="audio/mp4" bandwidth="2">
                       <SegmentTemplate timescale="1000" duration="2000" media="b-$Number$.m4s"/>
                     </Representation>
                     <Representation id="c" mimeType="video/mp4" bandwidth="3">
                       <SegmentTemplate timescale="1000" duration="2000" media="c-$Number$.m4s"/>
                     </Representation>
                   </AdaptationSet>
                 </Period>
               </MPD>"#,
        );

        let streams = &manifest.periods[0].stream_sets[0].streams;
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].id.as_deref(), Some("a"));
        assert_eq!(streams[1].id.as_deref(), Some("b"));
    }

    #[test]
    fn adaptation_set_left_empty_is_removed() {
        let manifest = process(
            r#"<MPD type="static" mediaPresentationDuration="PT10S">
                 <Period>
                   <AdaptationSet mimeType="video/mp4">
                     <Representation id="bad" bandwidth="1"/>
                   </AdaptationSet>
                   <AdaptationSet mimeType="audio/mp4">
                     <Representation id="good" bandwidth="2">
                       <SegmentTemplate timescale="1000" duration="2000" media="a-$Number$.m4s"/>
                     </Representation>
                   </AdaptationSet>
                 </Period>
               </MPD>"#,
        );

        let stream_sets = &manifest.periods[0].stream_sets;
        assert_eq!(stream_sets.len(), 1);
        assert_eq!(stream_sets[0].content_type.as_deref(), Some("audio"));
    }

    #[test]
    fn lone_period_inherits_presentation_duration() {
        let manifest = process(
            r#"<MPD type="static" mediaPresentationDuration="PT1M">
                 <Period>
                   <AdaptationSet mimeType="video/mp4">
                     <Representation id="v" bandwidth="1">
                       <SegmentTemplate timescale="1" duration="10" media="seg-$Number$.m4s"/>
                     </Representation>
                   </AdaptationSet>
                 </Period>
               </MPD>"#,
        );

        assert_eq!(manifest.periods[0].duration, Some(60));
        let stream = &manifest.periods[0].stream_sets[0].streams[0];
        assert_eq!(stream.segment_index.as_ref().unwrap().len(), 6);
    }

    #[test]
    fn consecutive_period_starts_and_durations_are_inferred() {
        let manifest = process(
            r#"<MPD type="static" mediaPresentationDuration="PT30S">
                 <Period id="p0" duration="PT10S">
                   <AdaptationSet mimeType="video/mp4">
                     <Representation id="v0" bandwidth="1">
                       <SegmentTemplate timescale="1" duration="5" media="p0-$Number$.m4s"/>
                     </Representation>
                   </AdaptationSet>
                 </Period>
                 <Period id="p1">
                   <AdaptationSet mimeType="video/mp4">
                     <Representation id="v1" bandwidth="1">
                       <SegmentTemplate timescale="1" duration="5" media="p1-$Number$.m4s"/>
                     </Representation>
                   </AdaptationSet>
                 </Period>
               </MPD>"#,
        );

        assert_eq!(manifest.periods[0].start, 0);
        assert_eq!(manifest.periods[0].duration, Some(10));
        // Second period starts where the first ends and runs to the end of
        // the presentation.
        assert_eq!(manifest.periods[1].start, 10);
        assert_eq!(manifest.periods[1].duration, Some(20));
    }

    #[test]
    fn period_duration_is_backfilled_from_segment_references() {
        let manifest = process(
            r#"<MPD type="static">
                 <Period start="PT0S">
                   <AdaptationSet mimeType="audio/mp4">
                     <Representation id="a" bandwidth="1">
                       <SegmentTemplate timescale="1000" media="seg-$Time$.m4s">
                         <SegmentTimeline>
                           <S t="0" d="2000" r="4"/>
                         </SegmentTimeline>
                       </SegmentTemplate>
                     </Representation>
                   </AdaptationSet>
                 </Period>
               </MPD>"#,
        );

        // Five 2-second segments.
        assert_eq!(manifest.periods[0].duration, Some(10));
    }

    #[test]
    fn stream_ids_are_unique_within_a_processor() {
        let xml = r#"<MPD type="static" mediaPresentationDuration="PT10S">
                 <Period>
                   <AdaptationSet mimeType="video/mp4">
                     <Representation id="a" bandwidth="1">
                       <SegmentTemplate timescale="1000" duration="2000" media="a-$Number$.m4s"/>
                     </Representation>
                     <Representation id="b" bandwidth="2">
                       <SegmentTemplate timescale="1000" duration="2000" media="b-$Number$.m4s"/>
                     </Representation>
                   </AdaptationSet>
                 </Period>
               </MPD>"#;

        let mut processor = MpdProcessor::new();
        let first = processor.process(parse_mpd(xml, MANIFEST_URL).unwrap());
        let second = processor.process(parse_mpd(xml, MANIFEST_URL).unwrap());

        let mut ids: Vec<u32> = first.periods[0].stream_sets[0]
            .streams
            .iter()
            .chain(&second.periods[0].stream_sets[0].streams)
            .map(|s| s.unique_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn text_representation_needs_only_a_base_url() {
        let manifest = process(
            r#"<MPD type="static" mediaPresentationDuration="PT10S">
                 <Period>
                   <AdaptationSet contentType="text" mimeType="text/vtt">
                     <Representation id="subs" bandwidth="1">
                       <BaseURL>http://cdn.example.com/subs.vtt</BaseURL>
                     </Representation>
                   </AdaptationSet>
                 </Period>
               </MPD>"#,
        );

        let stream = &manifest.periods[0].stream_sets[0].streams[0];
        assert_eq!(stream.media_url.as_deref(), Some("http://cdn.example.com/subs.vtt"));
        assert!(stream.segment_index.is_none());
    }
}
