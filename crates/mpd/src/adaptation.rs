//! `AdaptationSet` and `Representation` tags, plus the small property
//! children (`ContentComponent`, `Role`) an adaptation set can carry.

use crate::attr;
use crate::merge::{optional_child, resolve_base_url, resolve_block};
use crate::segment_info::{SegmentBase, SegmentList, SegmentTemplate};
use crate::xml::Element;

/// Inherited state handed down while parsing: the nearest ancestor's base
/// URL and segment-addressing blocks.
#[derive(Debug, Default)]
pub(crate) struct Inherited<'a> {
    pub base_url: Option<&'a str>,
    pub segment_base: Option<&'a SegmentBase>,
    pub segment_list: Option<&'a SegmentList>,
    pub segment_template: Option<&'a SegmentTemplate>,
}

/// A `ContentComponent` tag. Supplies a language and content type for an
/// adaptation set that does not declare its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentComponent {
    pub id: Option<String>,
    pub lang: Option<String>,
    /// `video` or `audio`, not a MIME type.
    pub content_type: Option<String>,
}

impl ContentComponent {
    fn from_element(elem: &Element) -> Self {
        ContentComponent {
            id: attr::string(elem, "id").ok(),
            lang: attr::string(elem, "lang").ok(),
            content_type: attr::string(elem, "contentType").ok(),
        }
    }
}

/// A `Role` tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Role {
    pub value: Option<String>,
}

impl Role {
    fn from_element(elem: &Element) -> Self {
        Role {
            value: attr::string(elem, "value").ok(),
        }
    }
}

/// A single encoding of an adaptation set's content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Representation {
    pub id: Option<String>,
    /// Inherited from the adaptation set, never declared on the tag itself.
    pub lang: Option<String>,
    /// Bits per second required for uninterrupted playback.
    pub bandwidth: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mime_type: Option<String>,
    pub codecs: Option<String>,
    pub base_url: Option<String>,
    pub segment_base: Option<SegmentBase>,
    pub segment_list: Option<SegmentList>,
    pub segment_template: Option<SegmentTemplate>,
}

impl Representation {
    fn from_element(elem: &Element, parent: &AdaptationSet) -> Self {
        let mut rep = Representation {
            id: attr::string(elem, "id").ok(),
            lang: parent.lang.clone(),
            bandwidth: attr::positive_u32(elem, "bandwidth").ok(),
            width: attr::positive_u32(elem, "width").ok().or(parent.width),
            height: attr::positive_u32(elem, "height").ok().or(parent.height),
            mime_type: attr::string(elem, "mimeType")
                .ok()
                .or_else(|| parent.mime_type.clone()),
            codecs: attr::string(elem, "codecs")
                .ok()
                .or_else(|| parent.codecs.clone()),
            base_url: resolve_base_url(elem, parent.base_url.as_deref()),
            segment_base: None,
            segment_list: None,
            segment_template: None,
        };

        rep.segment_base = resolve_block(
            elem,
            "SegmentBase",
            parent.segment_base.as_ref(),
            SegmentBase::from_element,
        );
        rep.segment_list = resolve_block(
            elem,
            "SegmentList",
            parent.segment_list.as_ref(),
            SegmentList::from_element,
        );
        rep.segment_template = resolve_block(
            elem,
            "SegmentTemplate",
            parent.segment_template.as_ref(),
            SegmentTemplate::from_element,
        );

        rep
    }
}

/// A set of interchangeable representations of one piece of content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdaptationSet {
    pub id: Option<String>,
    pub lang: Option<String>,
    /// `video`, `audio` or `text`. Inferred from the MIME type when not
    /// declared explicitly.
    pub content_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Inferred from the first representation when not declared explicitly.
    pub mime_type: Option<String>,
    pub codecs: Option<String>,
    /// True when a `Role` child carries `value="main"`.
    pub main: bool,
    pub base_url: Option<String>,
    pub segment_base: Option<SegmentBase>,
    pub segment_list: Option<SegmentList>,
    pub segment_template: Option<SegmentTemplate>,
    pub representations: Vec<Representation>,
}

impl AdaptationSet {
    pub(crate) fn from_element(elem: &Element, inherited: &Inherited<'_>) -> Self {
        let content_component = optional_child(elem, "ContentComponent")
            .map(ContentComponent::from_element);
        let role = optional_child(elem, "Role").map(Role::from_element);

        let mut set = AdaptationSet {
            id: attr::string(elem, "id").ok(),
            lang: attr::string(elem, "lang").ok().or_else(|| {
                content_component.as_ref().and_then(|c| c.lang.clone())
            }),
            content_type: attr::string(elem, "contentType").ok().or_else(|| {
                content_component.as_ref().and_then(|c| c.content_type.clone())
            }),
            width: attr::positive_u32(elem, "width").ok(),
            height: attr::positive_u32(elem, "height").ok(),
            mime_type: attr::string(elem, "mimeType").ok(),
            codecs: attr::string(elem, "codecs").ok(),
            main: role.as_ref().and_then(|r| r.value.as_deref()) == Some("main"),
            base_url: resolve_base_url(elem, inherited.base_url),
            segment_base: None,
            segment_list: None,
            segment_template: None,
            representations: Vec::new(),
        };

        // Content type must be settled before the representations parse,
        // since they inherit it through the MIME type.
        if set.content_type.is_none() {
            set.content_type = mime_prefix(set.mime_type.as_deref());
        }

        set.segment_base = resolve_block(
            elem,
            "SegmentBase",
            inherited.segment_base,
            SegmentBase::from_element,
        );
        set.segment_list = resolve_block(
            elem,
            "SegmentList",
            inherited.segment_list,
            SegmentList::from_element,
        );
        set.segment_template = resolve_block(
            elem,
            "SegmentTemplate",
            inherited.segment_template,
            SegmentTemplate::from_element,
        );

        set.representations = elem
            .children("Representation")
            .map(|child| Representation::from_element(child, &set))
            .collect();

        // The set may leave its MIME type to be inferred from the first
        // representation. Inconsistent per-representation types are dealt
        // with downstream.
        if set.mime_type.is_none() {
            set.mime_type = set
                .representations
                .first()
                .and_then(|rep| rep.mime_type.clone());
            if set.content_type.is_none() {
                set.content_type = mime_prefix(set.mime_type.as_deref());
            }
        }

        set
    }
}

/// The part of a MIME type before the slash (`video/mp4` yields `video`).
fn mime_prefix(mime_type: Option<&str>) -> Option<String> {
    mime_type.map(|m| m.split('/').next().unwrap_or(m).to_string())
}
