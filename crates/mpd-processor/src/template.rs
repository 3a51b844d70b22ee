//! URL template substitution for `SegmentTemplate` addressing.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::warn;

/// `$Identifier$` or `$Identifier%0Nd$` tokens, plus the `$$` escape.
static TEMPLATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(RepresentationID|Number|Bandwidth|Time)?(?:%0([0-9]+)d)?\$").unwrap()
});

/// Anything still shaped like a substitution token after filling.
static LEFTOVER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[A-Za-z]+(?:%0[0-9]+d)?\$").unwrap());

/// Fills the `$RepresentationID$`, `$Number$`, `$Bandwidth$` and `$Time$`
/// placeholders of a URL template. `$$` escapes a literal dollar sign, and
/// a `%0Nd` width specifier zero-pads numeric substitutions.
///
/// Unrecognized identifiers are left in place so the result is still a
/// usable (if odd) URL.
pub fn fill_url_template(
    template: &str,
    representation_id: Option<&str>,
    number: u64,
    bandwidth: Option<u32>,
    time: u64,
) -> String {
    let filled = TEMPLATE_TOKEN.replace_all(template, |caps: &Captures<'_>| {
        let width = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(0);

        match caps.get(1).map(|m| m.as_str()) {
            Some("RepresentationID") => {
                if width > 0 {
                    warn!(template, "width specifier is not allowed on $RepresentationID$, ignoring");
                }
                representation_id.unwrap_or("").to_string()
            }
            Some("Number") => format!("{number:0width$}"),
            Some("Bandwidth") => format!("{:0width$}", bandwidth.unwrap_or(0)),
            Some("Time") => format!("{time:0width$}"),
            _ if &caps[0] == "$$" => "$".to_string(),
            _ => caps[0].to_string(),
        }
    });

    for leftover in LEFTOVER_TOKEN.find_iter(&filled) {
        warn!(
            template,
            identifier = leftover.as_str(),
            "URL template has no substitution for identifier"
        );
    }

    filled.into_owned()
}

/// Resolves a filled template against a base URL by concatenation. Relative
/// reference resolution is deliberately not attempted; manifests using this
/// addressing style carry base URLs that end at a directory boundary.
pub fn resolve_url(base_url: Option<&str>, target: &str) -> String {
    match base_url {
        Some(base) => format!("{base}{target}"),
        None => target.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_representation_id_and_number() {
        let url = fill_url_template(
            "$RepresentationID$/seg-$Number$.m4f",
            Some("302k"),
            386,
            None,
            0,
        );
        assert_eq!(url, "302k/seg-386.m4f");
    }

    #[test]
    fn resolves_against_base_url_by_concatenation() {
        let url = fill_url_template("$RepresentationID$/seg-$Number$.m4f", Some("302k"), 386, None, 0);
        assert_eq!(
            resolve_url(Some("streamrail.com/"), &url),
            "streamrail.com/302k/seg-386.m4f"
        );
        assert_eq!(resolve_url(None, &url), "302k/seg-386.m4f");
    }

    #[test]
    fn fills_bandwidth_and_time() {
        let url = fill_url_template(
            "$Bandwidth$/$Time$.m4s",
            None,
            1,
            Some(302000),
            144000,
        );
        assert_eq!(url, "302000/144000.m4s");
    }

    #[test]
    fn applies_zero_padding_width() {
        let url = fill_url_template("seg-$Number%05d$.m4s", None, 7, None, 0);
        assert_eq!(url, "seg-00007.m4s");
    }

    #[test]
    fn width_never_truncates() {
        let url = fill_url_template("seg-$Number%02d$.m4s", None, 1234, None, 0);
        assert_eq!(url, "seg-1234.m4s");
    }

    #[test]
    fn double_dollar_is_a_literal() {
        let url = fill_url_template("price$$$Number$.m4s", None, 3, None, 0);
        assert_eq!(url, "price$3.m4s");
    }

    #[test]
    fn unknown_identifier_is_left_in_place() {
        let url = fill_url_template("$SubNumber$/$Number$.m4s", None, 3, None, 0);
        assert_eq!(url, "$SubNumber$/3.m4s");
    }
}
