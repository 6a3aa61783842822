//! Small edits on the root element of an SVG document

use regex::Regex;
use std::sync::LazyLock;

static ROOT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<svg\b[^>]*>").expect("root tag pattern is valid"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*"([^"]*)""#)
        .expect("attribute pattern is valid")
});

static EXTERNAL_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:href\s*=\s*["']\s*(?:https?:)?//|url\(\s*["']?\s*(?:https?:)?//|@import)"#)
        .expect("external reference pattern is valid")
});

/// Value of an attribute on the root `<svg>` element
pub fn root_attribute(svg: &str, name: &str) -> Option<String> {
    let tag = ROOT_TAG.find(svg)?;
    ATTRIBUTE
        .captures_iter(tag.as_str())
        .find(|caps| &caps[1] == name)
        .map(|caps| caps[2].to_string())
}

/// Set (or add) an attribute on the root `<svg>` element.
///
/// Documents without a root element are returned unchanged.
pub fn set_root_attribute(svg: &str, name: &str, value: &str) -> String {
    let Some(tag) = ROOT_TAG.find(svg) else {
        return svg.to_string();
    };
    let tag_text = tag.as_str();

    let existing = ATTRIBUTE
        .captures_iter(tag_text)
        .find(|caps| &caps[1] == name)
        .and_then(|caps| caps.get(2));

    let new_tag = if let Some(value_match) = existing {
        format!(
            "{}{}{}",
            &tag_text[..value_match.start()],
            value,
            &tag_text[value_match.end()..]
        )
    } else {
        let insert_at = if tag_text.ends_with("/>") {
            tag_text.len() - 2
        } else {
            tag_text.len() - 1
        };
        format!(
            "{} {}=\"{}\"{}",
            &tag_text[..insert_at],
            name,
            value,
            &tag_text[insert_at..]
        )
    };

    format!("{}{}{}", &svg[..tag.start()], new_tag, &svg[tag.end()..])
}

/// Insert markup as the first child of the root element
pub fn insert_after_root(svg: &str, fragment: &str) -> String {
    match ROOT_TAG.find(svg) {
        Some(tag) => format!("{}{}{}", &svg[..tag.end()], fragment, &svg[tag.end()..]),
        None => svg.to_string(),
    }
}

/// Parse the root `viewBox` as `[min_x, min_y, width, height]`
pub fn view_box(svg: &str) -> Option<[f32; 4]> {
    let raw = root_attribute(svg, "viewBox")?;
    let numbers: Vec<f32> = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match numbers.as_slice() {
        [x, y, w, h] if *w > 0.0 && *h > 0.0 => Some([*x, *y, *w, *h]),
        _ => None,
    }
}

/// Whether the document pulls in anything from outside itself
pub fn references_external_resource(svg: &str) -> bool {
    EXTERNAL_REFERENCE.is_match(svg)
}

/// Format a dimension without trailing zeros
pub fn format_number(value: f32) -> String {
    let text = format!("{value:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100%" viewBox="0 0 120 80"><g/></svg>"#;

    #[test]
    fn test_root_attribute() {
        assert_eq!(root_attribute(SVG, "width").as_deref(), Some("100%"));
        assert_eq!(root_attribute(SVG, "height"), None);
    }

    #[test]
    fn test_set_root_attribute_replaces_and_adds() {
        let updated = set_root_attribute(SVG, "width", "120");
        assert_eq!(root_attribute(&updated, "width").as_deref(), Some("120"));

        let updated = set_root_attribute(&updated, "height", "80");
        assert_eq!(root_attribute(&updated, "height").as_deref(), Some("80"));
        assert!(updated.ends_with("<g/></svg>"));
    }

    #[test]
    fn test_insert_after_root() {
        let updated = insert_after_root(SVG, "<rect/>");
        assert!(updated.contains(r#"viewBox="0 0 120 80"><rect/><g/>"#));
    }

    #[test]
    fn test_view_box_parsing() {
        assert_eq!(view_box(SVG), Some([0.0, 0.0, 120.0, 80.0]));
        assert_eq!(view_box("<svg viewBox=\"0,0,0,10\"></svg>"), None);
    }

    #[test]
    fn test_external_references() {
        assert!(!references_external_resource(SVG));
        assert!(references_external_resource(
            r#"<svg><image href="https://example.com/a.png"/></svg>"#
        ));
        assert!(references_external_resource(
            r"<svg><style>@import url(fonts.css);</style></svg>"
        ));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(120.0), "120");
        assert_eq!(format_number(12.5), "12.5");
    }
}
