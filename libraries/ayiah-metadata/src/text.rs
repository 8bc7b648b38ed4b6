//! Small text helpers shared by the XML-ish parsers (ComicInfo, OPF)

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][\w:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute regex should compile")
});

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex should compile"));

/// Trimmed, non-empty text
pub(crate) fn clean(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Split a delimited list (`,` or `;`), dropping empty entries
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .filter_map(clean)
        .collect()
}

/// Decode the five predefined XML entities and numeric character references
pub(crate) fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';').filter(|&end| end <= 10) else {
            out.push('&');
            rest = &tail[1..];
            continue;
        };

        let entity = &tail[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Strip markup and decode entities, e.g. for HTML descriptions
pub(crate) fn plain_text(value: &str) -> Option<String> {
    let without_cdata = value
        .trim()
        .trim_start_matches("<![CDATA[")
        .trim_end_matches("]]>");
    // Descriptions often carry escaped HTML, so strip again after decoding
    let stripped = TAG.replace_all(without_cdata, " ");
    let decoded = decode_entities(&stripped);
    let text = TAG.replace_all(&decoded, " ");
    clean(&text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Attributes of a single start tag
pub(crate) fn attributes(tag: &str) -> HashMap<String, String> {
    ATTRIBUTE
        .captures_iter(tag)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_string();
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
            Some((name, decode_entities(value)))
        })
        .collect()
}

/// Text of every `<name ...>text</name>` element, in document order
///
/// `name` may carry a namespace prefix (`dc:title`); matching is
/// case-sensitive like XML itself.
pub(crate) fn element_texts(document: &str, name: &str) -> Vec<String> {
    let pattern = format!(r"(?s)<{0}(?:\s[^>]*)?>(.*?)</{0}\s*>", regex::escape(name));
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };
    re.captures_iter(document)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| plain_text(m.as_str()))
        .collect()
}

/// Text of the first `<name>` element
pub(crate) fn element_text(document: &str, name: &str) -> Option<String> {
    element_texts(document, name).into_iter().next()
}

/// Start tags (`<name ...>` or `<name .../>`) of every `name` element
pub(crate) fn start_tags<'a>(document: &'a str, name: &str) -> Vec<&'a str> {
    let pattern = format!(r"<{}(?:\s[^>]*)?/?>", regex::escape(name));
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };
    re.find_iter(document).map(|m| m.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_entities() {
        assert_eq!(decode_entities("Tom &amp; Jerry &#169; &#x41;"), "Tom & Jerry © A");
        assert_eq!(decode_entities("AT&T"), "AT&T");
        assert_eq!(decode_entities("a &bogus; b"), "a &bogus; b");
    }

    #[test]
    fn extracts_elements_with_attributes() {
        let doc = r#"<dc:creator opf:role="aut">Frank Herbert</dc:creator>
                     <dc:creator>Brian &amp; Kevin</dc:creator>"#;
        assert_eq!(
            element_texts(doc, "dc:creator"),
            vec!["Frank Herbert".to_string(), "Brian & Kevin".to_string()]
        );
        assert_eq!(element_text(doc, "dc:title"), None);
    }

    #[test]
    fn element_names_do_not_match_prefixes() {
        let doc = "<Series>Saga</Series><SeriesGroup>X</SeriesGroup>";
        assert_eq!(element_texts(doc, "Series"), vec!["Saga".to_string()]);
    }

    #[test]
    fn strips_markup_from_descriptions() {
        assert_eq!(
            plain_text("<p>A <b>desert</b>\n planet.</p>").as_deref(),
            Some("A desert planet.")
        );
        assert_eq!(plain_text("&lt;p&gt;Escaped&lt;/p&gt;").as_deref(), Some("Escaped"));
        assert_eq!(plain_text("5 &lt; 6").as_deref(), Some("5 < 6"));
        assert_eq!(plain_text("   "), None);
    }

    #[test]
    fn parses_attributes_in_any_quote_style() {
        let attrs = attributes(r#"<item id="cover" href='images/cover.jpg' media-type="image/jpeg"/>"#);
        assert_eq!(attrs.get("id").map(String::as_str), Some("cover"));
        assert_eq!(attrs.get("href").map(String::as_str), Some("images/cover.jpg"));
        assert_eq!(attrs.get("media-type").map(String::as_str), Some("image/jpeg"));
    }

    #[test]
    fn splits_lists() {
        assert_eq!(split_list("Drama, Crime;; Thriller "), vec!["Drama", "Crime", "Thriller"]);
    }
}
