//! Minimal HTML fragment handling for the templated transport
//!
//! The server delivers identity and snapshots as small element fragments
//! (out-of-band swaps). Only flat, id-addressed elements are needed, so this is
//! a tag scanner rather than a DOM.

use crate::{UserId, CLIENT_ID_ELEMENT, SNAPSHOT_ELEMENT};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

const VOID_TAGS: [&str; 6] = ["input", "br", "hr", "img", "meta", "link"];

fn open_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Quoted attribute values may contain a literal `>`
        Regex::new(r#"<([A-Za-z][A-Za-z0-9-]*)((?:"[^"]*"|'[^']*'|[^'">])*)>"#)
            .expect("open tag pattern is valid")
    })
}

fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
            .expect("attribute pattern is valid")
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    tag: String,
    attributes: HashMap<String, String>,
    text: Option<String>,
}

impl Element {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Raw (still escaped) text between the opening and closing tag
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_out_of_band(&self) -> bool {
        self.attributes.contains_key("hx-swap-oob")
    }

    /// First non-empty of: `value` attribute, text content, `data-value`
    ///
    /// Returned unescaped whichever source it came from.
    pub fn identity_value(&self) -> Option<String> {
        let text = self.text().map(unescape);
        let value = [
            self.attribute("value"),
            text.as_deref(),
            self.attribute("data-value"),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .map(str::to_string);
        value
    }
}

/// Finds the first element whose `id` attribute equals `id`
pub fn find_element(html: &str, id: &str) -> Option<Element> {
    for captures in open_tag_pattern().captures_iter(html) {
        let attribute_text = captures.get(2).map_or("", |m| m.as_str());
        let attributes = parse_attributes(attribute_text);
        if attributes.get("id").map(String::as_str) != Some(id) {
            continue;
        }

        let tag = captures[1].to_ascii_lowercase();
        let self_closing = attribute_text.trim_end().ends_with('/');
        let text = if self_closing || VOID_TAGS.contains(&tag.as_str()) {
            None
        } else {
            let body_start = captures.get(0).map_or(html.len(), |m| m.end());
            let rest = &html[body_start..];
            rest.find(&format!("</{}", tag))
                .or_else(|| rest.find(&format!("</{}", &captures[1])))
                .map(|end| rest[..end].to_string())
        };

        return Some(Element {
            tag,
            attributes,
            text,
        });
    }

    None
}

fn parse_attributes(text: &str) -> HashMap<String, String> {
    attribute_pattern()
        .captures_iter(text)
        .map(|captures| {
            let name = captures[1].to_ascii_lowercase();
            let value = captures
                .get(2)
                .or_else(|| captures.get(3))
                .or_else(|| captures.get(4))
                .map_or(String::new(), |m| unescape(m.as_str()));
            (name, value)
        })
        .collect()
}

pub fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Out-of-band fragment announcing a connection's id
pub fn render_identity(id: &UserId) -> String {
    format!(
        r#"<input type="hidden" id="{}" value="{}" hx-swap-oob="true" />"#,
        CLIENT_ID_ELEMENT,
        escape(id.as_str())
    )
}

/// Out-of-band fragment carrying a snapshot JSON payload
pub fn render_snapshot(json: &str) -> String {
    format!(
        r#"<div id="{}" hx-swap-oob="true">{}</div>"#,
        SNAPSHOT_ELEMENT,
        escape(json)
    )
}
