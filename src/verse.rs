use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

/// Chapter content as the provider returns it: usually a markup blob of
/// unspecified dialect, occasionally already segmented into verses.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawContent {
    Markup(String),
    Segmented { verses: BTreeMap<String, String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verse {
    /// Verse number as found in the source. `0` is a sentinel meaning the
    /// number could not be resolved; such verses are kept, not dropped.
    pub number: u32,
    /// Verse body, inline markup passed through untouched.
    pub content: String,
}

static NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)").unwrap());
static NUMBERED_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)(\D+)").unwrap());
static ATTR_TAGGED: Lazy<Selector> = Lazy::new(|| Selector::parse("[data-number]").unwrap());
static VERSE_CLASSED: Lazy<Selector> = Lazy::new(|| Selector::parse(".verse, span.v").unwrap());

/// Splits chapter content into verses.
///
/// Markup input goes through a cascade of strategies, tried in order until
/// one yields anything: elements tagged with a verse-number attribute,
/// elements matching known verse-wrapper conventions, then a plain-text
/// split on number boundaries. An empty result means no strategy recognized
/// the dialect; callers fall back to rendering the raw content as-is.
pub fn extract_verses(content: &RawContent) -> Vec<Verse> {
    let markup = match content {
        RawContent::Segmented { verses } => {
            let mut out: Vec<Verse> = verses
                .iter()
                .map(|(number, body)| Verse {
                    number: number.trim().parse().unwrap_or(0),
                    content: body.clone(),
                })
                .collect();
            // string keys sort lexicographically, so re-sort numerically
            out.sort_by_key(|v| v.number);
            return out;
        }
        RawContent::Markup(markup) => markup,
    };

    let fragment = Html::parse_fragment(markup);
    let mut verses = tagged_verses(&fragment, &ATTR_TAGGED);
    if verses.is_empty() {
        verses = tagged_verses(&fragment, &VERSE_CLASSED);
    }
    if verses.is_empty() {
        verses = split_flattened_text(&fragment);
    }
    verses
}

fn tagged_verses(fragment: &Html, selector: &Selector) -> Vec<Verse> {
    fragment
        .select(selector)
        .map(|el| Verse {
            number: resolve_number(&el),
            content: node_body(&el),
        })
        .collect()
}

/// Number resolution order: primary attribute, alternate attribute, then
/// digits at the very start of the node's text. Unresolvable numbers become
/// the `0` sentinel rather than dropping the verse.
fn resolve_number(el: &ElementRef) -> u32 {
    attr_number(el, "data-number")
        .or_else(|| attr_number(el, "data-verse-number"))
        .or_else(|| {
            let text: String = el.text().collect();
            NUMBER_PREFIX
                .captures(&text)
                .and_then(|caps| caps[1].parse().ok())
        })
        .unwrap_or(0)
}

fn attr_number(el: &ElementRef, name: &str) -> Option<u32> {
    el.value().attr(name).and_then(|raw| raw.trim().parse().ok())
}

fn node_body(el: &ElementRef) -> String {
    let inner = el.inner_html();
    if !inner.is_empty() {
        inner
    } else {
        el.text().collect()
    }
}

/// Last-resort strategy: discard markup and split the visible text on
/// "digit run, then non-digit run" boundaries. Lossy on purpose; any stray
/// number in the prose becomes a verse boundary.
fn split_flattened_text(fragment: &Html) -> Vec<Verse> {
    let text: String = fragment.root_element().text().collect();
    NUMBERED_RUN
        .captures_iter(&text)
        .map(|caps| Verse {
            number: caps[1].parse().unwrap_or(0),
            content: caps[2].trim().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markup(s: &str) -> RawContent {
        RawContent::Markup(s.to_string())
    }

    fn segmented(entries: &[(&str, &str)]) -> RawContent {
        RawContent::Segmented {
            verses: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn segmented_input_short_circuits() {
        let content = segmented(&[("1", "In the beginning"), ("2", "And the earth")]);
        let verses = extract_verses(&content);
        assert_eq!(verses.len(), 2);
        assert_eq!(verses[0], Verse { number: 1, content: "In the beginning".into() });
        assert_eq!(verses[1], Verse { number: 2, content: "And the earth".into() });
    }

    #[test]
    fn segmented_input_sorts_numerically() {
        let content = segmented(&[("10", "tenth"), ("2", "second"), ("1", "first")]);
        let numbers: Vec<u32> = extract_verses(&content).iter().map(|v| v.number).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
    }

    #[test]
    fn segmented_key_that_is_not_a_number_keeps_sentinel() {
        let content = segmented(&[("intro", "A word before")]);
        let verses = extract_verses(&content);
        assert_eq!(verses.len(), 1);
        assert_eq!(verses[0].number, 0);
        assert_eq!(verses[0].content, "A word before");
    }

    #[test]
    fn data_number_attribute_wins() {
        let content = markup(
            r#"<p data-number="1">In the beginning</p><p data-number="2">And the earth</p>"#,
        );
        let verses = extract_verses(&content);
        assert_eq!(verses.len(), 2);
        assert_eq!(verses[0].number, 1);
        assert_eq!(verses[0].content, "In the beginning");
        assert_eq!(verses[1].number, 2);
        assert_eq!(verses[1].content, "And the earth");
    }

    #[test]
    fn alternate_attribute_is_consulted() {
        let content =
            markup(r#"<span data-number="" data-verse-number="3">And God said</span>"#);
        let verses = extract_verses(&content);
        assert_eq!(verses.len(), 1);
        assert_eq!(verses[0].number, 3);
    }

    #[test]
    fn inline_markup_passes_through() {
        let content = markup(r#"<p data-number="4"><em>And God saw</em> the light</p>"#);
        let verses = extract_verses(&content);
        assert_eq!(verses[0].content, "<em>And God saw</em> the light");
    }

    #[test]
    fn verse_class_resolves_number_from_text_prefix() {
        let content = markup(r#"<span class="verse">1 In the beginning</span>"#);
        let verses = extract_verses(&content);
        assert_eq!(verses.len(), 1);
        assert_eq!(verses[0].number, 1);
        assert_eq!(verses[0].content, "1 In the beginning");
    }

    #[test]
    fn short_tag_convention_matches() {
        let content = markup(r#"<span class="v">12 Therefore</span>"#);
        let verses = extract_verses(&content);
        assert_eq!(verses.len(), 1);
        assert_eq!(verses[0].number, 12);
    }

    #[test]
    fn unresolvable_number_defaults_to_zero() {
        let content = markup(r#"<span class="verse">Selah</span>"#);
        let verses = extract_verses(&content);
        assert_eq!(verses.len(), 1);
        assert_eq!(verses[0].number, 0);
        assert_eq!(verses[0].content, "Selah");
    }

    #[test]
    fn plain_text_splits_on_number_runs() {
        let content = markup("1 In the beginning God created 2 the heavens");
        let verses = extract_verses(&content);
        assert_eq!(verses.len(), 2);
        assert_eq!(verses[0], Verse { number: 1, content: "In the beginning God created".into() });
        assert_eq!(verses[1], Verse { number: 2, content: "the heavens".into() });
    }

    #[test]
    fn unrecognized_markup_falls_through_to_text_split() {
        let content = markup("<div><i>1 In the beginning</i> God created <b>2 the heavens</b></div>");
        let verses = extract_verses(&content);
        assert_eq!(verses.len(), 2);
        assert_eq!(verses[0].number, 1);
        assert_eq!(verses[1].number, 2);
    }

    #[test]
    fn no_markers_at_all_yields_empty() {
        let content = markup("<p>A psalm of David. A poetic introduction.</p>");
        assert!(extract_verses(&content).is_empty());
    }

    #[test]
    fn empty_input_yields_empty() {
        assert!(extract_verses(&markup("")).is_empty());
    }

    #[test]
    fn malformed_markup_is_tolerated() {
        let content = markup(r#"<p data-number="1">In the beginning<p data-number="2">And"#);
        let verses = extract_verses(&content);
        assert_eq!(verses.len(), 2);
        assert_eq!(verses[1].number, 2);
    }

    #[test]
    fn extraction_is_deterministic() {
        let content = markup(
            r#"<span class="v">1 In the beginning</span><span class="v">2 And the earth</span>"#,
        );
        assert_eq!(extract_verses(&content), extract_verses(&content));
    }
}
