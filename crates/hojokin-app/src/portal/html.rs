//! Small helpers shared by the listing and detail parsers.

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::portal::types::PortalError;

pub(crate) fn selector(css: &str) -> Result<Selector, PortalError> {
    Selector::parse(css).map_err(|err| PortalError::Selector {
        selector: css.to_string(),
        message: err.to_string(),
    })
}

pub(crate) fn pattern(re: &str) -> Result<Regex, PortalError> {
    Regex::new(re).map_err(|err| PortalError::Pattern {
        pattern: re.to_string(),
        message: err.to_string(),
    })
}

/// Elements whose text never renders.
const HIDDEN_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Text nodes below `element` in document order, skipping those inside a hidden element.
pub(crate) fn visible_text<'a>(element: &ElementRef<'a>) -> impl Iterator<Item = &'a str> + 'a {
    element.descendants().filter_map(|node| {
        let text = node.value().as_text()?;
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_TAGS.contains(&el.name()))
        });
        (!hidden).then_some(&**text)
    })
}

/// Concatenation of every trimmed visible text node below `element`.
pub(crate) fn stripped_text(element: &ElementRef<'_>) -> String {
    visible_text(element).map(str::trim).collect()
}

/// Visible text of `element`, whitespace included.
pub(crate) fn raw_text(element: &ElementRef<'_>) -> String {
    visible_text(element).collect()
}

/// Visible text of `element` as an ordered list of non-empty lines.
pub(crate) fn text_lines(element: &ElementRef<'_>) -> Vec<String> {
    visible_text(element)
        .flat_map(|chunk| chunk.split('\n'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn char_len(value: &str) -> usize {
    value.chars().count()
}
