use regex::Regex;
use scraper::{Html, Selector};

use crate::portal::html::{pattern, raw_text, selector};
use crate::portal::types::PortalError;

pub const ITEMS_PER_PAGE: usize = 10;

const COUNT_CAPTION_PATTERN: &str = r"該当する補助金.*?([0-9０-９]{1,4})\s*件";
const COUNT_FALLBACK_PATTERN: &str = r"([0-9０-９]{1,4})\s*件";
const PAGE_PARAM_PATTERN: &str = r"page=(\d+)";

/// Works out how many listing pages a search spans.
#[derive(Debug, Clone)]
pub struct PaginationResolver {
    link: Selector,
    caption: Regex,
    count_fallback: Regex,
    page_param: Regex,
}

impl PaginationResolver {
    pub fn new() -> Result<Self, PortalError> {
        Ok(Self {
            link: selector("a[href]")?,
            caption: pattern(COUNT_CAPTION_PATTERN)?,
            count_fallback: pattern(COUNT_FALLBACK_PATTERN)?,
            page_param: pattern(PAGE_PARAM_PATTERN)?,
        })
    }

    /// Result count and page count from one parse of a listing page.
    pub fn resolve(&self, html: &str) -> (usize, usize) {
        let document = Html::parse_document(html);
        let count = self.count_in(&document);
        (count, self.pages_in(&document, count))
    }

    /// Result count from the page caption; 0 when the page carries none.
    pub fn total_count(&self, html: &str) -> usize {
        self.resolve(html).0
    }

    /// Page count from the result count, or from the largest `page=` link when no
    /// count is shown. Never less than 1.
    pub fn total_pages(&self, html: &str) -> usize {
        self.resolve(html).1
    }

    fn pages_in(&self, document: &Html, count: usize) -> usize {
        if count > 0 {
            return count.div_ceil(ITEMS_PER_PAGE);
        }

        document
            .select(&self.link)
            .filter_map(|link| link.value().attr("href"))
            .filter_map(|href| self.page_param.captures(href))
            .filter_map(|caps| caps.get(1)?.as_str().parse::<usize>().ok())
            .fold(1, usize::max)
    }

    /// The caption is tried first; a match that fails to parse falls through.
    fn count_in(&self, document: &Html) -> usize {
        let text = raw_text(&document.root_element());
        [&self.caption, &self.count_fallback]
            .into_iter()
            .filter_map(|re| re.captures(&text))
            .find_map(|caps| parse_count(caps.get(1)?.as_str()))
            .unwrap_or(0)
    }
}

/// Parses ASCII or full-width decimal digits.
fn parse_count(digits: &str) -> Option<usize> {
    digits
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(u32::from(c) - u32::from('０') + u32::from('0')),
            other => Some(other),
        })
        .collect::<Option<String>>()?
        .parse()
        .ok()
}
