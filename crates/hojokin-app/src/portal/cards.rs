//! Listing-page card extraction.
//!
//! Result cards carry no stable class names, so a card is located by walking up from a
//! detail link to the nearest block container with enough text, and its fields are
//! recovered from the container's text lines by ordered pattern rules.

use std::collections::HashSet;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};
use url::Url;

use crate::portal::html::{char_len, pattern, raw_text, selector, text_lines};
use crate::portal::types::{PortalError, SubsidyRecord, SubsidyStatus};

pub const CARD_TAGS: [&str; 4] = ["article", "div", "li", "section"];
pub const MAX_ANCESTOR_DEPTH: usize = 5;
/// A container is a card only when its raw text is strictly longer than this.
pub const MIN_CARD_TEXT_CHARS: usize = 50;
pub const MIN_DESCRIPTION_CHARS: usize = 20;
pub const TAG_MARKER: char = '#';

const DETAIL_HREF_PATTERN: &str = r"/subsidies/(\d+)";
const PERIOD_LABEL: &str = "申請期間";
const AMOUNT_LABEL: &str = "上限金額";
const PERIOD_PATTERN: &str =
    r"申請期間\s*(\d{4}年\d{1,2}月\d{1,2}日)?\s*[〜～]\s*(\d{4}年\d{1,2}月\d{1,2}日)?";
const TITLE_BRACKET: &str = "「";
const TITLE_PREFIXED_BRACKET: &str = "：「";
const DESCRIPTION_EXCLUDES: [&str; 6] = ["公募中", "公募終了", "申請期間", "上限金額", "福井県", "北海道"];

pub const PREFECTURES: [&str; 47] = [
    "北海道", "青森県", "岩手県", "宮城県", "秋田県", "山形県", "福島県", "茨城県", "栃木県",
    "群馬県", "埼玉県", "千葉県", "東京都", "神奈川県", "新潟県", "富山県", "石川県", "福井県",
    "山梨県", "長野県", "岐阜県", "静岡県", "愛知県", "三重県", "滋賀県", "京都府", "大阪府",
    "兵庫県", "奈良県", "和歌山県", "鳥取県", "島根県", "岡山県", "広島県", "山口県", "徳島県",
    "香川県", "愛媛県", "高知県", "福岡県", "佐賀県", "長崎県", "熊本県", "大分県", "宮崎県",
    "鹿児島県", "沖縄県",
];

/// A field rule inspects one line and claims it by filling its field.
type FieldRule = fn(&CardExtractor, &str, &mut SubsidyRecord) -> bool;

/// Field rules in priority order. Each rule is owned by the first line it claims;
/// rules scan the same lines independently, so one line may feed several fields.
const FIELD_RULES: [(&str, FieldRule); 6] = [
    ("status", CardExtractor::claim_status),
    ("title", CardExtractor::claim_title),
    ("prefecture", CardExtractor::claim_prefecture),
    ("application_period", CardExtractor::claim_period),
    ("max_amount", CardExtractor::claim_amount),
    ("description", CardExtractor::claim_description),
];

#[derive(Debug, Clone)]
pub struct CardExtractor {
    portal_base: Url,
    anchor: Selector,
    detail_href: Regex,
    period: Regex,
    tag: Regex,
}

impl CardExtractor {
    pub fn new(portal_base: &Url) -> Result<Self, PortalError> {
        Ok(Self {
            portal_base: portal_base.clone(),
            anchor: selector("a[href]")?,
            detail_href: pattern(DETAIL_HREF_PATTERN)?,
            period: pattern(PERIOD_PATTERN)?,
            tag: pattern(r"#[^#]+")?,
        })
    }

    /// Extracts every new record on a listing page.
    ///
    /// `seen` holds detail URLs accepted earlier in the run and is extended in place.
    /// Serialized containers already examined on this page are tracked locally.
    pub fn extract_page(&self, html: &str, seen: &mut HashSet<String>) -> Vec<SubsidyRecord> {
        let document = Html::parse_document(html);
        let mut processed_cards: HashSet<String> = HashSet::new();
        let mut records = Vec::new();

        for anchor in document.select(&self.anchor) {
            if !self.is_detail_anchor(&anchor) {
                continue;
            }

            let mut node = *anchor;
            for _ in 0..MAX_ANCESTOR_DEPTH {
                let Some(parent) = node.parent() else {
                    break;
                };
                node = parent;

                let Some(container) = ElementRef::wrap(node) else {
                    continue;
                };
                if !CARD_TAGS.contains(&container.value().name()) {
                    continue;
                }

                let markup = container.html();
                if processed_cards.contains(&markup)
                    || char_len(&raw_text(&container)) <= MIN_CARD_TEXT_CHARS
                {
                    continue;
                }
                processed_cards.insert(markup);

                if let Some(record) = self.parse_card(&container, seen) {
                    records.push(record);
                }
                break;
            }
        }

        debug!(cards = processed_cards.len(), records = records.len(), "listing page parsed");
        records
    }

    fn is_detail_anchor(&self, anchor: &ElementRef<'_>) -> bool {
        anchor
            .value()
            .attr("href")
            .is_some_and(|href| self.detail_href.is_match(href))
    }

    fn parse_card(
        &self,
        container: &ElementRef<'_>,
        seen: &mut HashSet<String>,
    ) -> Option<SubsidyRecord> {
        let href = container
            .select(&self.anchor)
            .filter_map(|anchor| anchor.value().attr("href"))
            .find(|href| self.detail_href.is_match(href))?;

        let url = self.absolute_url(href)?;
        let Some(id) = self.extract_id(&url) else {
            trace!(%url, "detail link without numeric id");
            return None;
        };
        if !seen.insert(url.clone()) {
            trace!(%url, "detail link already collected");
            return None;
        }

        let record = self.parse_lines(id, url, &text_lines(container));
        record.has_title().then_some(record)
    }

    fn absolute_url(&self, href: &str) -> Option<String> {
        if href.starts_with("http") {
            return Some(href.to_string());
        }
        match self.portal_base.join(href) {
            Ok(url) => Some(url.to_string()),
            Err(err) => {
                debug!(href, error = %err, "unable to resolve detail link");
                None
            }
        }
    }

    pub fn extract_id(&self, url: &str) -> Option<String> {
        self.detail_href
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Maps card text lines onto record fields.
    pub fn parse_lines(
        &self,
        id: impl Into<String>,
        url: impl Into<String>,
        lines: &[String],
    ) -> SubsidyRecord {
        let mut record = SubsidyRecord::new(id, url);

        for (field, rule) in FIELD_RULES {
            if let Some(line) = lines.iter().find(|line| rule(self, line, &mut record)) {
                trace!(field, line = %line, "field claimed");
            }
        }

        record.tags = lines
            .iter()
            .filter(|line| line.starts_with(TAG_MARKER))
            .flat_map(|line| self.split_tags(line))
            .collect();

        record
    }

    fn split_tags(&self, line: &str) -> Vec<String> {
        self.tag
            .find_iter(line)
            .map(|m| m.as_str().trim().to_string())
            .collect()
    }

    fn claim_status(&self, line: &str, record: &mut SubsidyRecord) -> bool {
        let Some(status) = SubsidyStatus::from_line(line) else {
            return false;
        };
        record.status = Some(status);
        true
    }

    fn claim_title(&self, line: &str, record: &mut SubsidyRecord) -> bool {
        if !line.contains(TITLE_BRACKET) {
            return false;
        }
        record.title = line
            .replace(SubsidyStatus::OPEN_LABEL, "")
            .replace(SubsidyStatus::CLOSED_LABEL, "")
            .trim()
            .to_string();
        true
    }

    fn claim_prefecture(&self, line: &str, record: &mut SubsidyRecord) -> bool {
        if !PREFECTURES.contains(&line) {
            return false;
        }
        record.prefecture = Some(line.to_string());
        true
    }

    fn claim_period(&self, line: &str, record: &mut SubsidyRecord) -> bool {
        if !line.contains(PERIOD_LABEL) {
            return false;
        }
        record.application_period = Some(line.replace(PERIOD_LABEL, "").trim().to_string());
        if let Some(caps) = self.period.captures(line) {
            record.start_date = caps.get(1).map(|m| m.as_str().to_string());
            record.end_date = caps.get(2).map(|m| m.as_str().to_string());
        }
        true
    }

    fn claim_amount(&self, line: &str, record: &mut SubsidyRecord) -> bool {
        if !line.contains(AMOUNT_LABEL) {
            return false;
        }
        record.max_amount = Some(line.replace(AMOUNT_LABEL, "").trim().to_string());
        true
    }

    fn claim_description(&self, line: &str, record: &mut SubsidyRecord) -> bool {
        let eligible = !line.starts_with(TAG_MARKER)
            && !line.contains(TITLE_PREFIXED_BRACKET)
            && !DESCRIPTION_EXCLUDES.iter().any(|kw| line.contains(kw))
            && char_len(line) >= MIN_DESCRIPTION_CHARS;
        if eligible {
            record.description = Some(line.to_string());
        }
        eligible
    }
}
