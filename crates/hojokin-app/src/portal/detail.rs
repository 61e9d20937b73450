//! Detail-page enrichment: labelled sections, a long-text excerpt and the official link.

use scraper::{ElementRef, Html, Selector};

use crate::portal::html::{char_len, selector, stripped_text};
use crate::portal::types::{PortalError, SubsidyDetails};

const HEADING_SELECTOR: &str = "h2, h3, h4, dt, th";
const MAIN_CLASS_HINTS: [&str; 3] = ["content", "detail", "main"];
const MIN_PARAGRAPH_CHARS: usize = 50;
const MAX_PARAGRAPHS: usize = 3;
const OFFICIAL_LINK_HINTS: [&str; 3] = ["公式", "詳細", "申請"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetailField {
    Overview,
    Target,
    SubsidyRate,
    SubsidyLimit,
    EligibleExpenses,
    ApplicationMethod,
    Contact,
}

/// Heading keywords in priority order; the first rule matching a heading wins.
const HEADING_RULES: [(&[&str], DetailField); 7] = [
    (&["概要", "目的"], DetailField::Overview),
    (&["対象者", "対象"], DetailField::Target),
    (&["補助率"], DetailField::SubsidyRate),
    (&["補助上限", "補助金額"], DetailField::SubsidyLimit),
    (&["対象経費", "補助対象"], DetailField::EligibleExpenses),
    (&["申請方法"], DetailField::ApplicationMethod),
    (&["問い合わせ", "連絡先"], DetailField::Contact),
];

fn classify_heading(heading: &str) -> Option<DetailField> {
    HEADING_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|kw| heading.contains(kw)))
        .map(|(_, field)| *field)
}

fn slot(details: &mut SubsidyDetails, field: DetailField) -> &mut Option<String> {
    match field {
        DetailField::Overview => &mut details.overview,
        DetailField::Target => &mut details.target,
        DetailField::SubsidyRate => &mut details.subsidy_rate,
        DetailField::SubsidyLimit => &mut details.subsidy_limit,
        DetailField::EligibleExpenses => &mut details.eligible_expenses,
        DetailField::ApplicationMethod => &mut details.application_method,
        DetailField::Contact => &mut details.contact,
    }
}

#[derive(Debug, Clone)]
pub struct DetailEnricher {
    heading: Selector,
    main: Selector,
    article: Selector,
    classed: Selector,
    paragraph: Selector,
    link: Selector,
    portal_host: String,
}

impl DetailEnricher {
    /// `portal_host` is excluded when looking for the external official link.
    pub fn new(portal_host: impl Into<String>) -> Result<Self, PortalError> {
        Ok(Self {
            heading: selector(HEADING_SELECTOR)?,
            main: selector("main")?,
            article: selector("article")?,
            classed: selector("[class]")?,
            paragraph: selector("p")?,
            link: selector("a[href]")?,
            portal_host: portal_host.into(),
        })
    }

    pub fn extract(&self, html: &str) -> SubsidyDetails {
        let document = Html::parse_document(html);
        let mut details = SubsidyDetails::default();

        for heading in document.select(&self.heading) {
            let Some(field) = classify_heading(&stripped_text(&heading)) else {
                continue;
            };
            let value = heading
                .next_siblings()
                .find_map(ElementRef::wrap)
                .map(|sibling| stripped_text(&sibling))
                .unwrap_or_default();
            *slot(&mut details, field) = Some(value);
        }

        if details.overview.as_deref().is_none_or(str::is_empty) {
            details.full_description = self.long_excerpt(&document);
        }
        details.official_url = self.official_url(&document);

        details
    }

    fn main_container<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        document
            .select(&self.main)
            .next()
            .or_else(|| document.select(&self.article).next())
            .or_else(|| {
                document.select(&self.classed).find(|element| {
                    element
                        .value()
                        .classes()
                        .any(|class| MAIN_CLASS_HINTS.iter().any(|hint| class.contains(hint)))
                })
            })
    }

    fn long_excerpt(&self, document: &Html) -> Option<String> {
        let container = self.main_container(document)?;
        let paragraphs: Vec<String> = container
            .select(&self.paragraph)
            .map(|p| stripped_text(&p))
            .filter(|text| char_len(text) > MIN_PARAGRAPH_CHARS)
            .take(MAX_PARAGRAPHS)
            .collect();
        (!paragraphs.is_empty()).then(|| paragraphs.join("\n"))
    }

    fn official_url(&self, document: &Html) -> Option<String> {
        document.select(&self.link).find_map(|link| {
            let href = link.value().attr("href")?;
            let text = stripped_text(&link);
            let labelled = OFFICIAL_LINK_HINTS.iter().any(|hint| text.contains(hint));
            let external = href.starts_with("http") && !href.contains(&self.portal_host);
            (labelled && external).then(|| href.to_string())
        })
    }
}
