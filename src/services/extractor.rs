//! Article link and field extraction.
//!
//! Both the listing page and article pages are handled with ordered rule
//! lists: each rule pairs a CSS selector with a mapper, and the first rule
//! producing a value wins. Selector strings come from [`ExtractorConfig`]
//! so a site markup revision only needs a config change.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ArticleDraft, ExtractorConfig};
use crate::services::normalize::{collapse_whitespace, html_to_text, parse_date};
use crate::utils::{path_contains_any, resolve_url};

/// Maps a matched element to a field value; `None` means "try the next".
type FieldMapper<T> = fn(ElementRef<'_>) -> Option<T>;

/// One step of a cascading field lookup.
struct FieldRule<T> {
    selector: Selector,
    mapper: FieldMapper<T>,
}

impl<T> FieldRule<T> {
    fn apply(&self, document: &Html) -> Option<T> {
        document.select(&self.selector).find_map(self.mapper)
    }
}

fn first_match<T>(rules: &[FieldRule<T>], document: &Html) -> Option<T> {
    rules.iter().find_map(|rule| rule.apply(document))
}

fn element_text(el: ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "));
    (!text.is_empty()).then_some(text)
}

fn element_date(el: ElementRef<'_>) -> Option<DateTime<Utc>> {
    let from_attr = el
        .value()
        .attr("datetime")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(parse_date);
    from_attr.or_else(|| element_text(el).as_deref().and_then(parse_date))
}

/// Extracts article links from listing pages and fields from article pages.
pub struct ArticleExtractor {
    list_selectors: Vec<Selector>,
    any_anchor: Selector,
    article_path_markers: Vec<String>,
    title_rules: Vec<FieldRule<String>>,
    date_rules: Vec<FieldRule<DateTime<Utc>>>,
    summary_rules: Vec<FieldRule<String>>,
    body_containers: Vec<Selector>,
    strip: Option<Selector>,
    paragraph: Selector,
    municipality: String,
}

impl ArticleExtractor {
    /// Compile the configured selectors.
    pub fn new(config: &ExtractorConfig, municipality: impl Into<String>) -> Result<Self> {
        let strip = if config.strip_selectors.is_empty() {
            None
        } else {
            Some(Self::parse_selector(&config.strip_selectors.join(", "))?)
        };

        Ok(Self {
            list_selectors: Self::parse_selectors(&config.list_selectors)?,
            any_anchor: Self::parse_selector("a[href]")?,
            article_path_markers: config.article_path_markers.clone(),
            title_rules: Self::field_rules(&config.title_selectors, element_text)?,
            date_rules: Self::field_rules(&config.date_selectors, element_date)?,
            summary_rules: Self::field_rules(&config.summary_selectors, element_text)?,
            body_containers: Self::parse_selectors(&config.body_selectors)?,
            strip,
            paragraph: Self::parse_selector("p")?,
            municipality: municipality.into(),
        })
    }

    /// Extract article links from a listing page.
    ///
    /// Links come from the listing selectors in priority order, then from
    /// every anchor on the page if the selectors found nothing. Only links
    /// whose path looks like an article survive. Order is first-seen.
    pub fn parse_list(&self, markup: &str, base_url: &Url) -> Vec<Url> {
        let document = Html::parse_document(markup);
        let mut links = Vec::new();
        let mut seen = HashSet::new();

        for selector in &self.list_selectors {
            for anchor in document.select(selector) {
                self.collect_link(anchor, base_url, &mut links, &mut seen);
            }
        }

        if links.is_empty() {
            log::debug!("No links via listing selectors on {base_url}, scanning all anchors");
            for anchor in document.select(&self.any_anchor) {
                self.collect_link(anchor, base_url, &mut links, &mut seen);
            }
        }

        links
    }

    fn collect_link(
        &self,
        anchor: ElementRef<'_>,
        base_url: &Url,
        links: &mut Vec<Url>,
        seen: &mut HashSet<Url>,
    ) {
        let Some(href) = anchor.value().attr("href") else {
            return;
        };
        let Some(url) = resolve_url(base_url, href) else {
            return;
        };
        if path_contains_any(&url, &self.article_path_markers) && seen.insert(url.clone()) {
            links.push(url);
        }
    }

    /// Extract a draft from an article page. Never fails.
    pub fn parse_article(&self, markup: &str, url: &Url) -> ArticleDraft {
        let mut document = Html::parse_document(markup);

        let title = first_match(&self.title_rules, &document).unwrap_or_else(|| url.to_string());
        let published_at = first_match(&self.date_rules, &document);
        let summary = first_match(&self.summary_rules, &document);
        let body_text = self.extract_body(&mut document);

        ArticleDraft {
            title,
            summary,
            body_text,
            published_at,
            source_url: url.clone(),
            municipality: self.municipality.clone(),
        }
    }

    fn extract_body(&self, document: &mut Html) -> Option<String> {
        let container_id = self
            .body_containers
            .iter()
            .find_map(|selector| document.select(selector).next())
            .unwrap_or_else(|| document.root_element())
            .id();

        if let Some(strip) = &self.strip {
            let doomed: Vec<_> = document
                .tree
                .get(container_id)
                .and_then(ElementRef::wrap)
                .map(|container| container.select(strip).map(|el| el.id()).collect())
                .unwrap_or_default();
            for id in doomed {
                if let Some(mut node) = document.tree.get_mut(id) {
                    node.detach();
                }
            }
        }

        let container = document.tree.get(container_id).and_then(ElementRef::wrap)?;
        let paragraphs: Vec<String> = container
            .select(&self.paragraph)
            .filter_map(element_text)
            .collect();

        if paragraphs.is_empty() {
            html_to_text(&container.html())
        } else {
            Some(paragraphs.join("\n\n"))
        }
    }

    fn field_rules<T>(selectors: &[String], mapper: FieldMapper<T>) -> Result<Vec<FieldRule<T>>> {
        selectors
            .iter()
            .map(|s| Self::parse_selector(s).map(|selector| FieldRule { selector, mapper }))
            .collect()
    }

    fn parse_selectors(selectors: &[String]) -> Result<Vec<Selector>> {
        selectors.iter().map(|s| Self::parse_selector(s)).collect()
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}
