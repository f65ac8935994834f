//! Dated-page traversal of the APOD site.
//!
//! Each day's page links to its neighbors, forming an implicit doubly
//! linked list of days. [`SiteNavigator`] fetches one page at a time,
//! extracts the day's entry into an immutable [`DatedResource`], and
//! supports stepping along the chain. The navigator itself holds only
//! configuration, never fetch-to-fetch state, so a failed fetch cannot
//! leave stale fields behind.

pub mod links;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::fetch::{FetchError, PageSource};
use links::{LinkMatcher, LinkRole};

/// Pattern of a dated-page link target, e.g. `ap240102.html`.
const DAY_LINK_PATTERN: &str = r"ap(\d{6})\.html";

/// Direction of a traversal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Prev => write!(f, "previous"),
            Direction::Next => write!(f, "next"),
        }
    }
}

/// Errors from fetching or parsing a dated page.
#[derive(Debug, Error)]
pub enum SiteError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Page at {url} is missing its {what}")]
    Parse { url: Url, what: &'static str },

    #[error("No picture for {}", .date.as_ref().map(DayId::as_str).unwrap_or("the requested day"))]
    NoImage { date: Option<DayId> },

    #[error("No {} day recorded for {}", .direction, .date.as_ref().map(DayId::as_str).unwrap_or("the current page"))]
    NoSuchNeighbor {
        direction: Direction,
        date: Option<DayId>,
    },

    #[error("Navigation loop: day {date} was already visited")]
    NavigationLoop { date: DayId },

    #[error("Invalid day identifier {0:?} (expected six digits, YYMMDD)")]
    InvalidDate(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A day identifier in the site's six-digit YYMMDD encoding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayId(String);

impl DayId {
    pub fn new(s: &str) -> Result<Self, SiteError> {
        if s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(SiteError::InvalidDate(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for DayId {
    type Err = SiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// One day's entry, parsed from its page. Immutable once constructed;
/// stepping to a neighbor produces a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedResource {
    /// The page's own date, when it could be determined.
    pub date: Option<DayId>,

    /// URL the entry was parsed from.
    pub page_url: Url,

    /// URL of the day's picture. `None` means "no picture today"
    /// (a video was featured instead), which is a valid entry.
    pub image_url: Option<Url>,

    /// Title text, trimmed.
    pub title: String,

    /// Explanation text, whitespace-normalized.
    pub caption: String,

    /// Date of the chronologically next day, if its link parsed.
    pub next_date: Option<DayId>,

    /// Date of the chronologically previous day, if its link parsed.
    pub prev_date: Option<DayId>,
}

impl DatedResource {
    /// Whether this day featured a picture at all.
    pub fn has_picture(&self) -> bool {
        self.image_url.is_some()
    }
}

impl fmt::Display for DatedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt(d: &Option<DayId>) -> &str {
            d.as_ref().map(DayId::as_str).unwrap_or("-")
        }

        writeln!(f, "date: {}", opt(&self.date))?;
        writeln!(f, "url: {}", self.page_url)?;
        writeln!(f, "title: {}", self.title)?;
        writeln!(f, "next: {}", opt(&self.next_date))?;
        writeln!(f, "prev: {}", opt(&self.prev_date))?;
        write!(
            f,
            "picurl: {}",
            self.image_url.as_ref().map(Url::as_str).unwrap_or("-")
        )
    }
}

/// Fetches and parses one dated page at a time.
pub struct SiteNavigator {
    source: Box<dyn PageSource>,
    base_url: Url,
    archive_url: Url,
    matcher: LinkMatcher,
    day_link: Regex,
}

impl SiteNavigator {
    pub fn new(
        source: impl PageSource + 'static,
        base_url: &str,
        archive_url: &str,
    ) -> Result<Self, SiteError> {
        Ok(Self {
            source: Box::new(source),
            base_url: Url::parse(base_url)?,
            archive_url: Url::parse(archive_url)?,
            matcher: LinkMatcher::default(),
            day_link: Regex::new(DAY_LINK_PATTERN).unwrap(),
        })
    }

    /// Replace the navigation-link matcher (e.g. after an upstream
    /// markup change).
    pub fn with_matcher(mut self, matcher: LinkMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Deterministic URL of a day's page: the base URL for "most recent",
    /// otherwise `{base}/ap{date}.html`.
    pub fn page_url(&self, date: Option<&DayId>) -> Result<Url, SiteError> {
        match date {
            None => Ok(self.base_url.clone()),
            Some(d) => {
                let raw = format!(
                    "{}/ap{}.html",
                    self.base_url.as_str().trim_end_matches('/'),
                    d
                );
                Ok(Url::parse(&raw)?)
            }
        }
    }

    /// Fetch and parse the page for `date` (or the most recent page).
    ///
    /// A missing day propagates as [`FetchError::NotFound`]; a page whose
    /// required elements (title, explanation paragraph) are absent fails
    /// with [`SiteError::Parse`]. A page without a picture is a success
    /// with `image_url` unset.
    pub async fn fetch(&self, date: Option<&DayId>) -> Result<DatedResource, SiteError> {
        let page_url = self.page_url(date)?;
        let body = self.source.get_text(&page_url).await?;
        self.parse_page(&page_url, date, &body)
    }

    /// Step to the chronologically next day.
    pub async fn step_next(&self, current: &DatedResource) -> Result<DatedResource, SiteError> {
        let date = current
            .next_date
            .clone()
            .ok_or_else(|| SiteError::NoSuchNeighbor {
                direction: Direction::Next,
                date: current.date.clone(),
            })?;
        self.fetch(Some(&date)).await
    }

    /// Step to the chronologically previous day.
    pub async fn step_prev(&self, current: &DatedResource) -> Result<DatedResource, SiteError> {
        let date = current
            .prev_date
            .clone()
            .ok_or_else(|| SiteError::NoSuchNeighbor {
                direction: Direction::Prev,
                date: current.date.clone(),
            })?;
        self.fetch(Some(&date)).await
    }

    /// Fetch `start` (or the most recent page), then walk backwards until
    /// a day with a picture is found.
    ///
    /// The walk is bounded: every visited date is recorded, and a repeated
    /// `prev` date fails with [`SiteError::NavigationLoop`] instead of
    /// spinning. Never returns a picture-less resource.
    pub async fn rewind_to_picture(
        &self,
        start: Option<&DayId>,
    ) -> Result<DatedResource, SiteError> {
        let mut current = self.fetch(start).await?;
        let mut visited: HashSet<DayId> = current.date.iter().cloned().collect();

        while !current.has_picture() {
            let prev = current
                .prev_date
                .clone()
                .ok_or_else(|| SiteError::NoSuchNeighbor {
                    direction: Direction::Prev,
                    date: current.date.clone(),
                })?;

            if !visited.insert(prev.clone()) {
                return Err(SiteError::NavigationLoop { date: prev });
            }

            debug!("No picture for {:?}, stepping back to {}", current.date, prev);
            current = self.fetch(Some(&prev)).await?;
        }

        Ok(current)
    }

    /// Fetch the archive listing and parse it into a date → title map.
    ///
    /// Malformed rows are skipped; a date listed twice keeps the later
    /// title in document order (the listing is authoritative
    /// top-to-bottom).
    pub async fn fetch_archive_index(&self) -> Result<BTreeMap<DayId, String>, SiteError> {
        let body = self.source.get_text(&self.archive_url).await?;
        Ok(parse_archive_index(&body))
    }

    /// Fetch the raw image bytes for a resource, unparsed.
    ///
    /// Decoding and re-encoding is the image codec's job.
    pub async fn fetch_image_bytes(&self, resource: &DatedResource) -> Result<Vec<u8>, SiteError> {
        let url = resource
            .image_url
            .as_ref()
            .ok_or_else(|| SiteError::NoImage {
                date: resource.date.clone(),
            })?;
        Ok(self.source.get_bytes(url).await?)
    }

    /// Parse one day's page into a [`DatedResource`].
    fn parse_page(
        &self,
        page_url: &Url,
        requested: Option<&DayId>,
        html: &str,
    ) -> Result<DatedResource, SiteError> {
        let document = Html::parse_document(html);

        let b_sel = Selector::parse("b").unwrap();
        let p_sel = Selector::parse("p").unwrap();
        let img_sel = Selector::parse("img").unwrap();
        let a_sel = Selector::parse("a").unwrap();

        // Title is the first bolded heading.
        let title = document
            .select(&b_sel)
            .next()
            .map(|b| collapse_whitespace(&b.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SiteError::Parse {
                url: page_url.clone(),
                what: "title heading",
            })?;

        let paragraphs: Vec<ElementRef> = document.select(&p_sel).collect();

        // Explanation lives in the third paragraph in document order.
        let caption = paragraphs
            .get(2)
            .map(|p| collapse_whitespace(&p.text().collect::<String>()))
            .ok_or_else(|| SiteError::Parse {
                url: page_url.clone(),
                what: "explanation paragraph",
            })?;

        // The picture, if any, is an <img> inside the second paragraph,
        // wrapped in an anchor whose href points at the full-size image.
        let image_url = paragraphs
            .get(1)
            .and_then(|p| p.select(&img_sel).next())
            .and_then(|img| img.parent().and_then(ElementRef::wrap))
            .filter(|el| el.value().name() == "a")
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| match self.resolve_href(href) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("Unparsable image link on {}: {}", page_url, e);
                    None
                }
            });

        let mut prev_date = None;
        let mut next_date = None;
        let mut self_date = requested.cloned();

        // Navigation bar is the fifth paragraph. A short anchor list means
        // the page shape changed; traversal fields stay unset but the
        // entry itself is still usable.
        match paragraphs.get(4) {
            Some(nav) => {
                let anchors: Vec<ElementRef> = nav.select(&a_sel).collect();
                if anchors.len() < 6 {
                    warn!(
                        "Navigation bar at {} has {} anchors (expected at least 6), skipping links",
                        page_url,
                        anchors.len()
                    );
                } else {
                    for anchor in anchors {
                        let text = anchor.text().collect::<String>();
                        let Some(role) = self.matcher.role_for(&text) else {
                            continue;
                        };
                        let href = anchor.value().attr("href").unwrap_or("");
                        match role {
                            LinkRole::Prev => prev_date = self.day_from_link(href),
                            // May be present even when there is no tomorrow
                            // yet; walking forward must expect NotFound.
                            LinkRole::Next => next_date = self.day_from_link(href),
                            LinkRole::Discuss => {
                                if self_date.is_none() {
                                    self_date = day_from_query(href);
                                }
                            }
                        }
                    }
                }
            }
            None => warn!("No navigation bar found at {}", page_url),
        }

        // When the caller asked for "most recent" and the page named its
        // own date, report the dated URL it is canonically reachable at.
        let page_url = match (&requested, &self_date) {
            (None, Some(date)) => self.page_url(Some(date))?,
            _ => page_url.clone(),
        };

        Ok(DatedResource {
            date: self_date,
            page_url,
            image_url,
            title,
            caption,
            next_date,
            prev_date,
        })
    }

    /// Extract a day id from a dated-page link target.
    fn day_from_link(&self, href: &str) -> Option<DayId> {
        self.day_link
            .captures(href)
            .and_then(|c| c.get(1))
            .and_then(|m| DayId::new(m.as_str()).ok())
    }

    /// Resolve a possibly relative link target against the base URL.
    fn resolve_href(&self, href: &str) -> Result<Url, url::ParseError> {
        if let Ok(absolute) = Url::parse(href) {
            return Ok(absolute);
        }
        Url::parse(&format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            href.trim_start_matches('/')
        ))
    }
}

/// Extract a day id from a `date=YYMMDD` query parameter.
fn day_from_query(href: &str) -> Option<DayId> {
    let (_, rest) = href.split_once("date=")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    DayId::new(&digits).ok()
}

/// Parse the archive listing: anchors inside the first bolded block,
/// date taken from the link target, title from the visible text.
fn parse_archive_index(html: &str) -> BTreeMap<DayId, String> {
    let document = Html::parse_document(html);

    let b_sel = Selector::parse("b").unwrap();
    let a_sel = Selector::parse("a").unwrap();

    let mut index = BTreeMap::new();

    let Some(block) = document.select(&b_sel).next() else {
        warn!("Archive listing has no bolded index block");
        return index;
    };

    for anchor in block.select(&a_sel) {
        let Some(href) = anchor.value().attr("href") else {
            debug!("Skipping archive row without target");
            continue;
        };
        let Some(date) = href.get(2..8).and_then(|s| DayId::new(s).ok()) else {
            debug!("Skipping archive row with malformed target: {}", href);
            continue;
        };
        let title = collapse_whitespace(&anchor.text().collect::<String>());
        if title.is_empty() {
            debug!("Skipping archive row with empty title for {}", date);
            continue;
        }
        index.insert(date, title);
    }

    index
}

/// Collapse all whitespace runs (including newlines) to single spaces.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BASE: &str = "https://apod.nasa.gov/apod";
    const ARCHIVE: &str = "https://apod.nasa.gov/apod/archivepix.html";

    fn navigator() -> SiteNavigator {
        let fetcher = crate::fetch::PageFetcher::with_defaults().unwrap();
        SiteNavigator::new(fetcher, BASE, ARCHIVE).unwrap()
    }

    /// A page shaped like a real APOD day: header paragraph, picture
    /// paragraph, bold title, explanation, footer, navigation bar.
    fn day_page(picture: &str, nav: &str) -> String {
        format!(
            r#"<html><body><center>
<p>Astronomy Picture of the Day</p>
<p>{picture}</p>
<b> The Horsehead Nebula </b><br>
<p> Explanation:  Dark dust and
glowing gas   mingle in this view. </p>
<p>Tomorrow's picture: open cluster</p>
<p>{nav}</p>
</center></body></html>"#
        )
    }

    fn full_nav() -> String {
        concat!(
            r#"<a href="ap240101.html">&lt;</a> | "#,
            r#"<a href="archivepix.html">Archive</a> | "#,
            r#"<a href="lib/aptree.html">Index</a> | "#,
            r#"<a href="https://asterisk.apod.com/discuss.php?date=240102">Discuss</a> | "#,
            r#"<a href="ap240103.html">&gt;</a> | "#,
            r#"<a href="lib/about_apod.html">About APOD</a>"#,
        )
        .to_string()
    }

    fn picture_paragraph() -> String {
        r#"<a href="image/2401/horsehead.jpg"><img src="image/2401/horsehead_small.jpg"></a>"#
            .to_string()
    }

    fn parse(nav: &SiteNavigator, requested: Option<&DayId>, html: &str) -> DatedResource {
        let url = nav.page_url(requested).unwrap();
        nav.parse_page(&url, requested, html).unwrap()
    }

    #[test]
    fn test_page_url_building() {
        let nav = navigator();

        assert_eq!(nav.page_url(None).unwrap().as_str(), "https://apod.nasa.gov/apod");

        let date = DayId::new("240102").unwrap();
        assert_eq!(
            nav.page_url(Some(&date)).unwrap().as_str(),
            "https://apod.nasa.gov/apod/ap240102.html"
        );
    }

    #[test]
    fn test_parse_full_page() {
        let nav = navigator();
        let date = DayId::new("240102").unwrap();
        let html = day_page(&picture_paragraph(), &full_nav());

        let resource = parse(&nav, Some(&date), &html);

        assert_eq!(resource.date, Some(date));
        assert_eq!(resource.title, "The Horsehead Nebula");
        assert_eq!(
            resource.caption,
            "Explanation: Dark dust and glowing gas mingle in this view."
        );
        assert_eq!(
            resource.image_url.as_ref().map(Url::as_str),
            Some("https://apod.nasa.gov/apod/image/2401/horsehead.jpg")
        );
        assert_eq!(resource.prev_date, Some(DayId::new("240101").unwrap()));
        assert_eq!(resource.next_date, Some(DayId::new("240103").unwrap()));
        assert!(resource.has_picture());
    }

    #[test]
    fn test_self_date_recovered_from_discuss_link() {
        let nav = navigator();
        let html = day_page(&picture_paragraph(), &full_nav());

        let resource = parse(&nav, None, &html);

        assert_eq!(resource.date, Some(DayId::new("240102").unwrap()));
        // Page URL is rewritten to the dated form once the date is known.
        assert_eq!(
            resource.page_url.as_str(),
            "https://apod.nasa.gov/apod/ap240102.html"
        );
    }

    #[test]
    fn test_requested_date_is_not_overridden() {
        let nav = navigator();
        let date = DayId::new("991231").unwrap();
        let html = day_page(&picture_paragraph(), &full_nav());

        let resource = parse(&nav, Some(&date), &html);

        // The discuss link says 240102, but the caller's date wins.
        assert_eq!(resource.date, Some(date));
    }

    #[test]
    fn test_no_picture_is_a_valid_entry() {
        let nav = navigator();
        let html = day_page("A video was featured today.", &full_nav());

        let resource = parse(&nav, None, &html);

        assert!(!resource.has_picture());
        assert_eq!(resource.image_url, None);
        assert_eq!(resource.title, "The Horsehead Nebula");
        assert_eq!(resource.prev_date, Some(DayId::new("240101").unwrap()));
    }

    #[test]
    fn test_missing_title_is_a_parse_error() {
        let nav = navigator();
        let url = nav.page_url(None).unwrap();
        let html = "<html><body><p>a</p><p>b</p><p>c</p></body></html>";

        let err = nav.parse_page(&url, None, html).unwrap_err();
        assert!(matches!(err, SiteError::Parse { what: "title heading", .. }));
    }

    #[test]
    fn test_missing_explanation_is_a_parse_error() {
        let nav = navigator();
        let url = nav.page_url(None).unwrap();
        let html = "<html><body><b>Title</b><p>one</p><p>two</p></body></html>";

        let err = nav.parse_page(&url, None, html).unwrap_err();
        assert!(matches!(
            err,
            SiteError::Parse {
                what: "explanation paragraph",
                ..
            }
        ));
    }

    #[test]
    fn test_short_navigation_bar_is_a_soft_failure() {
        let nav = navigator();
        let short_nav = r#"<a href="ap240101.html">&lt;</a> <a href="ap240103.html">&gt;</a>"#;
        let html = day_page(&picture_paragraph(), short_nav);

        let resource = parse(&nav, None, &html);

        assert_eq!(resource.prev_date, None);
        assert_eq!(resource.next_date, None);
        assert_eq!(resource.date, None);
        assert!(resource.has_picture());
    }

    #[test]
    fn test_malformed_neighbor_link_leaves_date_absent() {
        let nav = navigator();
        let bad_prev_nav = concat!(
            r#"<a href="yesterday.html">&lt;</a> | "#,
            r#"<a href="archivepix.html">Archive</a> | "#,
            r#"<a href="lib/aptree.html">Index</a> | "#,
            r#"<a href="https://asterisk.apod.com/discuss.php?date=240102">Discuss</a> | "#,
            r#"<a href="ap240103.html">&gt;</a> | "#,
            r#"<a href="lib/about_apod.html">About APOD</a>"#,
        );
        let html = day_page(&picture_paragraph(), bad_prev_nav);

        let resource = parse(&nav, None, &html);

        assert_eq!(resource.prev_date, None);
        assert_eq!(resource.next_date, Some(DayId::new("240103").unwrap()));
    }

    #[test]
    fn test_custom_matcher_swaps_glyphs() {
        let matcher = LinkMatcher::new(vec![
            ("«".to_string(), LinkRole::Prev),
            ("»".to_string(), LinkRole::Next),
        ]);
        let nav = navigator().with_matcher(matcher);

        let alt_nav = concat!(
            r#"<a href="ap240101.html">«</a> | "#,
            r#"<a href="archivepix.html">Archive</a> | "#,
            r#"<a href="lib/aptree.html">Index</a> | "#,
            r#"<a href="discuss.php?date=240102">Discuss</a> | "#,
            r#"<a href="ap240103.html">»</a> | "#,
            r#"<a href="lib/about_apod.html">About APOD</a>"#,
        );
        let html = day_page(&picture_paragraph(), alt_nav);

        let resource = parse(&nav, None, &html);

        assert_eq!(resource.prev_date, Some(DayId::new("240101").unwrap()));
        assert_eq!(resource.next_date, Some(DayId::new("240103").unwrap()));
        // "Discuss" is no longer a rule, so the self date stays unknown.
        assert_eq!(resource.date, None);
    }

    #[test]
    fn test_caption_whitespace_is_normalized() {
        let nav = navigator();
        let html = day_page(&picture_paragraph(), &full_nav());

        let resource = parse(&nav, None, &html);

        assert!(!resource.caption.contains('\n'));
        assert!(!resource.caption.contains("  "));
    }

    #[test]
    fn test_archive_index_last_duplicate_wins() {
        let html = r#"<html><body>
<b>
<a href="ap240101.html">Comet Tails</a><br>
<a href="ap240102.html">First Title</a><br>
<a href="ap240102.html">Corrected Title</a><br>
</b>
</body></html>"#;

        let index = parse_archive_index(html);

        assert_eq!(index.len(), 2);
        assert_eq!(
            index.get(&DayId::new("240102").unwrap()),
            Some(&"Corrected Title".to_string())
        );
    }

    #[test]
    fn test_archive_index_skips_malformed_rows() {
        let html = r#"<html><body>
<b>
<a href="ap240101.html">Good Row</a><br>
<a href="notadate.html">Bad Target</a><br>
<a>No Target</a><br>
<a href="ap240103.html">Another Good Row</a><br>
</b>
</body></html>"#;

        let index = parse_archive_index(html);

        assert_eq!(index.len(), 2);
        assert!(index.contains_key(&DayId::new("240101").unwrap()));
        assert!(index.contains_key(&DayId::new("240103").unwrap()));
    }

    #[test]
    fn test_archive_index_empty_without_bold_block() {
        let index = parse_archive_index("<html><body><p>nothing here</p></body></html>");
        assert!(index.is_empty());
    }

    #[test]
    fn test_day_id_validation() {
        assert!(DayId::new("240102").is_ok());
        assert!(DayId::new("24010").is_err());
        assert!(DayId::new("2401023").is_err());
        assert!(DayId::new("24010x").is_err());
        assert!(DayId::new("").is_err());
    }

    #[test]
    fn test_day_from_query() {
        assert_eq!(
            day_from_query("https://asterisk.apod.com/discuss.php?date=240102"),
            Some(DayId::new("240102").unwrap())
        );
        assert_eq!(
            day_from_query("discuss.php?date=240102&lang=en"),
            Some(DayId::new("240102").unwrap())
        );
        assert_eq!(day_from_query("discuss.php"), None);
        assert_eq!(day_from_query("discuss.php?date=24"), None);
    }

    #[test]
    fn test_display_renders_all_fields() {
        let nav = navigator();
        let html = day_page(&picture_paragraph(), &full_nav());
        let resource = parse(&nav, None, &html);

        let rendered = resource.to_string();
        assert!(rendered.contains("date: 240102"));
        assert!(rendered.contains("next: 240103"));
        assert!(rendered.contains("prev: 240101"));
        assert!(rendered.contains("picurl: https://apod.nasa.gov/apod/image/2401/horsehead.jpg"));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n b\t\tc  "), "a b c");
        assert_eq!(collapse_whitespace(""), "");
    }

    // ── Traversal against a canned site ─────────────────────────────────

    use async_trait::async_trait;
    use std::collections::HashMap;

    /// In-memory site: URL → page text, URL → image bytes. Anything not
    /// registered is a 404.
    struct MockSite {
        pages: HashMap<String, String>,
        images: HashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl PageSource for MockSite {
        async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| FetchError::NotFound { url: url.clone() })
        }

        async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
            self.images
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| FetchError::NotFound { url: url.clone() })
        }
    }

    struct SiteBuilder {
        pages: HashMap<String, String>,
        images: HashMap<String, Vec<u8>>,
    }

    impl SiteBuilder {
        fn new() -> Self {
            Self {
                pages: HashMap::new(),
                images: HashMap::new(),
            }
        }

        /// Register a day page linked to its neighbors. A `None` neighbor
        /// becomes an anchor with a non-dated target, as the real site
        /// emits for edge pages.
        fn day(mut self, date: &str, prev: Option<&str>, next: Option<&str>, picture: bool) -> Self {
            let picture_html = if picture {
                format!(r#"<a href="image/{date}.jpg"><img src="image/{date}_s.jpg"></a>"#)
            } else {
                "A video was featured today.".to_string()
            };
            let prev_href = prev
                .map(|d| format!("ap{d}.html"))
                .unwrap_or_else(|| "calendar.html".to_string());
            let next_href = next
                .map(|d| format!("ap{d}.html"))
                .unwrap_or_else(|| "calendar.html".to_string());
            let nav = format!(
                concat!(
                    r#"<a href="{prev}">&lt;</a> | "#,
                    r#"<a href="archivepix.html">Archive</a> | "#,
                    r#"<a href="lib/aptree.html">Index</a> | "#,
                    r#"<a href="discuss.php?date={date}">Discuss</a> | "#,
                    r#"<a href="{next}">&gt;</a> | "#,
                    r#"<a href="lib/about_apod.html">About APOD</a>"#,
                ),
                prev = prev_href,
                date = date,
                next = next_href,
            );
            let url = format!("{BASE}/ap{date}.html");
            self.pages.insert(url, day_page(&picture_html, &nav));
            if picture {
                self.images
                    .insert(format!("{BASE}/image/{date}.jpg"), date.as_bytes().to_vec());
            }
            self
        }

        fn archive(mut self, html: &str) -> Self {
            self.pages.insert(ARCHIVE.to_string(), html.to_string());
            self
        }

        fn build(self) -> SiteNavigator {
            let source = MockSite {
                pages: self.pages,
                images: self.images,
            };
            SiteNavigator::new(source, BASE, ARCHIVE).unwrap()
        }
    }

    fn day(s: &str) -> DayId {
        DayId::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_of_missing_day_is_not_found() {
        let nav = SiteBuilder::new().build();

        let err = nav.fetch(Some(&day("240102"))).await.unwrap_err();
        assert!(matches!(err, SiteError::Fetch(ref f) if f.is_not_found()));
    }

    #[tokio::test]
    async fn test_step_round_trip() {
        let nav = SiteBuilder::new()
            .day("240101", None, Some("240102"), true)
            .day("240102", Some("240101"), Some("240103"), true)
            .day("240103", Some("240102"), None, true)
            .build();

        let start = nav.fetch(Some(&day("240102"))).await.unwrap();
        let next = nav.step_next(&start).await.unwrap();
        assert_eq!(next.date, Some(day("240103")));

        let back = nav.step_prev(&next).await.unwrap();
        assert_eq!(back.date, start.date);
    }

    #[tokio::test]
    async fn test_step_past_the_edge_fails_with_no_such_neighbor() {
        let nav = SiteBuilder::new()
            .day("240103", Some("240102"), None, true)
            .build();

        let edge = nav.fetch(Some(&day("240103"))).await.unwrap();
        assert_eq!(edge.next_date, None);

        let err = nav.step_next(&edge).await.unwrap_err();
        assert!(matches!(
            err,
            SiteError::NoSuchNeighbor {
                direction: Direction::Next,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_dangling_next_link_surfaces_as_not_found() {
        // The newest page can carry a parseable link to a tomorrow that
        // does not exist yet.
        let nav = SiteBuilder::new()
            .day("240103", Some("240102"), Some("240104"), true)
            .build();

        let newest = nav.fetch(Some(&day("240103"))).await.unwrap();
        assert_eq!(newest.next_date, Some(day("240104")));

        let err = nav.step_next(&newest).await.unwrap_err();
        assert!(matches!(err, SiteError::Fetch(ref f) if f.is_not_found()));
    }

    #[tokio::test]
    async fn test_rewind_skips_pictureless_days() {
        let nav = SiteBuilder::new()
            .day("240101", None, Some("240102"), true)
            .day("240102", Some("240101"), Some("240103"), false)
            .day("240103", Some("240102"), None, false)
            .build();

        let found = nav.rewind_to_picture(Some(&day("240103"))).await.unwrap();

        assert!(found.has_picture());
        assert_eq!(found.date, Some(day("240101")));
    }

    #[tokio::test]
    async fn test_rewind_returns_start_when_it_has_a_picture() {
        let nav = SiteBuilder::new()
            .day("240103", Some("240102"), None, true)
            .build();

        let found = nav.rewind_to_picture(Some(&day("240103"))).await.unwrap();
        assert_eq!(found.date, Some(day("240103")));
    }

    #[tokio::test]
    async fn test_rewind_detects_navigation_loops() {
        let nav = SiteBuilder::new()
            .day("240101", Some("240102"), Some("240102"), false)
            .day("240102", Some("240101"), None, false)
            .build();

        let err = nav.rewind_to_picture(Some(&day("240102"))).await.unwrap_err();
        assert!(matches!(err, SiteError::NavigationLoop { .. }));
    }

    #[tokio::test]
    async fn test_rewind_propagates_missing_past() {
        let nav = SiteBuilder::new()
            .day("240102", Some("240101"), None, false)
            .build();

        // 240101 is linked but not served.
        let err = nav.rewind_to_picture(Some(&day("240102"))).await.unwrap_err();
        assert!(matches!(err, SiteError::Fetch(ref f) if f.is_not_found()));
    }

    #[tokio::test]
    async fn test_fetch_image_bytes() {
        let nav = SiteBuilder::new()
            .day("240102", Some("240101"), None, true)
            .build();

        let resource = nav.fetch(Some(&day("240102"))).await.unwrap();
        let bytes = nav.fetch_image_bytes(&resource).await.unwrap();
        assert_eq!(bytes, b"240102");
    }

    #[tokio::test]
    async fn test_fetch_image_bytes_without_picture_is_no_image() {
        let nav = SiteBuilder::new()
            .day("240102", Some("240101"), None, false)
            .build();

        let resource = nav.fetch(Some(&day("240102"))).await.unwrap();
        let err = nav.fetch_image_bytes(&resource).await.unwrap_err();
        assert!(matches!(err, SiteError::NoImage { .. }));
    }

    #[tokio::test]
    async fn test_fetch_archive_index_through_transport() {
        let nav = SiteBuilder::new()
            .archive(
                r#"<html><body><b>
<a href="ap240101.html">Comet Tails</a><br>
<a href="ap240102.html">Aurora Over Iceland</a><br>
</b></body></html>"#,
            )
            .build();

        let index = nav.fetch_archive_index().await.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(
            index.get(&day("240102")),
            Some(&"Aurora Over Iceland".to_string())
        );
    }
}
