//! Details page extraction
//!
//! Field labels on the site are Persian. Values listed under a label are
//! deduplicated and joined with the Persian comma.

use crate::site::{ExtractError, Extractor};
use crate::storage::{ItemId, Record};
use crate::url::{numeric_param, resolve_url};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

const LIST_SEPARATOR: &str = "، ";

const DURATION_KEYS: &[&str] = &["مدت", "مدت زمان", "زمان"];
const EPISODE_KEYS: &[&str] = &["تعداد قسمت", "تعداد قطعه", "تعداد قطعات", "تعداد قسمت‌ها"];

static RE_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}:\d{2}:\d{2}|\d{1,3}:\d{2})").expect("valid duration regex")
});
static RE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid number regex"));

/// Extractor for IranSeda audiobook details pages
#[derive(Debug, Clone)]
pub struct DetailsExtractor {
    base: Url,
}

impl DetailsExtractor {
    pub fn new(base: Url) -> Self {
        Self { base }
    }
}

impl Extractor for DetailsExtractor {
    fn extract(&self, content: &str, source_url: &str) -> Result<Record, ExtractError> {
        if content.trim().is_empty() {
            return Err(ExtractError::Empty);
        }

        let page = Page {
            doc: Html::parse_document(content),
            base: &self.base,
        };

        let (duration, episode_count) = page.duration_and_episodes();

        Ok(Record {
            id: numeric_param(source_url, "g", false).map(ItemId),
            attachment_id: page.attachment_id(),
            title: page.text_of("h1.titel"),
            description: page.text_of("#about .body-module"),
            detail: page
                .text_of("#review .body-module .more")
                .or_else(|| page.text_of("#review .body-module")),
            language: page.language(),
            country: None,
            author: page
                .labelled("نویسنده")
                .or_else(|| page.metadata("عنوان كتاب مرجع"))
                .or_else(|| page.metadata("نویسنده")),
            translator: page.metadata("ترجمه"),
            narrator: page.metadata("راوی"),
            director: page
                .labelled("کارگردان")
                .or_else(|| page.metadata("کارگردان")),
            producer: page.metadata("تهیه‌کننده"),
            sound_engineer: page.metadata("صدابردار"),
            effector: page
                .metadata("افکتور")
                .or_else(|| page.metadata("افكتور")),
            actors: page.metadata("بازیگران"),
            genre: page
                .metadata("کلمه کلیدی")
                .or_else(|| page.metadata("نوع متن")),
            category: page
                .metadata("دسته بندی ها")
                .or_else(|| page.labelled("دسته‌بندی")),
            duration,
            episode_count,
            cover_image_url: page.og_image().or_else(|| page.first_image()),
            source_url: Some(source_url.to_string()),
            player_link: None,
            full_mp3_url: None,
            all_mp3s: None,
        })
    }
}

struct Page<'a> {
    doc: Html,
    base: &'a Url,
}

impl Page<'_> {
    fn select<'d>(&'d self, css: &str) -> Vec<ElementRef<'d>> {
        match Selector::parse(css) {
            Ok(selector) => self.doc.select(&selector).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn text_of(&self, css: &str) -> Option<String> {
        self.select(css).first().and_then(|el| non_empty(element_text(*el)))
    }

    fn resolve(&self, href: &str) -> Option<String> {
        resolve_url(self.base, href).ok()
    }

    fn language(&self) -> Option<String> {
        self.select(r#"meta[property="og:locale"]"#)
            .first()
            .and_then(|m| m.value().attr("content"))
            .filter(|locale| locale.contains("fa"))
            .map(|_| "فارسی".to_string())
    }

    /// Values from the `.item-info` block whose `<strong>` label contains `label`
    fn labelled(&self, label: &str) -> Option<String> {
        let strong = Selector::parse("strong").ok()?;
        let values = Selector::parse("a, span").ok()?;

        for dd in self.select(".item-info dd.field") {
            let Some(heading) = dd.select(&strong).next() else {
                continue;
            };
            if !element_text(heading).contains(label) {
                continue;
            }
            let items = dd
                .select(&values)
                .map(element_text)
                .filter(|t| !t.is_empty() && t != label);
            return join_unique(items);
        }
        None
    }

    /// Values from the `#tags` definition list whose `<dt>` contains `label`
    fn metadata(&self, label: &str) -> Option<String> {
        let span = Selector::parse("span").ok()?;

        for dt in self.select("#tags dt") {
            if !element_text(dt).contains(label) {
                continue;
            }
            let Some(dd) = next_dd(dt) else {
                continue;
            };
            let values = dd
                .select(&span)
                .map(element_text)
                .filter(|v| !v.is_empty() && v != ",");
            if let Some(joined) = join_unique(values) {
                return Some(joined);
            }
        }
        None
    }

    fn duration_and_episodes(&self) -> (Option<String>, Option<u32>) {
        let mut duration = None;
        let mut episodes = None;

        for dd in self.select(".item-info dd.field") {
            let text = element_text(dd);
            if duration.is_none() && DURATION_KEYS.iter().any(|k| text.contains(k)) {
                duration = find_duration(&text);
            }
            if episodes.is_none() && EPISODE_KEYS.iter().any(|k| text.contains(k)) {
                episodes = find_number(&text);
            }
        }

        for dt in self.select("#tags dt") {
            let label = element_text(dt);
            let Some(dd) = next_dd(dt) else {
                continue;
            };
            let text = element_text(dd);
            if duration.is_none() && DURATION_KEYS.iter().any(|k| label.contains(k)) {
                duration = find_duration(&text);
            }
            if episodes.is_none() && EPISODE_KEYS.iter().any(|k| label.contains(k)) {
                episodes = find_number(&text);
            }
        }

        (duration, episodes)
    }

    fn og_image(&self) -> Option<String> {
        let meta = self.select(r#"meta[property="og:image"]"#);
        let meta = meta.first()?;
        let href = meta
            .value()
            .attr("content")
            .or_else(|| meta.value().attr("value"))
            .filter(|v| !v.trim().is_empty())?;
        self.resolve(href)
    }

    fn first_image(&self) -> Option<String> {
        [".product-view .item .image img", ".cover img", "img"]
            .iter()
            .find_map(|css| self.select(css).into_iter().next())
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| self.resolve(src))
    }

    /// Attachment id from the cover image, any image, or any anchor
    fn attachment_id(&self) -> Option<u64> {
        if let Some(id) = self.og_image().and_then(|og| numeric_param(&og, "attid", true)) {
            return Some(id);
        }

        let from_images = self
            .select("img[src]")
            .into_iter()
            .filter_map(|img| img.value().attr("src"))
            .find_map(|src| numeric_param(src, "attid", true));
        if from_images.is_some() {
            return from_images;
        }

        self.select("a[href]")
            .into_iter()
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| numeric_param(href, "attid", true))
    }
}

/// Text of an element with whitespace runs collapsed to single spaces
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn next_dd(dt: ElementRef<'_>) -> Option<ElementRef<'_>> {
    dt.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "dd")
}

fn join_unique(values: impl Iterator<Item = String>) -> Option<String> {
    let mut unique: Vec<String> = Vec::new();
    for value in values {
        if !unique.contains(&value) {
            unique.push(value);
        }
    }
    non_empty(unique.join(LIST_SEPARATOR))
}

fn find_duration(text: &str) -> Option<String> {
    RE_DURATION.find(text).map(|m| m.as_str().to_string())
}

fn find_number(text: &str) -> Option<u32> {
    RE_NUMBER.find(text).and_then(|m| m.as_str().parse().ok())
}
