//! holychords.com record source.
//!
//! Acquisition is two-phase: the author index yields the author list, then
//! each author page yields that author's song identifiers (and enriches the
//! author with a description and thumbnail). Detail extraction pulls the
//! song page apart with CSS selectors.

use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use chordsync_shared::{
    AlbumRecord, Author, DetailedRecord, Identifier, Result, Translation,
};

use crate::RecordSource;
use crate::http::SourceClient;

/// Production site base URL.
const SITE_URL: &str = "https://holychords.com";

/// Author index path under the site base.
const AUTHOR_INDEX_PATH: &str = "/artists";

/// The holychords.com variant of [`RecordSource`].
pub struct HolychordsSource {
    client: Arc<SourceClient>,
    /// Stop listing once this many identifiers are collected.
    quota: Option<usize>,
    base_url: String,
}

impl HolychordsSource {
    pub fn new(client: Arc<SourceClient>, quota: Option<usize>) -> Self {
        Self {
            client,
            quota,
            base_url: SITE_URL.to_string(),
        }
    }

    /// Point the source at a mock server (for integration tests).
    #[cfg(test)]
    fn with_base(mut self, base: &str) -> Self {
        self.base_url = base.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait::async_trait]
impl RecordSource for HolychordsSource {
    fn name(&self) -> &str {
        "holychords"
    }

    async fn list_identifiers(&self) -> Result<Vec<Identifier>> {
        let index_url = format!("{}{}", self.base_url, AUTHOR_INDEX_PATH);
        let body = self.client.get(&index_url).await?;
        let authors = parse_author_index(&body, &self.base_url);
        info!(count = authors.len(), "author index listed");

        let mut identifiers: Vec<Identifier> = Vec::new();

        for mut author in authors {
            let Some(author_url) = author.url.clone() else {
                continue;
            };

            let page = match self.client.get(&author_url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(author = %author.name, error = %e, "author page fetch failed, skipping");
                    continue;
                }
            };

            let listing = parse_author_page(&page, &self.base_url);
            author.description = listing.description;
            author.thumbnail_url = listing.thumbnail_url;

            for uri in listing.song_uris {
                identifiers.push(Identifier {
                    uri,
                    author: Some(author.clone()),
                });
            }
            debug!(author = %author.name, total = identifiers.len(), "author songs listed");

            if let Some(quota) = self.quota {
                if identifiers.len() >= quota {
                    debug!(quota, "identifier quota reached, stopping listing");
                    break;
                }
            }
        }

        Ok(identifiers)
    }

    async fn fetch_detail(&self, id: &Identifier) -> Option<DetailedRecord> {
        if id.uri.is_empty() {
            return None;
        }

        let url = format!("{}{}", self.base_url, id.uri);
        let body = match self.client.get(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(uri = %id.uri, error = %e, "detail fetch failed");
                return None;
            }
        };

        Some(parse_detail_page(
            &body,
            url,
            id.author.clone(),
            &self.base_url,
        ))
    }
}

// ---------------------------------------------------------------------------
// Extraction helpers
// ---------------------------------------------------------------------------

/// Author-page extraction result.
struct AuthorListing {
    description: Option<String>,
    thumbnail_url: Option<String>,
    song_uris: Vec<String>,
}

/// Parse the author index into the author list.
fn parse_author_index(html: &str, base: &str) -> Vec<Author> {
    let doc = Html::parse_document(html);
    let author_sel = Selector::parse("a.docs_item_name").unwrap();

    doc.select(&author_sel)
        .map(|el| Author {
            name: element_text(&el),
            url: el.value().attr("href").map(|href| absolutize(base, href)),
            description: None,
            thumbnail_url: None,
        })
        .collect()
}

/// Parse one author page: description, thumbnail, and song locators.
fn parse_author_page(html: &str, base: &str) -> AuthorListing {
    let doc = Html::parse_document(html);
    let description_sel = Selector::parse(".twoThird.last").unwrap();
    let thumbnail_sel = Selector::parse(".oneThird img").unwrap();
    let song_sel = Selector::parse("a.topcharts__item-title").unwrap();

    let description = doc
        .select(&description_sel)
        .next()
        .map(|el| element_text(&el))
        .filter(|s| !s.is_empty());

    let thumbnail_url = doc
        .select(&thumbnail_sel)
        .next()
        .and_then(|el| el.value().attr("src"))
        .map(|src| absolutize(base, src));

    let song_uris = doc
        .select(&song_sel)
        .filter_map(|el| el.value().attr("href"))
        .map(str::to_string)
        .collect();

    AuthorListing {
        description,
        thumbnail_url,
        song_uris,
    }
}

/// Parse one song page into a [`DetailedRecord`].
///
/// Missing optional pieces stay unpopulated; the record is still produced so
/// a sparse page contributes what it has.
fn parse_detail_page(
    html: &str,
    url: String,
    author: Option<Author>,
    base: &str,
) -> DetailedRecord {
    let doc = Html::parse_document(html);

    let title_sel = Selector::parse("h1.entry-title span").unwrap();
    let audio_sel = Selector::parse("audio.wp-audio-shortcode source").unwrap();
    let body_sel = Selector::parse("pre").unwrap();
    let video_sel = Selector::parse(".videoEmbed iframe").unwrap();
    let album_sel = Selector::parse(r#"[itemprop="inAlbum"]"#).unwrap();
    let album_link_sel = Selector::parse(r#"[itemprop="inAlbum"] a"#).unwrap();
    let album_img_sel = Selector::parse(".entry-header img.noprint.imgcover").unwrap();
    let tag_sel = Selector::parse(r#"footer a[rel="tag"]"#).unwrap();
    let translation_sel = Selector::parse(".box_style_3 li").unwrap();
    let translation_label_sel = Selector::parse("small").unwrap();
    let translation_link_sel = Selector::parse("a").unwrap();

    let title = doc
        .select(&title_sel)
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default();

    let audio_url = doc
        .select(&audio_sel)
        .next()
        .and_then(|el| el.value().attr("src"))
        .map(|src| absolutize(base, src));

    // The chord sheet keeps its markup; entities are not decoded downstream.
    let body = doc.select(&body_sel).next();
    let body_text = body.map(|el| el.inner_html()).unwrap_or_default();
    let chords_key = body
        .and_then(|el| el.value().attr("class"))
        .map(str::to_string);

    let video_url = doc
        .select(&video_sel)
        .next()
        .and_then(|el| el.value().attr("src"))
        .map(str::to_string);

    let album_title = doc
        .select(&album_sel)
        .next()
        .map(|el| element_text(&el))
        .filter(|s| !s.is_empty());
    let album_url = doc
        .select(&album_link_sel)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(|href| absolutize(base, href));
    let album_thumbnail = doc
        .select(&album_img_sel)
        .next()
        .and_then(|el| el.value().attr("src"))
        .map(|src| absolutize(base, src));

    let tags = doc
        .select(&tag_sel)
        .map(|el| element_text(&el))
        .filter(|s| !s.is_empty())
        .collect();

    let translations = doc
        .select(&translation_sel)
        .map(|li| Translation {
            label: li
                .select(&translation_label_sel)
                .next()
                .map(|el| element_text(&el))
                .unwrap_or_default(),
            url: li
                .select(&translation_link_sel)
                .next()
                .and_then(|el| el.value().attr("href"))
                .map(|href| absolutize(base, href)),
        })
        .collect();

    DetailedRecord {
        title,
        body_text,
        url,
        audio_url,
        video_url,
        tags,
        translations,
        chords_key,
        album: AlbumRecord {
            title: album_title,
            url: album_url,
            thumbnail_url: album_thumbnail,
            author,
        },
    }
}

/// Collect an element's text content, trimmed.
fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Resolve a possibly site-relative href against the site base.
fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{base}{href}")
    }
}
