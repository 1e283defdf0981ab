use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::base;
use super::SourceAdapter;
use crate::error::{Error, Result};
use crate::models::{Event, Source};
use crate::normalize;

pub const SOURCE_NAME: &str = "agendaculturalporto";

/// "06 Jan 2024 21:00" once months are translated.
const DATE_LAYOUT: &str = "%d %b %Y %H:%M";
const IMAGE_WIDTH: &str = "300w";

static ARTICLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article.mec-event-article").expect("agenda article selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".mec-event-title a").expect("agenda title selector"));
static IMAGE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".mec-event-image img").expect("agenda image selector"));
static DETAIL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".mec-single-event").expect("agenda detail selector"));
static PLACE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".mec-single-event-location .author").expect("agenda place selector")
});
static ADDRESS_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".mec-single-event-location .mec-address").expect("agenda address selector")
});
static DESCRIPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".mec-single-event-description p").expect("agenda description selector")
});
static TIME_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".mec-single-event-time .mec-events-abbr").expect("agenda time selector")
});
static DATE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".mec-single-event-date .mec-events-abbr .mec-start-date-label")
        .expect("agenda date selector")
});

/// What the listing page tells about one event before its detail page is read.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Listing {
    pub id: String,
    pub title: String,
    pub url: Url,
    pub image: String,
}

/// HTML listing of agendaculturalporto.org: one listing page plus one detail
/// page per article.
pub struct AgendaCultural {
    name: String,
}

pub fn create(source: &Source) -> Box<dyn SourceAdapter> {
    Box::new(AgendaCultural::new(source))
}

impl AgendaCultural {
    pub fn new(source: &Source) -> Self {
        Self {
            name: source.name.clone(),
        }
    }

    pub(crate) fn parse_listing(&self, base_url: &Url, html: &str) -> Vec<Listing> {
        let document = Html::parse_document(html);
        let mut listings = Vec::new();

        for article in document.select(&ARTICLE_SELECTOR) {
            let Some(title_node) = article.select(&TITLE_SELECTOR).next() else {
                warn!(source = %self.name, url = %base_url, error_kind = "parse", "article without title, skipped");
                continue;
            };
            let title = base::inner_text(title_node);
            let id = title_node
                .value()
                .attr("data-event-id")
                .unwrap_or_default()
                .trim()
                .to_string();

            let url = match title_node
                .value()
                .attr("href")
                .and_then(|href| base::absolute_url(base_url, href))
            {
                Some(url) => url,
                None => {
                    warn!(source = %self.name, event_id = %id, error_kind = "parse", "article without detail link, skipped");
                    continue;
                }
            };

            let image = match base::first_attr(&article, &IMAGE_SELECTOR, "data-lazy-srcset")
                .ok_or_else(|| Error::ImageNotFound(IMAGE_WIDTH.to_string()))
                .and_then(|srcset| base::extract_image(&srcset, IMAGE_WIDTH))
            {
                Ok(image) => image,
                Err(err) => {
                    warn!(source = %self.name, event_id = %id, url = %url, error_kind = err.kind(), "{err}");
                    String::new()
                }
            };

            listings.push(Listing {
                id,
                title,
                url,
                image,
            });
        }

        listings
    }

    pub(crate) fn parse_detail(
        &self,
        listing: Listing,
        html: &str,
        now: DateTime<Utc>,
    ) -> Result<Event> {
        let document = Html::parse_document(html);
        let detail = document
            .select(&DETAIL_SELECTOR)
            .next()
            .ok_or_else(|| Error::Parse(format!("no event container at {}", listing.url)))?;

        let time = base::first_text(&detail, &TIME_SELECTOR).unwrap_or_default();
        let date_text = normalize::month_pt_to_en(
            &base::first_text(&detail, &DATE_SELECTOR).unwrap_or_default(),
        );
        let timestamp = normalize::parse_date_at(&date_text, &time, DATE_LAYOUT, now)?;

        Ok(Event {
            id: listing.id,
            url: listing.url.to_string(),
            title: listing.title,
            description: normalize::sanitize(&base::all_text(&detail, &DESCRIPTION_SELECTOR)),
            image: listing.image,
            place: base::first_text(&detail, &PLACE_SELECTOR).unwrap_or_default(),
            location: base::first_text(&detail, &ADDRESS_SELECTOR).unwrap_or_default(),
            date_text,
            time,
            timestamp,
            ..Event::default()
        })
    }

    fn complete(&self, listing: Listing) -> Option<Event> {
        debug!(source = %self.name, url = %listing.url, "visiting event page");
        let html = match base::fetch_text(&listing.url) {
            Ok(html) => html,
            Err(err) => {
                warn!(source = %self.name, event_id = %listing.id, error_kind = err.kind(), "{err}");
                return None;
            }
        };

        let id = listing.id.clone();
        match self.parse_detail(listing, &html, Utc::now()) {
            Ok(event) => Some(event),
            Err(err) => {
                warn!(source = %self.name, event_id = %id, error_kind = err.kind(), "{err}");
                None
            }
        }
    }
}

impl SourceAdapter for AgendaCultural {
    fn load_events(&self, url: &Url) -> Vec<Event> {
        let html = match base::fetch_text(url) {
            Ok(html) => html,
            Err(err) => {
                warn!(source = %self.name, url = %url, error_kind = err.kind(), "{err}");
                return Vec::new();
            }
        };

        self.parse_listing(url, &html)
            .into_iter()
            .filter_map(|listing| self.complete(listing))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use httpmock::prelude::*;

    const LISTING_HTML: &str = r#"
    <div class="mec-wrap">
        <article class="mec-event-article">
            <div class="mec-event-image">
                <img data-lazy-srcset="https://agendaculturalporto.org/wp-content/uploads/2022/12/Orfelia-150x150.jpg 150w, https://agendaculturalporto.org/wp-content/uploads/2022/12/Orfelia-300x300.jpg 300w">
            </div>
            <h4 class="mec-event-title">
                <a class="mec-color-hover" data-event-id="35215" href="/orfelia-em-estreia-ao-vivo-no-maus-habitos">Orfélia em estreia ao vivo no Maus Hábitos</a>
            </h4>
        </article>
        <article class="mec-event-article">
            <h4 class="mec-event-title">No link here</h4>
        </article>
        <article class="mec-event-article">
            <h4 class="mec-event-title">
                <a data-event-id="35300" href="/broken-page">Sem página</a>
            </h4>
        </article>
    </div>
    "#;

    const DETAIL_HTML: &str = r#"
    <div class="mec-single-event">
        <div class="mec-single-event-description">
            <p>O projeto <strong>luso-brasileiro</strong> apresenta o álbum.</p><p>Entrada livre.</p>
        </div>
        <div class="mec-single-event-date">
            <abbr class="mec-events-abbr"><span class="mec-start-date-label">06 Out 2099</span></abbr>
        </div>
        <div class="mec-single-event-time">
            <abbr class="mec-events-abbr">21:00 - 23:30</abbr>
        </div>
        <div class="mec-single-event-location">
            <dd class="author">Maus Hábitos - Espaço de Intervenção Cultural</dd>
            <address class="mec-address">R. de Passos Manuel 178 4º Piso, 4000-382 Porto</address>
        </div>
    </div>
    "#;

    fn adapter() -> AgendaCultural {
        AgendaCultural::new(&Source::new(SOURCE_NAME, "https://agendaculturalporto.org/"))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap()
    }

    fn orfelia() -> Listing {
        Listing {
            id: "35215".to_string(),
            title: "Orfélia".to_string(),
            url: Url::parse("https://agendaculturalporto.org/orfelia").unwrap(),
            image: String::new(),
        }
    }

    #[test]
    fn parses_listing_articles() {
        let base_url = Url::parse("https://agendaculturalporto.org/").unwrap();
        let listings = adapter().parse_listing(&base_url, LISTING_HTML);

        assert_eq!(listings.len(), 2, "article without a link is skipped");
        let first = &listings[0];
        assert_eq!(first.id, "35215");
        assert_eq!(first.title, "Orfélia em estreia ao vivo no Maus Hábitos");
        assert_eq!(
            first.url.as_str(),
            "https://agendaculturalporto.org/orfelia-em-estreia-ao-vivo-no-maus-habitos"
        );
        assert_eq!(
            first.image,
            "https://agendaculturalporto.org/wp-content/uploads/2022/12/Orfelia-300x300.jpg"
        );
        assert_eq!(listings[1].image, "", "missing srcset leaves the image empty");
    }

    #[test]
    fn parses_detail_page() {
        let event = adapter()
            .parse_detail(orfelia(), DETAIL_HTML, now())
            .expect("parse detail");

        assert_eq!(event.id, "35215");
        assert_eq!(event.place, "Maus Hábitos - Espaço de Intervenção Cultural");
        assert_eq!(event.location, "R. de Passos Manuel 178 4º Piso, 4000-382 Porto");
        assert_eq!(
            event.description,
            "O projeto luso-brasileiro apresenta o álbum.Entrada livre."
        );
        assert_eq!(event.date_text, "06 Oct 2099");
        assert_eq!(event.time, "21:00 - 23:30");
        assert_eq!(
            event.timestamp,
            Utc.with_ymd_and_hms(2099, 10, 6, 21, 0, 0).unwrap()
        );
    }

    #[test]
    fn past_detail_dates_sort_as_current() {
        let html = DETAIL_HTML.replace("06 Out 2099", "02 Jan 2022");
        let event = adapter()
            .parse_detail(orfelia(), &html, now())
            .expect("parse detail");
        assert_eq!(
            event.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn detail_without_container_or_date_is_rejected() {
        let err = adapter()
            .parse_detail(orfelia(), "<div class=\"other\"></div>", now())
            .expect_err("missing container");
        assert_eq!(err.kind(), "parse");

        let html = DETAIL_HTML.replace("06 Out 2099", "Out 2099");
        let err = adapter()
            .parse_detail(orfelia(), &html, now())
            .expect_err("bad date");
        assert_eq!(err.kind(), "date_parse");
    }

    #[test]
    fn loads_events_through_listing_and_detail_pages() {
        let server = MockServer::start();
        let listing = server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(200).body(LISTING_HTML);
        });
        let detail = server.mock(|when, then| {
            when.method(GET)
                .path("/orfelia-em-estreia-ao-vivo-no-maus-habitos");
            then.status(200).body(DETAIL_HTML);
        });
        let broken = server.mock(|when, then| {
            when.method(GET).path("/broken-page");
            then.status(200).body("<html><body>moved</body></html>");
        });

        let url = Url::parse(&server.url("/")).unwrap();
        let events = adapter().load_events(&url);

        listing.assert();
        detail.assert();
        broken.assert();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "35215");
        assert_eq!(
            events[0].url,
            server.url("/orfelia-em-estreia-ao-vivo-no-maus-habitos")
        );
    }

    #[test]
    fn failing_listing_yields_no_events() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(503);
        });

        let url = Url::parse(&server.url("/")).unwrap();
        assert!(adapter().load_events(&url).is_empty());
    }
}
