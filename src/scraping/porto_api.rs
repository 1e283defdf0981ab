use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use super::base;
use super::SourceAdapter;
use crate::error::{Error, Result};
use crate::models::{Event, Source};
use crate::normalize;

pub const SOURCE_NAME: &str = "porto";

/// "2022-05-12 10:00:00"
const INPUT_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";
/// Mirrors the site's "May 12th, 2022" rendering, including the fixed suffix.
const DATE_TEXT_LAYOUT: &str = "%b %dth, %Y";
const TIME_LAYOUT: &str = "%H:%M";
const MAP_QUERY_URL: &str = "https://www.google.com/maps/search/?api=1&query=";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventList {
    page_by_url: EventPage,
}

#[derive(Debug, Deserialize)]
struct EventPage {
    events: EventItems,
}

#[derive(Debug, Deserialize)]
struct EventItems {
    #[serde(default)]
    items: Vec<EventSource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventSource {
    #[serde(default)]
    id: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    full_url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    dates: Vec<Dates>,
    #[serde(default)]
    thumbnail: Thumbnail,
    #[serde(default)]
    locations: Vec<LocationEntry>,
}

#[derive(Debug, Deserialize)]
struct Dates {
    #[serde(default)]
    start: String,
    #[serde(default)]
    end: String,
    #[serde(default)]
    repeating: Vec<Repeating>,
}

#[derive(Debug, Deserialize)]
struct Repeating {
    #[serde(default)]
    label: String,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnail {
    #[serde(default)]
    small: Image,
}

#[derive(Debug, Default, Deserialize)]
struct Image {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct LocationEntry {
    #[serde(default)]
    location: Location,
}

#[derive(Debug, Default, Deserialize)]
struct Location {
    #[serde(default)]
    locality: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptionPage {
    page_by_url: DescriptionBody,
}

#[derive(Debug, Deserialize)]
struct DescriptionBody {
    #[serde(default)]
    body: Vec<BodyFragment>,
}

#[derive(Debug, Deserialize)]
struct BodyFragment {
    #[serde(default)]
    value: String,
}

/// JSON API behind porto.pt's agenda.
pub struct PortoApi {
    name: String,
}

pub fn create(source: &Source) -> Box<dyn SourceAdapter> {
    Box::new(PortoApi::new(source))
}

impl PortoApi {
    pub fn new(source: &Source) -> Self {
        Self {
            name: source.name.clone(),
        }
    }

    fn fetch_items(&self, url: &Url, now: DateTime<Utc>) -> Result<Vec<EventSource>> {
        let mut url = url.clone();
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != "startDate")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        pairs.push(("startDate".to_string(), now.format("%Y-%m-%d").to_string()));
        url.query_pairs_mut().clear().extend_pairs(pairs);

        let list: EventList = base::fetch_json(&url)?;
        Ok(list.page_by_url.events.items)
    }

    /// Asks the same endpoint for the event page and returns its first body
    /// fragment as plain text.
    fn description(&self, api_url: &Url, page_path: &str) -> Result<String> {
        let mut url = api_url.clone();
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair("queryName", "PageByUrl")
            .append_pair("urlPath", page_path);

        let page: DescriptionPage = base::fetch_json(&url)?;
        page.page_by_url
            .body
            .first()
            .map(|fragment| normalize::sanitize(&fragment.value))
            .ok_or_else(|| Error::Parse(format!("empty page body for {page_path}")))
    }

    fn build_event(
        &self,
        api_url: &Url,
        item: EventSource,
        now: DateTime<Utc>,
    ) -> Result<Event> {
        // Only the first occurrence is used, even for multi-date items.
        let dates = item
            .dates
            .first()
            .ok_or_else(|| Error::Parse(format!("event {} has no dates", item.id)))?;
        let timestamp = normalize::parse_date_at(&dates.start, "", INPUT_LAYOUT, now)?;
        let (date_text, time) = date_range(dates)?;

        let description = match self.description(api_url, &item.url) {
            Ok(description) => description,
            Err(err) => {
                warn!(source = %self.name, event_id = %item.id, error_kind = err.kind(), "{err}");
                String::new()
            }
        };

        let location = item.locations.first().map(|entry| &entry.location);

        Ok(Event {
            id: normalize::sanitize(&item.id),
            url: item.full_url,
            title: normalize::sanitize(&item.title),
            description,
            image: item.thumbnail.small.url,
            place: location.map(place).unwrap_or_default(),
            location: location
                .map(|loc| loc.address.clone())
                .unwrap_or_default(),
            location_map: location.map(map_url).unwrap_or_default(),
            date_text,
            days: days(dates),
            time,
            timestamp,
            ..Event::default()
        })
    }

    pub(crate) fn load_events_at(&self, url: &Url, now: DateTime<Utc>) -> Vec<Event> {
        let items = match self.fetch_items(url, now) {
            Ok(items) => items,
            Err(err) => {
                warn!(source = %self.name, url = %url, error_kind = err.kind(), "{err}");
                return Vec::new();
            }
        };
        debug!(source = %self.name, count = items.len(), "fetched api items");

        let mut events = Vec::with_capacity(items.len());
        for item in items {
            let id = item.id.clone();
            match self.build_event(url, item, now) {
                Ok(event) => events.push(event),
                Err(err) => {
                    warn!(source = %self.name, event_id = %id, error_kind = err.kind(), "{err}");
                }
            }
        }
        events
    }
}

impl SourceAdapter for PortoApi {
    fn load_events(&self, url: &Url) -> Vec<Event> {
        self.load_events_at(url, Utc::now())
    }
}

fn place(location: &Location) -> String {
    if location.address.is_empty() {
        normalize::sanitize(&location.locality)
    } else {
        format!("{} - {}", location.locality, location.address)
    }
}

fn map_url(location: &Location) -> String {
    format!(
        "{MAP_QUERY_URL}{:.6},{:.6}",
        location.latitude, location.longitude
    )
}

fn days(dates: &Dates) -> String {
    let labels = dates
        .repeating
        .iter()
        .map(|day| day.label.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    normalize::sanitize(&labels)
}

fn date_range(dates: &Dates) -> Result<(String, String)> {
    let parse = |value: &str| {
        NaiveDateTime::parse_from_str(value, INPUT_LAYOUT).map_err(|_| Error::DateParse {
            input: value.to_string(),
            layout: INPUT_LAYOUT.to_string(),
        })
    };
    let start = parse(&dates.start)?;
    let end = parse(&dates.end)?;

    Ok((
        format!(
            "{} - {}",
            start.format(DATE_TEXT_LAYOUT),
            end.format(DATE_TEXT_LAYOUT)
        ),
        format!(
            "{} - {}",
            start.format(TIME_LAYOUT),
            end.format(TIME_LAYOUT)
        ),
    ))
}
