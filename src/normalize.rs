//! Field normalization shared by the adapters, the store and the publisher.

use chrono::{DateTime, Duration, DurationRound, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node};

use crate::error::{Error, Result};
use crate::models::Event;

/// Telegram caption for a photo message. Placeholders, in order: Url, Title,
/// Description, LocationMap, Place, DateText, Time, Days.
pub const CAPTION_TEMPLATE: &str = "<b><a href=\"%s\">%s</a></b> &#10;%s &#10;📍 <a href=\"%s\">%s</a> &#10;🗓 %s &#10;🕒 %s &#10;%s";

/// Telegram limit for a photo caption.
pub const CAPTION_LIMIT: usize = 1024;

static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^&(?:#[0-9]+|#x[0-9a-fA-F]+|[a-zA-Z][a-zA-Z0-9]*);").expect("entity regex")
});

const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

const MONTHS_PT_EN: [(&str, &str); 7] = [
    ("Fev", "Feb"),
    ("Abr", "Apr"),
    ("Mai", "May"),
    ("Ago", "Aug"),
    ("Set", "Sep"),
    ("Out", "Oct"),
    ("Dez", "Dec"),
];

/// Strips every tag, attribute and embedded script/style, then escapes the
/// remaining text so it can be dropped into an HTML caption as-is.
pub fn sanitize(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let fragment = Html::parse_fragment(input);
    let mut text = String::with_capacity(input.len());
    for node in fragment.root_element().descendants() {
        let Node::Text(chunk) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(element) => SKIPPED_ELEMENTS.contains(&element.name()),
            _ => false,
        });
        if !hidden {
            text.push_str(chunk);
        }
    }

    escape_text(&text)
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Escapes markup characters in a plain caption field. Entities already
/// present, as left by [`sanitize`], are kept.
fn escape_field(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (pos, ch) in text.char_indices() {
        if ch == '&' && ENTITY.is_match(&text[pos..]) {
            out.push('&');
        } else {
            out.push_str(&escape_text(ch.encode_utf8(&mut [0; 4])));
        }
    }
    out
}

/// Replaces the first Portuguese month abbreviation found with its English
/// counterpart ("06 Out 2024" -> "06 Oct 2024").
pub fn month_pt_to_en(date: &str) -> String {
    for (pt, en) in MONTHS_PT_EN {
        if date.contains(pt) {
            return date.replacen(pt, en, 1);
        }
    }
    date.to_string()
}

/// Parses the start instant of an event, see [`parse_date_at`].
pub fn parse_date(date: &str, time: &str, layout: &str) -> Result<DateTime<Utc>> {
    parse_date_at(date, time, layout, Utc::now())
}

/// Parses `date` plus the start of the `time` range ("21:00 - 23:30") with a
/// chrono `layout`, reading the result as UTC.
///
/// A start earlier than `now` is replaced by `now` truncated to the hour, so
/// running and recurring events sort as current.
pub fn parse_date_at(
    date: &str,
    time: &str,
    layout: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let start_time = time.split(" - ").next().unwrap_or_default().trim();
    let input = if start_time.is_empty() {
        date.trim().to_string()
    } else {
        format!("{} {}", date.trim(), start_time)
    };

    let start = NaiveDateTime::parse_from_str(&input, layout)
        .map_err(|_| Error::DateParse {
            input: input.clone(),
            layout: layout.to_string(),
        })?
        .and_utc();

    if start < now {
        return Ok(now.duration_trunc(Duration::hours(1)).unwrap_or(now));
    }
    Ok(start)
}

/// Shortens the description so that `template` filled with the event stays
/// within `limit` bytes. The cut lands after the last "." inside the budget;
/// without one the description is dropped entirely.
pub fn truncate_for_publish(event: &Event, template: &str, limit: usize) -> String {
    let fixed_len = template.len()
        + event.url.len()
        + event.title.len()
        + event.location_map.len()
        + event.place.len()
        + event.date_text.len()
        + event.time.len()
        + event.days.len();
    let description = &event.description;

    if fixed_len + description.len() <= limit {
        return description.clone();
    }

    let budget = limit.saturating_sub(fixed_len);
    match description.as_bytes()[..budget]
        .iter()
        .rposition(|&byte| byte == b'.')
    {
        Some(dot) => description[..=dot].to_string(),
        None => String::new(),
    }
}

/// Fills the caption template, truncating the description to fit `limit`.
pub fn render_caption(event: &Event, template: &str, limit: usize) -> String {
    let event = &Event {
        title: escape_field(&event.title),
        place: escape_field(&event.place),
        date_text: escape_field(&event.date_text),
        time: escape_field(&event.time),
        days: escape_field(&event.days),
        ..event.clone()
    };
    let description = truncate_for_publish(event, template, limit);
    let mut values = [
        event.url.as_str(),
        event.title.as_str(),
        description.as_str(),
        event.location_map.as_str(),
        event.place.as_str(),
        event.date_text.as_str(),
        event.time.as_str(),
        event.days.as_str(),
    ]
    .into_iter();

    let mut out = String::with_capacity(limit);
    let mut rest = template;
    while let Some(pos) = rest.find("%s") {
        out.push_str(&rest[..pos]);
        out.push_str(values.next().unwrap_or_default());
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}
