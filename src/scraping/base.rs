use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::Url;
use scraper::{ElementRef, Selector};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(20))
        .user_agent("PortoEvents/0.1 (+https://github.com/oleksiy-os/porto-events)")
        .build()
        .unwrap_or_else(|_| Client::new())
});

pub fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn inner_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Cleaned text of the first match, `None` when absent or blank.
pub fn first_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(inner_text)
        .filter(|text| !text.is_empty())
}

/// Raw text of every match, concatenated in document order.
pub fn all_text(element: &ElementRef<'_>, selector: &Selector) -> String {
    element
        .select(selector)
        .flat_map(|node| node.text())
        .collect::<String>()
}

pub fn first_attr(element: &ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

/// Resolves `href` against `base`; absolute links are returned untouched.
pub fn absolute_url(base: &Url, href: &str) -> Option<Url> {
    base.join(href.trim()).ok()
}

pub fn fetch_text(url: &Url) -> Result<String> {
    let response = CLIENT
        .get(url.clone())
        .send()
        .map_err(|err| Error::fetch(url.as_str(), err))?;
    let response = response
        .error_for_status()
        .map_err(|err| Error::fetch(url.as_str(), err))?;
    response
        .text()
        .map_err(|err| Error::fetch(url.as_str(), err))
}

pub fn fetch_json<T: DeserializeOwned>(url: &Url) -> Result<T> {
    let body = fetch_text(url)?;
    serde_json::from_str(&body).map_err(|err| Error::fetch(url.as_str(), err))
}

/// Picks the candidate URL tagged with `descriptor` (e.g. "300w") out of a
/// responsive `srcset` attribute.
pub fn extract_image(srcset: &str, descriptor: &str) -> Result<String> {
    let pattern = format!(r"(?:^|,)\s*(\S+)\s+{}(?:\s*,|\s*$)", regex::escape(descriptor));
    let re = Regex::new(&pattern).map_err(|err| Error::Parse(err.to_string()))?;
    re.captures(srcset)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::ImageNotFound(descriptor.to_string()))
}
