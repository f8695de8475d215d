//! Canonical browser request headers and the date-interpolated user agent.
//!
//! The user agent claims a Chrome version interpolated linearly between two
//! anchor dates, so the string stays plausible for years without updates:
//! 2023-03-07 maps to Chrome 111 and 2030-09-24 maps to Chrome 200. A small
//! random jitter is applied and the result never drops below 101.

use chrono::{Datelike, Local, NaiveDate};
use rand::Rng;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, USER_AGENT,
};

use crate::error::{ScrapeError, ScrapeResult};

const VERSION_FLOOR: i64 = 101;

fn anchor_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 3, 7).expect("valid anchor date")
}

fn anchor_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 9, 24).expect("valid anchor date")
}

/// Chrome major version the anchors interpolate to at `date`, before jitter.
#[must_use]
pub fn interpolated_version(date: NaiveDate) -> i64 {
    let a1 = f64::from(anchor_start().num_days_from_ce());
    let b1 = f64::from(anchor_end().num_days_from_ce());
    let n = f64::from(date.num_days_from_ce());
    ((n - a1) / (b1 - a1) * (200.0 - 111.0) + 111.0) as i64
}

/// Interpolated version with jitter applied and the floor enforced.
#[must_use]
pub fn jittered_version(date: NaiveDate) -> i64 {
    let version = interpolated_version(date) + rand::rng().random_range(-5..=1);
    version.max(VERSION_FLOOR)
}

/// Windows/Chrome user agent fabricated for `date`.
#[must_use]
pub fn user_agent_for(date: NaiveDate) -> String {
    let version = jittered_version(date);
    format!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/{version}.0.0.0 Safari/537.36"
    )
}

/// User agent for today.
#[must_use]
pub fn default_user_agent() -> String {
    user_agent_for(Local::now().date_naive())
}

/// Canonical browser-like request headers with the given user agent.
pub fn browser_headers(user_agent: &str) -> ScrapeResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,\
             image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(
        "sec-ch-ua",
        HeaderValue::from_static(
            r#""Chromium";v="142", "Google Chrome";v="142", "Not_A Brand";v="99""#,
        ),
    );
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    headers.insert("sec-ch-ua-platform", HeaderValue::from_static("\"Windows\""));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("cross-site"));
    headers.insert("sec-fetch-user", HeaderValue::from_static("?1"));
    headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent)
            .map_err(|_| ScrapeError::Config(format!("invalid user agent: {user_agent:?}")))?,
    );
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_interpolate_exactly() {
        assert_eq!(interpolated_version(anchor_start()), 111);
        assert_eq!(interpolated_version(anchor_end()), 200);
    }

    #[test]
    fn jitter_stays_in_band() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let base = interpolated_version(date);
        for _ in 0..64 {
            let v = jittered_version(date);
            assert!(v >= (base - 5).max(VERSION_FLOOR));
            assert!(v <= base + 1);
        }
    }

    #[test]
    fn early_dates_hit_the_floor() {
        let date = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        for _ in 0..64 {
            assert!(jittered_version(date) >= VERSION_FLOOR);
        }
    }

    #[test]
    fn headers_carry_the_user_agent() {
        let ua = user_agent_for(NaiveDate::from_ymd_opt(2026, 8, 1).unwrap());
        let headers = browser_headers(&ua).unwrap();
        assert_eq!(headers.get(USER_AGENT).unwrap().to_str().unwrap(), ua);
        assert_eq!(headers.get("upgrade-insecure-requests").unwrap(), "1");
        assert!(headers.contains_key("sec-ch-ua"));
    }
}
