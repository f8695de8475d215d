//! URL discovery sources: sitemap resolution and flat URL files.
//!
//! The sitemap resolver is deliberately a black box to the engine: given a
//! homepage it either yields URLs or collapses every failure into one
//! "sitemap unavailable" condition.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;

use crate::error::{ScrapeError, ScrapeResult};

/// Child sitemaps followed from one `<sitemapindex>`
const MAX_CHILD_SITEMAPS: usize = 50;

enum Sitemap {
    Urls(Vec<String>),
    Index(Vec<String>),
}

/// Resolve `<homepage>/sitemap.xml` into the page URLs it lists, following
/// one level of sitemap-index indirection.
pub async fn sitemap_urls(client: &Client, homepage: &str) -> ScrapeResult<Vec<String>> {
    let unavailable = || ScrapeError::SitemapUnavailable(homepage.to_string());
    let base = homepage.trim_end_matches('/');

    let body = fetch_xml(client, &format!("{base}/sitemap.xml"))
        .await
        .map_err(|_| unavailable())?;
    match parse_sitemap(&body).map_err(|_| unavailable())? {
        Sitemap::Urls(urls) => Ok(urls),
        Sitemap::Index(children) => {
            let mut urls = Vec::new();
            for child in children.into_iter().take(MAX_CHILD_SITEMAPS) {
                let body = fetch_xml(client, &child).await.map_err(|_| unavailable())?;
                if let Sitemap::Urls(mut page_urls) =
                    parse_sitemap(&body).map_err(|_| unavailable())?
                {
                    urls.append(&mut page_urls);
                }
            }
            Ok(urls)
        }
    }
}

async fn fetch_xml(client: &Client, url: &str) -> ScrapeResult<String> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::Http {
            status,
            url: url.to_string(),
        });
    }
    Ok(response.text().await?)
}

fn parse_sitemap(xml: &str) -> Result<Sitemap, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut seen_root = false;
    let mut is_index = false;
    let mut in_loc = false;
    let mut locs = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.local_name();
                if !seen_root {
                    seen_root = true;
                    is_index = name.as_ref() == b"sitemapindex";
                }
                if name.as_ref() == b"loc" {
                    in_loc = true;
                }
            }
            Event::Text(t) if in_loc => {
                let text = t.unescape()?.trim().to_string();
                if !text.is_empty() {
                    locs.push(text);
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"loc" {
                    in_loc = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(if is_index {
        Sitemap::Index(locs)
    } else {
        Sitemap::Urls(locs)
    })
}

/// Read one URL per non-blank line.
pub fn urls_from_txt(path: &Path) -> ScrapeResult<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Read URLs from a CSV file: column `URL` when the header has one, the
/// first column otherwise (the header row is skipped either way).
pub fn urls_from_csv(path: &Path) -> ScrapeResult<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).map_err(csv_io)?;
    let column = reader
        .headers()
        .map_err(csv_io)?
        .iter()
        .position(|h| h == "URL")
        .unwrap_or(0);

    let mut urls = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_io)?;
        if let Some(value) = row.get(column) {
            let value = value.trim();
            if !value.is_empty() {
                urls.push(value.to_string());
            }
        }
    }
    Ok(urls)
}

fn csv_io(e: csv::Error) -> ScrapeError {
    ScrapeError::Io(std::io::Error::other(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/</loc></url>
  <url><loc>https://example.com/blog/a</loc></url>
</urlset>"#;

    const INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/sitemap-posts.xml</loc></sitemap>
</sitemapindex>"#;

    #[test]
    fn urlset_yields_page_urls() {
        match parse_sitemap(URLSET).unwrap() {
            Sitemap::Urls(urls) => {
                assert_eq!(urls, ["https://example.com/", "https://example.com/blog/a"]);
            }
            Sitemap::Index(_) => panic!("urlset parsed as index"),
        }
    }

    #[test]
    fn index_yields_child_sitemaps() {
        match parse_sitemap(INDEX).unwrap() {
            Sitemap::Index(children) => {
                assert_eq!(children, ["https://example.com/sitemap-posts.xml"]);
            }
            Sitemap::Urls(_) => panic!("index parsed as urlset"),
        }
    }

    #[test]
    fn entities_are_unescaped() {
        let xml = r"<urlset><url><loc>https://example.com/?a=1&amp;b=2</loc></url></urlset>";
        match parse_sitemap(xml).unwrap() {
            Sitemap::Urls(urls) => assert_eq!(urls, ["https://example.com/?a=1&b=2"]),
            Sitemap::Index(_) => panic!("urlset parsed as index"),
        }
    }

    #[test]
    fn txt_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://a.com/1\n\n  https://a.com/2  \n").unwrap();
        let urls = urls_from_txt(file.path()).unwrap();
        assert_eq!(urls, ["https://a.com/1", "https://a.com/2"]);
    }

    #[test]
    fn csv_prefers_url_column() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,URL\n1,https://a.com/1\n2,https://a.com/2").unwrap();
        let urls = urls_from_csv(file.path()).unwrap();
        assert_eq!(urls, ["https://a.com/1", "https://a.com/2"]);
    }

    #[test]
    fn csv_falls_back_to_first_column() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "link,label\nhttps://a.com/1,one").unwrap();
        let urls = urls_from_csv(file.path()).unwrap();
        assert_eq!(urls, ["https://a.com/1"]);
    }
}
