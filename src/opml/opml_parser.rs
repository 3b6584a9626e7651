// src/opml/opml_parser.rs
use crate::stations::Station;
use log::warn;
use opml::{Body, Head, OPML, Outline};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpmlError {
    #[error("Failed to read OPML file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse OPML data: {0}")]
    Format(#[from] opml::Error),
}

/// Extract feed subscriptions from OPML content.
///
/// Outlines count as feeds when they carry `type="rss"` or an `xmlUrl`
/// attribute; nested folder outlines are walked recursively. Entries
/// without a usable title or URL are skipped, not fatal — imports of
/// sloppy exports should salvage what they can.
pub fn stations_from_opml(content: &str) -> Result<Vec<Station>, OpmlError> {
    let document = OPML::from_str(content)?;
    let mut stations = Vec::new();
    for outline in document.body.outlines {
        collect_feeds(outline, &mut stations);
    }
    Ok(stations)
}

pub fn stations_from_opml_file<P: AsRef<Path>>(path: P) -> Result<Vec<Station>, OpmlError> {
    let content = fs::read_to_string(path)?;
    stations_from_opml(&content)
}

/// Render a station list as an OPML 2.0 document.
pub fn stations_to_opml(title: &str, stations: &[Station]) -> Result<String, OpmlError> {
    let outlines: Vec<Outline> = stations
        .iter()
        .map(|station| Outline {
            text: station.name.clone(),
            title: Some(station.name.clone()),
            r#type: Some("rss".to_string()),
            xml_url: Some(station.url.clone()),
            ..Outline::default()
        })
        .collect();

    let document = OPML {
        head: Some(Head { title: Some(title.to_string()), ..Head::default() }),
        body: Body { outlines },
        ..OPML::default()
    };

    Ok(document.to_string()?)
}

fn collect_feeds(outline: Outline, stations: &mut Vec<Station>) {
    let is_feed = outline.r#type.as_deref().is_some_and(|t| t.eq_ignore_ascii_case("rss"))
        || outline.xml_url.is_some();

    if is_feed {
        // Prefer the title attribute, fall back to text
        let name = outline
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| Some(outline.text.clone()).filter(|t| !t.is_empty()));

        let url = outline.xml_url.clone().filter(|u| !u.is_empty());

        match (name, url) {
            (Some(name), Some(url)) => stations.push(Station { name, url }),
            _ => warn!("opml: skipping outline '{}' without title or xmlUrl", outline.text),
        }
    }

    for child in outline.outlines {
        collect_feeds(child, stations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OPML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
    <opml version="2.0">
        <head>
            <title>My Podcasts</title>
        </head>
        <body>
            <outline text="Tech" title="Tech">
                <outline text="Syntax FM" title="Syntax FM" type="rss" xmlUrl="http://feed.syntax.fm/rss" htmlUrl="https://syntax.fm"/>
                <outline title="Darknet Diaries" type="rss" xmlUrl="https://feeds.example.com/darknet.rss" />
            </outline>
            <outline text="News (no type, but has xmlUrl)" xmlUrl="http://example.com/news.xml" />
            <outline text="Broken" type="rss" />
        </body>
    </opml>"#;

    #[test]
    fn parses_feeds_including_nested_and_untyped() {
        let stations = stations_from_opml(SAMPLE_OPML).unwrap();
        assert_eq!(stations.len(), 3);
        assert_eq!(stations[0].name, "Syntax FM");
        assert_eq!(stations[0].url, "http://feed.syntax.fm/rss");
        assert_eq!(stations[1].name, "Darknet Diaries");
        assert_eq!(stations[2].name, "News (no type, but has xmlUrl)");
    }

    #[test]
    fn entries_without_url_are_skipped() {
        let stations = stations_from_opml(SAMPLE_OPML).unwrap();
        assert!(stations.iter().all(|s| s.name != "Broken"));
    }

    #[test]
    fn export_then_import_preserves_stations() {
        let stations = vec![
            Station { name: "Rust News".into(), url: "http://example.com/rust.rss".into() },
            Station { name: "Daily Talk".into(), url: "http://example.com/talk.rss".into() },
        ];

        let document = stations_to_opml("test export", &stations).unwrap();
        let parsed = stations_from_opml(&document).unwrap();
        assert_eq!(parsed, stations);
    }

    #[test]
    fn malformed_opml_is_an_error() {
        assert!(stations_from_opml("<opml><body>").is_err());
    }
}
