//! NewsAPI headlines.
//!
//! Builds a search query from the significant words of a market question
//! and returns the newest article titles. Without an API key the feed is
//! silent and the council runs on market data alone.
//!
//! API: `https://newsapi.org/v2/everything`
//! Auth: API key via `apiKey` query param. Free tier: 100 req/day.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use super::NewsFeed;
use crate::config::NewsSettings;

const STOP_WORDS: &[&str] = &[
    "will", "the", "be", "in", "a", "an", "is", "it", "of", "to", "for", "and", "or", "by", "at",
    "on", "this", "that", "before", "after", "than", "more", "less", "above", "below", "between",
];

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    articles: Vec<NewsArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    source: Option<NewsSource>,
}

#[derive(Debug, Deserialize)]
struct NewsSource {
    #[serde(default)]
    name: Option<String>,
}

pub struct NewsApiClient {
    http: Client,
    host: String,
    api_key: Option<SecretString>,
}

impl NewsApiClient {
    pub fn new(settings: &NewsSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("Failed to build news HTTP client")?;
        Ok(Self {
            http,
            host: settings.host.trim_end_matches('/').to_string(),
            api_key: settings
                .api_key
                .as_ref()
                .map(|k| SecretString::new(k.expose_secret().clone())),
        })
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Up to five significant words of the question.
fn search_query(question: &str) -> String {
    question
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(&w.to_lowercase().as_str()))
        .take(5)
        .collect::<Vec<_>>()
        .join(" ")
}

fn headline(article: &NewsArticle) -> Option<String> {
    let title = article.title.as_deref()?.trim();
    if title.is_empty() || title == "[Removed]" {
        return None;
    }
    Some(match article.source.as_ref().and_then(|s| s.name.as_deref()) {
        Some(source) => format!("{title} ({source})"),
        None => title.to_string(),
    })
}

#[async_trait]
impl NewsFeed for NewsApiClient {
    async fn headlines(&self, question: &str, limit: usize) -> Result<Vec<String>> {
        let Some(key) = &self.api_key else {
            return Ok(Vec::new());
        };
        let query = search_query(question);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v2/everything", self.host);
        let page_size = limit.to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("q", query.as_str()),
                ("sortBy", "publishedAt"),
                ("language", "en"),
                ("pageSize", page_size.as_str()),
                ("apiKey", key.expose_secret().as_str()),
            ])
            .send()
            .await
            .context("NewsAPI request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("NewsAPI error {status}");
        }

        let body: NewsApiResponse = resp.json().await.context("Failed to parse NewsAPI response")?;
        let headlines: Vec<String> = body.articles.iter().filter_map(headline).take(limit).collect();
        debug!(query = %query, count = headlines.len(), "Headlines fetched");
        Ok(headlines)
    }
}
