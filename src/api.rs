use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::verse::RawContent;

const BASE_URL: &str = "https://api.scripture.api.bible/v1";
const SEARCH_LIMIT: &str = "20";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    Status { status: StatusCode, url: String },
}

/// Blocking client for the scripture.api.bible content provider.
pub struct BibleClient {
    http: Client,
    api_key: String,
}

impl BibleClient {
    pub fn new(api_key: String) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { http, api_key })
    }

    pub fn bibles(&self) -> Result<Vec<BibleVersion>, ApiError> {
        self.get("/bibles", &[])
    }

    pub fn books(&self, bible_id: &str) -> Result<Vec<Book>, ApiError> {
        self.get(&format!("/bibles/{bible_id}/books"), &[])
    }

    pub fn chapters(&self, bible_id: &str, book_id: &str) -> Result<Vec<ChapterSummary>, ApiError> {
        self.get(&format!("/bibles/{bible_id}/books/{book_id}/chapters"), &[])
    }

    pub fn chapter(&self, bible_id: &str, chapter_id: &str) -> Result<ChapterContent, ApiError> {
        self.get(
            &format!("/bibles/{bible_id}/chapters/{chapter_id}"),
            &[
                ("content-type", "html"),
                ("include-notes", "false"),
                ("include-titles", "true"),
                ("include-chapter-numbers", "false"),
                ("include-verse-numbers", "true"),
                ("include-verse-spans", "true"),
            ],
        )
    }

    pub fn search(&self, bible_id: &str, query: &str) -> Result<SearchHits, ApiError> {
        self.get(
            &format!("/bibles/{bible_id}/search"),
            &[("query", query), ("limit", SEARCH_LIMIT)],
        )
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, ApiError> {
        let url = format!("{BASE_URL}{path}");
        debug!(url = %url, "fetching");
        let response = self
            .http
            .get(&url)
            .header("api-key", &self.api_key)
            .query(query)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { status, url });
        }
        let envelope: Envelope<T> = response.json()?;
        Ok(envelope.data)
    }
}

// Responses arrive wrapped in a { "data": ... } envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Language {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BibleVersion {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
    #[serde(default)]
    pub description: Option<String>,
    pub language: Language,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub bible_id: String,
    #[serde(default)]
    pub abbreviation: Option<String>,
    pub name: String,
    #[serde(default)]
    pub name_long: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSummary {
    pub id: String,
    pub bible_id: String,
    pub number: String,
    pub book_id: String,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterLink {
    pub id: String,
    pub book_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterContent {
    pub id: String,
    pub content: RawContent,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub verse_count: Option<u32>,
    #[serde(default)]
    pub copyright: Option<String>,
    #[serde(default)]
    pub next: Option<ChapterLink>,
    #[serde(default)]
    pub previous: Option<ChapterLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHits {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub verses: Vec<SearchVerse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchVerse {
    pub id: String,
    pub reference: String,
    pub text: String,
}
