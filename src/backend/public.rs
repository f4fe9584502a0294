//! Public types of the reader backend's REST API
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Articles

#[derive(clap::ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    PostedAt,
    Score,
    AiScore,
}

#[derive(clap::ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Desc,
    Asc,
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct ArticleQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
}

/// The AI generated analysis attached to an article. Text fields are
/// in Chinese.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Analysis {
    pub topic: String,
    pub title_cn: String,
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    pub takeaway: String,
    pub ai_score: f64,
    pub original_text_trans: Option<String>,
    pub url_content_trans: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Article {
    pub id: i64,
    pub hn_id: i64,
    pub original_title: String,
    pub original_url: Option<String>,
    pub original_text: Option<String>,
    pub score: i64,
    pub posted_at: String,
    pub by: Option<String>,
    pub r#type: String,
    pub detailed_analysis: Option<Analysis>,
    pub descendants: Option<i64>,
    #[serde(default)]
    pub favorites_count: i64,
    #[serde(default)]
    pub is_favorited: bool,
    #[serde(default)]
    pub is_read_later: bool,
    #[serde(default)]
    pub deleted: Option<bool>,
    #[serde(default)]
    pub dead: Option<bool>,
}

impl Article {
    /// The backend sends either RFC 3339 or a naive UTC timestamp
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.posted_at)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(&self.posted_at, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|dt| dt.and_utc())
            })
    }

    /// Title to show, preferring the translated one
    pub fn display_title(&self) -> &str {
        self.detailed_analysis
            .as_ref()
            .map(|a| a.title_cn.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or(self.original_title.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ArticleList {
    pub items: Vec<Article>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
    pub total_pages: i64,
}

// Auth

#[derive(Serialize)]
pub struct Credentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: Value,
}

#[derive(Deserialize, Debug)]
pub struct SignupResponse {
    pub user: Value,
    pub session: Option<Value>,
}
