//! Rebrickable catalog lookups.

use serde::{Deserialize, Serialize};

use super::ToolError;

const SERVICE: &str = "Rebrickable";
const SEARCH_LIMIT: usize = 5;

/// A catalog entry as returned to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegoSet {
    pub set_num: String,
    pub name: String,
    pub year: Option<u32>,
    pub num_parts: Option<u32>,
    pub theme_id: Option<u32>,
    /// Resolved theme name; absent when the theme lookup failed or was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_img_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LegoLookup {
    Found(LegoSet),
    NotFound { set_num: String },
}

#[derive(Debug, Deserialize)]
struct RawSet {
    set_num: String,
    name: String,
    year: Option<u32>,
    theme_id: Option<u32>,
    num_parts: Option<u32>,
    set_img_url: Option<String>,
}

impl From<RawSet> for LegoSet {
    fn from(raw: RawSet) -> Self {
        Self {
            set_num: raw.set_num,
            name: raw.name,
            year: raw.year,
            num_parts: raw.num_parts,
            theme_id: raw.theme_id,
            theme: None,
            set_img_url: raw.set_img_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTheme {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    results: Vec<RawSet>,
}

/// Rebrickable wants the variant suffix: `75192` is `75192-1`.
pub fn normalize_set_number(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains('-') {
        trimmed.to_string()
    } else {
        format!("{trimmed}-1")
    }
}

pub struct RebrickableClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl RebrickableClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// GET a catalog path; `Ok(None)` on 404.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, ToolError> {
        let resp = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header("Authorization", format!("key {}", self.api_key))
            .query(query)
            .send()
            .await
            .map_err(|source| ToolError::Http { service: SERVICE, source })?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ToolError::Api { service: SERVICE, status, body });
        }
        resp.json::<T>()
            .await
            .map(Some)
            .map_err(|source| ToolError::Http { service: SERVICE, source })
    }

    pub async fn get_set(&self, set_num: &str) -> Result<LegoLookup, ToolError> {
        let set_num = normalize_set_number(set_num);
        let Some(raw) = self
            .get::<RawSet>(&format!("/lego/sets/{set_num}/"), &[])
            .await?
        else {
            tracing::info!(%set_num, "Lego set not found");
            return Ok(LegoLookup::NotFound { set_num });
        };

        let mut set = LegoSet::from(raw);
        if let Some(theme_id) = set.theme_id {
            match self
                .get::<RawTheme>(&format!("/lego/themes/{theme_id}/"), &[])
                .await
            {
                Ok(theme) => set.theme = theme.map(|t| t.name),
                Err(e) => tracing::warn!(error = %e, theme_id, "Theme lookup failed"),
            }
        }
        Ok(LegoLookup::Found(set))
    }

    pub async fn search_sets(&self, query: &str) -> Result<Vec<LegoSet>, ToolError> {
        let page_size = SEARCH_LIMIT.to_string();
        let page = self
            .get::<SearchPage>("/lego/sets/", &[("search", query), ("page_size", page_size.as_str())])
            .await?;
        Ok(page
            .map(|p| p.results)
            .unwrap_or_default()
            .into_iter()
            .take(SEARCH_LIMIT)
            .map(LegoSet::from)
            .collect())
    }
}
