use anyhow::{Error, Result, anyhow, bail};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::public::{ArticleList, ArticleQuery, Article, Credentials, LoginResponse, SignupResponse};
use crate::core::AppConfig;

/// Which per-user article list an interaction targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collection {
    Favorites,
    ReadLater,
}

impl Collection {
    fn path(&self) -> &'static str {
        match self {
            Collection::Favorites => "favorites",
            Collection::ReadLater => "read-later",
        }
    }
}

/// Request/response client for the parts of the backend outside of
/// chat: auth, article listings, and favorite/read-later toggles.
pub struct BackendClient {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl BackendClient {
    pub fn new(api_url: &str, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.api_url, config.token.clone())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_url, path))
            .header("Content-Type", "application/json")
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, Error> {
        let token = self
            .token
            .as_ref()
            .ok_or(anyhow!("Sign in first: no token is configured"))?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    async fn check(resp: Response) -> Result<Response, Error> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("API Error {}: {}", status.as_u16(), body);
        }
        Ok(resp)
    }

    async fn json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, Error> {
        let resp = Self::check(req.send().await?).await?;
        Ok(resp.json::<T>().await?)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, Error> {
        let req = self
            .request(Method::POST, "/auth/login")
            .json(&Credentials { email, password });
        Self::json(req).await
    }

    pub async fn signup(&self, email: &str, password: &str) -> Result<SignupResponse, Error> {
        let req = self
            .request(Method::POST, "/auth/signup")
            .json(&Credentials { email, password });
        Self::json(req).await
    }

    /// Signed in reads include the user's favorite flags
    fn maybe_authed(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.request(method, path);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    pub async fn list_articles(&self, query: &ArticleQuery) -> Result<ArticleList, Error> {
        Self::json(self.maybe_authed(Method::GET, "/articles/").query(query)).await
    }

    pub async fn get_article(&self, id: i64) -> Result<Article, Error> {
        Self::json(self.maybe_authed(Method::GET, &format!("/articles/{}", id))).await
    }

    pub async fn list_collection(
        &self,
        collection: Collection,
        query: &ArticleQuery,
    ) -> Result<ArticleList, Error> {
        let path = format!("/interactions/{}", collection.path());
        Self::json(self.authed(Method::GET, &path)?.query(query)).await
    }

    /// Add or remove an article from one of the user's collections
    pub async fn toggle(&self, collection: Collection, article_id: i64, add: bool) -> Result<()> {
        let path = format!("/interactions/{}/{}", collection.path(), article_id);
        let method = if add { Method::POST } else { Method::DELETE };
        let resp = self.authed(method, &path)?.send().await?;
        Self::check(resp).await?;
        tracing::debug!("Updated {} for article {}", collection.path(), article_id);
        Ok(())
    }
}
