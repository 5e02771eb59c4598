//! Upstream settings read from the process environment.
//!
//! Nothing here is cached: resolvers call [`ResolverConfig::load`] on every
//! request so credentials can be rotated without a restart.

use crate::types::ResourceType;
use std::collections::HashMap;
use url::Url;

pub const REALTIME_API_URL: &str = "REALTIME_API_URL";
pub const RT_TOKEN: &str = "RT_TOKEN";
pub const REALTIME_TRENDING_URL: &str = "REALTIME_TRENDING_URL";
pub const REALTIME_BREAKING_NEWS_URL: &str = "REALTIME_BREAKING_NEWS_URL";
pub const REALTIME_ARTICLES_URL: &str = "REALTIME_ARTICLES_URL";
pub const REALTIME_VIDEOS_URL: &str = "REALTIME_VIDEOS_URL";
pub const NEWS_API_KEY: &str = "NEWS_API_KEY";
pub const NEWS_API_URL: &str = "NEWS_API_URL";

pub const DEFAULT_NEWS_API_URL: &str = "https://newsapi.org/v2/everything";

/// A read-only view of named configuration values.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads straight from `std::env`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl ConfigSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

// Blank values are treated as unset.
fn lookup(source: &dyn ConfigSource, key: &str) -> Option<String> {
    source
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn lookup_url(source: &dyn ConfigSource, key: &str) -> Option<Url> {
    let raw = lookup(source, key)?;
    match Url::parse(&raw) {
        Ok(url) => Some(url),
        Err(err) => {
            tracing::warn!(key, error = %err, "ignoring malformed upstream URL");
            None
        }
    }
}

/// `REALTIME_API_URL` with a fixed suffix appended.
fn derive_from_base(source: &dyn ConfigSource, suffix: &str) -> Option<Url> {
    let base = lookup(source, REALTIME_API_URL)?;
    let joined = format!("{}/{}", base.trim_end_matches('/'), suffix);
    match Url::parse(&joined) {
        Ok(url) => Some(url),
        Err(err) => {
            tracing::warn!(key = REALTIME_API_URL, error = %err, "ignoring malformed base URL");
            None
        }
    }
}

/// The public news API used as the second tier for breaking news and articles.
#[derive(Clone, Debug, PartialEq)]
pub struct SecondaryApi {
    pub url: Url,
    pub api_key: String,
}

/// Everything a resolver needs to know about its upstreams for one request.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolverConfig {
    pub primary_url: Option<Url>,
    pub token: Option<String>,
    pub secondary: Option<SecondaryApi>,
}

impl ResolverConfig {
    pub fn load(resource: ResourceType, source: &dyn ConfigSource) -> Self {
        let primary_url = match resource {
            ResourceType::Matches => lookup_url(source, REALTIME_API_URL),
            ResourceType::Trending => lookup_url(source, REALTIME_TRENDING_URL)
                .or_else(|| derive_from_base(source, "trending")),
            ResourceType::BreakingNews => lookup_url(source, REALTIME_BREAKING_NEWS_URL)
                .or_else(|| derive_from_base(source, "breaking")),
            ResourceType::Articles => lookup_url(source, REALTIME_ARTICLES_URL)
                .or_else(|| derive_from_base(source, "articles")),
            // Videos are never derived from the base URL.
            ResourceType::Videos => lookup_url(source, REALTIME_VIDEOS_URL),
        };

        let secondary = match resource {
            ResourceType::BreakingNews | ResourceType::Articles => {
                lookup(source, NEWS_API_KEY).and_then(|api_key| {
                    let url = match lookup(source, NEWS_API_URL) {
                        Some(_) => lookup_url(source, NEWS_API_URL)?,
                        None => Url::parse(DEFAULT_NEWS_API_URL).ok()?,
                    };
                    Some(SecondaryApi { url, api_key })
                })
            }
            _ => None,
        };

        ResolverConfig {
            primary_url,
            token: lookup(source, RT_TOKEN),
            secondary,
        }
    }
}
