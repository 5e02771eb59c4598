//! Fallback chains for the public resources.
//!
//! Every request builds a fresh [`ResolverConfig`], turns it into a list of
//! [`Step`]s with [`plan`], then runs the steps in order. Each step yields a
//! [`TierOutcome`]; [`fold_outcome`] decides whether the chain stops there.
//! A chain ending in the manual tier always produces data. A chain that ends
//! on a failed upstream (matches) surfaces that failure verbatim.
use crate::env::{ConfigSource, ResolverConfig, SecondaryApi};
use crate::manual_store::ManualStore;
use crate::metrics_defs::RESOLVER_TIER_OUTCOME;
use crate::types::ResourceType;
use crate::upstream::{
    QueryParams, UpstreamClient, UpstreamFailure, UpstreamOutcome, query_value,
};
use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde_json::{Value, json};
use shared::counter;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use url::Url;

const DEFAULT_SORT_BY: &str = "publishedAt";

/// What a public endpoint sends back: a status and a JSON body.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub status: StatusCode,
    pub body: Value,
}

impl Resolution {
    pub fn ok(body: Value) -> Self {
        Resolution {
            status: StatusCode::OK,
            body,
        }
    }

    fn missing_config(name: &str) -> Self {
        Resolution {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({ "error": format!("{name} not configured") }),
        }
    }
}

impl From<UpstreamFailure> for Resolution {
    fn from(failure: UpstreamFailure) -> Self {
        Resolution {
            status: failure.status,
            body: failure.body,
        }
    }
}

impl IntoResponse for Resolution {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Primary,
    Secondary,
    Manual,
}

impl Tier {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Tier::Primary => "primary",
            Tier::Secondary => "secondary",
            Tier::Manual => "manual",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TierOutcome {
    Success(Value),
    Skip(&'static str),
    Fail(UpstreamFailure),
}

impl TierOutcome {
    const fn label(&self) -> &'static str {
        match self {
            TierOutcome::Success(_) => "success",
            TierOutcome::Skip(_) => "skip",
            TierOutcome::Fail(_) => "fail",
        }
    }
}

/// One stage of a chain, with everything needed to run it.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// A tier that is not configured. Recorded, never attempted.
    Skip { tier: Tier, reason: &'static str },
    Primary { url: Url, token: String },
    Secondary { api: SecondaryApi, query: QueryParams },
    Manual,
}

impl Step {
    pub fn tier(&self) -> Tier {
        match self {
            Step::Skip { tier, .. } => *tier,
            Step::Primary { .. } => Tier::Primary,
            Step::Secondary { .. } => Tier::Secondary,
            Step::Manual => Tier::Manual,
        }
    }
}

/// Builds the chain for `resource`, or the error response when a required
/// setting is missing and there is nothing to fall back to.
pub fn plan(
    resource: ResourceType,
    config: &ResolverConfig,
    params: &QueryParams,
) -> Result<Vec<Step>, Resolution> {
    let primary = match (&config.primary_url, &config.token) {
        (Some(url), Some(token)) => Step::Primary {
            url: url.clone(),
            token: token.clone(),
        },
        (None, _) => Step::Skip {
            tier: Tier::Primary,
            reason: "primary upstream URL not configured",
        },
        (Some(_), None) => Step::Skip {
            tier: Tier::Primary,
            reason: "RT_TOKEN not configured",
        },
    };

    match resource {
        ResourceType::Matches => {
            if config.primary_url.is_none() {
                return Err(Resolution::missing_config(crate::env::REALTIME_API_URL));
            }
            if config.token.is_none() {
                return Err(Resolution::missing_config(crate::env::RT_TOKEN));
            }
            Ok(vec![primary])
        }
        ResourceType::Trending => Ok(vec![primary, Step::Manual]),
        ResourceType::BreakingNews | ResourceType::Articles => {
            let secondary = match &config.secondary {
                Some(api) => Step::Secondary {
                    api: api.clone(),
                    query: news_query(resource, params),
                },
                None => Step::Skip {
                    tier: Tier::Secondary,
                    reason: "NEWS_API_KEY not configured",
                },
            };
            Ok(vec![primary, secondary, Step::Manual])
        }
        ResourceType::Videos => {
            if config.primary_url.is_some() && config.token.is_none() {
                return Err(Resolution::missing_config(crate::env::RT_TOKEN));
            }
            Ok(vec![primary, Step::Manual])
        }
    }
}

/// Query sent to the public news API. Only the search term and sort order
/// are taken from the caller.
fn news_query(resource: ResourceType, params: &QueryParams) -> QueryParams {
    let default_q = match resource {
        ResourceType::BreakingNews => "sports breaking",
        _ => "sports",
    };
    let q = query_value(params, "q").unwrap_or(default_q);
    let sort_by = query_value(params, "sortBy").unwrap_or(DEFAULT_SORT_BY);

    QueryParams::from([
        ("q".to_string(), q.to_string()),
        ("sortBy".to_string(), sort_by.to_string()),
    ])
}

/// Folds one tier outcome into the chain state, which is the last upstream
/// failure seen. `Break` ends the chain with a response.
pub fn fold_outcome(
    last_failure: Option<UpstreamFailure>,
    outcome: TierOutcome,
) -> ControlFlow<Resolution, Option<UpstreamFailure>> {
    match outcome {
        TierOutcome::Success(body) => ControlFlow::Break(Resolution::ok(body)),
        TierOutcome::Skip(_) => ControlFlow::Continue(last_failure),
        TierOutcome::Fail(failure) => ControlFlow::Continue(Some(failure)),
    }
}

/// Response for a chain that ran out of steps without a success.
pub fn exhausted(last_failure: Option<UpstreamFailure>) -> Resolution {
    match last_failure {
        Some(failure) => failure.into(),
        None => Resolution::ok(Value::Array(Vec::new())),
    }
}

#[derive(Clone)]
pub struct Resolvers {
    upstream: UpstreamClient,
    store: Arc<ManualStore>,
    env: Arc<dyn ConfigSource>,
}

impl Resolvers {
    pub fn new(
        upstream: UpstreamClient,
        store: Arc<ManualStore>,
        env: Arc<dyn ConfigSource>,
    ) -> Self {
        Resolvers {
            upstream,
            store,
            env,
        }
    }

    pub async fn resolve(&self, resource: ResourceType, params: &QueryParams) -> Resolution {
        let config = ResolverConfig::load(resource, self.env.as_ref());

        let steps = match plan(resource, &config, params) {
            Ok(steps) => steps,
            Err(resolution) => {
                tracing::error!(%resource, body = %resolution.body, "resource is misconfigured");
                return resolution;
            }
        };

        let mut state = None;
        for step in steps {
            let tier = step.tier();
            let outcome = self.run_step(resource, step, params).await;

            counter!(
                RESOLVER_TIER_OUTCOME,
                "resource" => resource.name(),
                "tier" => tier.as_str(),
                "outcome" => outcome.label()
            )
            .increment(1);

            match &outcome {
                TierOutcome::Success(_) => {
                    tracing::debug!(%resource, %tier, "tier succeeded");
                }
                TierOutcome::Skip(reason) => {
                    tracing::warn!(%resource, %tier, reason, "tier skipped");
                }
                TierOutcome::Fail(failure) => {
                    tracing::warn!(%resource, %tier, status = %failure.status, "tier failed");
                }
            }

            state = match fold_outcome(state, outcome) {
                ControlFlow::Break(resolution) => return resolution,
                ControlFlow::Continue(state) => state,
            };
        }

        exhausted(state)
    }

    async fn run_step(
        &self,
        resource: ResourceType,
        step: Step,
        params: &QueryParams,
    ) -> TierOutcome {
        match step {
            Step::Skip { reason, .. } => TierOutcome::Skip(reason),
            Step::Primary { url, token } => {
                match self.upstream.call(&url, Some(&token), params).await {
                    UpstreamOutcome::Success(body) => TierOutcome::Success(body),
                    UpstreamOutcome::Failure(failure) => TierOutcome::Fail(failure),
                }
            }
            Step::Secondary { api, mut query } => {
                query.push(("apiKey".to_string(), api.api_key));
                match self.upstream.call(&api.url, None, &query).await {
                    UpstreamOutcome::Success(body) => TierOutcome::Success(articles_of(body)),
                    UpstreamOutcome::Failure(failure) => TierOutcome::Fail(failure),
                }
            }
            Step::Manual => TierOutcome::Success(self.store.read(resource).await),
        }
    }
}

/// The `articles` array of a news API envelope.
fn articles_of(mut body: Value) -> Value {
    match body.get_mut("articles").map(Value::take) {
        None | Some(Value::Null) => Value::Array(Vec::new()),
        Some(articles) => articles,
    }
}
