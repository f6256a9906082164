//! # sc-rating
//!
//! Clients for the remote rating services. Two independent instances are
//! supported: a pure quality-rating service and a fully-automatic trade-off
//! service. They share one wire shape and differ only in which part of the
//! decision they perform, so one client type serves both roles.
//!
//! Calls carry their own timeout and bounded retry, independent of the
//! session's round loop.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sc_types::{RatingError, ServiceEndpoint};

/// Which part of the decision a service instance performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRole {
    /// Rates acquisition quality only.
    Quality,
    /// Rates quality and resolves the multi-objective trade-off.
    Tradeoff,
}

/// Per-round payload sent to a rating service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingRequest {
    /// Objective labels, index-aligned with `scores`.
    pub objectives: Vec<String>,
    pub scores: Vec<f64>,
    /// Present when elapsed time participates in the trade-off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_s: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RatingResponse {
    score: f64,
}

/// A remote scoring capability consumed by the reward combiner.
#[async_trait]
pub trait RatingService: Send + Sync {
    /// Obtain the scalar trade-off reward for one round's scores.
    async fn rate(&self, request: &RatingRequest) -> Result<f64, RatingError>;

    fn role(&self) -> ServiceRole;
}

/// HTTP JSON client for a rating service endpoint.
#[derive(Debug, Clone)]
pub struct HttpRatingService {
    url: String,
    role: ServiceRole,
    client: reqwest::Client,
    timeout_ms: u64,
    retries: u32,
}

impl HttpRatingService {
    pub fn new(endpoint: &ServiceEndpoint, role: ServiceRole) -> Result<Self, RatingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(endpoint.timeout_ms))
            .build()
            .map_err(|e| RatingError::Unavailable {
                message: e.to_string(),
            })?;
        Ok(Self {
            url: endpoint.url(),
            role,
            client,
            timeout_ms: endpoint.timeout_ms,
            retries: endpoint.retries,
        })
    }

    async fn post_once(&self, request: &RatingRequest) -> Result<f64, RatingError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RatingError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    RatingError::Unavailable {
                        message: e.to_string(),
                    }
                }
            })?;

        let response = response
            .error_for_status()
            .map_err(|e| RatingError::Unavailable {
                message: e.to_string(),
            })?;

        let rating: RatingResponse =
            response.json().await.map_err(|e| RatingError::Malformed {
                message: e.to_string(),
            })?;

        if !rating.score.is_finite() {
            return Err(RatingError::Malformed {
                message: format!("non-finite score {}", rating.score),
            });
        }
        Ok(rating.score)
    }
}

#[async_trait]
impl RatingService for HttpRatingService {
    async fn rate(&self, request: &RatingRequest) -> Result<f64, RatingError> {
        let mut attempt = 0;
        loop {
            match self.post_once(request).await {
                Ok(score) => {
                    debug!(role = ?self.role, score, "rating service replied");
                    return Ok(score);
                }
                Err(err) if attempt < self.retries => {
                    warn!(role = ?self.role, attempt, %err, "rating call failed, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn role(&self) -> ServiceRole {
        self.role
    }
}
