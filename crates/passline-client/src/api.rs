use async_trait::async_trait;
use passline_core::types::{Order, OrderId, OrderStatus, VenueId};
use serde::Serialize;

use crate::error::{ClientError, Result};

/// Canonical order endpoints consumed by the display.
///
/// A trait seam so the feed can be driven by a fake in tests and by
/// [`RestOrdersApi`] in production.
#[async_trait]
pub trait OrdersApi: Send + Sync {
    /// Canonical snapshot of a venue's orders (initial load and poll).
    async fn list_orders(&self, venue_id: &VenueId) -> Result<Vec<Order>>;

    /// Persist a status change; returns the updated order.
    async fn update_status(&self, order_id: &OrderId, status: OrderStatus) -> Result<Order>;
}

#[derive(Serialize)]
struct StatusBody {
    status: OrderStatus,
}

/// reqwest-backed implementation against the platform REST API.
pub struct RestOrdersApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestOrdersApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl OrdersApi for RestOrdersApi {
    async fn list_orders(&self, venue_id: &VenueId) -> Result<Vec<Order>> {
        let url = format!("{}/api/v1/venues/{}/orders", self.base_url, venue_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn update_status(&self, order_id: &OrderId, status: OrderStatus) -> Result<Order> {
        let url = format!("{}/api/v1/orders/{}/status", self.base_url, order_id);
        let response = self
            .http
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&StatusBody { status })
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}
