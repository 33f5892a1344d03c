//! REST data provider implementation

use crate::query;
use chrono::{DateTime, Utc};
use fieldops_core::ProviderError;
use fieldops_core::activity::{Activity, NewActivity};
use fieldops_core::equipment::Equipment;
use fieldops_core::ids::{NotificationId, TicketId, UserId};
use fieldops_core::media::{TicketMedia, WorkSession};
use fieldops_core::notification::{NewNotification, Notification};
use fieldops_core::provider::{DataProvider, NewTicket, ProviderFuture, TicketFilter};
use fieldops_core::stats::UserStats;
use fieldops_core::ticket::Ticket;
use fieldops_core::user::{Role, UserProfile};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

const TICKETS: &str = "tickets";
const PROFILES: &str = "profiles";
const EQUIPMENT: &str = "equipment";
const ACTIVITIES: &str = "ticket_activities";
const NOTIFICATIONS: &str = "notifications";
const MEDIA: &str = "ticket_media";
const WORK_SESSIONS: &str = "work_sessions";

/// Data provider backed by a PostgREST-style HTTP API.
///
/// Each table is exposed at `{base_url}/{table}`. Rows are selected with
/// `column=eq.value` filters, and writes ask for the stored row back with
/// `Prefer: return=representation`. The API key is sent both as `apikey`
/// and as a bearer token.
#[derive(Clone)]
pub struct RestProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for RestProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestProvider {
    /// Create a provider for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] if the HTTP client cannot be
    /// built or `base_url` is blank.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ProviderError::Unavailable("backend URL is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// Base URL requests are sent to, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{table}", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &'static str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, ProviderError> {
        tracing::trace!(table, ?params, "Backend select");
        let response = send(self.request(Method::GET, table).query(params)).await?;
        decode(response).await
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &'static str,
        id: impl ToString,
    ) -> Result<Option<T>, ProviderError> {
        let rows = self
            .select(table, &[("id", query::eq(id)), ("limit", "1".to_string())])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert<B, T>(&self, table: &'static str, body: &B) -> Result<T, ProviderError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        tracing::trace!(table, "Backend insert");
        let request = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(body);
        let rows: Vec<T> = decode(send(request).await?).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode(format!("insert into {table} returned no row")))
    }

    async fn patch<B, T>(
        &self,
        table: &'static str,
        id: impl ToString,
        body: &B,
    ) -> Result<Option<T>, ProviderError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        tracing::trace!(table, "Backend update");
        let request = self
            .request(Method::PATCH, table)
            .query(&[("id", query::eq(id))])
            .header("Prefer", "return=representation")
            .json(body);
        let rows: Vec<T> = decode(send(request).await?).await?;
        Ok(rows.into_iter().next())
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ProviderError> {
    let response = request.send().await.map_err(|e| {
        if e.is_connect() || e.is_timeout() {
            ProviderError::Unavailable(e.to_string())
        } else {
            ProviderError::Request(e.to_string())
        }
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, body))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Decode(e.to_string()))
}

fn status_error(status: StatusCode, body: String) -> ProviderError {
    match status {
        StatusCode::CONFLICT => ProviderError::Conflict(body),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            ProviderError::Unavailable(format!("backend returned {status}"))
        }
        status => ProviderError::Api {
            status: status.as_u16(),
            message: body,
        },
    }
}

fn missing(entity: &str, id: impl std::fmt::Display) -> ProviderError {
    ProviderError::Api {
        status: StatusCode::NOT_FOUND.as_u16(),
        message: format!("{entity} {id} does not exist"),
    }
}

impl DataProvider for RestProvider {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn list_tickets(&self, filter: TicketFilter) -> ProviderFuture<'_, Vec<Ticket>> {
        Box::pin(async move { self.select(TICKETS, &query::tickets(&filter)).await })
    }

    fn get_ticket(&self, id: TicketId) -> ProviderFuture<'_, Option<Ticket>> {
        Box::pin(async move { self.select_one(TICKETS, id).await })
    }

    fn create_ticket(&self, ticket: NewTicket) -> ProviderFuture<'_, Ticket> {
        Box::pin(async move { self.insert(TICKETS, &ticket).await })
    }

    fn update_ticket(&self, ticket: Ticket) -> ProviderFuture<'_, Ticket> {
        Box::pin(async move {
            self.patch(TICKETS, ticket.id, &ticket)
                .await?
                .ok_or_else(|| missing("ticket", ticket.id))
        })
    }

    fn delete_ticket(&self, id: TicketId) -> ProviderFuture<'_, ()> {
        Box::pin(async move {
            let request = self
                .request(Method::DELETE, TICKETS)
                .query(&[("id", query::eq(id))]);
            send(request).await?;
            Ok(())
        })
    }

    fn list_users(&self, role: Option<Role>) -> ProviderFuture<'_, Vec<UserProfile>> {
        Box::pin(async move {
            let mut params = vec![("order", "full_name.asc".to_string())];
            if let Some(role) = role {
                params.push(("role", query::eq(role)));
            }
            self.select(PROFILES, &params).await
        })
    }

    fn get_user(&self, id: UserId) -> ProviderFuture<'_, Option<UserProfile>> {
        Box::pin(async move { self.select_one(PROFILES, id).await })
    }

    fn list_equipment(&self) -> ProviderFuture<'_, Vec<Equipment>> {
        Box::pin(async move {
            self.select(EQUIPMENT, &[("order", "name.asc".to_string())])
                .await
        })
    }

    fn append_activity(&self, activity: NewActivity) -> ProviderFuture<'_, Activity> {
        Box::pin(async move { self.insert(ACTIVITIES, &activity).await })
    }

    fn list_activities(&self, ticket_id: TicketId) -> ProviderFuture<'_, Vec<Activity>> {
        Box::pin(async move {
            self.select(ACTIVITIES, &query::by_ticket(ticket_id)).await
        })
    }

    fn create_notification(
        &self,
        notification: NewNotification,
    ) -> ProviderFuture<'_, Notification> {
        Box::pin(async move { self.insert(NOTIFICATIONS, &notification).await })
    }

    fn list_notifications(&self, user_id: UserId) -> ProviderFuture<'_, Vec<Notification>> {
        Box::pin(async move {
            let params = [
                ("user_id", query::eq(user_id)),
                ("order", "created_at.desc".to_string()),
            ];
            self.select(NOTIFICATIONS, &params).await
        })
    }

    fn mark_notification_read(
        &self,
        id: NotificationId,
    ) -> ProviderFuture<'_, Option<Notification>> {
        Box::pin(async move {
            self.patch(NOTIFICATIONS, id, &json!({ "is_read": true }))
                .await
        })
    }

    fn add_media(&self, media: TicketMedia) -> ProviderFuture<'_, TicketMedia> {
        Box::pin(async move { self.insert(MEDIA, &media).await })
    }

    fn list_media(&self, ticket_id: TicketId) -> ProviderFuture<'_, Vec<TicketMedia>> {
        Box::pin(async move { self.select(MEDIA, &query::by_ticket(ticket_id)).await })
    }

    fn add_work_session(&self, session: WorkSession) -> ProviderFuture<'_, WorkSession> {
        Box::pin(async move { self.insert(WORK_SESSIONS, &session).await })
    }

    fn list_work_sessions(&self, ticket_id: TicketId) -> ProviderFuture<'_, Vec<WorkSession>> {
        Box::pin(async move {
            self.select(WORK_SESSIONS, &query::by_ticket(ticket_id))
                .await
        })
    }

    fn user_stats(&self, user_id: UserId, now: DateTime<Utc>) -> ProviderFuture<'_, UserStats> {
        Box::pin(async move {
            let filter = TicketFilter::default().assigned_to(user_id);
            let tickets: Vec<Ticket> = self.select(TICKETS, &query::tickets(&filter)).await?;
            Ok(UserStats::compute(user_id, &tickets, now))
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code

    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider =
            RestProvider::new("https://api.example.com/rest/v1/", "key", Duration::from_secs(5))
                .unwrap();
        assert_eq!(provider.base_url(), "https://api.example.com/rest/v1");
        assert_eq!(provider.name(), "rest");
    }

    #[test]
    fn blank_url_is_rejected() {
        let result = RestProvider::new("  ", "key", Duration::from_secs(5));
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }

    #[test]
    fn statuses_map_to_provider_errors() {
        assert_eq!(
            status_error(StatusCode::CONFLICT, "duplicate key".to_string()),
            ProviderError::Conflict("duplicate key".to_string())
        );
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, String::new()),
            ProviderError::Unavailable(_)
        ));
        assert_eq!(
            status_error(StatusCode::UNAUTHORIZED, "bad key".to_string()),
            ProviderError::Api {
                status: 401,
                message: "bad key".to_string()
            }
        );
    }
}
