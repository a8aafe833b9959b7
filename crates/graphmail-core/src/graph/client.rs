//! Microsoft Graph client for the user and mail endpoints.
//!
//! Every call is a single request with fixed query shaping. Pagination
//! continuation links are reported back to the caller but never followed,
//! and there is no retry beyond what the transport does.

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::CoreError;
use crate::config::GraphConfig;
use crate::graph::auth::{AccessToken, ClientSecretCredential, Credentials};
use crate::graph::models::{
    Collection, ErrorResponse, Message, MessagePage, MessageSummary, OutgoingMessage, User,
    UserSummary,
};

/// Maximum number of users requested by [`GraphClient::list_users`].
pub const USERS_PAGE_SIZE: usize = 25;
/// Maximum number of messages requested by [`GraphClient::list_inbox`].
pub const INBOX_PAGE_SIZE: usize = 25;

const USER_FIELDS: &str = "displayName,id,mail";
const INBOX_FIELDS: &str = "from,isRead,receivedDateTime,subject";

/// Graph API client. Built once at startup and shared by reference.
#[derive(Debug)]
pub struct GraphClient {
    http_client: Client,
    credential: ClientSecretCredential,
    base_url: String,
}

impl GraphClient {
    /// Create a new Graph client for the given app credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(credentials: Credentials, config: &GraphConfig) -> Result<Self, CoreError> {
        // The token exchange must not follow redirects.
        let http_client = Client::builder()
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| CoreError::Other(format!("creating HTTP client: {e}")))?;

        let credential = ClientSecretCredential::new(http_client.clone(), credentials, config);

        Ok(Self {
            http_client,
            credential,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Current app-only token, refreshed if needed.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if a token cannot be obtained.
    pub async fn app_token(&self) -> Result<AccessToken, CoreError> {
        self.credential.get_token().await
    }

    /// List up to 25 users ordered by display name.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the request fails.
    pub async fn list_users(&self) -> Result<Vec<UserSummary>, CoreError> {
        let top = USERS_PAGE_SIZE.to_string();
        let request = self
            .authorized("list users", self.http_client.get(self.url("/users")))
            .await?
            .query(&[
                ("$select", USER_FIELDS),
                ("$top", top.as_str()),
                ("$orderby", "displayName"),
            ]);

        let page: Collection<User> = fetch_json("list users", request).await?;
        let mut users: Vec<UserSummary> = page
            .value
            .into_iter()
            .take(USERS_PAGE_SIZE)
            .map(UserSummary::from)
            .collect();
        users.sort_by_cached_key(|u| u.display_name.to_lowercase());

        log::debug!("listed {} users", users.len());
        Ok(users)
    }

    /// Fetch the `limit` most recent messages of a mailbox, without field projection.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the request fails.
    pub async fn list_recent_messages(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<MessagePage, CoreError> {
        let url = self.url(&format!("/users/{}/messages", urlencoding::encode(user_id)));
        let top = limit.to_string();
        let request = self
            .authorized("read mail", self.http_client.get(url))
            .await?
            .query(&[("$top", top.as_str())]);

        let page: Collection<Message> = fetch_json("read mail", request).await?;
        Ok(MessagePage {
            messages: page
                .value
                .into_iter()
                .take(limit as usize)
                .map(MessageSummary::from)
                .collect(),
            next_link: page.next_link,
        })
    }

    /// Fetch up to 25 inbox messages, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the request fails.
    pub async fn list_inbox(&self, user_id: &str) -> Result<MessagePage, CoreError> {
        let url = self.url(&format!(
            "/users/{}/mailFolders/inbox/messages",
            urlencoding::encode(user_id)
        ));
        let top = INBOX_PAGE_SIZE.to_string();
        let request = self
            .authorized("list inbox", self.http_client.get(url))
            .await?
            .query(&[
                ("$select", INBOX_FIELDS),
                ("$top", top.as_str()),
                ("$orderby", "receivedDateTime DESC"),
            ]);

        let page: Collection<Message> = fetch_json("list inbox", request).await?;
        let mut messages: Vec<MessageSummary> = page
            .value
            .into_iter()
            .take(INBOX_PAGE_SIZE)
            .map(MessageSummary::from)
            .collect();
        // Undated messages sort last.
        messages.sort_by(|a, b| b.received_at.cmp(&a.received_at));

        log::debug!(
            "listed {} inbox messages for {user_id} (more: {})",
            messages.len(),
            page.next_link.is_some()
        );
        Ok(MessagePage {
            messages,
            next_link: page.next_link,
        })
    }

    /// Send a plain-text mail on behalf of `user_id` with app-only permissions.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the request fails.
    pub async fn send_mail(
        &self,
        user_id: &str,
        message: &OutgoingMessage,
    ) -> Result<(), CoreError> {
        let url = self.url(&format!("/users/{}/sendMail", urlencoding::encode(user_id)));
        let request = self
            .authorized("send mail", self.http_client.post(url))
            .await?
            .json(&message.to_request());

        let response = request
            .send()
            .await
            .map_err(|e| CoreError::Api(format!("send mail request failed: {e}")))?;
        check_status("send mail", response).await?;

        log::info!("sent mail from {user_id} to {}", message.recipient);
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn authorized(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<RequestBuilder, CoreError> {
        let token = self.credential.get_token().await.map_err(|e| match e {
            CoreError::Auth(msg) => CoreError::Auth(format!("{operation}: {msg}")),
            other => other,
        })?;
        Ok(request.bearer_auth(token.secret))
    }
}

async fn fetch_json<T: DeserializeOwned>(
    operation: &str,
    request: RequestBuilder,
) -> Result<T, CoreError> {
    let response = request
        .send()
        .await
        .map_err(|e| CoreError::Api(format!("{operation} request failed: {e}")))?;
    let response = check_status(operation, response).await?;

    response
        .json::<T>()
        .await
        .map_err(|e| CoreError::Serialization(format!("parsing {operation} response: {e}")))
}

async fn check_status(operation: &str, response: Response) -> Result<Response, CoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&text)
        .map_or(text, |err| format!("{}: {}", err.error.code, err.error.message));
    Err(CoreError::Api(format!(
        "{operation} failed: {status} - {detail}"
    )))
}
