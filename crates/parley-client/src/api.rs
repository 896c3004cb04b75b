//! Typed HTTP client for the coordinator REST surface.

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use parley_shared::kinds::ErrorKind;
use parley_shared::protocol::{
    ConnectionRequestInfo, ConnectionRequestListResponse, CreateAccountRequest,
    CreateAccountResponse, ErrorBody, FriendListResponse, FriendRequestInfo,
    FriendRequestListResponse, IncomingPingInfo, IncomingPingListResponse, OpenConnectionRequest,
    OpenConnectionResponse, PingStatusResponse, RegisterSessionResponse, ReplyConnectionRequest,
    RespondFriendRequestRequest, SendFriendRequestRequest, SendFriendRequestResponse,
    SendPingRequest, SendPingResponse, SessionInfo, SessionListResponse,
};
use parley_shared::types::{FriendDecision, PingStatus};

use crate::error::ClientError;

/// A handle to one coordinator instance, optionally bound to a credential.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    http: reqwest::Client,
    base_url: String,
    credential: Option<String>,
}

impl CoordinatorClient {
    /// Point at a coordinator, unauthenticated (enough for
    /// `create_account` and `poll_ping`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
            credential: None,
        }
    }

    /// Bind a bearer credential to every subsequent call.
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let req = match &self.credential {
            Some(credential) => req.bearer_auth(credential),
            None => req,
        };

        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }

        // Non-2xx: the body carries the machine-readable kind.
        match resp.json::<ErrorBody>().await {
            Ok(body) => Err(ClientError::Api {
                kind: body.kind,
                message: body.error,
            }),
            Err(_) => Err(ClientError::Api {
                kind: ErrorKind::Internal,
                message: format!("HTTP {status} with unreadable error body"),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Identity store
    // ------------------------------------------------------------------

    pub async fn create_account(
        &self,
        username: &str,
    ) -> Result<CreateAccountResponse, ClientError> {
        self.execute(
            self.http
                .post(self.url("/accounts"))
                .json(&CreateAccountRequest {
                    username: username.to_string(),
                }),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Session registry
    // ------------------------------------------------------------------

    pub async fn register_session(&self) -> Result<SessionInfo, ClientError> {
        let resp: RegisterSessionResponse =
            self.execute(self.http.post(self.url("/sessions"))).await?;
        Ok(resp.session)
    }

    pub async fn heartbeat(&self, handle: &str) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .execute(self.http.post(self.url(&format!("/sessions/{handle}/heartbeat"))))
            .await?;
        Ok(())
    }

    pub async fn deactivate_session(&self, handle: &str) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .execute(self.http.delete(self.url(&format!("/sessions/{handle}"))))
            .await?;
        Ok(())
    }

    pub async fn list_live_sessions(&self) -> Result<Vec<SessionInfo>, ClientError> {
        let resp: SessionListResponse =
            self.execute(self.http.get(self.url("/sessions"))).await?;
        Ok(resp.sessions)
    }

    /// Another account's live sessions (presence discovery; not
    /// friend-gated).
    pub async fn presence(&self, username: &str) -> Result<Vec<SessionInfo>, ClientError> {
        let resp: SessionListResponse = self
            .execute(self.http.get(self.url(&format!("/presence/{username}"))))
            .await?;
        Ok(resp.sessions)
    }

    // ------------------------------------------------------------------
    // Friend graph
    // ------------------------------------------------------------------

    pub async fn send_friend_request(&self, to_username: &str) -> Result<Uuid, ClientError> {
        let resp: SendFriendRequestResponse = self
            .execute(
                self.http
                    .post(self.url("/friends/requests"))
                    .json(&SendFriendRequestRequest {
                        to_username: to_username.to_string(),
                    }),
            )
            .await?;
        Ok(resp.request_id)
    }

    pub async fn respond_friend_request(
        &self,
        request_id: Uuid,
        decision: FriendDecision,
    ) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .execute(
                self.http
                    .post(self.url(&format!("/friends/requests/{request_id}/respond")))
                    .json(&RespondFriendRequestRequest { decision }),
            )
            .await?;
        Ok(())
    }

    pub async fn list_incoming_friend_requests(
        &self,
    ) -> Result<Vec<FriendRequestInfo>, ClientError> {
        let resp: FriendRequestListResponse = self
            .execute(self.http.get(self.url("/friends/requests")))
            .await?;
        Ok(resp.requests)
    }

    pub async fn list_friends(&self) -> Result<Vec<String>, ClientError> {
        let resp: FriendListResponse =
            self.execute(self.http.get(self.url("/friends"))).await?;
        Ok(resp.friends)
    }

    pub async fn unfriend(&self, username: &str) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .execute(self.http.delete(self.url(&format!("/friends/{username}"))))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Connection requests
    // ------------------------------------------------------------------

    pub async fn open_connection(
        &self,
        from_session: &str,
        to_session: &str,
        offer: &str,
    ) -> Result<Uuid, ClientError> {
        let resp: OpenConnectionResponse = self
            .execute(
                self.http
                    .post(self.url("/connections"))
                    .json(&OpenConnectionRequest {
                        from_session: from_session.to_string(),
                        to_session: to_session.to_string(),
                        offer: offer.to_string(),
                    }),
            )
            .await?;
        Ok(resp.request_id)
    }

    pub async fn reply_connection(
        &self,
        request_id: Uuid,
        answer: &str,
    ) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .execute(
                self.http
                    .post(self.url(&format!("/connections/{request_id}/reply")))
                    .json(&ReplyConnectionRequest {
                        answer: answer.to_string(),
                    }),
            )
            .await?;
        Ok(())
    }

    pub async fn complete_connection(&self, request_id: Uuid) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .execute(
                self.http
                    .post(self.url(&format!("/connections/{request_id}/complete"))),
            )
            .await?;
        Ok(())
    }

    pub async fn incoming_connections(
        &self,
        session_handle: &str,
    ) -> Result<Vec<ConnectionRequestInfo>, ClientError> {
        let resp: ConnectionRequestListResponse = self
            .execute(
                self.http
                    .get(self.url(&format!("/connections/incoming/{session_handle}"))),
            )
            .await?;
        Ok(resp.requests)
    }

    pub async fn connection_status(
        &self,
        request_id: Uuid,
    ) -> Result<ConnectionRequestInfo, ClientError> {
        self.execute(self.http.get(self.url(&format!("/connections/{request_id}"))))
            .await
    }

    // ------------------------------------------------------------------
    // Liveness pings
    // ------------------------------------------------------------------

    pub async fn send_ping(
        &self,
        from_session: &str,
        to_session: &str,
    ) -> Result<Uuid, ClientError> {
        let resp: SendPingResponse = self
            .execute(self.http.post(self.url("/pings")).json(&SendPingRequest {
                from_session: from_session.to_string(),
                to_session: to_session.to_string(),
            }))
            .await?;
        Ok(resp.ping_id)
    }

    pub async fn respond_ping(&self, ping_id: Uuid) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .execute(self.http.post(self.url(&format!("/pings/{ping_id}/respond"))))
            .await?;
        Ok(())
    }

    pub async fn poll_ping(&self, ping_id: Uuid) -> Result<Option<PingStatus>, ClientError> {
        let resp: PingStatusResponse = self
            .execute(self.http.get(self.url(&format!("/pings/{ping_id}"))))
            .await?;
        Ok(resp.status)
    }

    pub async fn incoming_pings(
        &self,
        session_handle: &str,
    ) -> Result<Vec<IncomingPingInfo>, ClientError> {
        let resp: IncomingPingListResponse = self
            .execute(
                self.http
                    .get(self.url(&format!("/pings/incoming/{session_handle}"))),
            )
            .await?;
        Ok(resp.pings)
    }
}
