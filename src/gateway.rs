//! HTTP session gateway client
//!
//! Talks to a local bridge process that owns the platform login, cookies and
//! realtime transport. Every call after login carries the bearer token the
//! bridge hands out.

use crate::config::Config;
use crate::contacts::Contact;
use crate::credentials::Credentials;
use crate::error::{AuthError, FetchError, ListenError, SendError};
use crate::session::{Authenticator, EventKind, InboundMessage, SendReceipt, SessionHandle};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Slack on top of the long-poll window before a poll counts as hung
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(rename = "userID", default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireFriend {
    #[serde(rename = "userID")]
    user_id: String,
    #[serde(rename = "fullName", default)]
    full_name: String,
    #[serde(default)]
    vanity: Option<String>,
}

impl From<WireFriend> for Contact {
    fn from(f: WireFriend) -> Self {
        Contact::new(&f.user_id, &f.full_name, f.vanity.as_deref())
    }
}

#[derive(Debug, Serialize)]
struct WireSend<'a> {
    body: &'a str,
    #[serde(rename = "threadID")]
    thread_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireReceipt {
    #[serde(rename = "threadID", default)]
    thread_id: Option<String>,
    #[serde(rename = "messageID", default)]
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "senderID", default)]
    sender_id: Option<String>,
    #[serde(rename = "threadID", default)]
    thread_id: String,
    #[serde(rename = "messageID", default)]
    message_id: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    attachments: Vec<serde_json::Value>,
    #[serde(rename = "participantNames", default)]
    participant_names: Vec<String>,
    #[serde(rename = "senderName", default)]
    sender_name: Option<String>,
}

impl From<WireEvent> for InboundMessage {
    fn from(e: WireEvent) -> Self {
        Self {
            kind: EventKind::from_wire(&e.kind),
            sender_id: e.sender_id.filter(|s| !s.is_empty()),
            thread_id: e.thread_id,
            message_id: e.message_id,
            body: e.body,
            has_attachments: !e.attachments.is_empty(),
            participant_count: e.participant_names.len(),
            sender_display_name: e.sender_name,
        }
    }
}

/// Parse one long-poll response body
fn parse_events(text: &str) -> Result<Vec<InboundMessage>, ListenError> {
    let events: Vec<WireEvent> =
        serde_json::from_str(text).map_err(|e| ListenError::Decode(e.to_string()))?;
    Ok(events.into_iter().map(InboundMessage::from).collect())
}

/// Logs in against the gateway
pub struct GatewayClient {
    http: Client,
    base: String,
    poll_timeout: Duration,
}

impl GatewayClient {
    pub fn new(config: &Config) -> Result<Self, AuthError> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base: config.gateway_url.trim_end_matches('/').to_string(),
            poll_timeout: config.poll_timeout(),
        })
    }
}

#[async_trait]
impl Authenticator for GatewayClient {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Arc<dyn SessionHandle>, AuthError> {
        let url = format!("{}/login", self.base);
        debug!(%url, email = %credentials.email, "Logging in");

        let resp = self
            .http
            .post(&url)
            .json(credentials)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let reason = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(if reason.is_empty() {
                status.to_string()
            } else {
                reason
            }));
        }
        if !status.is_success() {
            return Err(AuthError::Transport(format!("login returned {}", status)));
        }

        let login: LoginResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        info!(user = ?login.user_id, "Logged in as {}", credentials.email);

        let session: Arc<dyn SessionHandle> = Arc::new(GatewaySession {
            http: self.http.clone(),
            base: self.base.clone(),
            token: login.token,
            account: credentials.email.clone(),
            poll_timeout: self.poll_timeout,
            backlog: Mutex::new(VecDeque::new()),
        });
        Ok(session)
    }
}

/// Authenticated gateway session
pub struct GatewaySession {
    http: Client,
    base: String,
    token: String,
    account: String,
    poll_timeout: Duration,
    backlog: Mutex<VecDeque<InboundMessage>>,
}

impl GatewaySession {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    /// One long poll. `Ok(None)` means the gateway closed the stream.
    async fn poll(&self) -> Result<Option<Vec<InboundMessage>>, ListenError> {
        let resp = self
            .http
            .get(self.url("events"))
            .bearer_auth(&self.token)
            .query(&[("timeout", self.poll_timeout.as_secs())])
            .timeout(self.poll_timeout + POLL_GRACE)
            .send()
            .await
            .map_err(|e| ListenError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::GONE {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ListenError::Status(status.as_u16()));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| ListenError::Transport(e.to_string()))?;
        parse_events(&text).map(Some)
    }
}

#[async_trait]
impl SessionHandle for GatewaySession {
    fn account(&self) -> &str {
        &self.account
    }

    async fn friends_list(&self) -> Result<Vec<Contact>, FetchError> {
        let resp = self
            .http
            .get(self.url("friends"))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status().as_u16()));
        }

        let friends: Vec<WireFriend> = resp
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(friends.into_iter().map(Contact::from).collect())
    }

    async fn send_message(&self, body: &str, target: &str) -> Result<SendReceipt, SendError> {
        let resp = self
            .http
            .post(self.url("messages"))
            .bearer_auth(&self.token)
            .json(&WireSend {
                body,
                thread_id: target,
            })
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SendError::Status(resp.status().as_u16()));
        }

        let receipt: WireReceipt = resp
            .json()
            .await
            .map_err(|e| SendError::Decode(e.to_string()))?;
        Ok(SendReceipt {
            thread_id: receipt.thread_id,
            message_id: receipt.message_id,
        })
    }

    async fn next_event(&self) -> Option<Result<InboundMessage, ListenError>> {
        let mut backlog = self.backlog.lock().await;
        loop {
            if let Some(msg) = backlog.pop_front() {
                return Some(Ok(msg));
            }
            match self.poll().await {
                Ok(Some(events)) => {
                    if !events.is_empty() {
                        debug!("Received {} events", events.len());
                    }
                    backlog.extend(events);
                }
                Ok(None) => {
                    warn!("Gateway closed the event stream");
                    return None;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Answers one scripted response per connection, in order
    struct StubGateway {
        base_url: String,
        requests: Arc<std::sync::Mutex<Vec<String>>>,
        handle: JoinHandle<()>,
    }

    impl StubGateway {
        async fn new(script: Vec<(u16, &'static str)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(std::sync::Mutex::new(Vec::new()));

            let seen = requests.clone();
            let handle = tokio::spawn(async move {
                for (status, body) in script {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        return;
                    };
                    let request = read_request(&mut socket).await;
                    seen.lock().unwrap().push(request);

                    let response = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });

            Self {
                base_url,
                requests,
                handle,
            }
        }

        fn config(&self) -> Config {
            Config::for_test(&self.base_url)
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Drop for StubGateway {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }

    /// Read one request (head plus `Content-Length` body) as text
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_string();
                let body_len = head
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                while buf.len() < end + 4 + body_len {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                return String::from_utf8_lossy(&buf).to_string();
            }
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return String::from_utf8_lossy(&buf).to_string();
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    const LOGIN_OK: (u16, &str) = (200, r#"{"token":"tok-1","userID":"9"}"#);

    async fn login(stub: &StubGateway) -> Arc<dyn SessionHandle> {
        GatewayClient::new(&stub.config())
            .unwrap()
            .authenticate(&Credentials::new("me@example.com", "pw"))
            .await
            .unwrap()
    }

    #[test]
    fn test_parse_message_event() {
        let events = parse_events(
            r#"[{
                "type": "message",
                "senderID": "100",
                "threadID": "T1",
                "messageID": "mid.1",
                "body": "hello",
                "attachments": [],
                "participantNames": ["Alice"],
                "senderName": "Alice"
            }]"#,
        )
        .unwrap();

        assert_eq!(events.len(), 1);
        let msg = &events[0];
        assert_eq!(msg.kind, EventKind::Message);
        assert_eq!(msg.sender_id.as_deref(), Some("100"));
        assert_eq!(msg.body.as_deref(), Some("hello"));
        assert_eq!(msg.participant_count, 1);
        assert!(!msg.has_attachments);
    }

    #[test]
    fn test_parse_sparse_events() {
        let events = parse_events(
            r#"[
                {"type": "typ", "threadID": "T1"},
                {"type": "message", "senderID": "", "threadID": "T2", "messageID": "m",
                 "attachments": [{"type": "photo"}], "participantNames": ["A", "B", "C"]}
            ]"#,
        )
        .unwrap();

        assert_eq!(events[0].kind, EventKind::Typing);
        assert_eq!(events[0].sender_id, None);
        assert_eq!(events[1].sender_id, None);
        assert!(events[1].has_attachments);
        assert_eq!(events[1].participant_count, 3);
        assert_eq!(events[1].body, None);
    }

    #[test]
    fn test_parse_events_rejects_garbage() {
        assert!(matches!(parse_events("{}"), Err(ListenError::Decode(_))));
    }

    #[test]
    fn test_friend_to_contact() {
        let friends: Vec<WireFriend> = serde_json::from_str(
            r#"[{"userID":"1","fullName":"Alice Smith","vanity":"alice.s"},
                {"userID":"2","fullName":"Bob","vanity":""}]"#,
        )
        .unwrap();
        let contacts: Vec<Contact> = friends.into_iter().map(Contact::from).collect();
        assert_eq!(contacts[0], Contact::new("1", "Alice Smith", Some("alice.s")));
        assert_eq!(contacts[1].alias, None);
    }

    #[test]
    fn test_send_body_shape() {
        let json = serde_json::to_value(WireSend {
            body: "hi",
            thread_id: "T1",
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"body": "hi", "threadID": "T1"}));
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = GatewayClient::new(&Config::for_test("http://localhost:8765/")).unwrap();
        assert_eq!(client.base, "http://localhost:8765");
    }

    #[tokio::test]
    async fn test_login_transport_error() {
        // Nothing listens on port 9 (discard) in test environments
        let client = GatewayClient::new(&Config::for_test("http://127.0.0.1:9")).unwrap();
        let result = client
            .authenticate(&Credentials::new("me@example.com", "pw"))
            .await;
        assert!(matches!(result, Err(AuthError::Transport(_))));
    }
    #[tokio::test]
    async fn test_login_unauthorized_is_rejected() {
        let stub = StubGateway::new(vec![(401, "bad password")]).await;
        let result = GatewayClient::new(&stub.config())
            .unwrap()
            .authenticate(&Credentials::new("me@example.com", "wrong"))
            .await;

        match result {
            Err(AuthError::Rejected(reason)) => assert_eq!(reason, "bad password"),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("login should be rejected"),
        }
        let requests = stub.requests();
        assert!(requests[0].starts_with("POST /login "));
        assert!(requests[0].contains(r#""email":"me@example.com""#));
    }

    #[tokio::test]
    async fn test_login_forbidden_without_body_names_status() {
        let stub = StubGateway::new(vec![(403, "")]).await;
        let result = GatewayClient::new(&stub.config())
            .unwrap()
            .authenticate(&Credentials::new("me@example.com", "pw"))
            .await;
        assert!(matches!(result, Err(AuthError::Rejected(ref r)) if r.contains("403")));
    }

    #[tokio::test]
    async fn test_login_server_error_is_transport() {
        let stub = StubGateway::new(vec![(500, "")]).await;
        let result = GatewayClient::new(&stub.config())
            .unwrap()
            .authenticate(&Credentials::new("me@example.com", "pw"))
            .await;
        assert!(matches!(result, Err(AuthError::Transport(_))));
    }

    #[tokio::test]
    async fn test_friends_list_with_bearer_token() {
        let stub = StubGateway::new(vec![
            LOGIN_OK,
            (200, r#"[{"userID":"1","fullName":"Alice","vanity":"al"}]"#),
        ])
        .await;
        let session = login(&stub).await;
        assert_eq!(session.account(), "me@example.com");

        let friends = session.friends_list().await.unwrap();
        assert_eq!(friends, vec![Contact::new("1", "Alice", Some("al"))]);

        let request = stub.requests()[1].to_lowercase();
        assert!(request.starts_with("get /friends "));
        assert!(request.contains("bearer tok-1"));
    }

    #[tokio::test]
    async fn test_friends_list_status_error() {
        let stub = StubGateway::new(vec![LOGIN_OK, (500, "")]).await;
        let session = login(&stub).await;
        assert!(matches!(
            session.friends_list().await,
            Err(FetchError::Status(500))
        ));
    }

    #[tokio::test]
    async fn test_send_message_receipt_and_status_error() {
        let stub = StubGateway::new(vec![
            LOGIN_OK,
            (200, r#"{"threadID":"T1","messageID":"mid.1"}"#),
            (503, ""),
        ])
        .await;
        let session = login(&stub).await;

        let receipt = session.send_message("hi", "1").await.unwrap();
        assert_eq!(receipt.thread(), Some("T1"));
        assert!(stub.requests()[1].contains(r#""threadID":"1""#));

        assert_eq!(
            session.send_message("again", "1").await,
            Err(SendError::Status(503))
        );
    }

    #[tokio::test]
    async fn test_next_event_delivers_poll_in_order_then_closes() {
        let stub = StubGateway::new(vec![
            LOGIN_OK,
            (
                200,
                r#"[{"type":"message","senderID":"1","threadID":"T1","messageID":"m1","body":"one"},
                    {"type":"message","senderID":"1","threadID":"T1","messageID":"m2","body":"two"}]"#,
            ),
            (410, ""),
        ])
        .await;
        let session = login(&stub).await;

        let first = session.next_event().await.unwrap().unwrap();
        let second = session.next_event().await.unwrap().unwrap();
        assert_eq!(first.message_id, "m1");
        assert_eq!(second.message_id, "m2");
        assert!(session.next_event().await.is_none());

        let requests = stub.requests();
        // Second event came from the backlog, not another poll
        assert_eq!(requests.len(), 3);
        assert!(requests[1].starts_with("GET /events?timeout=1 "));
    }

    #[tokio::test]
    async fn test_next_event_status_error() {
        let stub = StubGateway::new(vec![LOGIN_OK, (502, "")]).await;
        let session = login(&stub).await;
        assert!(matches!(
            session.next_event().await,
            Some(Err(ListenError::Status(502)))
        ));
    }
}
