//! Command Router
//!
//! Per-command pipeline, in this order:
//! 1. Trusted origin from the transport
//! 2. Nonce consumed
//! 3. Request id recorded for correlation (duplicates per origin rejected)
//! 4. `connect` creates a session and token and stops here
//! 5. Session token validated against the trusted origin and session
//! 6. Tab ownership for any command naming an existing tab
//! 7. Negotiation for sensitive actions
//! 8. Dispatch to the browser host
//!
//! Every failure becomes an error response carrying the original request id.

use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

use tether_permissions::{
    Action, ApprovalUi, PermissionNegotiator, PermissionPolicyStore, PermissionRequest,
    SqlitePolicyBackend,
};
use tether_security::{
    origin_of_url, InboundMessage, OriginAuthenticator, ReplayGuard, SessionTokenStore,
    TrustedOrigin,
};
use tether_session::{SessionRegistry, TabId};
use tether_storage::Database;

use crate::config::Config;
use crate::error::ProtocolError;
use crate::host::BrowserHost;
use crate::protocol::{Command, Envelope, EnvelopeKind, Response, SessionCreated};
use crate::tracker::RequestTracker;
use crate::Result;

/// Target origin used for a tab opened without a URL
const BLANK_ORIGIN: &str = "about:blank";

/// All router state, handed in at construction so tests get isolated instances
#[derive(Clone)]
pub struct Stores {
    pub replay: ReplayGuard,
    pub tokens: SessionTokenStore,
    pub sessions: SessionRegistry,
    pub policies: PermissionPolicyStore,
    pub requests: RequestTracker,
}

impl Stores {
    /// Fresh stores with policies kept in memory only
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_policies(config, PermissionPolicyStore::in_memory())
    }

    pub fn with_policies(config: &Config, policies: PermissionPolicyStore) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            replay: ReplayGuard::with_capacity(config.nonce_capacity),
            tokens: SessionTokenStore::with_ttl(config.token_ttl()?),
            sessions: SessionRegistry::new(),
            policies,
            requests: RequestTracker::with_ttl(config.request_ttl()?),
        })
    }

    /// Stores for a host process, loading remembered policies from the
    /// configured database if there is one
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;

        let path = match &config.policy_database_path {
            Some(path) => path,
            None => return Self::new(config),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(path)?;
        let policies = PermissionPolicyStore::with_backend(Arc::new(SqlitePolicyBackend::new(db)));
        policies.init()?;

        Self::with_policies(config, policies)
    }
}

pub struct CommandRouter {
    stores: Stores,
    negotiator: PermissionNegotiator,
    host: Arc<dyn BrowserHost>,
}

impl CommandRouter {
    pub fn new(
        config: &Config,
        stores: Stores,
        ui: Arc<dyn ApprovalUi>,
        host: Arc<dyn BrowserHost>,
    ) -> Self {
        let negotiator =
            PermissionNegotiator::new(stores.sessions.clone(), stores.policies.clone(), ui)
                .with_timeout(config.approval_timeout());

        Self {
            stores,
            negotiator,
            host,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn negotiator(&self) -> &PermissionNegotiator {
        &self.negotiator
    }

    /// Handle a raw JSON message whose sender origin the transport vouches for
    pub async fn handle_json(&self, transport_origin: &str, raw: &str) -> Response {
        let payload: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(origin = %transport_origin, error = %e, "Unparseable message");
                return Response::error(String::new(), &ProtocolError::MalformedMessage(e.to_string()));
            }
        };

        let request_id = request_id_of(&payload);

        match OriginAuthenticator::authenticate(transport_origin, payload) {
            Ok(message) => self.handle(message).await,
            Err(e) => {
                let err = ProtocolError::from(e);
                tracing::warn!(
                    request_id = %request_id,
                    origin = %transport_origin,
                    code = err.code(),
                    "Message from unusable origin"
                );
                Response::error(request_id, &err)
            }
        }
    }

    /// Handle one authenticated message and produce its correlated response
    pub async fn handle(&self, message: InboundMessage) -> Response {
        let InboundMessage { origin, payload } = message;
        let fallback_id = request_id_of(&payload);

        let envelope: Envelope = match serde_json::from_value(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                return reject(fallback_id, &origin, ProtocolError::MalformedMessage(e.to_string()))
            }
        };

        if envelope.request_id.is_empty() {
            return reject(
                String::new(),
                &origin,
                ProtocolError::MalformedMessage("empty requestId".into()),
            );
        }

        let request_id = envelope.request_id.clone();
        if let Err(e) = self.stores.replay.check(envelope.nonce.as_deref()) {
            return reject(request_id, &origin, e.into());
        }
        if let Err(e) = self
            .stores
            .requests
            .begin(&request_id, &origin, envelope.tab_hint())
        {
            return reject(request_id, &origin, e);
        }

        let result = self.process(&origin, envelope).await;
        self.stores.requests.complete(&origin, &request_id);

        match result {
            Ok(payload) => Response::ok(request_id, payload),
            Err(e) => reject(request_id, &origin, e),
        }
    }

    async fn process(
        &self,
        origin: &TrustedOrigin,
        envelope: Envelope,
    ) -> std::result::Result<Value, ProtocolError> {
        match envelope.kind {
            EnvelopeKind::Connect => self.connect(origin),
            EnvelopeKind::ExecuteCommand => {
                let claims = self
                    .stores
                    .tokens
                    .validate(envelope.session_token.as_deref(), origin)?;

                let raw = envelope.command.ok_or_else(|| {
                    ProtocolError::MalformedMessage("executeCommand without a command".into())
                })?;
                let command = Command::parse(raw)?;

                self.execute(origin, &claims.session_id, command).await
            }
            EnvelopeKind::Unknown => Err(ProtocolError::UnknownCommand(
                "unsupported envelope type".into(),
            )),
        }
    }

    fn connect(&self, origin: &TrustedOrigin) -> std::result::Result<Value, ProtocolError> {
        if !origin.is_secure() {
            return Err(ProtocolError::InsecureOrigin(origin.to_string()));
        }

        let session = self.stores.sessions.create_session(origin)?;
        let token = self.stores.tokens.issue(&session.id, origin);

        let created = SessionCreated {
            session_id: session.id,
            created_at: session.created_at,
            session_token: token.token,
            expires_at: token.expires_at,
        };

        Ok(created.to_payload())
    }

    async fn execute(
        &self,
        origin: &TrustedOrigin,
        token_session: &str,
        command: Command,
    ) -> std::result::Result<Value, ProtocolError> {
        let session_id = command.session_id().to_string();

        if session_id != token_session {
            tracing::warn!(
                session_id = %session_id,
                origin = %origin,
                "Session token belongs to a different session"
            );
            return Err(ProtocolError::InvalidSession(session_id));
        }
        self.stores.sessions.require(&session_id)?;

        if let Some(tab_id) = command.tab_id() {
            if !self.stores.sessions.is_tab_owned(&session_id, tab_id) {
                tracing::warn!(session_id = %session_id, tab_id, "Tab access denied");
                return Err(ProtocolError::TabAccessDenied(tab_id));
            }
        }

        match command {
            Command::ListTabs { .. } => {
                let tabs = self.stores.sessions.tabs(&session_id)?;
                Ok(json!({ "tabs": tabs, "success": true }))
            }

            Command::CreateTab { url, .. } => {
                let target = match url.as_deref() {
                    Some(url) => target_origin(url)?,
                    None => BLANK_ORIGIN.to_string(),
                };
                let request = PermissionRequest::new(Action::CreateTab, origin.as_str(), target)
                    .with_url(url.clone());
                self.authorize(request, &session_id).await?;

                let tab_id = self.open_tab(&session_id, url.as_deref()).await?;
                Ok(json!({ "tabId": tab_id, "success": true }))
            }

            Command::Navigate { tab_id, url, .. } => {
                let request =
                    PermissionRequest::new(Action::Navigate, origin.as_str(), target_origin(&url)?)
                        .with_url(Some(url.clone()));
                self.authorize(request, &session_id).await?;

                match tab_id {
                    Some(tab_id) => Ok(self.host.navigate(tab_id, &url).await?),
                    None => {
                        let tab_id = self.open_tab(&session_id, Some(&url)).await?;
                        Ok(json!({ "tabId": tab_id, "url": url, "success": true }))
                    }
                }
            }

            Command::Execute {
                tab_id, tool, args, ..
            } => {
                let action = tool_action(&tool)?;

                if action.is_sensitive() {
                    let current = self.host.tab_url(tab_id).await?;
                    let target = origin_of_url(&current).unwrap_or(current);
                    let request = PermissionRequest::new(action, origin.as_str(), target)
                        .with_element(string_arg(&args, "element"))
                        .with_ref(string_arg(&args, "ref"))
                        .with_text(string_arg(&args, "text"));
                    self.authorize(request, &session_id).await?;
                }

                Ok(self.host.execute(tab_id, action, &args).await?)
            }
        }
    }

    async fn authorize(
        &self,
        request: PermissionRequest,
        session_id: &str,
    ) -> std::result::Result<(), ProtocolError> {
        let resolution = self.negotiator.negotiate(request, session_id).await?;
        tracing::debug!(session_id = %session_id, ?resolution, "Permission granted");
        Ok(())
    }

    async fn open_tab(
        &self,
        session_id: &str,
        url: Option<&str>,
    ) -> std::result::Result<TabId, ProtocolError> {
        let tab_id = self.host.create_tab(url).await?;
        self.stores.sessions.add_tab(session_id, tab_id)?;

        tracing::info!(session_id = %session_id, tab_id, "Opened tab for session");

        Ok(tab_id)
    }

    /// Drop every piece of process state, as a host restart would.
    /// Remembered policies are reloaded from their backend.
    pub fn reset(&self) -> Result<()> {
        self.stores.replay.reset();
        self.stores.tokens.reset();
        self.stores.sessions.reset();
        self.stores.requests.reset();
        self.negotiator.reset();

        self.stores.policies.reset();
        let policies = self.stores.policies.init()?;

        tracing::info!(policies, "Router state reset");

        Ok(())
    }
}

fn reject(request_id: String, origin: &TrustedOrigin, err: ProtocolError) -> Response {
    tracing::warn!(
        request_id = %request_id,
        origin = %origin,
        code = err.code(),
        error = %err,
        "Command rejected"
    );
    Response::error(request_id, &err)
}

fn request_id_of(payload: &Value) -> String {
    payload
        .get("requestId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Origin a URL would load into; opaque URLs stand for themselves
fn target_origin(url: &str) -> std::result::Result<String, ProtocolError> {
    if let Some(origin) = origin_of_url(url) {
        return Ok(origin);
    }

    let parsed = Url::parse(url.trim())
        .map_err(|e| ProtocolError::MalformedMessage(format!("bad url {url}: {e}")))?;
    Ok(parsed.as_str().to_string())
}

/// Map an `execute` tool name onto a tab-scoped action
fn tool_action(tool: &str) -> std::result::Result<Action, ProtocolError> {
    match tool.parse::<Action>() {
        Ok(action) if action.is_tab_scoped() && action != Action::Navigate => Ok(action),
        _ => Err(ProtocolError::UnknownCommand(format!("tool {tool}"))),
    }
}

fn string_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}
