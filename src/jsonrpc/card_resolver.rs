//! Agent card discovery via the well-known URI convention.

use super::error::{A2AError, A2AResult};
use super::transport::CallMeta;
use super::types::AgentCard;

/// Default path for the agent card well-known endpoint (A2A v0.3+).
const DEFAULT_AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";

/// Previous well-known path (pre-v0.3 compat).
const PREV_AGENT_CARD_PATH: &str = "/.well-known/agent.json";

/// Resolves [`AgentCard`]s from an agent's origin.
#[derive(Debug, Clone)]
pub struct CardResolver {
    client: reqwest::Client,
    base: String,
}

impl CardResolver {
    /// Resolver for the agent serving `endpoint`. Cards are looked up at the
    /// endpoint's origin, so `http://host:8080/jsonrpc` resolves against
    /// `http://host:8080`.
    pub fn for_endpoint(client: reqwest::Client, endpoint: &str) -> A2AResult<Self> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|e| A2AError::Transport(format!("invalid agent URL {endpoint:?}: {e}")))?;
        let base = url.origin().ascii_serialization();
        Ok(Self { client, base })
    }

    /// The origin cards are fetched from.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Fetch and parse the agent card.
    ///
    /// Tries `/.well-known/agent-card.json` first and falls back to
    /// `/.well-known/agent.json` when that returns 404.
    ///
    /// # Errors
    ///
    /// Returns [`A2AError::Transport`] on connection failures, [`A2AError::Http`]
    /// on non-2xx responses, and [`A2AError::InvalidJson`] on parse failures.
    pub async fn resolve(&self, meta: &CallMeta) -> A2AResult<AgentCard> {
        match self.fetch_card(DEFAULT_AGENT_CARD_PATH, meta).await {
            Ok(card) => Ok(card),
            Err(A2AError::Http { status: 404, .. }) => {
                tracing::debug!(
                    "agent card not found at {}{}, trying fallback path {}",
                    self.base,
                    DEFAULT_AGENT_CARD_PATH,
                    PREV_AGENT_CARD_PATH,
                );
                self.fetch_card(PREV_AGENT_CARD_PATH, meta).await
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_card(&self, path: &str, meta: &CallMeta) -> A2AResult<AgentCard> {
        let url = format!("{}{path}", self.base);

        tracing::debug!("resolving agent card from {}", url);

        let response = self
            .client
            .get(&url)
            .headers(meta.to_header_map())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    A2AError::Transport(format!("failed to connect to agent at {url}: {e}"))
                } else if e.is_timeout() {
                    A2AError::Timeout(format!("timed out fetching agent card from {url}: {e}"))
                } else {
                    A2AError::Transport(format!("failed to fetch agent card from {url}: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(A2AError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| A2AError::Transport(format!("failed to read agent card response: {e}")))?;

        let card: AgentCard = serde_json::from_slice(&bytes)
            .map_err(|e| A2AError::InvalidJson(format!("failed to parse agent card: {e}")))?;

        tracing::debug!("resolved agent card: {} v{}", card.name, card.version);

        Ok(card)
    }
}
