//! Query request body as expected by the SSE answer endpoint.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// API protocol version expected by the service.
pub const API_VERSION: &str = "2.18";

/// Tunable parameters sent alongside the query string.
///
/// The defaults match what the web frontend sends for a plain query,
/// toggles included; the service rejects or misroutes bodies that omit
/// them. Override individual fields to change search mode, model, or
/// locale.
#[derive(Debug, Clone, Serialize)]
pub struct QueryParams {
    /// UI language, e.g. `en-US`
    pub language: String,
    /// IANA timezone reported to the service
    pub timezone: String,
    /// Search focus, e.g. `internet` or `writing`
    pub search_focus: String,
    /// Conversational mode, e.g. `copilot` or `concise`
    pub mode: String,
    /// Random identifier the frontend assigns to this query
    pub frontend_uuid: Uuid,
    /// Random identifier for the conversation context
    pub frontend_context_uuid: Uuid,
    /// Protocol version, see [`API_VERSION`]
    pub version: String,
    /// Data sources to consult, e.g. `["web"]`
    pub sources: Vec<String>,
    /// Restrict results by recency (`day`, `week`, `month`, `year`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_recency_filter: Option<String>,
    /// Model preference identifier
    pub model_preference: String,
    pub is_related_query: bool,
    pub is_sponsored: bool,
    /// Who authored the query; the frontend sends `user`
    pub prompt_source: String,
    /// Surface the query came from; the frontend sends `home`
    pub query_source: String,
    pub is_incognito: bool,
    pub local_search_enabled: bool,
    /// Selects the block-structured response format this client parses
    pub use_schematized_api: bool,
    pub send_back_text_in_streaming_api: bool,
    pub client_coordinates: Option<Value>,
    /// Referenced threads or collections; unused by this client
    pub mentions: Vec<Value>,
    pub skip_search_enabled: bool,
    pub is_nav_suggestions_disabled: bool,
    pub always_search_override: bool,
    pub override_no_search: bool,
    pub should_ask_for_mcp_tool_confirmation: bool,
    pub browser_agent_allow_once_from_toggle: bool,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            timezone: "Europe/London".to_string(),
            search_focus: "internet".to_string(),
            mode: "copilot".to_string(),
            frontend_uuid: Uuid::new_v4(),
            frontend_context_uuid: Uuid::new_v4(),
            version: API_VERSION.to_string(),
            sources: vec!["web".to_string()],
            search_recency_filter: None,
            model_preference: "pplx_pro".to_string(),
            is_related_query: false,
            is_sponsored: false,
            prompt_source: "user".to_string(),
            query_source: "home".to_string(),
            is_incognito: false,
            local_search_enabled: false,
            use_schematized_api: true,
            send_back_text_in_streaming_api: false,
            client_coordinates: None,
            mentions: Vec::new(),
            skip_search_enabled: true,
            is_nav_suggestions_disabled: false,
            always_search_override: false,
            override_no_search: false,
            should_ask_for_mcp_tool_confirmation: true,
            browser_agent_allow_once_from_toggle: false,
        }
    }
}

/// A single query to submit to the answer endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    /// The question itself
    pub query_str: String,
    /// Protocol parameters
    pub params: QueryParams,
}

impl QueryRequest {
    /// A request for `query` with default [`QueryParams`].
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query_str: query.into(),
            params: QueryParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{API_VERSION, QueryParams, QueryRequest};

    #[test]
    fn test_serializes_defaults() {
        let request = QueryRequest::new("what is rust");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["query_str"], "what is rust");
        let params = &value["params"];
        assert_eq!(params["language"], "en-US");
        assert_eq!(params["timezone"], "Europe/London");
        assert_eq!(params["search_focus"], "internet");
        assert_eq!(params["mode"], "copilot");
        assert_eq!(params["version"], API_VERSION);
        assert_eq!(params["sources"], json!(["web"]));
        assert_eq!(params["model_preference"], "pplx_pro");
        // Absent filters are omitted, not serialized as null.
        assert!(params.get("search_recency_filter").is_none());
        // The frontend identifiers must be present and well-formed.
        assert!(params["frontend_uuid"].is_string());
        assert!(params["frontend_context_uuid"].is_string());
        // Toggle defaults the service expects on every query.
        assert_eq!(params["prompt_source"], "user");
        assert_eq!(params["query_source"], "home");
        assert_eq!(params["is_related_query"], false);
        assert_eq!(params["is_sponsored"], false);
        assert_eq!(params["is_incognito"], false);
        assert_eq!(params["local_search_enabled"], false);
        assert_eq!(params["use_schematized_api"], true);
        assert_eq!(params["send_back_text_in_streaming_api"], false);
        assert_eq!(params["client_coordinates"], json!(null));
        assert_eq!(params["mentions"], json!([]));
        assert_eq!(params["skip_search_enabled"], true);
        assert_eq!(params["is_nav_suggestions_disabled"], false);
        assert_eq!(params["always_search_override"], false);
        assert_eq!(params["override_no_search"], false);
        assert_eq!(params["should_ask_for_mcp_tool_confirmation"], true);
        assert_eq!(params["browser_agent_allow_once_from_toggle"], false);
    }

    #[test]
    fn test_recency_filter_serialized_when_set() {
        let params = QueryParams {
            search_recency_filter: Some("week".to_string()),
            ..QueryParams::default()
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["search_recency_filter"], "week");
    }

    #[test]
    fn test_each_request_gets_fresh_uuids() {
        let a = QueryRequest::new("a");
        let b = QueryRequest::new("b");
        assert_ne!(a.params.frontend_uuid, b.params.frontend_uuid);
    }
}
