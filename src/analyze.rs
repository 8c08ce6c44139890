//! Optional LLM enrichment of ingested documents.
//!
//! One chat-completion call per document classifies it against a fixed JSON
//! schema (type, summary, entities, dates, department, importance). The
//! result is advisory: any failure here is logged and reported as
//! [`AnalysisOutcome::Failed`], and the pipeline carries on unenriched.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::config::AnalysisConfig;
use crate::error::{PipelineError, Result};
use crate::models::DocumentAnalysis;

const DOC_TYPES: &[&str] = &[
    "contract",
    "invoice",
    "report",
    "manual",
    "policy",
    "presentation",
    "spreadsheet",
    "other",
];

const DEPARTMENTS: &[&str] = &[
    "legal",
    "finance",
    "hr",
    "engineering",
    "sales",
    "marketing",
    "operations",
    "executive",
];

const IMPORTANCE_LEVELS: &[&str] = &["critical", "important", "normal", "low"];

const SYSTEM_PROMPT: &str = "\
You classify business documents. Reply with a single JSON object and nothing else:
{
  \"doc_type\": one of contract|invoice|report|manual|policy|presentation|spreadsheet|other,
  \"summary\": 2-3 sentence summary,
  \"key_entities\": up to 5 organizations, people or products,
  \"key_dates\": up to 3 dates in ISO 8601 (YYYY-MM-DD),
  \"department\": one of legal|finance|hr|engineering|sales|marketing|operations|executive, or null,
  \"language\": ISO 639-1 code of the document language,
  \"importance\": one of critical|important|normal|low
}
Importance criteria: legal and financial documents are critical; executive \
reports and policies are important; standard working documents are normal; \
drafts and temporary files are low.";

/// Chat-completion seam. One prompt in, the model's raw reply text out.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn complete_json(&self, system: &str, user: &str, model: &str) -> Result<String>;
}

/// OpenAI-compatible chat completions endpoint in JSON mode.
pub struct HttpChatApi {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpChatApi {
    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Ok(HttpChatApi {
            client,
            url: format!("{}/chat/completions", config.url.trim_end_matches('/')),
            api_key,
        })
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn complete_json(&self, system: &str, user: &str, model: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "response_format": {"type": "json_object"},
            "temperature": 0.1,
        });

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Analysis(format!(
                "chat API error {status}: {body_text}"
            )));
        }

        let json: serde_json::Value = response.json().await?;
        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| PipelineError::Analysis("chat response missing content".to_string()))
    }
}

/// How an analysis attempt ended. Callers can tell "off by configuration"
/// apart from "tried and failed"; neither blocks ingestion.
#[derive(Debug)]
pub enum AnalysisOutcome {
    Analyzed(DocumentAnalysis),
    Disabled,
    Failed(String),
}

impl AnalysisOutcome {
    pub fn into_option(self) -> Option<DocumentAnalysis> {
        match self {
            AnalysisOutcome::Analyzed(a) => Some(a),
            _ => None,
        }
    }
}

pub struct DocumentAnalyzer {
    api: Option<Arc<dyn ChatApi>>,
    config: AnalysisConfig,
}

impl DocumentAnalyzer {
    pub fn new(api: Option<Arc<dyn ChatApi>>, config: AnalysisConfig) -> Self {
        DocumentAnalyzer { api, config }
    }

    pub fn disabled(config: AnalysisConfig) -> Self {
        DocumentAnalyzer { api: None, config }
    }

    /// Classify a document from a bounded prefix of its normalized text.
    pub async fn analyze(&self, text: &str, filename: &str) -> AnalysisOutcome {
        let api = match &self.api {
            Some(api) if self.config.enabled => api,
            _ => return AnalysisOutcome::Disabled,
        };

        let prefix: String = text.chars().take(self.config.max_prefix_chars).collect();
        let user = format!("Filename: {filename}\n\nDocument text:\n{prefix}");

        let raw = match api
            .complete_json(SYSTEM_PROMPT, &user, &self.config.model)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(filename, error = %e, "document analysis call failed");
                return AnalysisOutcome::Failed(e.to_string());
            }
        };

        match parse_analysis(&raw) {
            Ok(analysis) => AnalysisOutcome::Analyzed(analysis),
            Err(e) => {
                tracing::warn!(filename, error = %e, "document analysis returned unusable JSON");
                AnalysisOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Parse and sanitize the model's reply. Out-of-set values are clamped
/// rather than rejected; only unparseable JSON is an error.
fn parse_analysis(raw: &str) -> Result<DocumentAnalysis> {
    let start = raw
        .find('{')
        .ok_or_else(|| PipelineError::Analysis("no JSON object in reply".to_string()))?;
    let end = raw
        .rfind('}')
        .ok_or_else(|| PipelineError::Analysis("no JSON object in reply".to_string()))?;
    if end < start {
        return Err(PipelineError::Analysis("no JSON object in reply".to_string()));
    }
    let value: serde_json::Value = serde_json::from_str(&raw[start..=end])?;

    let doc_type = clamp_to_set(&value, "doc_type", DOC_TYPES, Some("other"));
    let importance = clamp_to_set(&value, "importance", IMPORTANCE_LEVELS, Some("normal"));
    let department = clamp_to_set(&value, "department", DEPARTMENTS, None);

    let summary = string_field(&value, "summary");
    let language = string_field(&value, "language").map(|l| l.to_lowercase());

    let mut key_entities: Vec<String> = string_list(&value, "key_entities");
    key_entities.truncate(5);

    let mut key_dates: Vec<String> = string_list(&value, "key_dates");
    key_dates.retain(|d| is_iso_date(d));
    key_dates.truncate(3);

    Ok(DocumentAnalysis {
        doc_type,
        summary,
        key_entities,
        key_dates,
        department,
        language,
        importance,
        analyzed_at: Some(Utc::now()),
    })
}

fn string_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn string_list(value: &serde_json::Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Keep a field only when its lowercased value is in `set`; out-of-set
/// values fall back to `default` (in-set by construction) when one exists.
fn clamp_to_set(
    value: &serde_json::Value,
    key: &str,
    set: &[&str],
    default: Option<&str>,
) -> Option<String> {
    let raw = string_field(value, key)?;
    let lowered = raw.to_lowercase();
    if set.contains(&lowered.as_str()) {
        Some(lowered)
    } else {
        default.map(|d| d.to_string())
    }
}

fn is_iso_date(s: &str) -> bool {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedChat(Result<String>);

    #[async_trait]
    impl ChatApi for ScriptedChat {
        async fn complete_json(&self, _system: &str, _user: &str, _model: &str) -> Result<String> {
            match &self.0 {
                Ok(s) => Ok(s.clone()),
                Err(_) => Err(PipelineError::Analysis("scripted failure".to_string())),
            }
        }
    }

    fn enabled_config() -> AnalysisConfig {
        AnalysisConfig {
            enabled: true,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn test_parse_full_reply() {
        let raw = r#"{
            "doc_type": "invoice",
            "summary": "An invoice for services. It totals 1200 EUR.",
            "key_entities": ["Acme GmbH", "Jane Doe"],
            "key_dates": ["2024-03-01", "2024-04-01"],
            "department": "finance",
            "language": "en",
            "importance": "critical"
        }"#;
        let a = parse_analysis(raw).unwrap();
        assert_eq!(a.doc_type.as_deref(), Some("invoice"));
        assert_eq!(a.department.as_deref(), Some("finance"));
        assert_eq!(a.importance.as_deref(), Some("critical"));
        assert_eq!(a.key_entities.len(), 2);
        assert_eq!(a.key_dates.len(), 2);
        assert!(a.analyzed_at.is_some());
    }

    #[test]
    fn test_out_of_set_values_clamped() {
        let raw = r#"{
            "doc_type": "memo",
            "department": "magic",
            "importance": "URGENT",
            "summary": "x"
        }"#;
        let a = parse_analysis(raw).unwrap();
        assert_eq!(a.doc_type.as_deref(), Some("other"));
        assert_eq!(a.importance.as_deref(), Some("normal"));
        assert_eq!(a.department, None);
    }

    #[test]
    fn test_uppercase_in_set_value_accepted() {
        let raw = r#"{"doc_type": "Report", "importance": "Important"}"#;
        let a = parse_analysis(raw).unwrap();
        assert_eq!(a.doc_type.as_deref(), Some("report"));
        assert_eq!(a.importance.as_deref(), Some("important"));
    }

    #[test]
    fn test_lists_truncated_and_dates_validated() {
        let raw = r#"{
            "key_entities": ["a", "b", "c", "d", "e", "f", "g"],
            "key_dates": ["2024-01-15", "soon", "2024-02-29", "2023-02-29", "2024-05-01"]
        }"#;
        let a = parse_analysis(raw).unwrap();
        assert_eq!(a.key_entities.len(), 5);
        // "soon" and the impossible 2023-02-29 are dropped, rest capped at 3
        assert_eq!(a.key_dates, vec!["2024-01-15", "2024-02-29", "2024-05-01"]);
    }

    #[test]
    fn test_json_extracted_from_fenced_reply() {
        let raw = "```json\n{\"doc_type\": \"report\"}\n```";
        let a = parse_analysis(raw).unwrap();
        assert_eq!(a.doc_type.as_deref(), Some("report"));
    }

    #[test]
    fn test_garbage_reply_is_error() {
        assert!(parse_analysis("I could not classify this document.").is_err());
        assert!(parse_analysis("{not json}").is_err());
    }

    #[tokio::test]
    async fn test_disabled_analyzer_reports_disabled() {
        let analyzer = DocumentAnalyzer::disabled(AnalysisConfig::default());
        let outcome = analyzer.analyze("some text", "a.txt").await;
        assert!(matches!(outcome, AnalysisOutcome::Disabled));
    }

    #[tokio::test]
    async fn test_api_failure_is_nonfatal_outcome() {
        let api = Arc::new(ScriptedChat(Err(PipelineError::Analysis("x".to_string()))));
        let analyzer = DocumentAnalyzer::new(Some(api), enabled_config());
        let outcome = analyzer.analyze("some text", "a.txt").await;
        assert!(matches!(outcome, AnalysisOutcome::Failed(_)));
        assert!(outcome.into_option().is_none());
    }

    #[tokio::test]
    async fn test_successful_analysis() {
        let api = Arc::new(ScriptedChat(Ok(
            r#"{"doc_type": "policy", "summary": "A policy.", "importance": "important"}"#
                .to_string(),
        )));
        let analyzer = DocumentAnalyzer::new(Some(api), enabled_config());
        let outcome = analyzer.analyze("policy text", "policy.pdf").await;
        let analysis = outcome.into_option().unwrap();
        assert_eq!(analysis.doc_type.as_deref(), Some("policy"));
    }
}
