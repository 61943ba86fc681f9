use cw_core::countries::detect_country_fallback;
use cw_core::models::{CompletionRequest, LanguageModel};
use cw_core::{DisruptionType, Result, Severity, TARGET_LLM_REQUEST};
use regex::Regex;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::prompts;

/// Location answers that mean the model could not name a country.
const NO_LOCATION: [&str; 2] = ["No Location Detected", "Unknown"];

#[derive(Debug, Clone, PartialEq)]
pub struct SeverityLocation {
    pub severity: Severity,
    pub location: String,
}

/// Fields pulled out of a `Severity: X, Location: Y` answer. Either may be
/// missing or unusable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSeverityLocation {
    pub severity: Option<Severity>,
    pub raw_severity: Option<String>,
    pub location: Option<String>,
}

fn severity_location_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)severity\s*:\s*([^,\n]*?)\s*(?:[,\n].*?)?(?:\blocation\s*:\s*(.*)|$)")
            .unwrap_or_else(|e| panic!("severity pattern: {}", e))
    })
}

fn location_only_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)location\s*:\s*(.*)").unwrap_or_else(|e| panic!("location pattern: {}", e))
    })
}

fn clean_location(raw: &str) -> Option<String> {
    let location = raw
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim_end_matches('.')
        .trim();
    if location.is_empty() || NO_LOCATION.iter().any(|n| n.eq_ignore_ascii_case(location)) {
        None
    } else {
        Some(location.to_string())
    }
}

/// Tolerant parse of the severity/location answer. Label case, spacing and
/// commas inside the location ("Busan, South Korea") are all accepted.
pub fn parse_severity_location(response: &str) -> ParsedSeverityLocation {
    let response = response.trim().trim_matches('"');
    if let Some(caps) = severity_location_pattern().captures(response) {
        let raw_severity = caps.get(1).map(|m| m.as_str().trim().to_string());
        return ParsedSeverityLocation {
            severity: raw_severity.as_deref().and_then(|s| s.parse().ok()),
            raw_severity: raw_severity.filter(|s| !s.is_empty()),
            location: caps.get(2).and_then(|m| clean_location(m.as_str())),
        };
    }
    ParsedSeverityLocation {
        location: location_only_pattern()
            .captures(response)
            .and_then(|caps| caps.get(1))
            .and_then(|m| clean_location(m.as_str())),
        ..Default::default()
    }
}

/// Runs the three language-model enrichment steps for an article text.
pub struct ArticleAnalyzer {
    model: Arc<dyn LanguageModel>,
}

impl fmt::Debug for ArticleAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArticleAnalyzer")
            .field("model", &self.model.name())
            .finish()
    }
}

impl ArticleAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// One of the fixed categories, or `Unknown` for an empty or off-list answer.
    pub async fn classify_disruption(&self, text: &str) -> Result<DisruptionType> {
        let answer = self
            .model
            .complete(CompletionRequest::new(
                prompts::CLASSIFY_SYSTEM,
                prompts::classify(text),
                prompts::CLASSIFY_MAX_TOKENS,
            ))
            .await?;

        let kind = DisruptionType::from_label(&answer);
        if !kind.is_known() && !answer.is_empty() {
            debug!(target: TARGET_LLM_REQUEST, "Off-list category {:?}", answer);
        }
        Ok(kind)
    }

    /// Severity is clamped to `Low` when unrecognised; a missing country is
    /// replaced by the text-scan fallback.
    pub async fn detect_severity_and_location(&self, text: &str) -> Result<SeverityLocation> {
        let answer = self
            .model
            .complete(CompletionRequest::new(
                prompts::SEVERITY_SYSTEM,
                prompts::severity_and_location(text),
                prompts::SEVERITY_MAX_TOKENS,
            ))
            .await?;
        let answer = if answer.is_empty() {
            prompts::SEVERITY_DEFAULT_ANSWER.to_string()
        } else {
            answer
        };

        let parsed = parse_severity_location(&answer);
        let severity = match parsed.severity {
            Some(severity) => severity,
            None => {
                warn!(target: TARGET_LLM_REQUEST,
                    "Unrecognised severity {:?}, using Low", parsed.raw_severity);
                Severity::Low
            }
        };
        let location = parsed
            .location
            .unwrap_or_else(|| detect_country_fallback(text).to_string());

        Ok(SeverityLocation { severity, location })
    }

    /// At most four sentences. An empty answer yields the original text.
    pub async fn summarize_article(&self, text: &str) -> Result<String> {
        let summary = self
            .model
            .complete(CompletionRequest::new(
                prompts::SUMMARY_SYSTEM,
                prompts::summary(text),
                prompts::SUMMARY_MAX_TOKENS,
            ))
            .await?;
        if summary.is_empty() {
            return Ok(text.to_string());
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cw_core::Error;
    use tokio::sync::Mutex;

    /// Replies with canned answers in order and records every request.
    struct ScriptedModel {
        answers: Mutex<Vec<Result<String>>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedModel {
        fn new(answers: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            self.seen.lock().await.push(request);
            self.answers
                .lock()
                .await
                .pop()
                .unwrap_or_else(|| Err(Error::Inference("script exhausted".to_string())))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn test_parse_exact_format() {
        let parsed = parse_severity_location("Severity: High, Location: Vietnam");
        assert_eq!(parsed.severity, Some(Severity::High));
        assert_eq!(parsed.location.as_deref(), Some("Vietnam"));
    }

    #[test]
    fn test_parse_tolerates_case_spacing_and_commas() {
        let parsed = parse_severity_location("severity:medium ,  LOCATION :  Busan, South Korea.");
        assert_eq!(parsed.severity, Some(Severity::Medium));
        assert_eq!(parsed.location.as_deref(), Some("Busan, South Korea"));

        let parsed = parse_severity_location("Severity: Low\nLocation: Germany");
        assert_eq!(parsed.severity, Some(Severity::Low));
        assert_eq!(parsed.location.as_deref(), Some("Germany"));
    }

    #[test]
    fn test_parse_without_separator() {
        let parsed = parse_severity_location("Severity: High Location: Vietnam");
        assert_eq!(parsed.severity, Some(Severity::High));
        assert_eq!(parsed.raw_severity.as_deref(), Some("High"));
        assert_eq!(parsed.location.as_deref(), Some("Vietnam"));

        let parsed = parse_severity_location("Severity: Medium, some notes");
        assert_eq!(parsed.severity, Some(Severity::Medium));
        assert_eq!(parsed.location, None);
    }

    #[test]
    fn test_parse_flags_unusable_parts() {
        let parsed = parse_severity_location("Severity: Catastrophic, Location: Unknown");
        assert_eq!(parsed.severity, None);
        assert_eq!(parsed.raw_severity.as_deref(), Some("Catastrophic"));
        assert_eq!(parsed.location, None);

        let parsed = parse_severity_location("I cannot tell.");
        assert_eq!(parsed, ParsedSeverityLocation::default());

        let parsed = parse_severity_location("Location: Japan");
        assert_eq!(parsed.severity, None);
        assert_eq!(parsed.location.as_deref(), Some("Japan"));
    }

    #[tokio::test]
    async fn test_classify_maps_answers() {
        let model = ScriptedModel::new(vec![
            Ok("Port Disruption".to_string()),
            Ok("Space Weather".to_string()),
            Ok(String::new()),
        ]);
        let analyzer = ArticleAnalyzer::new(model.clone());
        assert_eq!(analyzer.classify_disruption("t").await.unwrap(), DisruptionType::PortDisruption);
        assert_eq!(analyzer.classify_disruption("t").await.unwrap(), DisruptionType::Unknown);
        assert_eq!(analyzer.classify_disruption("t").await.unwrap(), DisruptionType::Unknown);

        let seen = model.seen.lock().await;
        assert_eq!(seen[0].max_tokens, 10);
        assert_eq!(seen[0].system, prompts::CLASSIFY_SYSTEM);
    }

    #[tokio::test]
    async fn test_severity_location_fallbacks() {
        let text = "Floods near Hanoi, Vietnam halted electronics output";
        let model = ScriptedModel::new(vec![
            Ok("Severity: High, Location: No Location Detected".to_string()),
            Ok(String::new()),
            Ok("Severity: Extreme, Location: Thailand".to_string()),
        ]);
        let analyzer = ArticleAnalyzer::new(model.clone());

        let first = analyzer.detect_severity_and_location(text).await.unwrap();
        assert_eq!(first, SeverityLocation { severity: Severity::High, location: "Vietnam".to_string() });

        let empty = analyzer.detect_severity_and_location(text).await.unwrap();
        assert_eq!(empty, SeverityLocation { severity: Severity::Low, location: "Vietnam".to_string() });

        let clamped = analyzer.detect_severity_and_location(text).await.unwrap();
        assert_eq!(clamped, SeverityLocation { severity: Severity::Low, location: "Thailand".to_string() });

        assert_eq!(model.seen.lock().await[0].max_tokens, 50);
    }

    #[tokio::test]
    async fn test_summarize() {
        let model = ScriptedModel::new(vec![
            Ok("Ports reopened after two days.".to_string()),
            Ok(String::new()),
            Err(Error::Inference("rate limited".to_string())),
        ]);
        let analyzer = ArticleAnalyzer::new(model.clone());
        assert_eq!(analyzer.summarize_article("long text").await.unwrap(), "Ports reopened after two days.");
        assert_eq!(analyzer.summarize_article("long text").await.unwrap(), "long text");
        assert!(analyzer.summarize_article("long text").await.is_err());
        assert_eq!(model.seen.lock().await[0].max_tokens, 100);
    }
}
