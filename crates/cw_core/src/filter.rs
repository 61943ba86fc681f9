use chrono::{NaiveDateTime, NaiveTime};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::dates::{end_of_day, parse_date, parse_published};
use crate::types::{Article, Severity};
use crate::{Error, Result};

/// Raw query string of `GET /api/preferences/filter-articles`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub locations: Option<String>,
    pub radius: Option<String>,
    pub disruption_types: Option<String>,
    pub severity_levels: Option<String>,
    pub suppliers: Option<String>,
}

/// Validated, conjunctive article filter. Empty lists mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    pub locations: Vec<String>,
    pub disruption_types: Vec<String>,
    pub severities: Vec<Severity>,
    pub suppliers: Vec<String>,
    /// Upper bound on the stored distance from the reference point, in km.
    pub max_radius: Option<f64>,
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn non_empty(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl FilterCriteria {
    pub fn from_params(params: &FilterParams) -> Result<Self> {
        let from = match non_empty(&params.from_date) {
            Some(raw) => Some(
                parse_date(raw)
                    .ok_or_else(|| Error::validation(format!("Invalid fromDate: {}", raw)))?
                    .and_time(NaiveTime::MIN),
            ),
            None => None,
        };
        let to = match non_empty(&params.to_date) {
            Some(raw) => Some(end_of_day(
                parse_date(raw).ok_or_else(|| Error::validation(format!("Invalid toDate: {}", raw)))?,
            )),
            None => None,
        };
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(Error::validation(
                    "Invalid date range. 'fromDate' must be earlier than 'toDate'.",
                ));
            }
        }

        let max_radius = match non_empty(&params.radius) {
            Some(raw) => match raw.parse::<f64>() {
                Ok(km) if km.is_finite() && km >= 0.0 => Some(km),
                _ => return Err(Error::validation(format!("Invalid radius: {}", raw))),
            },
            None => None,
        };

        let severities = split_list(params.severity_levels.as_deref())
            .iter()
            .map(|s| s.parse::<Severity>())
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            from,
            to,
            locations: split_list(params.locations.as_deref()),
            disruption_types: split_list(params.disruption_types.as_deref()),
            severities,
            suppliers: split_list(params.suppliers.as_deref()),
            max_radius,
        })
    }

    /// In-process evaluation, used by backends without a query language.
    /// Does not look at `is_deleted`.
    pub fn matches(&self, article: &Article) -> bool {
        if self.from.is_some() || self.to.is_some() {
            let Some(published) = parse_published(&article.published_date) else {
                return false;
            };
            if self.from.is_some_and(|from| published < from) {
                return false;
            }
            if self.to.is_some_and(|to| published > to) {
                return false;
            }
        }
        if !self.locations.is_empty() && !self.locations.contains(&article.location) {
            return false;
        }
        if !self.disruption_types.is_empty()
            && !self
                .disruption_types
                .iter()
                .any(|t| t == article.disruption_type.as_str())
        {
            return false;
        }
        if !self.severities.is_empty() && !self.severities.contains(&article.severity) {
            return false;
        }
        if !self.suppliers.is_empty() {
            match &article.source_name {
                Some(source) if self.suppliers.contains(source) => {}
                _ => return false,
            }
        }
        if let Some(max) = self.max_radius {
            match article.radius {
                Some(radius) if radius <= max => {}
                _ => return false,
            }
        }
        true
    }
}

/// Free-text search over title, location, disruption type and severity.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pattern: Regex,
}

impl SearchQuery {
    /// The term is a case-insensitive regular expression.
    pub fn new(query: Option<&str>) -> Result<Self> {
        let raw = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| Error::validation("Search query is required."))?;
        let pattern = RegexBuilder::new(raw)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::validation(format!("Invalid search query: {}", e)))?;
        Ok(Self { pattern })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, article: &Article) -> bool {
        self.pattern.is_match(&article.title)
            || self.pattern.is_match(&article.location)
            || self.pattern.is_match(article.disruption_type.as_str())
            || self.pattern.is_match(article.severity.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DisruptionType, NewArticle};

    fn article(location: &str, severity: Severity, published: &str) -> Article {
        NewArticle {
            title: "Typhoon shuts Haiphong terminals".to_string(),
            url: format!("https://news.test/{}", location),
            image_url: None,
            disruption_type: DisruptionType::PortDisruption,
            published_date: published.to_string(),
            location: location.to_string(),
            coordinates: None,
            radius: Some(1650.0),
            severity,
            raw_text: String::new(),
            text: String::new(),
            source_name: Some("Reuters".to_string()),
        }
        .into_article("id".to_string())
    }

    #[test]
    fn test_empty_params_match_everything() {
        let criteria = FilterCriteria::from_params(&FilterParams::default()).unwrap();
        assert_eq!(criteria, FilterCriteria::default());
        assert!(criteria.matches(&article("Vietnam", Severity::Low, "garbage")));
    }

    #[test]
    fn test_lists_are_split_and_trimmed() {
        let params = FilterParams {
            locations: Some("Vietnam, China,,".to_string()),
            severity_levels: Some("High,medium".to_string()),
            ..Default::default()
        };
        let criteria = FilterCriteria::from_params(&params).unwrap();
        assert_eq!(criteria.locations, vec!["Vietnam", "China"]);
        assert_eq!(criteria.severities, vec![Severity::High, Severity::Medium]);

        assert!(criteria.matches(&article("China", Severity::High, "2024-03-05T00:00:00Z")));
        assert!(!criteria.matches(&article("China", Severity::Low, "2024-03-05T00:00:00Z")));
        assert!(!criteria.matches(&article("Chile", Severity::High, "2024-03-05T00:00:00Z")));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let params = FilterParams {
            from_date: Some("2024-03-01".to_string()),
            to_date: Some("2024-03-05".to_string()),
            ..Default::default()
        };
        let criteria = FilterCriteria::from_params(&params).unwrap();
        assert!(criteria.matches(&article("Vietnam", Severity::Low, "2024-03-01T00:00:00Z")));
        assert!(criteria.matches(&article("Vietnam", Severity::Low, "2024-03-05T23:00:00Z")));
        assert!(!criteria.matches(&article("Vietnam", Severity::Low, "2024-03-06T00:00:00Z")));
    }

    #[test]
    fn test_rejects_bad_params() {
        let reversed = FilterParams {
            from_date: Some("2024-03-10".to_string()),
            to_date: Some("2024-03-01".to_string()),
            ..Default::default()
        };
        assert!(matches!(FilterCriteria::from_params(&reversed), Err(Error::Validation(_))));

        let radius = FilterParams {
            radius: Some("-5".to_string()),
            ..Default::default()
        };
        assert!(matches!(FilterCriteria::from_params(&radius), Err(Error::Validation(_))));

        let severity = FilterParams {
            severity_levels: Some("Severe".to_string()),
            ..Default::default()
        };
        assert!(matches!(FilterCriteria::from_params(&severity), Err(Error::Validation(_))));
    }

    #[test]
    fn test_radius_and_supplier() {
        let params = FilterParams {
            radius: Some("2000".to_string()),
            suppliers: Some("Reuters".to_string()),
            ..Default::default()
        };
        let criteria = FilterCriteria::from_params(&params).unwrap();
        let mut near = article("Vietnam", Severity::Low, "2024-03-05T00:00:00Z");
        assert!(criteria.matches(&near));
        near.radius = None;
        assert!(!criteria.matches(&near));
        near.radius = Some(10.0);
        near.source_name = Some("Bloomberg".to_string());
        assert!(!criteria.matches(&near));
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let a = article("Vietnam", Severity::High, "2024-03-05T00:00:00Z");
        assert!(SearchQuery::new(Some("haiphong")).unwrap().matches(&a));
        assert!(SearchQuery::new(Some("VIET")).unwrap().matches(&a));
        assert!(SearchQuery::new(Some("port disr")).unwrap().matches(&a));
        assert!(SearchQuery::new(Some("^high$")).unwrap().matches(&a));
        assert!(!SearchQuery::new(Some("earthquake")).unwrap().matches(&a));
    }

    #[test]
    fn test_search_requires_valid_query() {
        assert!(matches!(SearchQuery::new(None), Err(Error::Validation(_))));
        assert!(matches!(SearchQuery::new(Some("  ")), Err(Error::Validation(_))));
        assert!(matches!(SearchQuery::new(Some("(unclosed")), Err(Error::Validation(_))));
    }
}
