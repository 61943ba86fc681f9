use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A persisted article as served by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(rename = "disruptionType")]
    pub disruption_type: DisruptionType,
    /// ISO 8601 as delivered by the news source; parsed only at query time.
    #[serde(rename = "publishedDate")]
    pub published_date: String,
    pub location: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius: Option<f64>,
    pub severity: Severity,
    pub raw_text: String,
    pub text: String,
    #[serde(rename = "sourceName")]
    pub source_name: Option<String>,
    #[serde(rename = "isdeleted")]
    pub is_deleted: bool,
}

/// An enriched article ready to be upserted. The store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub title: String,
    pub url: String,
    pub image_url: Option<String>,
    pub disruption_type: DisruptionType,
    pub published_date: String,
    pub location: String,
    pub coordinates: Option<crate::geo::Coordinates>,
    pub radius: Option<f64>,
    pub severity: Severity,
    pub raw_text: String,
    pub text: String,
    pub source_name: Option<String>,
}

impl NewArticle {
    /// Materialise the record under the given id, overwriting every field.
    pub fn into_article(self, id: String) -> Article {
        Article {
            id,
            title: self.title,
            url: self.url,
            image_url: self.image_url,
            disruption_type: self.disruption_type,
            published_date: self.published_date,
            location: self.location,
            lat: self.coordinates.map(|c| c.lat),
            lng: self.coordinates.map(|c| c.lng),
            radius: self.radius,
            severity: self.severity,
            raw_text: self.raw_text,
            text: self.text,
            source_name: self.source_name,
            is_deleted: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// A soft-deleted article already owns the URL; nothing was written.
    SkippedDeleted,
}

/// Strip the decoration language models like to wrap one-word answers in.
fn clean_label(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim_end_matches('.')
        .trim()
}

macro_rules! disruption_types {
    ($($variant:ident => $label:literal),+ $(,)?) => {
        /// Kind of supply-chain event an article describes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum DisruptionType {
            $($variant,)+
            Unknown,
        }

        impl DisruptionType {
            /// Every classifiable category, in prompt order. Excludes `Unknown`.
            pub const ALL: &'static [DisruptionType] = &[$(DisruptionType::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(DisruptionType::$variant => $label,)+
                    DisruptionType::Unknown => "Unknown",
                }
            }
        }
    };
}

disruption_types! {
    AirportDisruption => "Airport Disruption",
    Bankruptcy => "Bankruptcy",
    BusinessSpinOff => "Business Spin-Off",
    BusinessSale => "Business Sale",
    ChemicalSpill => "Chemical Spill",
    Corruption => "Corruption",
    CompanySplit => "Company Split",
    CyberAttack => "Cyber Attack",
    RegulatoryAction => "FDA/EMA/OSHA Action",
    FactoryFire => "Factory Fire",
    Geopolitical => "Geopolitical",
    LeadershipTransition => "Leadership Transition",
    LegalAction => "Legal Action",
    MergerAcquisition => "Merger & Acquisition",
    PortDisruption => "Port Disruption",
    ProtestRiot => "Protest/Riot",
    SupplyShortage => "Supply Shortage",
    Earthquake => "Earthquake",
    ExtremeWeather => "Extreme Weather",
    Flood => "Flood",
    Hurricane => "Hurricane",
    Tornado => "Tornado",
    Volcano => "Volcano",
    HumanHealth => "Human Health",
    PowerOutage => "Power Outage",
    Cna => "CNA",
}

impl DisruptionType {
    /// Lenient parse of a model answer; anything off-list is `Unknown`.
    pub fn from_label(raw: &str) -> Self {
        let label = clean_label(raw);
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(label))
            .unwrap_or(DisruptionType::Unknown)
    }

    pub fn is_known(&self) -> bool {
        *self != DisruptionType::Unknown
    }
}

impl fmt::Display for DisruptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DisruptionType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DisruptionType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(DisruptionType::from_label(&raw))
    }
}

/// Impact rating assigned per article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Low
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let label = clean_label(s);
        Severity::ALL
            .into_iter()
            .find(|sev| sev.as_str().eq_ignore_ascii_case(label))
            .ok_or_else(|| crate::Error::validation(format!("Unknown severity level: {}", s)))
    }
}
