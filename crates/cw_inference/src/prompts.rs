use cw_core::DisruptionType;

pub const CLASSIFY_SYSTEM: &str =
    "You are an assistant that categorizes disruptions based on the context, even if inferred.";
pub const CLASSIFY_MAX_TOKENS: u32 = 10;

pub const SEVERITY_SYSTEM: &str = "You are an assistant that categorizes disruption severity and always provides a primary affected country based on the context, even if inferred.";
pub const SEVERITY_MAX_TOKENS: u32 = 50;

pub const SUMMARY_SYSTEM: &str =
    "You are an assistant that provides brief and informative summaries of articles.";
pub const SUMMARY_MAX_TOKENS: u32 = 100;

/// Answer substituted when the model returns nothing for severity/location.
pub const SEVERITY_DEFAULT_ANSWER: &str = "Severity: Low, Location: No Location Detected";

pub fn classify(text: &str) -> String {
    let categories = DisruptionType::ALL
        .iter()
        .map(|t| format!("'{}'", t.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Based on the following information about an article: \"{text}\"\n\n\
         Classify the disruption described in this article into one of these categories:\n\
         {categories}\n\n\
         Select only one category from the list above that best fits the type of disruption. \
         Do not provide any additional text or explanation, just respond with the single category name."
    )
}

pub fn severity_and_location(text: &str) -> String {
    format!(
        "Given the following information about an article \"{text}\":\n\n\
         Based on this information, please:\n\
         1. Determine the severity level of the disruption mentioned, selecting from: \"Low,\" \"Medium,\" or \"High.\"\n\
            - Consider the overall tone and language used to assess impact level.\n\
         2. Identify the primary country affected by the disruption.\n\
            - If multiple countries are mentioned, select the one that is most frequently referenced.\n\
            - If no clear country is specified, try to infer the location from contextual clues, \
         but never respond with \"Unknown\" as the location.\n\
         Format the response EXACTLY as: \"Severity: <Low/Medium/High>, Location: <Country Name>\". \
         No further explanation needed."
    )
}

pub fn summary(text: &str) -> String {
    format!(
        "Summarize the following article into a concise overview of no more than four sentences. \
         Focus on the main points, events, or conclusions described: \"{text}\""
    )
}
