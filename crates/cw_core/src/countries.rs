use tracing::debug;

/// Returned when no known country name appears in the text.
pub const DEFAULT_COUNTRY: &str = "United States of America";

/// Country names scanned by [`detect_country_fallback`], matched in this order.
pub const COUNTRIES: &[&str] = &[
    "Afghanistan", "Albania", "Algeria", "Andorra", "Angola", "Antigua and Barbuda",
    "Argentina", "Armenia", "Australia", "Austria", "Azerbaijan", "Bahamas", "Bahrain",
    "Bangladesh", "Barbados", "Belarus", "Belgium", "Belize", "Benin", "Bhutan", "Bolivia",
    "Bosnia and Herzegovina", "Botswana", "Brazil", "Brunei", "Bulgaria", "Burkina Faso",
    "Burundi", "Cabo Verde", "Cambodia", "Cameroon", "Canada", "Central African Republic",
    "Chad", "Chile", "China", "Colombia", "Comoros", "Congo (Congo-Brazzaville)",
    "Costa Rica", "Croatia", "Cuba", "Cyprus", "Czechia (Czech Republic)", "Denmark",
    "Djibouti", "Dominica", "Dominican Republic", "Ecuador", "Egypt", "El Salvador",
    "Equatorial Guinea", "Eritrea", "Estonia", "Eswatini (fmr. Swaziland)", "Ethiopia",
    "Fiji", "Finland", "France", "Gabon", "Gambia", "Georgia", "Germany", "Ghana", "Greece",
    "Grenada", "Guatemala", "Guinea", "Guinea-Bissau", "Guyana", "Haiti", "Honduras",
    "Hungary", "Iceland", "India", "Indonesia", "Iran", "Iraq", "Ireland", "Israel", "Italy",
    "Jamaica", "Japan", "Jordan", "Kazakhstan", "Kenya", "Kiribati", "Kuwait", "Kyrgyzstan",
    "Laos", "Latvia", "Lebanon", "Lesotho", "Liberia", "Libya", "Liechtenstein", "Lithuania",
    "Luxembourg", "Madagascar", "Malawi", "Malaysia", "Maldives", "Mali", "Malta",
    "Marshall Islands", "Mauritania", "Mauritius", "Mexico", "Micronesia (Federated States of)",
    "Moldova (Republic of)", "Monaco", "Mongolia", "Montenegro", "Morocco", "Mozambique",
    "Myanmar", "Namibia", "Nauru", "Nepal", "Netherlands", "New Zealand", "Nicaragua",
    "Niger", "Nigeria", "North Korea", "North Macedonia", "Norway", "Oman", "Pakistan",
    "Palau", "Palestine State", "Panama", "Papua New Guinea", "Paraguay", "Peru", "Philippines",
    "Poland", "Portugal", "Qatar", "Romania", "Russian Federation", "Rwanda", "Saint Kitts and Nevis",
    "Saint Lucia", "Saint Vincent and the Grenadines", "Samoa", "San Marino", "Sao Tome and Principe",
    "Saudi Arabia", "Senegal", "Serbia", "Seychelles", "Sierra Leone", "Singapore", "Slovakia",
    "Slovenia", "Solomon Islands", "Somalia", "South Africa", "South Korea", "South Sudan",
    "Spain", "Sri Lanka", "Sudan", "Suriname", "Sweden", "Switzerland", "Syria", "Tajikistan",
    "Tanzania", "Thailand", "Timor-Leste", "Togo", "Tonga", "Trinidad and Tobago", "Tunisia",
    "Turkey", "Turkmenistan", "Tuvalu", "Uganda", "Ukraine", "United Arab Emirates",
    "United Kingdom", "United States of America", "Uruguay", "Uzbekistan", "Vanuatu", "Venezuela",
    "Vietnam", "Yemen", "Zambia", "Zimbabwe",
];

/// First country from [`COUNTRIES`] whose name occurs anywhere in `text`
/// (case-insensitive substring), else [`DEFAULT_COUNTRY`].
///
/// Plain containment, so "Nigeria" in the text reports "Niger".
pub fn detect_country_fallback(text: &str) -> &'static str {
    let lower_text = text.to_lowercase();
    for country in COUNTRIES {
        if lower_text.contains(&country.to_lowercase()) {
            debug!("Detected country: {}", country);
            return country;
        }
    }
    DEFAULT_COUNTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_mentioned_country() {
        let text = "Factory output fell after the disruption in Vietnam and Vietnam again last week";
        assert_eq!(detect_country_fallback(text), "Vietnam");
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(detect_country_fallback("strikes across GERMANY's ports"), "Germany");
    }

    #[test]
    fn test_list_order_wins() {
        // "Chile" precedes "China" in the list
        assert_eq!(detect_country_fallback("China and Chile sign a deal"), "Chile");
        // "Niger" is listed before "Nigeria" and is a substring of it
        assert_eq!(detect_country_fallback("Lagos, Nigeria"), "Niger");
    }

    #[test]
    fn test_default_when_nothing_matches() {
        assert_eq!(detect_country_fallback("No Content Available"), DEFAULT_COUNTRY);
        assert_eq!(detect_country_fallback(""), DEFAULT_COUNTRY);
    }
}
