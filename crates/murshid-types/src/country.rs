//! Country allow-list and the payment-exempt alias set.

/// Countries a lead may submit. The form only offers these; anything else
/// is rejected by the validator.
pub const ALLOWED_COUNTRIES: &[&str] = &[
    "Tunisia",
    "Algeria",
    "Morocco",
    "Libya",
    "Egypt",
    "Mauritania",
    "Saudi Arabia",
    "United Arab Emirates",
    "Qatar",
    "Kuwait",
    "Bahrain",
    "Oman",
    "Jordan",
    "Lebanon",
    "Iraq",
    "Palestine",
    "Syria",
    "Yemen",
    "Sudan",
    "France",
    "Germany",
    "Italy",
    "Spain",
    "Belgium",
    "Netherlands",
    "Switzerland",
    "United Kingdom",
    "Canada",
    "United States",
    "Turkey",
    "Other",
];

/// Aliases for the coach's home country, where individual coaching is
/// handled offline and no payment link is issued. English name, ISO code
/// and native script, all matched case-insensitively after trimming.
pub const EXEMPT_COUNTRY_ALIASES: &[&str] = &["tunisia", "tn", "تونس"];

/// Whether `country` is on the fixed allow-list (case-insensitive, trimmed).
pub fn is_allowed_country(country: &str) -> bool {
    let needle = country.trim();
    ALLOWED_COUNTRIES
        .iter()
        .any(|c| c.eq_ignore_ascii_case(needle) || *c == needle)
}

/// Whether `country` matches the payment-exempt alias set.
pub fn is_exempt_country(country: &str) -> bool {
    let needle = country.trim().to_lowercase();
    EXEMPT_COUNTRY_ALIASES.iter().any(|a| *a == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_is_case_insensitive() {
        assert!(is_allowed_country("tunisia"));
        assert!(is_allowed_country("  France "));
        assert!(is_allowed_country("UNITED KINGDOM"));
        assert!(!is_allowed_country("Atlantis"));
        assert!(!is_allowed_country(""));
    }

    #[test]
    fn exempt_set_matches_all_aliases() {
        assert!(is_exempt_country("Tunisia"));
        assert!(is_exempt_country(" TN "));
        assert!(is_exempt_country("تونس"));
        assert!(!is_exempt_country("France"));
        assert!(!is_exempt_country(""));
    }
}
