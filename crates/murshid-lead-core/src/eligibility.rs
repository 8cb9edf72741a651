//! Payment eligibility
//!
//! Pure decision logic: individual coaching is paid up front unless the
//! lead is in the coach's home country, where follow-up happens offline.

use murshid_types::country::is_exempt_country;
use murshid_types::LeadSubmission;

/// Category whose leads are routed through payment.
pub const PAID_CATEGORY: &str = "individuals";

/// Whether this lead must be routed through payment.
///
/// True iff the category is [`PAID_CATEGORY`] and the country is not in
/// the exempt alias set. An empty country fails safe toward charging.
pub fn requires_payment(category: &str, country: &str) -> bool {
    if category.trim() != PAID_CATEGORY {
        return false;
    }
    let country = country.trim();
    if country.is_empty() {
        return true;
    }
    !is_exempt_country(country)
}

/// Whether a payment link should actually be attempted for this lead:
/// payment must be required and a package identifier present. The caller
/// logs the missing-package case as a warning, not an error.
pub fn wants_payment_link(lead: &LeadSubmission) -> bool {
    requires_payment(&lead.category, &lead.country)
        && lead.package.as_deref().is_some_and(|p| !p.trim().is_empty())
}
