use serde::{Deserialize, Serialize};

use crate::domain::company::Company;
use crate::domain::contact::Contact;

/// Contact filter behind `create_segment`. Segments are previews, never
/// persisted: industry matches exactly, title and location match on
/// case-insensitive substring.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentFilter {
    pub industry: Option<String>,
    pub title_contains: Option<String>,
    pub location_contains: Option<String>,
}

impl SegmentFilter {
    pub fn is_empty(&self) -> bool {
        self.industry.is_none() && self.title_contains.is_none() && self.location_contains.is_none()
    }

    pub fn matches(&self, contact: &Contact, company: Option<&Company>) -> bool {
        if let Some(industry) = &self.industry {
            let matched = company
                .and_then(|company| company.industry.as_deref())
                .map(|value| value == industry)
                .unwrap_or(false);
            if !matched {
                return false;
            }
        }

        if let Some(title) = &self.title_contains {
            let matched = contact
                .title
                .as_deref()
                .map(|value| value.to_lowercase().contains(&title.to_lowercase()))
                .unwrap_or(false);
            if !matched {
                return false;
            }
        }

        if let Some(location) = &self.location_contains {
            let matched = contact
                .location
                .as_deref()
                .map(|value| value.to_lowercase().contains(&location.to_lowercase()))
                .unwrap_or(false);
            if !matched {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::company::{Company, CompanyId};
    use crate::domain::contact::{Contact, ContactId};

    use super::SegmentFilter;

    fn contact(title: Option<&str>, location: Option<&str>) -> Contact {
        Contact {
            id: ContactId("ct-1".to_string()),
            user_id: "user-1".to_string(),
            company_id: Some(CompanyId("co-1".to_string())),
            first_name: "Dana".to_string(),
            last_name: "Reyes".to_string(),
            email: "dana@example.com".to_string(),
            title: title.map(str::to_string),
            location: location.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn company(industry: Option<&str>) -> Company {
        Company {
            id: CompanyId("co-1".to_string()),
            user_id: "user-1".to_string(),
            name: "Northwind".to_string(),
            industry: industry.map(str::to_string),
            website: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_filter_matches_everyone() {
        let filter = SegmentFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&contact(None, None), None));
    }

    #[test]
    fn industry_requires_exact_company_match() {
        let filter =
            SegmentFilter { industry: Some("Software".to_string()), ..SegmentFilter::default() };

        assert!(filter.matches(&contact(None, None), Some(&company(Some("Software")))));
        assert!(!filter.matches(&contact(None, None), Some(&company(Some("software")))));
        assert!(!filter.matches(&contact(None, None), None));
    }

    #[test]
    fn title_and_location_match_case_insensitive_substrings() {
        let filter = SegmentFilter {
            title_contains: Some("engineer".to_string()),
            location_contains: Some("berlin".to_string()),
            ..SegmentFilter::default()
        };

        assert!(filter.matches(&contact(Some("Senior Engineer"), Some("Berlin, DE")), None));
        assert!(!filter.matches(&contact(Some("Designer"), Some("Berlin, DE")), None));
        assert!(!filter.matches(&contact(Some("Senior Engineer"), None), None));
    }
}
