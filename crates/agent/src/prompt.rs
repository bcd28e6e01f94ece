use crate::context::CrmSnapshot;

const APPROVED_ACTIONS: &str = "create_campaign, send_email, create_segment, schedule_campaign";

/// Builds the system prompt: the assistant's role, the live CRM snapshot,
/// and the JSON reply contract the parser expects on the way back.
pub fn build_system_prompt(snapshot: &CrmSnapshot) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(
        "You are a marketing assistant for a CRM. You help the user manage email \
         campaigns, contacts, and audience segments. You can propose actions, but \
         every action requires explicit human approval before it runs.\n\n",
    );

    prompt.push_str("Current CRM data:\n");
    prompt.push_str(&format!("- Contacts: {}\n", snapshot.contact_count));
    prompt.push_str(&format!("- Companies: {}\n", snapshot.company_count));
    prompt.push_str(&format!("- Campaigns: {}\n", snapshot.campaign_count));
    prompt.push_str(&format!(
        "- Activities in the last 7 days: {}\n",
        snapshot.recent_activity_count
    ));

    if !snapshot.industries.is_empty() {
        prompt.push_str(&format!("- Industries: {}\n", snapshot.industries.join(", ")));
    }

    if !snapshot.contact_sample.is_empty() {
        prompt.push_str("\nSample contacts:\n");
        for member in &snapshot.contact_sample {
            let title = member.contact.title.as_deref().unwrap_or("no title");
            let company = member.company_name.as_deref().unwrap_or("no company");
            prompt.push_str(&format!(
                "- {} ({title}, {company})\n",
                member.contact.full_name()
            ));
        }
    }

    prompt.push_str(&format!(
        "\nApproved actions: {APPROVED_ACTIONS}. Never propose anything else.\n\n\
         End every reply with a single JSON object on its own line:\n\
         {{\"message\": \"<your reply text>\", \"requiresApproval\": <bool>, \
         \"approvalData\": {{\"action\": \"<action name>\", \"details\": {{...}}}}, \
         \"suggestedActions\": [\"...\"], \"completed\": <bool>}}\n\
         Omit approvalData when no approval is needed. The message field must \
         contain only prose, never JSON.\n"
    ));

    prompt
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use relay_core::domain::contact::{Contact, ContactId};
    use relay_db::repositories::SegmentMember;

    use super::build_system_prompt;
    use crate::context::CrmSnapshot;

    #[test]
    fn prompt_includes_counts_and_contract() {
        let snapshot = CrmSnapshot {
            contact_count: 42,
            company_count: 7,
            campaign_count: 3,
            recent_activity_count: 5,
            contact_sample: Vec::new(),
            industries: vec!["Software".to_string(), "Retail".to_string()],
        };

        let prompt = build_system_prompt(&snapshot);

        assert!(prompt.contains("Contacts: 42"));
        assert!(prompt.contains("Companies: 7"));
        assert!(prompt.contains("Software, Retail"));
        assert!(prompt.contains("requiresApproval"));
        assert!(prompt.contains("create_campaign"));
    }

    #[test]
    fn prompt_lists_sample_contacts_with_company() {
        let now = Utc::now();
        let snapshot = CrmSnapshot {
            contact_count: 1,
            contact_sample: vec![SegmentMember {
                contact: Contact {
                    id: ContactId("ct-1".to_string()),
                    user_id: "user-1".to_string(),
                    company_id: None,
                    first_name: "Dana".to_string(),
                    last_name: "Reyes".to_string(),
                    email: "dana@example.com".to_string(),
                    title: Some("VP Engineering".to_string()),
                    location: None,
                    created_at: now,
                    updated_at: now,
                },
                company_name: Some("Acme".to_string()),
            }],
            ..CrmSnapshot::default()
        };

        let prompt = build_system_prompt(&snapshot);

        assert!(prompt.contains("Dana Reyes (VP Engineering, Acme)"));
    }
}
