//! Built-in outreach email templates
//!
//! Read-only reference data used to pre-fill a campaign's subject and
//! content. Placeholders are resolved per recipient at dispatch time.

use serde::Serialize;

use crate::template::extract_variables;

/// A static email template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmailTemplate {
    pub id: &'static str,
    pub category: &'static str,
    pub name: &'static str,
    pub subject: &'static str,
    pub content: &'static str,
}

impl EmailTemplate {
    /// Variable names referenced by subject and content, first-seen order
    pub fn variables(&self) -> Vec<String> {
        extract_variables([self.subject, self.content])
    }
}

const CATALOG: &[EmailTemplate] = &[
    EmailTemplate {
        id: "collaboration-invite",
        category: "outreach",
        name: "Collaboration invite",
        subject: "Collaboration opportunity with {companyName}",
        content: "<p>Hi {influencerName},</p>\
<p>We have been following your content and love what you create. \
{companyName} would like to invite you to collaborate on {campaignName}.</p>\
<p>Let us know if you are interested and we will send over the details.</p>\
<p>Best,<br>{senderName}</p>",
    },
    EmailTemplate {
        id: "product-seeding",
        category: "outreach",
        name: "Product seeding",
        subject: "{influencerName}, can we send you {productName}?",
        content: "<p>Hi {influencerName},</p>\
<p>We think our {productName} would be a great fit for your audience. \
We would love to send you one, no strings attached.</p>\
<p>Just reply with your shipping address.</p>\
<p>Cheers,<br>{senderName} at {companyName}</p>",
    },
    EmailTemplate {
        id: "paid-partnership",
        category: "outreach",
        name: "Paid partnership proposal",
        subject: "Paid partnership proposal from {companyName}",
        content: "<p>Hi {influencerName},</p>\
<p>{companyName} is planning a paid campaign and we would like you on board. \
Our budget for this collaboration is {budget}.</p>\
<p>Deliverables: {deliverables}</p>\
<p>Looking forward to hearing from you,<br>{senderName}</p>",
    },
    EmailTemplate {
        id: "ugc-request",
        category: "ugc",
        name: "UGC content request",
        subject: "UGC request: {productName}",
        content: "<p>Hi {influencerName},</p>\
<p>We are looking for authentic user generated content featuring {productName}. \
We pay {budget} per approved video.</p>\
<p>Interested? Reply and we will share the brief.</p>\
<p>{senderName}, {companyName}</p>",
    },
    EmailTemplate {
        id: "agency-introduction",
        category: "agency",
        name: "Agency introduction",
        subject: "{companyName} x {agencyName}",
        content: "<p>Hi {influencerName},</p>\
<p>I am reaching out on behalf of {companyName}. We would like to work with \
creators represented by {agencyName} on {campaignName}.</p>\
<p>Who is the best person to talk to about rates and availability?</p>\
<p>Thanks,<br>{senderName}</p>",
    },
    EmailTemplate {
        id: "follow-up",
        category: "follow_up",
        name: "Follow-up",
        subject: "Following up: {campaignName}",
        content: "<p>Hi {influencerName},</p>\
<p>Just following up on my previous email about {campaignName}. \
We would still love to work with you.</p>\
<p>Best,<br>{senderName}</p>",
    },
];

/// Every built-in template
pub fn all() -> &'static [EmailTemplate] {
    CATALOG
}

/// Look up a template by id
pub fn find(id: &str) -> Option<&'static EmailTemplate> {
    CATALOG.iter().find(|t| t.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ids_are_unique() {
        let mut ids: Vec<_> = all().iter().map(|t| t.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), all().len());
    }

    #[test]
    fn test_find() {
        assert_eq!(find("follow-up").map(|t| t.category), Some("follow_up"));
        assert!(find("missing").is_none());
    }

    #[test]
    fn test_variables_cover_subject_and_content() {
        let template = find("product-seeding").unwrap();
        assert_eq!(
            template.variables(),
            vec!["influencerName", "productName", "senderName", "companyName"]
        );
    }

    #[test]
    fn test_every_template_personalizes_the_recipient() {
        for template in all() {
            assert!(
                template.variables().iter().any(|v| v == "influencerName"),
                "{} does not greet the recipient",
                template.id
            );
        }
    }
}
