//! Email template rendering.
//!
//! Plain named-placeholder substitution only — template content is data, and
//! nothing in it is ever evaluated.

use houndhub_db::StepAttachments;

/// Substitute `{key}` placeholders with literal values.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// A call-to-action link appended below the step body.
#[derive(Debug, Clone)]
pub struct CtaLink {
    pub label: String,
    pub url: String,
}

/// Build the portal links for a step's configured attachments.
/// Each link type is independently optional.
pub fn attachment_links(portal_base: &str, attachments: &StepAttachments) -> Vec<CtaLink> {
    let base = portal_base.trim_end_matches('/');
    let mut links = Vec::new();

    if let Some(id) = attachments.contract_id {
        links.push(CtaLink {
            label: "Review and sign your contract".into(),
            url: format!("{base}/contracts/{id}/sign"),
        });
    }
    if let Some(id) = attachments.form_id {
        links.push(CtaLink {
            label: "Complete your form".into(),
            url: format!("{base}/forms/{id}/fill"),
        });
    }
    if let Some(id) = attachments.quote_id {
        links.push(CtaLink {
            label: "View your quote".into(),
            url: format!("{base}/quotes/{id}"),
        });
    }
    if let Some(id) = attachments.invoice_id {
        links.push(CtaLink {
            label: "View and pay your invoice".into(),
            url: format!("{base}/invoices/{id}/pay"),
        });
    }
    if attachments.include_booking_link {
        let url = match attachments.booking_type_id {
            Some(id) => format!("{base}/book/{id}"),
            None => format!("{base}/book"),
        };
        links.push(CtaLink {
            label: "Book your next session".into(),
            url,
        });
    }

    links
}

/// Append links to an HTML body as anchor paragraphs.
pub fn append_links_html(body: &str, links: &[CtaLink]) -> String {
    if links.is_empty() {
        return body.to_string();
    }
    let mut out = String::from(body);
    for link in links {
        out.push_str(&format!(
            "\n<p><a href=\"{}\">{}</a></p>",
            link.url, link.label
        ));
    }
    out
}

/// Append links to a plain-text body, one per line.
pub fn append_links_text(body: &str, links: &[CtaLink]) -> String {
    if links.is_empty() {
        return body.to_string();
    }
    let mut out = String::from(body);
    out.push('\n');
    for link in links {
        out.push_str(&format!("\n{}: {}", link.label, link.url));
    }
    out
}
