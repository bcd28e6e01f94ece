use tera::{Context, Tera};
use thiserror::Error;

use crate::domain::company::Company;
use crate::domain::contact::Contact;
use crate::domain::template::EmailTemplate;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template `{name}` failed to render: {source}")]
    Render { name: String, source: tera::Error },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Renders a stored template against one contact. Variables available to
/// authors: `first_name`, `last_name`, `full_name`, `email`, `title`,
/// `company`.
pub fn render_for_contact(
    template: &EmailTemplate,
    contact: &Contact,
    company: Option<&Company>,
) -> Result<RenderedEmail, TemplateError> {
    let mut context = Context::new();
    context.insert("first_name", &contact.first_name);
    context.insert("last_name", &contact.last_name);
    context.insert("full_name", &contact.full_name());
    context.insert("email", &contact.email);
    context.insert("title", contact.title.as_deref().unwrap_or_default());
    context.insert("company", company.map(|company| company.name.as_str()).unwrap_or_default());

    let subject = Tera::one_off(&template.subject, &context, false).map_err(|source| {
        TemplateError::Render { name: template.name.clone(), source }
    })?;
    let html = Tera::one_off(&template.html_body, &context, true).map_err(|source| {
        TemplateError::Render { name: template.name.clone(), source }
    })?;

    Ok(RenderedEmail { subject, html })
}
