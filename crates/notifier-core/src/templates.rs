//! Built-in template renderer using `{{variable}}` syntax
//!
//! Lookup order for a (method, key) pair:
//!
//! 1. template registered for the method and key
//! 2. template registered for the method under `default`
//! 3. a generated plain listing of the payload
//!
//! Variables: every payload field by its dotted path, every payload
//! attribute as `@name`, `element`, `kind`, and each extra value.

use std::collections::{BTreeMap, HashMap};

use crate::config::TemplateConfig;
use crate::model::{NotificationPayload, QName};
use crate::traits::{DeliveryMethod, TemplateRenderer};

/// Key under which a method's fallback template is registered
pub const DEFAULT_TEMPLATE_KEY: &str = "default";

#[derive(Debug, Default)]
pub struct SimpleTemplateRenderer {
    templates: HashMap<(DeliveryMethod, String), String>,
}

impl SimpleTemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &TemplateConfig) -> Self {
        let mut renderer = Self::new();
        for template in &config.templates {
            renderer.register(template.method, template.key.clone(), template.body.clone());
        }
        renderer
    }

    pub fn register(&mut self, method: DeliveryMethod, key: impl Into<String>, body: impl Into<String>) {
        self.templates.insert((method, key.into()), body.into());
    }

    fn lookup(&self, method: DeliveryMethod, key: &str) -> Option<&str> {
        self.templates
            .get(&(method, key.to_string()))
            .or_else(|| {
                self.templates
                    .get(&(method, DEFAULT_TEMPLATE_KEY.to_string()))
            })
            .map(String::as_str)
    }

    fn variables(
        element: &QName,
        payload: &NotificationPayload,
        extra: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert("element".to_string(), element.local_name.clone());
        vars.insert("kind".to_string(), format!("{:?}", payload.kind()));
        for (key, value) in &payload.fields {
            vars.insert(key.clone(), value.clone());
        }
        for (key, value) in &payload.attributes {
            vars.insert(format!("@{}", key), value.clone());
        }
        for (key, value) in extra {
            vars.insert(key.clone(), value.clone());
        }
        vars
    }

    /// Substitute `{{name}}` placeholders in one pass over the template
    ///
    /// Substituted values are never rescanned. Unknown placeholders are left
    /// as written.
    fn render_string(template: &str, vars: &BTreeMap<String, String>) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}").and_then(|end| vars.get(&after[..end]).map(|v| (end, v))) {
                Some((end, value)) => {
                    result.push_str(value);
                    rest = &after[end + 2..];
                }
                None => {
                    result.push_str("{{");
                    rest = after;
                }
            }
        }
        result.push_str(rest);
        result
    }

    fn listing(element: &QName, payload: &NotificationPayload) -> String {
        let mut body = format!("{}\n", element.local_name);
        for (key, value) in &payload.fields {
            body.push_str(&format!("{}: {}\n", key, value));
        }
        body
    }
}

impl TemplateRenderer for SimpleTemplateRenderer {
    fn render(
        &self,
        element: &QName,
        template_key: &str,
        method: DeliveryMethod,
        payload: &NotificationPayload,
        extra: &BTreeMap<String, String>,
    ) -> Result<String, crate::Error> {
        match self.lookup(method, template_key) {
            Some(template) => Ok(Self::render_string(
                template,
                &Self::variables(element, payload, extra),
            )),
            None => {
                tracing::debug!(
                    "No {} template for {}, using field listing",
                    method,
                    template_key
                );
                Ok(Self::listing(element, payload))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TemplateDefinition;

    fn invite() -> NotificationPayload {
        NotificationPayload::new(QName::new("http://calendarserver.org/ns/", "invite-notification"))
            .with_field("summary", "share")
            .with_field("organizer.href", "mailto:mtwain@mysite.edu")
            .with_attribute("shared-type", "calendar")
    }

    #[test]
    fn test_render_registered_template() {
        let mut renderer = SimpleTemplateRenderer::new();
        renderer.register(
            DeliveryMethod::Email,
            "CSS-invite-notification",
            "{{organizer.href}} shared {{summary}} ({{@shared-type}}) with {{user}}",
        );

        let payload = invite();
        let mut extra = BTreeMap::new();
        extra.insert("user".to_string(), "douglm".to_string());

        let body = renderer
            .render(
                &payload.name,
                "CSS-invite-notification",
                DeliveryMethod::Email,
                &payload,
                &extra,
            )
            .unwrap();
        assert_eq!(body, "mailto:mtwain@mysite.edu shared share (calendar) with douglm");
    }

    #[test]
    fn test_substituted_values_are_not_expanded() {
        let mut renderer = SimpleTemplateRenderer::new();
        renderer.register(DeliveryMethod::Sms, "note", "{{summary}} from {{organizer.href}} {{missing}}");

        let payload = invite().with_field("summary", "{{organizer.href}}");
        let body = renderer
            .render(&payload.name, "note", DeliveryMethod::Sms, &payload, &BTreeMap::new())
            .unwrap();
        assert_eq!(body, "{{organizer.href}} from mailto:mtwain@mysite.edu {{missing}}");
    }

    #[test]
    fn test_method_default_template() {
        let renderer = SimpleTemplateRenderer::from_config(&TemplateConfig {
            templates: vec![TemplateDefinition {
                method: DeliveryMethod::Sms,
                key: DEFAULT_TEMPLATE_KEY.to_string(),
                body: "New {{element}}: {{summary}}".to_string(),
            }],
        });

        let payload = invite();
        let body = renderer
            .render(&payload.name, "CSS-invite-notification", DeliveryMethod::Sms, &payload, &BTreeMap::new())
            .unwrap();
        assert_eq!(body, "New invite-notification: share");
    }

    #[test]
    fn test_listing_when_no_template() {
        let renderer = SimpleTemplateRenderer::new();
        let payload = invite();

        let body = renderer
            .render(&payload.name, "CSS-invite-notification", DeliveryMethod::Email, &payload, &BTreeMap::new())
            .unwrap();
        assert!(body.starts_with("invite-notification\n"));
        assert!(body.contains("summary: share"));
    }
}
