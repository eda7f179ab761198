//! 通知模板，支持 `{{variable}}` 占位符

use std::collections::HashMap;

use regex::Regex;
use tracing::warn;

use super::types::NotificationKind;

pub struct TemplateEngine {
    titles: HashMap<NotificationKind, String>,
    bodies: HashMap<NotificationKind, String>,
    variable_regex: Regex,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self {
            titles: HashMap::new(),
            bodies: HashMap::new(),
            variable_regex: Regex::new(r"\{\{(\w+)\}\}").unwrap(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut engine = Self::new();

        engine.register(
            NotificationKind::RequestReceived,
            "Purchase request received",
            "We received your request for \"{{item_title}}\" ({{amount}}). \
             Pay using one of the listed methods and upload your payment screenshot. \
             Request ID: {{request_id}}",
        );
        engine.register(
            NotificationKind::PaymentSubmitted,
            "New payment to review",
            "{{customer}} submitted payment for \"{{item_title}}\" ({{amount}}) via {{payment_method}}. \
             Reference: {{reference}}. Receipt: {{receipt_url}}",
        );
        engine.register(
            NotificationKind::PurchaseApproved,
            "Purchase approved",
            "Your payment for \"{{item_title}}\" was approved. The book is now in your library.",
        );
        engine.register(
            NotificationKind::PurchaseRejected,
            "Purchase rejected",
            "Your request for \"{{item_title}}\" was rejected: {{reason}}",
        );
        engine.register(
            NotificationKind::PurchaseCompleted,
            "Purchase completed",
            "Your purchase of \"{{item_title}}\" is complete. Enjoy reading!",
        );

        engine
    }

    pub fn register(
        &mut self,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) {
        self.titles.insert(kind, title.into());
        self.bodies.insert(kind, body.into());
    }

    /// 替换模板变量；缺失的变量替换为空串并记录告警
    pub fn render(&self, template: &str, variables: &HashMap<String, String>) -> String {
        self.variable_regex
            .replace_all(template, |caps: &regex::Captures| {
                let name = &caps[1];
                match variables.get(name) {
                    Some(value) => value.clone(),
                    None => {
                        warn!(variable = name, "模板变量缺失");
                        String::new()
                    }
                }
            })
            .into_owned()
    }

    /// 渲染指定场景的标题和正文
    pub fn render_kind(
        &self,
        kind: NotificationKind,
        variables: &HashMap<String, String>,
    ) -> Option<(String, String)> {
        let title = self.titles.get(&kind)?;
        let body = self.bodies.get(&kind)?;
        Some((self.render(title, variables), self.render(body, variables)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_replaces_variables() {
        let engine = TemplateEngine::new();
        let out = engine.render(
            "Hi {{name}}, {{name}} owes {{amount}}",
            &vars(&[("name", "Sara"), ("amount", "ETB 10.00")]),
        );
        assert_eq!(out, "Hi Sara, Sara owes ETB 10.00");
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let engine = TemplateEngine::new();
        assert_eq!(engine.render("[{{missing}}]", &HashMap::new()), "[]");
    }

    #[test]
    fn test_default_templates_cover_all_kinds() {
        let engine = TemplateEngine::with_defaults();
        for kind in [
            NotificationKind::RequestReceived,
            NotificationKind::PaymentSubmitted,
            NotificationKind::PurchaseApproved,
            NotificationKind::PurchaseRejected,
            NotificationKind::PurchaseCompleted,
        ] {
            assert!(engine.render_kind(kind, &HashMap::new()).is_some());
        }

        let (title, body) = engine
            .render_kind(
                NotificationKind::PurchaseRejected,
                &vars(&[("item_title", "Dune"), ("reason", "amount mismatch")]),
            )
            .unwrap();
        assert_eq!(title, "Purchase rejected");
        assert_eq!(body, "Your request for \"Dune\" was rejected: amount mismatch");
    }
}
