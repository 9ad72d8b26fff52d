use async_trait::async_trait;
use tantrata_core::config::NotificationConfig;
use tantrata_core::notify::{NotificationError, Notifier, RecommendationNotice};
use tera::{Context, Tera};
use tracing::info;

const TEMPLATE_NAME: &str = "recommendation_email.txt";

const RECOMMENDATION_TEMPLATE: &str = "\
Hello,

Thank you for buying {{ purchased | join(sep=\", \") }}.
Customers who bought the same items also picked up:
{% for name in recommended %}  - {{ name }}
{% endfor %}
See you again soon!
";

/// Renders the recommendation message and writes it to the log instead of
/// handing it to a mail relay.
pub struct LogNotifier {
    sender: String,
    subject: String,
    templates: Tera,
}

impl LogNotifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, tera::Error> {
        let mut templates = Tera::default();
        templates.add_raw_template(TEMPLATE_NAME, RECOMMENDATION_TEMPLATE)?;
        Ok(Self { sender: config.sender.clone(), subject: config.subject.clone(), templates })
    }

    pub fn render(&self, notice: &RecommendationNotice) -> Result<String, NotificationError> {
        let context = Context::from_serialize(notice)
            .map_err(|error| NotificationError::Template(error.to_string()))?;
        self.templates
            .render(TEMPLATE_NAME, &context)
            .map_err(|error| NotificationError::Template(error.to_string()))
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &RecommendationNotice) -> Result<(), NotificationError> {
        let body = self.render(notice)?;
        info!(
            event_name = "notification.recommendations.rendered",
            sale_id = %notice.sale_id,
            recipient = %notice.recipient,
            sender = %self.sender,
            subject = %self.subject,
            recommended = notice.recommended.len(),
            body = %body,
            "recommendation message ready"
        );
        Ok(())
    }
}
