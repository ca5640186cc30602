use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_sesv2::{
    Client,
    error::{DisplayErrorContext, ProvideErrorMetadata},
    types::{Body, Content, Destination, EmailContent, Message},
};

use super::AlertFormatter;
use crate::{
    delivery::{DeliveryError, OutputAdapter},
    models::{Alert, OutputConfig},
    template::EMAIL_TEMPLATE,
};

const CHARSET: &str = "UTF-8";

/// SES error codes meaning this message will never be accepted as is.
const PERMANENT_ERROR_CODES: [&str; 3] =
    ["MessageRejected", "MailFromDomainNotVerifiedException", "BadRequestException"];

fn is_permanent(code: Option<&str>) -> bool {
    code.is_some_and(|code| PERMANENT_ERROR_CODES.contains(&code))
}

fn content(data: String) -> Result<Content, DeliveryError> {
    Content::builder()
        .data(data)
        .charset(CHARSET)
        .build()
        .map_err(|e| DeliveryError::permanent(e.to_string()))
}

/// Sends HTML notification emails through SES.
pub struct EmailAdapter {
    client: Client,
    formatter: Arc<AlertFormatter>,
    mail_from: String,
    configuration_set: Option<String>,
}

impl EmailAdapter {
    pub fn new(
        client: Client,
        formatter: Arc<AlertFormatter>,
        mail_from: impl Into<String>,
        configuration_set: Option<String>,
    ) -> Self {
        Self { client, formatter, mail_from: mail_from.into(), configuration_set }
    }

    fn email_content(&self, alert: &Alert) -> Result<EmailContent, DeliveryError> {
        let html = self.formatter.render(EMAIL_TEMPLATE, alert)?;
        let message = Message::builder()
            .subject(content(alert.title())?)
            .body(Body::builder().html(content(html)?).build())
            .build();
        Ok(EmailContent::builder().simple(message).build())
    }
}

#[async_trait]
impl OutputAdapter for EmailAdapter {
    async fn deliver(&self, alert: &Alert, config: &OutputConfig) -> Result<(), DeliveryError> {
        let OutputConfig::Email(email) = config else {
            return Err(DeliveryError::permanent("email adapter given a non-email config"));
        };
        let destination = Destination::builder().to_addresses(&email.destination_address).build();

        self.client
            .send_email()
            .from_email_address(&self.mail_from)
            .destination(destination)
            .content(self.email_content(alert)?)
            .set_configuration_set_name(self.configuration_set.clone())
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                if is_permanent(e.code()) {
                    DeliveryError::permanent(message)
                } else {
                    DeliveryError::transient(message)
                }
            })?;
        Ok(())
    }
}
