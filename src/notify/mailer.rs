//! SMTP delivery via lettre

use super::{Mail, Notifier};
use crate::config::WatchDog;
use crate::error::Result;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

/// Port using implicit TLS; every other port upgrades with STARTTLS
const SMTPS_PORT: u16 = 465;

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    pub fn new(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        from: &str,
        to: &str,
    ) -> Result<Self> {
        let from: Mailbox = from.parse()?;
        let to: Mailbox = to.parse()?;
        let creds = Credentials::new(user.to_string(), password.to_string());

        let builder = if port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        };

        Ok(Self {
            transport: builder.port(port).credentials(creds).build(),
            from,
            to,
        })
    }

    pub fn from_config(config: &WatchDog) -> Result<Self> {
        Self::new(
            &config.smtp_host,
            config.smtp_port,
            &config.smtp_user,
            &config.smtp_password,
            &config.smtp_from,
            &config.smtp_to,
        )
    }

    fn build(&self, mail: &Mail) -> Result<Message> {
        Ok(Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(mail.html_body.clone())?)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, mail: &Mail) -> Result<()> {
        let message = self.build(mail)?;
        self.transport.send(message).await?;
        info!("Sent mail: {}", mail.subject);
        Ok(())
    }
}
