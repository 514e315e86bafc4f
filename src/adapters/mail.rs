//! Send email-action notifications.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::uri::{
    AMQPAuthority, AMQPQueryString, AMQPScheme, AMQPUri, AMQPUserInfo,
};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use serde::Serialize;
use url::Url;

use crate::config::Mail;
use crate::domain::EmailAddress;
use crate::error::{AuthError, Result, ToInternal};
use crate::ports::{NotificationKind, Notifier};

const DEFAULT_AMPQ_HOST: &str = "localhost";
const DEFAULT_AMPQ_PORT: u16 = 5672;
const DEFAULT_AMPQ_VHOST: &str = "/";

const CONTENT_ENCODING: &str = "utf8";
const CONTENT_TYPE: &str = "application/cloudevents+json";
const DATA_CONTENT_TYPE: &str = "application/json";
const CLOUDEVENT_VERSION: &str = "1.0";
const ID_LENGTH: usize = 12;

#[derive(Debug, Serialize)]
struct Cloudevent<'a> {
    specversion: &'static str,
    r#type: &'static str,
    source: &'static str,
    id: String,
    time: String,
    datacontenttype: &'static str,
    data: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    to: &'a str,
    template: NotificationKind,
    link: String,
}

/// Publishes notifications as CloudEvents on a RabbitMQ queue.
#[derive(Clone)]
pub struct RabbitMqNotifier {
    queue: String,
    conn: Arc<Connection>,
}

impl RabbitMqNotifier {
    /// Create a new [`RabbitMqNotifier`].
    pub async fn new(config: &Mail) -> Result<Self> {
        let addr = Url::parse(&config.address).catch()?;
        let uri = AMQPUri {
            scheme: AMQPScheme::from_str(addr.scheme()).map_err(|_| {
                AuthError::Configuration(format!(
                    "unsupported AMQP scheme `{}`",
                    addr.scheme()
                ))
            })?,
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: config.username.clone(),
                    password: config.password.clone(),
                },
                host: addr.host_str().unwrap_or(DEFAULT_AMPQ_HOST).into(),
                port: addr.port().unwrap_or(DEFAULT_AMPQ_PORT),
            },
            vhost: config
                .vhost
                .clone()
                .unwrap_or(DEFAULT_AMPQ_VHOST.to_string()),
            query: AMQPQueryString {
                channel_max: config.pool,
                ..Default::default()
            },
        };

        let conn_config = ConnectionProperties::default()
            .with_connection_name("sessionkeep_notifier".into());
        let conn = Connection::connect_uri(uri, conn_config).await.catch()?;

        tracing::info!(%addr, queue = %config.queue, "rabbitmq connected");

        Ok(Self {
            queue: config.queue.clone(),
            conn: Arc::new(conn),
        })
    }

    async fn create_channel(&self) -> Result<Channel> {
        let channel = self.conn.create_channel().await.catch()?;
        channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .catch()?;
        Ok(channel)
    }

    fn create_event(data: Content) -> Cloudevent {
        let id = Alphanumeric.sample_string(&mut OsRng, ID_LENGTH);
        Cloudevent {
            specversion: CLOUDEVENT_VERSION,
            r#type: "com.sessionkeep.email",
            source: "com.sessionkeep.auth",
            id,
            time: Utc::now().to_rfc3339(),
            datacontenttype: DATA_CONTENT_TYPE,
            data,
        }
    }
}

#[async_trait]
impl Notifier for RabbitMqNotifier {
    async fn send(
        &self,
        kind: NotificationKind,
        email: &EmailAddress,
        token: &str,
        base_url: &str,
    ) -> Result<()> {
        let channel = self.create_channel().await?;

        let payload = Self::create_event(Content {
            to: email.as_str(),
            template: kind,
            link: kind.link(base_url, token),
        });
        let payload = serde_json::to_vec(&payload).catch()?;

        channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_content_encoding(CONTENT_ENCODING.into())
                    .with_content_type(CONTENT_TYPE.into()),
            )
            .await
            .catch()?;

        tracing::trace!(?kind, "event sent");

        Ok(())
    }
}

/// Notifier that only writes to the log. Used when no broker is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        kind: NotificationKind,
        email: &EmailAddress,
        _token: &str,
        base_url: &str,
    ) -> Result<()> {
        tracing::info!(?kind, %email, %base_url, "notification not delivered, no broker configured");
        Ok(())
    }
}
