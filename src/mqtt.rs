use crate::prelude::*;
use crate::home_assistant;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PUBLISH_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(10);

/// One value to publish. Messages on the channel carry topics relative to
/// the namespace.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub retain: bool,
    pub payload: String,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ChannelData {
    Message(Message),
    Shutdown,
}

#[derive(Clone)]
pub struct Mqtt {
    config: config::Mqtt,
    channels: Channels,
    status: StatusBoard,
    shutdown: Arc<AtomicBool>,
}

impl Mqtt {
    pub fn new(config: config::Mqtt, channels: Channels, status: StatusBoard) -> Self {
        Self {
            config,
            channels,
            status,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        let c = &self.config;

        if !c.enabled() {
            info!("mqtt disabled, skipping");
            return Ok(());
        }

        let mut options = MqttOptions::new(c.client_id(), c.host(), c.port());

        let will = LastWill {
            topic: self.lwt_topic(),
            message: bytes::Bytes::from("offline"),
            qos: QoS::AtLeastOnce,
            retain: true,
        };
        options.set_last_will(will);

        options.set_keep_alive(Duration::from_secs(60));
        if let (Some(u), Some(p)) = (c.username(), c.password()) {
            options.set_credentials(u, p);
        }

        info!("initializing mqtt at {}:{}", c.host(), c.port());

        let (client, eventloop) = AsyncClient::new(options, 10);

        futures::try_join!(
            self.setup(client.clone()),
            self.receiver(eventloop),
            self.sender(client)
        )?;

        Ok(())
    }

    pub fn stop(&self) {
        info!("Stopping MQTT client...");
        let _ = self.channels.to_mqtt.send(ChannelData::Shutdown);
    }

    async fn setup(&self, client: AsyncClient) -> Result<()> {
        client
            .publish(self.lwt_topic(), QoS::AtLeastOnce, true, "online")
            .await?;

        if self.config.homeassistant().enabled() {
            let ha = home_assistant::Config::new(&self.config);
            for msg in ha.all()?.into_iter() {
                let _ = client
                    .publish(&msg.topic, QoS::AtLeastOnce, msg.retain, msg.payload)
                    .await;
            }
        }

        Ok(())
    }

    // drives the connection; nothing is subscribed so incoming publishes are
    // only logged
    async fn receiver(&self, mut eventloop: EventLoop) -> Result<()> {
        while !self.shutdown.load(Ordering::Relaxed) {
            if let Ok(event) = tokio::time::timeout(Duration::from_secs(1), eventloop.poll()).await {
                match event {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        info!("mqtt connected");
                    }
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        debug!("RX: {}", publish.topic);
                    }
                    Err(e) if !self.shutdown.load(Ordering::Relaxed) => {
                        error!("{}", e);
                        info!("reconnecting in 5s");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    _ => {} // keepalives etc
                }
            }
        }

        info!("MQTT receiver loop exiting");
        Ok(())
    }

    // publisher -> mqtt
    async fn sender(&self, client: AsyncClient) -> Result<()> {
        use ChannelData::*;

        let mut receiver = self.channels.to_mqtt.subscribe();

        loop {
            let message = match receiver.recv().await {
                Ok(Shutdown) => {
                    info!("MQTT sender received shutdown signal");
                    self.shutdown.store(true, Ordering::Relaxed);
                    let _ = client
                        .publish(self.lwt_topic(), QoS::AtLeastOnce, true, "offline")
                        .await;
                    let _ = client.disconnect().await;
                    break;
                }
                Ok(Message(message)) => message,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("mqtt sender lagged, {} messages dropped", n);
                    continue;
                }
                Err(e) => bail!("mqtt sender: {}", e),
            };

            let topic = format!("{}/{}", self.config.namespace(), message.topic);
            debug!("publishing: {} = {}", topic, message.payload);
            self.publish(&client, &topic, &message).await;
        }

        info!("MQTT sender loop exiting");
        Ok(())
    }

    async fn publish(&self, client: &AsyncClient, topic: &str, message: &Message) {
        let payload = message.payload.as_bytes().to_vec();

        for attempt in 1..=PUBLISH_ATTEMPTS {
            match client
                .publish(topic, QoS::AtLeastOnce, message.retain, payload.as_slice())
                .await
            {
                Ok(_) => {
                    self.status.update_stats(|s| s.mqtt_messages_sent += 1);
                    return;
                }
                Err(err) => {
                    self.status.update_stats(|s| s.mqtt_errors += 1);
                    if attempt == PUBLISH_ATTEMPTS {
                        error!("MQTT publish of {} failed, giving up: {:?}", topic, err);
                        return;
                    }
                    error!(
                        "MQTT publish failed: {:?} - retrying in {}s (attempt {}/{})",
                        err,
                        RETRY_DELAY.as_secs(),
                        attempt,
                        PUBLISH_ATTEMPTS
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    fn lwt_topic(&self) -> String {
        format!("{}/LWT", self.config.namespace())
    }
}
