use crate::prelude::*;
use crate::fields::FIELDS;

use tokio::time::Instant;

/// Turns the current datagram into per-field MQTT messages, emitting only
/// what changed since the last publish.
pub struct DiffPublisher {
    previous: Option<Datagram>,
    next_allowed: Option<Instant>,
    min_period: Option<std::time::Duration>,
}

impl DiffPublisher {
    pub fn new(config: &config::Publisher) -> Self {
        Self {
            previous: None,
            next_allowed: None,
            min_period: config.min_publish_period(),
        }
    }

    pub fn previous(&self) -> Option<&Datagram> {
        self.previous.as_ref()
    }

    /// The first datagram and any status change publish every field and
    /// ignore the rate limit. Otherwise, while rate limited, nothing is emitted before
    /// `next_allowed` and `previous` is left alone so the skipped changes
    /// are still published later.
    pub fn diff(&mut self, current: &Datagram, now: Instant) -> Vec<mqtt::Message> {
        let previous = match &self.previous {
            Some(previous) if previous.status == current.status => Some(previous),
            _ => None,
        };
        let status_changed = previous.is_none();

        if let (Some(_), Some(next)) = (self.min_period, self.next_allowed) {
            if !status_changed && now < next {
                return Vec::new();
            }
        }

        let messages: Vec<mqtt::Message> = FIELDS
            .iter()
            .filter_map(|field| {
                let new = field.value(current);
                if let Some(previous) = previous {
                    if !field.changed(&field.value(previous), &new) {
                        return None;
                    }
                }

                Some(mqtt::Message {
                    topic: field.key.to_string(),
                    retain: field.retain(),
                    payload: field.format(&new),
                })
            })
            .collect();

        self.previous = Some(current.clone());
        if let Some(period) = self.min_period {
            self.next_allowed = Some(now + period);
        }

        messages
    }
}

/// Polls the snapshot cell at a fixed cadence and feeds the diff into the
/// MQTT channel.
pub struct Publisher {
    config: config::Publisher,
    mqtt_enabled: bool,
    snapshot: SnapshotCell,
    status: StatusBoard,
    channels: Channels,
}

impl Publisher {
    pub fn new(
        config: &Config,
        snapshot: SnapshotCell,
        status: StatusBoard,
        channels: Channels,
    ) -> Self {
        Self {
            config: config.publisher().clone(),
            mqtt_enabled: config.mqtt().enabled(),
            snapshot,
            status,
            channels,
        }
    }

    pub async fn start(self) -> Result<()> {
        info!("publisher starting, every {}ms", self.config.interval().as_millis());

        let mut diff = DiffPublisher::new(&self.config);
        // first tick one period in, once the mqtt sender has subscribed
        let period = self.config.interval();
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let current = self.snapshot.get();
            self.status.set_publisher(format!("Data:{}", current.status));

            if let Some(previous) = diff.previous().filter(|p| p.status != current.status) {
                info!("status {} -> {}", previous.status, current.status);
            }

            let messages = diff.diff(&current, Instant::now());
            if !self.mqtt_enabled || messages.is_empty() {
                continue;
            }

            trace!("{} fields changed", messages.len());
            for message in messages {
                if self
                    .channels
                    .to_mqtt
                    .send(mqtt::ChannelData::Message(message))
                    .is_err()
                {
                    warn!("send(to_mqtt) failed - channel closed?");
                }
            }
        }
    }
}
