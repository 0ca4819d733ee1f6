use crate::prelude::*;
use crate::fields::{Field, FIELDS};

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Device {
    identifiers: [String; 1],
    manufacturer: &'static str,
    model: &'static str,
    name: String,
    sw_version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Entity<'a> {
    name: &'a str,
    unique_id: String,
    state_topic: String,
    availability_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_class: Option<&'a str>,
    device: &'a Device,
}

/// Home Assistant discovery descriptors, one sensor per published field.
pub struct Config {
    mqtt: config::Mqtt,
    device: Device,
}

impl Config {
    pub fn new(mqtt: &config::Mqtt) -> Self {
        let node_id = mqtt.homeassistant().node_id();

        Self {
            mqtt: mqtt.clone(),
            device: Device {
                identifiers: [node_id.to_string()],
                manufacturer: "Growatt",
                model: "Inverter",
                name: format!("Growatt {}", node_id),
                sw_version: env!("CARGO_PKG_VERSION"),
            },
        }
    }

    /// Discovery topics live outside the namespace, so these messages carry
    /// absolute topics and bypass the sender's prefixing.
    pub fn all(&self) -> Result<Vec<mqtt::Message>> {
        FIELDS.iter().map(|field| self.sensor(field)).collect()
    }

    pub fn sensor(&self, field: &Field) -> Result<mqtt::Message> {
        let ha = self.mqtt.homeassistant();
        let ns = self.mqtt.namespace();

        let entity = Entity {
            name: field.name,
            unique_id: format!("{}_{}", ha.node_id(), field.key),
            state_topic: format!("{}/{}", ns, field.key),
            availability_topic: format!("{}/LWT", ns),
            unit_of_measurement: field.unit,
            device_class: field.device_class,
            state_class: field.state_class,
            device: &self.device,
        };

        Ok(mqtt::Message {
            topic: format!("{}/sensor/{}/{}/config", ha.prefix(), ha.node_id(), field.key),
            retain: true,
            payload: serde_json::to_string(&entity)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mqtt_config() -> config::Mqtt {
        let yaml = "mqtt:\n  homeassistant:\n    node_id: roof\n";
        crate::config::Config::from_yaml(yaml).unwrap().mqtt().clone()
    }

    #[test]
    fn one_retained_config_per_field() {
        let messages = Config::new(&mqtt_config()).all().unwrap();

        assert_eq!(messages.len(), FIELDS.len());
        assert!(messages.iter().all(|m| m.retain));
        assert_eq!(messages[0].topic, "homeassistant/sensor/roof/pv1_voltage/config");
    }

    #[test]
    fn payload_points_at_state_topic() {
        let field = FIELDS.iter().find(|f| f.key == "power").unwrap();
        let message = Config::new(&mqtt_config()).sensor(field).unwrap();
        let json: serde_json::Value = serde_json::from_str(&message.payload).unwrap();

        assert_eq!(json["state_topic"], "solar/growatt/power");
        assert_eq!(json["availability_topic"], "solar/growatt/LWT");
        assert_eq!(json["unique_id"], "roof_power");
        assert_eq!(json["unit_of_measurement"], "W");
        assert_eq!(json["device_class"], "power");
        assert_eq!(json["device"]["identifiers"][0], "roof");
    }

    #[test]
    fn status_has_no_unit() {
        let field = FIELDS.iter().find(|f| f.key == "status").unwrap();
        let message = Config::new(&mqtt_config()).sensor(field).unwrap();
        let json: serde_json::Value = serde_json::from_str(&message.payload).unwrap();

        assert!(json.get("unit_of_measurement").is_none());
        assert!(json.get("device_class").is_none());
    }
}
