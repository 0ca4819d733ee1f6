use crate::prelude::*;

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: Serial,
    #[serde(default)]
    pub reader: Reader,
    #[serde(default)]
    pub interpreter: Interpreter,
    #[serde(default)]
    pub publisher: Publisher,
    #[serde(default)]
    pub mqtt: Mqtt,
    #[serde(default)]
    pub http: Http,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// Serial {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Serial {
    #[serde(default = "Config::default_device")]
    pub device: String,
    #[serde(default = "Config::default_baudrate")]
    pub baudrate: u32,
}

impl Default for Serial {
    fn default() -> Self {
        Self {
            device: Config::default_device(),
            baudrate: Config::default_baudrate(),
        }
    }
}

impl Serial {
    pub fn device(&self) -> &str {
        &self.device
    }

    // anything below 110 baud is a typo, not a real line speed
    pub fn baudrate(&self) -> u32 {
        if self.baudrate < 110 {
            Config::default_baudrate()
        } else {
            self.baudrate
        }
    }
} // }}}

// Reader {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Reader {
    /// Reconnect and re-initialise after this long without a byte.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_respawn_after")]
    pub respawn_after: Duration,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_poke_interval")]
    pub poke_interval: Duration,

    /// Wait after a failed initialisation before trying again.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_init_cooldown")]
    pub init_cooldown: Duration,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "Config::default_response_timeout")]
    pub response_timeout: Duration,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_reconnect_delay")]
    pub reconnect_delay: Duration,
}

impl Default for Reader {
    fn default() -> Self {
        Self {
            respawn_after: Config::default_respawn_after(),
            poke_interval: Config::default_poke_interval(),
            init_cooldown: Config::default_init_cooldown(),
            response_timeout: Config::default_response_timeout(),
            reconnect_delay: Config::default_reconnect_delay(),
        }
    }
} // }}}

// Interpreter {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Interpreter {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "Config::default_poll_interval")]
    pub poll_interval: Duration,

    /// Silence on the queue that puts the interpreter to sleep.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_idle_timeout")]
    pub idle_timeout: Duration,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_sleep_backoff")]
    pub sleep_backoff: Duration,

    /// Consecutive corrupt frames tolerated before backing off.
    #[serde(default = "Config::default_corrupt_frame_limit")]
    pub corrupt_frame_limit: u32,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_corrupt_backoff")]
    pub corrupt_backoff: Duration,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self {
            poll_interval: Config::default_poll_interval(),
            idle_timeout: Config::default_idle_timeout(),
            sleep_backoff: Config::default_sleep_backoff(),
            corrupt_frame_limit: Config::default_corrupt_frame_limit(),
            corrupt_backoff: Config::default_corrupt_backoff(),
        }
    }
}

impl Interpreter {
    /// Number of consecutive empty polls that add up to `idle_timeout`.
    pub fn empty_poll_limit(&self) -> u32 {
        let poll = self.poll_interval.as_millis().max(1);
        let limit = self.idle_timeout.as_millis().div_ceil(poll);
        limit.clamp(1, u32::MAX as u128) as u32
    }
} // }}}

// Publisher {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Publisher {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "Config::default_publish_interval")]
    pub interval: Duration,

    /// Minimum time between publishes while the status is unchanged; 0 disables.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_min_publish_period")]
    pub min_publish_period: Duration,
}

impl Default for Publisher {
    fn default() -> Self {
        Self {
            interval: Config::default_publish_interval(),
            min_publish_period: Config::default_min_publish_period(),
        }
    }
}

impl Publisher {
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn min_publish_period(&self) -> Option<Duration> {
        Some(self.min_publish_period).filter(|p| !p.is_zero())
    }
} // }}}

// HomeAssistant {{{
#[derive(Clone, Debug, Deserialize)]
pub struct HomeAssistant {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    #[serde(default = "Config::default_mqtt_homeassistant_prefix")]
    pub prefix: String,

    #[serde(default = "Config::default_mqtt_homeassistant_node_id")]
    pub node_id: String,
}

impl HomeAssistant {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }
} // }}}

// Mqtt {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Mqtt {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    #[serde(default = "Config::default_mqtt_host")]
    pub host: String,
    #[serde(default = "Config::default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "Config::default_mqtt_client_id")]
    pub client_id: String,

    #[serde(default = "Config::default_mqtt_namespace")]
    pub namespace: String,

    #[serde(default = "Config::default_mqtt_homeassistant")]
    pub homeassistant: HomeAssistant,
}

// no mqtt section at all means no mqtt
impl Default for Mqtt {
    fn default() -> Self {
        Self {
            enabled: false,
            host: Config::default_mqtt_host(),
            port: Config::default_mqtt_port(),
            username: None,
            password: None,
            client_id: Config::default_mqtt_client_id(),
            namespace: Config::default_mqtt_namespace(),
            homeassistant: Config::default_mqtt_homeassistant(),
        }
    }
}

impl Mqtt {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &Option<String> {
        &self.username
    }

    pub fn password(&self) -> &Option<String> {
        &self.password
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn homeassistant(&self) -> &HomeAssistant {
        &self.homeassistant
    }
} // }}}

// Http {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Http {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    #[serde(default = "Config::default_http_port")]
    pub port: u16,
}

impl Default for Http {
    fn default() -> Self {
        Self {
            enabled: Config::default_enabled(),
            port: Config::default_http_port(),
        }
    }
}

impl Http {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn port(&self) -> u16 {
        self.port
    }
} // }}}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| file_error_with_source!(err, "error reading {}", file))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!("  Serial: {} at {} baud", self.serial.device(), self.serial.baudrate());
        info!("  Reader:");
        info!("    Respawn after: {}s", self.reader.respawn_after.as_secs());
        info!("    Init cooldown: {}s", self.reader.init_cooldown.as_secs());
        info!("  Interpreter:");
        info!("    Poll interval: {}ms", self.interpreter.poll_interval.as_millis());
        info!("    Idle timeout: {}s", self.interpreter.idle_timeout.as_secs());
        info!("    Sleep backoff: {}s", self.interpreter.sleep_backoff.as_secs());
        info!("    Corrupt frame limit: {}", self.interpreter.corrupt_frame_limit);
        info!("  Publisher:");
        info!("    Interval: {}ms", self.publisher.interval.as_millis());
        match self.publisher.min_publish_period() {
            Some(p) => info!("    Min publish period: {}s", p.as_secs()),
            None => info!("    Min publish period: disabled"),
        }

        info!("  MQTT: {}", if self.mqtt.enabled { "enabled" } else { "disabled" });
        if self.mqtt.enabled {
            info!("    Host: {}", self.mqtt.host);
            info!("    Port: {}", self.mqtt.port);
            info!("    Namespace: {}", self.mqtt.namespace);
            info!("    Home Assistant: {}", if self.mqtt.homeassistant.enabled { "enabled" } else { "disabled" });
        }

        info!("  HTTP: {}", if self.http.enabled { "enabled" } else { "disabled" });
        if self.http.enabled {
            info!("    Port: {}", self.http.port);
        }

        info!("  Log Level: {}", self.loglevel);
    }

    fn validate(&self) -> Result<()> {
        if self.serial.device.is_empty() {
            return Err(file_error!("serial.device cannot be empty"));
        }

        if self.mqtt.enabled {
            if self.mqtt.port == 0 {
                bail!("mqtt.port must be between 1 and 65535");
            }
            if self.mqtt.host.is_empty() {
                return Err(file_error!("MQTT host cannot be empty"));
            }
            if self.mqtt.namespace.is_empty() {
                return Err(file_error!("MQTT namespace cannot be empty"));
            }
        }

        if self.http.enabled && self.http.port == 0 {
            bail!("http.port must be between 1 and 65535");
        }

        if self.interpreter.poll_interval.is_zero() {
            return Err(file_error!("interpreter.poll_interval cannot be 0"));
        }

        if self.publisher.interval.is_zero() {
            return Err(file_error!("publisher.interval cannot be 0"));
        }

        if self.reader.respawn_after.is_zero() {
            return Err(file_error!("reader.respawn_after cannot be 0"));
        }

        Ok(())
    }

    pub fn serial(&self) -> &Serial {
        &self.serial
    }

    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn mqtt(&self) -> &Mqtt {
        &self.mqtt
    }

    pub fn http(&self) -> &Http {
        &self.http
    }

    pub fn loglevel(&self) -> &str {
        &self.loglevel
    }

    fn default_device() -> String {
        "/dev/ttyUSB0".to_string()
    }

    fn default_baudrate() -> u32 {
        9600
    }

    fn default_respawn_after() -> Duration {
        Duration::from_secs(5 * 60)
    }

    fn default_poke_interval() -> Duration {
        Duration::from_secs(60)
    }

    fn default_init_cooldown() -> Duration {
        Duration::from_secs(10 * 60)
    }

    fn default_response_timeout() -> Duration {
        Duration::from_millis(500)
    }

    fn default_reconnect_delay() -> Duration {
        Duration::from_secs(5)
    }

    fn default_poll_interval() -> Duration {
        Duration::from_millis(100)
    }

    fn default_idle_timeout() -> Duration {
        Duration::from_secs(10)
    }

    fn default_sleep_backoff() -> Duration {
        Duration::from_secs(5 * 60)
    }

    fn default_corrupt_frame_limit() -> u32 {
        20
    }

    fn default_corrupt_backoff() -> Duration {
        Duration::from_secs(2 * 60)
    }

    fn default_publish_interval() -> Duration {
        Duration::from_millis(500)
    }

    fn default_min_publish_period() -> Duration {
        Duration::ZERO
    }

    fn default_mqtt_host() -> String {
        "localhost".to_string()
    }

    fn default_mqtt_port() -> u16 {
        1883
    }

    fn default_mqtt_client_id() -> String {
        "growatt-bridge".to_string()
    }

    fn default_mqtt_namespace() -> String {
        "solar/growatt".to_string()
    }

    fn default_mqtt_homeassistant() -> HomeAssistant {
        HomeAssistant {
            enabled: Self::default_enabled(),
            prefix: Self::default_mqtt_homeassistant_prefix(),
            node_id: Self::default_mqtt_homeassistant_node_id(),
        }
    }

    fn default_mqtt_homeassistant_prefix() -> String {
        "homeassistant".to_string()
    }

    fn default_mqtt_homeassistant_node_id() -> String {
        "growatt".to_string()
    }

    fn default_http_port() -> u16 {
        5701
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_from_minimal_file() -> Result<()> {
        let config = Config::from_yaml("serial:\n  device: /dev/ttyS1\n")?;

        assert_eq!(config.serial().device(), "/dev/ttyS1");
        assert_eq!(config.serial().baudrate(), 9600);
        assert_eq!(config.reader().respawn_after, Duration::from_secs(300));
        assert_eq!(config.interpreter().poll_interval, Duration::from_millis(100));
        assert_eq!(config.interpreter().empty_poll_limit(), 100);
        assert_eq!(config.publisher().min_publish_period(), None);
        assert!(!config.mqtt().enabled());
        assert!(config.http().enabled());
        assert_eq!(config.http().port(), 5701);
        assert_eq!(config.loglevel(), "info");

        Ok(())
    }

    #[test]
    fn full_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            r#"
serial:
  device: /dev/ttyUSB1
  baudrate: 50
interpreter:
  poll_interval: 250
  idle_timeout: 5
publisher:
  min_publish_period: 30
mqtt:
  host: broker.local
  username: solar
  password: secret
  homeassistant:
    enabled: false
http:
  port: 8080
loglevel: debug
"#
        )?;

        let config = Config::new(file.path().to_string_lossy().to_string())?;
        // below 110 baud falls back to the default
        assert_eq!(config.serial().baudrate(), 9600);
        assert_eq!(config.interpreter().empty_poll_limit(), 20);
        assert_eq!(
            config.publisher().min_publish_period(),
            Some(Duration::from_secs(30))
        );
        assert!(config.mqtt().enabled());
        assert_eq!(config.mqtt().host(), "broker.local");
        assert_eq!(config.mqtt().port(), 1883);
        assert_eq!(config.mqtt().namespace(), "solar/growatt");
        assert_eq!(config.mqtt().username(), &Some("solar".to_string()));
        assert!(!config.mqtt().homeassistant().enabled());
        assert_eq!(config.mqtt().homeassistant().prefix(), "homeassistant");
        assert_eq!(config.http().port(), 8080);
        assert_eq!(config.loglevel(), "debug");

        Ok(())
    }

    #[test]
    fn rejects_empty_mqtt_host() {
        let err = Config::from_yaml("mqtt:\n  host: \"\"\n").unwrap_err();
        assert!(err.to_string().contains("MQTT host cannot be empty"), "{}", err);
    }

    #[test]
    fn rejects_zero_poll_interval() {
        assert!(Config::from_yaml("interpreter:\n  poll_interval: 0\n").is_err());
    }

    #[test]
    fn missing_file() {
        let err = Config::new("/nonexistent/growatt.yaml".to_string()).unwrap_err();
        assert!(err.to_string().contains("error reading"), "{}", err);
    }
}
