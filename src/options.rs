use clap::{Parser, ValueEnum};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Action {
    /// Run the bridge
    Start,
    /// Send the init handshake to the inverter once and exit
    Init,
}

/// Growatt Bridge - serial inverter data to MQTT and HTTP
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    #[clap(short = 'a', long = "action", value_enum, default_value_t = Action::Start)]
    pub action: Action,

    /// Log at debug level regardless of the config file
    #[clap(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}
