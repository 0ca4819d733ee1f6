#![allow(dead_code)]

use growatt_bridge::growatt::datagram::RECORD_LEN;
use growatt_bridge::growatt::frame::TERMINATOR;
use growatt_bridge::prelude::*;

use chrono::{DateTime, Local, TimeZone};
use std::time::Duration;

pub struct Factory();

impl Factory {
    /// PV1 10.0 V, bus 350.0 V, grid 230.0 V at 50.00 Hz, 0.5 W, 53.4 C,
    /// Normal, no fault, 4.0 kWh today, 100.0 kWh total, 1.0 h.
    pub fn record() -> [u8; RECORD_LEN] {
        [
            0x00, 0x64, // pv1 voltage
            0x0d, 0xac, // bus voltage
            0x00, 0x00, // pv2 voltage
            0x08, 0xfc, // grid voltage
            0x13, 0x88, // grid frequency
            0x00, 0x05, // power
            0x02, 0x16, // temperature
            0x01, // status
            0x00, // fault code
            0x00, 0x00, 0x00, 0x00, // unknown
            0x00, 0x28, // day production
            0x00, 0x00, 0x03, 0xe8, // total production
            0x00, 0x00, 0x1c, 0x20, // operating hours
        ]
    }

    /// PV1 10.0 V, PV2 5.0 V, grid 240.0 V at 50.00 Hz, 0.5 W, 54.2 C,
    /// Normal, 4.0 kWh today, 100.0 kWh total, 1.0 h. Bus voltage and
    /// the fault code are zero.
    pub fn sample_record() -> [u8; RECORD_LEN] {
        [
            0x00, 0x64, 0x00, 0x00, 0x00, 0x32, 0x09, 0x60, 0x13, 0x88, 0x00, 0x05, 0x02, 0x1e,
            0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x28, 0x00, 0x00, 0x03, 0xe8, 0x00, 0x00,
            0x1c, 0x20,
        ]
    }

    /// A record followed by its terminator, as it appears on the wire.
    pub fn frame() -> Vec<u8> {
        let mut frame = Self::record().to_vec();
        frame.push(TERMINATOR);
        frame
    }

    pub fn noon(day: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap()
    }

    pub fn interpreter_config() -> config::Interpreter {
        config::Interpreter {
            poll_interval: Duration::from_millis(100),
            idle_timeout: Duration::from_secs(1),
            sleep_backoff: Duration::from_secs(300),
            corrupt_frame_limit: 20,
            corrupt_backoff: Duration::from_secs(120),
        }
    }

    pub fn reader_config() -> config::Reader {
        config::Reader {
            respawn_after: Duration::from_millis(300),
            poke_interval: Duration::from_secs(60),
            init_cooldown: Duration::from_secs(600),
            response_timeout: Duration::from_millis(200),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}
