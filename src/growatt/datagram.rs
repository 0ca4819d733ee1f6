use crate::prelude::*;

use chrono::{DateTime, Local};
use nom_derive::{Nom, Parse};
use num_enum::TryFromPrimitive;
use serde::Serialize;

/// Length of a data record, excluding the terminating sync byte.
pub const RECORD_LEN: usize = 30;

/// Fault code used on synthesised datagrams, where no fault was reported.
pub const NO_FAULT: i32 = -1;

// Status {{{
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Status {
    Unavailable,
    Waiting,
    Normal,
    Fault,
    Sleeping,
    Invalid,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unavailable => "Unavailable",
            Status::Waiting => "Waiting",
            Status::Normal => "Normal",
            Status::Fault => "Fault",
            Status::Sleeping => "Sleeping",
            Status::Invalid => "Invalid",
        }
    }

    /// Maps the status byte of a record. Codes the inverter is not known to
    /// send come out as Unavailable.
    pub fn from_code(code: u8) -> Self {
        match DeviceStatus::try_from(code) {
            Ok(status) => status.into(),
            Err(_) => {
                debug!("unmapped status code {}", code);
                Status::Unavailable
            }
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum DeviceStatus {
    Waiting = 0,
    Normal = 1,
    Fault = 2,
}

impl From<DeviceStatus> for Status {
    fn from(status: DeviceStatus) -> Self {
        match status {
            DeviceStatus::Waiting => Status::Waiting,
            DeviceStatus::Normal => Status::Normal,
            DeviceStatus::Fault => Status::Fault,
        }
    }
}
// }}}

// Record {{{
/// Wire layout of one record, big-endian.
#[derive(PartialEq, Clone, Debug, Nom)]
#[nom(BigEndian)]
pub struct Record {
    #[nom(Parse = "Utils::be_u16_div10")]
    pub pv1_voltage: f64,
    #[nom(Parse = "Utils::be_u16_div10")]
    pub bus_voltage: f64,
    #[nom(Parse = "Utils::be_u16_div10")]
    pub pv2_voltage: f64,
    #[nom(Parse = "Utils::be_u16_div10")]
    pub grid_voltage: f64,
    #[nom(Parse = "Utils::be_u16_div100")]
    pub grid_frequency: f64,
    #[nom(Parse = "Utils::be_u16_div10")]
    pub power: f64,
    #[nom(Parse = "Utils::be_u16_div10")]
    pub temperature: f64,

    pub status: u8,
    pub fault_code: u8,

    #[nom(SkipBefore(4))] // unknown
    #[nom(Parse = "Utils::be_u16_div10")]
    pub day_production: f64,
    #[nom(Parse = "Utils::be_u32_div10")]
    pub total_production: f64,
    #[nom(Parse = "Utils::be_u32_div7200")]
    pub operating_hours: f64,
}

impl Record {
    pub fn decode(input: &[u8]) -> Result<Self> {
        if input.len() != RECORD_LEN {
            bail!(
                "record length {} (expected {}): {:02x?}",
                input.len(),
                RECORD_LEN,
                input
            );
        }

        match Record::parse(input) {
            Ok((_, r)) => Ok(r),
            Err(e) => Err(anyhow!("record parse failed: {:?}", e)),
        }
    }
} // }}}

// Datagram {{{
/// One decoded measurement. Replaced wholesale, never mutated in place.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Datagram {
    pub pv1_voltage: f64,
    pub bus_voltage: f64,
    pub pv2_voltage: f64,
    pub grid_voltage: f64,
    pub grid_frequency: f64,
    pub power: f64,
    pub temperature: f64,
    pub status: Status,
    pub fault_code: i32,
    pub day_production: f64,
    pub total_production: f64,
    pub operating_hours: f64,
    pub timestamp: DateTime<Local>,
}

impl Datagram {
    pub fn decode(input: &[u8], now: DateTime<Local>) -> Result<Self> {
        Ok(Self::from_record(Record::decode(input)?, now))
    }

    pub fn from_record(r: Record, now: DateTime<Local>) -> Self {
        Self {
            pv1_voltage: r.pv1_voltage,
            bus_voltage: r.bus_voltage,
            pv2_voltage: r.pv2_voltage,
            grid_voltage: r.grid_voltage,
            grid_frequency: r.grid_frequency,
            power: r.power,
            temperature: r.temperature,
            status: Status::from_code(r.status),
            fault_code: r.fault_code as i32,
            day_production: r.day_production,
            total_production: r.total_production,
            operating_hours: r.operating_hours,
            timestamp: now,
        }
    }

    /// Status-only datagram for a degraded state.
    ///
    /// Total production carries over from `last`, the most recent decoded
    /// datagram. Day production carries over only while still on the same
    /// local day as `last`, so the day counter resets across midnight.
    pub fn placeholder(status: Status, last: Option<&Datagram>, now: DateTime<Local>) -> Self {
        let (day_production, total_production) = match last {
            Some(last) if last.timestamp.date_naive() == now.date_naive() => {
                (last.day_production, last.total_production)
            }
            Some(last) => (0.0, last.total_production),
            None => (0.0, 0.0),
        };

        Self {
            pv1_voltage: 0.0,
            bus_voltage: 0.0,
            pv2_voltage: 0.0,
            grid_voltage: 0.0,
            grid_frequency: 0.0,
            power: 0.0,
            temperature: 0.0,
            status,
            fault_code: NO_FAULT,
            day_production,
            total_production,
            operating_hours: 0.0,
            timestamp: now,
        }
    }

    pub fn empty() -> Self {
        Self::placeholder(Status::Unavailable, None, Local::now())
    }
}

impl std::fmt::Display for Datagram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[Datagram] {} pv1:{}V grid:{}V/{}Hz power:{}W temp:{}C day:{}kWh total:{}kWh",
            self.status,
            self.pv1_voltage,
            self.grid_voltage,
            self.grid_frequency,
            self.power,
            self.temperature,
            self.day_production,
            self.total_production
        )
    }
} // }}}
