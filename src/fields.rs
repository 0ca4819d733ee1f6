use crate::prelude::*;

/// How a field is compared and rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    /// Rounded to `precision` decimals before comparing and formatting.
    Number { precision: u32 },
    /// Compared by exact match and published retained.
    Status,
    /// Local capture time, `%Y-%m-%d %H:%M:%S`.
    Timestamp,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

pub struct Field {
    /// Topic suffix and JSON key.
    pub key: &'static str,
    pub name: &'static str,
    pub unit: Option<&'static str>,
    pub kind: Kind,
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
    pub get: fn(&Datagram) -> Value,
}

impl Field {
    pub fn value(&self, datagram: &Datagram) -> Value {
        (self.get)(datagram)
    }

    pub fn retain(&self) -> bool {
        self.kind == Kind::Status
    }

    pub fn format(&self, value: &Value) -> String {
        match (self.kind, value) {
            (Kind::Number { precision }, Value::Number(v)) => {
                format!("{:.*}", precision as usize, v)
            }
            (_, Value::Number(v)) => v.to_string(),
            (_, Value::Text(s)) => s.clone(),
        }
    }

    /// True when `new` should be published over `old`.
    pub fn changed(&self, old: &Value, new: &Value) -> bool {
        const TOLERANCE: f64 = 0.00001;

        match (self.kind, old, new) {
            (Kind::Number { precision }, Value::Number(o), Value::Number(n)) => {
                (Utils::round(*n, precision) - Utils::round(*o, precision)).abs() > TOLERANCE
            }
            (_, o, n) => o != n,
        }
    }
}

fn number(v: f64) -> Value {
    Value::Number(v)
}

/// Every published field of a datagram, in publish order.
pub static FIELDS: &[Field] = &[
    Field {
        key: "pv1_voltage",
        name: "PV1 Voltage",
        unit: Some("V"),
        kind: Kind::Number { precision: 1 },
        device_class: Some("voltage"),
        state_class: Some("measurement"),
        get: |d| number(d.pv1_voltage),
    },
    Field {
        key: "bus_voltage",
        name: "Bus Voltage",
        unit: Some("V"),
        kind: Kind::Number { precision: 1 },
        device_class: Some("voltage"),
        state_class: Some("measurement"),
        get: |d| number(d.bus_voltage),
    },
    Field {
        key: "pv2_voltage",
        name: "PV2 Voltage",
        unit: Some("V"),
        kind: Kind::Number { precision: 1 },
        device_class: Some("voltage"),
        state_class: Some("measurement"),
        get: |d| number(d.pv2_voltage),
    },
    Field {
        key: "grid_voltage",
        name: "Grid Voltage",
        unit: Some("V"),
        kind: Kind::Number { precision: 1 },
        device_class: Some("voltage"),
        state_class: Some("measurement"),
        get: |d| number(d.grid_voltage),
    },
    Field {
        key: "grid_frequency",
        name: "Grid Frequency",
        unit: Some("Hz"),
        kind: Kind::Number { precision: 2 },
        device_class: Some("frequency"),
        state_class: Some("measurement"),
        get: |d| number(d.grid_frequency),
    },
    Field {
        key: "power",
        name: "Power",
        unit: Some("W"),
        kind: Kind::Number { precision: 1 },
        device_class: Some("power"),
        state_class: Some("measurement"),
        get: |d| number(d.power),
    },
    Field {
        key: "temperature",
        name: "Temperature",
        unit: Some("°C"),
        kind: Kind::Number { precision: 1 },
        device_class: Some("temperature"),
        state_class: Some("measurement"),
        get: |d| number(d.temperature),
    },
    Field {
        key: "status",
        name: "Status",
        unit: None,
        kind: Kind::Status,
        device_class: None,
        state_class: None,
        get: |d| Value::Text(d.status.to_string()),
    },
    Field {
        key: "fault_code",
        name: "Fault Code",
        unit: None,
        kind: Kind::Number { precision: 0 },
        device_class: None,
        state_class: None,
        get: |d| number(d.fault_code as f64),
    },
    Field {
        key: "day_production",
        name: "Production Today",
        unit: Some("kWh"),
        kind: Kind::Number { precision: 1 },
        device_class: Some("energy"),
        state_class: Some("total_increasing"),
        get: |d| number(d.day_production),
    },
    Field {
        key: "total_production",
        name: "Production Total",
        unit: Some("kWh"),
        kind: Kind::Number { precision: 1 },
        device_class: Some("energy"),
        state_class: Some("total_increasing"),
        get: |d| number(d.total_production),
    },
    Field {
        key: "operating_hours",
        name: "Operating Hours",
        unit: Some("h"),
        kind: Kind::Number { precision: 1 },
        device_class: Some("duration"),
        state_class: Some("total_increasing"),
        get: |d| number(d.operating_hours),
    },
    Field {
        key: "timestamp",
        name: "Last Update",
        unit: None,
        kind: Kind::Timestamp,
        device_class: None,
        state_class: None,
        get: |d| Value::Text(d.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
    },
];
