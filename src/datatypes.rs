use std::collections::HashMap;

use crate::{
    error::{Error, Result},
    protocol::extract,
};

pub const BASIC_EVENT: &str = "urn:Belkin:service:basicevent:1";
pub const INSIGHT: &str = "urn:Belkin:service:insight:1";

/// UPnP service a WeMo action is addressed to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Service {
    BasicEvent,
    Insight,
}

impl Service {
    pub fn service_type(self) -> &'static str {
        match self {
            Service::BasicEvent => BASIC_EVENT,
            Service::Insight => INSIGHT,
        }
    }

    pub fn control_path(self) -> &'static str {
        match self {
            Service::BasicEvent => "/upnp/control/basicevent1",
            Service::Insight => "/upnp/control/insight1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum DeviceKind {
    Socket,
    Insight,
    Lightswitch,
    Maker,
    Motion,
    Unknown,
}

impl DeviceKind {
    pub fn from_device_type(device_type: &str) -> DeviceKind {
        let lower = device_type.to_lowercase();
        if lower.contains(":controllee:") {
            DeviceKind::Socket
        } else if lower.contains(":insight:") {
            DeviceKind::Insight
        } else if lower.contains(":lightswitch:") || lower.contains(":dimmer:") {
            DeviceKind::Lightswitch
        } else if lower.contains(":maker:") {
            DeviceKind::Maker
        } else if lower.contains(":sensor:") {
            DeviceKind::Motion
        } else {
            DeviceKind::Unknown
        }
    }

    pub fn is_switch(self) -> bool {
        match self {
            DeviceKind::Socket | DeviceKind::Insight | DeviceKind::Lightswitch | DeviceKind::Maker => true,
            DeviceKind::Motion | DeviceKind::Unknown => false,
        }
    }
}

/// Device description served from `setup.xml`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub device_type: String,
    pub friendly_name: String,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    pub serial_number: Option<String>,
    pub udn: String,
    pub mac_address: Option<String>,
    pub firmware_version: Option<String>,
}

impl DeviceInfo {
    pub fn from_setup_xml(xml: &str) -> Result<DeviceInfo> {
        let required = |tag: &str| {
            extract(xml, tag)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| Error::Other(format!("Device description is missing <{}>", tag)))
        };

        Ok(DeviceInfo {
            device_type: required("deviceType")?,
            friendly_name: required("friendlyName")?,
            manufacturer: extract(xml, "manufacturer"),
            model_name: extract(xml, "modelName"),
            serial_number: extract(xml, "serialNumber"),
            udn: required("UDN")?,
            mac_address: extract(xml, "macAddress"),
            firmware_version: extract(xml, "firmwareVersion"),
        })
    }

    pub fn kind(&self) -> DeviceKind {
        DeviceKind::from_device_type(&self.device_type)
    }
}

/// Relay state reported by `GetBinaryState`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum BinaryState {
    Off,
    On,
    // Insight only: relay closed but no load drawing power
    Standby,
}

impl BinaryState {
    pub fn parse(value: &str) -> Result<BinaryState> {
        // Insight replies with "state|lastchange|..."
        let state = value.split('|').next().unwrap_or("").trim();
        match state {
            "0" => Ok(BinaryState::Off),
            "1" => Ok(BinaryState::On),
            "8" => Ok(BinaryState::Standby),
            other => Err(Error::Other(format!("Unexpected binary state: {}", other))),
        }
    }

    pub fn is_on(self) -> bool {
        self != BinaryState::Off
    }
}

/// Energy readings from an Insight switch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightParams {
    pub state: BinaryState,
    pub last_change: u64,
    pub on_for: u64,
    pub on_today: u64,
    pub on_total: u64,
    pub time_period: u64,
    pub current_power_mw: f64,
    pub today_mw_minutes: f64,
    pub total_mw_minutes: f64,
    pub power_threshold_mw: f64,
}

impl InsightParams {
    pub fn parse(value: &str) -> Result<InsightParams> {
        let fields: Vec<&str> = value.trim().split('|').collect();
        if fields.len() < 11 {
            return Err(Error::Other(format!(
                "Expected 11 insight fields, got {}",
                fields.len()
            )));
        }

        let int = |i: usize| {
            fields[i]
                .parse::<u64>()
                .map_err(|_| Error::Other(format!("Invalid insight field {}: {}", i, fields[i])))
        };
        let float = |i: usize| {
            fields[i]
                .parse::<f64>()
                .map_err(|_| Error::Other(format!("Invalid insight field {}: {}", i, fields[i])))
        };

        // field 6 is the average power, which the device does not keep current
        Ok(InsightParams {
            state: BinaryState::parse(fields[0])?,
            last_change: int(1)?,
            on_for: int(2)?,
            on_today: int(3)?,
            on_total: int(4)?,
            time_period: int(5)?,
            current_power_mw: float(7)?,
            today_mw_minutes: float(8)?,
            total_mw_minutes: float(9)?,
            power_threshold_mw: float(10)?,
        })
    }

    pub fn today_kwh(&self) -> f64 {
        self.today_mw_minutes / (1000.0 * 1000.0 * 60.0)
    }
}

/// Unicast reply to an SSDP `M-SEARCH`
#[derive(Debug, Clone, PartialEq)]
pub struct SsdpResponse {
    pub location: String,
    pub st: Option<String>,
    pub usn: Option<String>,
    pub server: Option<String>,
}

impl SsdpResponse {
    pub fn parse(data: &str) -> Option<SsdpResponse> {
        let mut lines = data.lines();
        let status = lines.next()?;
        if !status.starts_with("HTTP/1.1 200") && !status.starts_with("NOTIFY") {
            return None;
        }

        let headers: HashMap<String, String> = lines
            .filter_map(|line| {
                let colon = line.find(':')?;
                Some((
                    line[..colon].trim().to_uppercase(),
                    line[colon + 1..].trim().to_string(),
                ))
            })
            .collect();

        Some(SsdpResponse {
            location: headers.get("LOCATION").filter(|l| !l.is_empty())?.clone(),
            st: headers.get("ST").or_else(|| headers.get("NT")).cloned(),
            usn: headers.get("USN").cloned(),
            server: headers.get("SERVER").cloned(),
        })
    }

    pub fn is_belkin(&self) -> bool {
        vec![self.st.as_ref(), self.usn.as_ref(), self.server.as_ref()]
            .into_iter()
            .flatten()
            .any(|value| value.to_lowercase().contains("belkin") || value.contains("Socket-1_0"))
    }
}
