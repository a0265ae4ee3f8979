use std::sync::Arc;

use crate::{
    capabilities::{DeviceActions, Insight, MotionSensor, Switch},
    datatypes::{DeviceInfo, DeviceKind, Service},
    error::Result,
    protocol::{base_url, DefaultProtocol, Protocol},
};

// DEVICES

pub struct RawDevice {
    location: String,
    base_url: String,
    info: DeviceInfo,
    protocol: Arc<dyn Protocol>,
}

impl RawDevice {
    pub fn new(location: &str, info: DeviceInfo) -> Result<RawDevice> {
        Self::with_protocol(location, info, Arc::new(DefaultProtocol::new()))
    }

    pub(crate) fn with_protocol(
        location: &str,
        info: DeviceInfo,
        protocol: Arc<dyn Protocol>,
    ) -> Result<RawDevice> {
        Ok(Self {
            location: location.to_string(),
            base_url: base_url(location)?,
            info,
            protocol,
        })
    }

    /// URL of the device's `setup.xml`
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl DeviceActions for RawDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn send(&self, service: Service, action: &str, args: &[(&str, &str)]) -> Result<String> {
        let url = format!("{}{}", self.base_url, service.control_path());
        self.protocol
            .call(&url, service.service_type(), action, args)
    }
}

macro_rules! new_device {
    ( $x:ident ) => {
        pub struct $x {
            raw: RawDevice,
        }

        impl $x {
            pub fn new(location: &str, info: DeviceInfo) -> Result<Self> {
                Ok(Self {
                    raw: RawDevice::new(location, info)?,
                })
            }

            pub fn from_raw(raw: RawDevice) -> Self {
                Self { raw }
            }

            pub fn location(&self) -> &str {
                self.raw.location()
            }
        }

        impl DeviceActions for $x {
            fn info(&self) -> &DeviceInfo {
                self.raw.info()
            }

            fn send(&self, service: Service, action: &str, args: &[(&str, &str)]) -> Result<String> {
                self.raw.send(service, action, args)
            }
        }
    };
}

new_device!(Socket);

impl Switch for Socket {}

new_device!(InsightSwitch);

impl Switch for InsightSwitch {}
impl Insight for InsightSwitch {}

new_device!(Lightswitch);

impl Switch for Lightswitch {}

new_device!(Maker);

impl Switch for Maker {}

new_device!(Motion);

impl MotionSensor for Motion {}

pub enum Device {
    Socket(Socket),
    Insight(InsightSwitch),
    Lightswitch(Lightswitch),
    Maker(Maker),
    Motion(Motion),
    Unknown(RawDevice),
}

impl Device {
    pub fn from_info(location: &str, info: DeviceInfo) -> Result<Device> {
        Self::from_info_with_protocol(location, info, Arc::new(DefaultProtocol::new()))
    }

    pub(crate) fn from_info_with_protocol(
        location: &str,
        info: DeviceInfo,
        protocol: Arc<dyn Protocol>,
    ) -> Result<Device> {
        let kind = info.kind();
        let raw = RawDevice::with_protocol(location, info, protocol)?;
        Ok(match kind {
            DeviceKind::Socket => Device::Socket(Socket::from_raw(raw)),
            DeviceKind::Insight => Device::Insight(InsightSwitch::from_raw(raw)),
            DeviceKind::Lightswitch => Device::Lightswitch(Lightswitch::from_raw(raw)),
            DeviceKind::Maker => Device::Maker(Maker::from_raw(raw)),
            DeviceKind::Motion => Device::Motion(Motion::from_raw(raw)),
            DeviceKind::Unknown => Device::Unknown(raw),
        })
    }

    pub fn actions(&self) -> &dyn DeviceActions {
        match self {
            Device::Socket(device) => device as &dyn DeviceActions,
            Device::Insight(device) => device as &dyn DeviceActions,
            Device::Lightswitch(device) => device as &dyn DeviceActions,
            Device::Maker(device) => device as &dyn DeviceActions,
            Device::Motion(device) => device as &dyn DeviceActions,
            Device::Unknown(device) => device as &dyn DeviceActions,
        }
    }

    pub fn name(&self) -> &str {
        self.actions().name()
    }

    pub fn info(&self) -> &DeviceInfo {
        self.actions().info()
    }

    pub fn as_switch(&self) -> Option<&dyn Switch> {
        match self {
            Device::Socket(device) => Some(device as &dyn Switch),
            Device::Insight(device) => Some(device as &dyn Switch),
            Device::Lightswitch(device) => Some(device as &dyn Switch),
            Device::Maker(device) => Some(device as &dyn Switch),
            Device::Motion(_) | Device::Unknown(_) => None,
        }
    }

    pub fn as_motion(&self) -> Option<&dyn MotionSensor> {
        match self {
            Device::Motion(device) => Some(device as &dyn MotionSensor),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{tests::SOCKET_SETUP_XML, tests::setup_xml, BinaryState};
    use crate::error::{Error, SoapFault};
    use crate::protocol::ProtocolMock;

    const LOCATION: &str = "http://10.0.0.2:49153/setup.xml";

    fn state_response(state: &str) -> Result<String> {
        Ok(format!(
            "<s:Envelope><s:Body><u:GetBinaryStateResponse><BinaryState>{}</BinaryState></u:GetBinaryStateResponse></s:Body></s:Envelope>",
            state
        ))
    }

    fn socket(protocol: Arc<ProtocolMock>) -> Device {
        let info = DeviceInfo::from_setup_xml(SOCKET_SETUP_XML).unwrap();
        Device::from_info_with_protocol(LOCATION, info, protocol).unwrap()
    }

    #[test]
    fn test_toggle_switches_off_when_on() {
        // arrange
        let protocol = Arc::new(ProtocolMock::new());
        protocol.push_return_value(state_response("1"));
        let device = socket(protocol.clone());

        // act
        let now_on = device.as_switch().unwrap().toggle().unwrap();

        // assert
        assert!(!now_on);
        let reqs = protocol.requests();
        assert_eq!(2, reqs.len());
        assert_eq!("http://10.0.0.2:49153/upnp/control/basicevent1", reqs[1].url);
        assert_eq!(Some(String::from("SetBinaryState")), reqs[1].action);
        assert_eq!(vec![(String::from("BinaryState"), String::from("0"))], reqs[1].args);
    }

    #[test]
    fn test_toggle_switches_on_when_off() {
        let protocol = Arc::new(ProtocolMock::new());
        protocol.push_return_value(state_response("0"));
        let device = socket(protocol.clone());

        assert!(device.as_switch().unwrap().toggle().unwrap());
        assert_eq!(
            vec![(String::from("BinaryState"), String::from("1"))],
            protocol.requests()[1].args
        );
    }

    #[test]
    fn test_get_state_failure() {
        let protocol = Arc::new(ProtocolMock::new());
        protocol.push_return_value(Err(Error::Soap(SoapFault {
            code: String::from("-1"),
            description: String::from("Invalid Action"),
        })));
        let device = socket(protocol);

        assert!(device.as_switch().unwrap().get_state().is_err());
    }

    #[test]
    fn test_insight_standby_is_on() {
        let protocol = Arc::new(ProtocolMock::new());
        protocol.push_return_value(state_response("8|1497306462|0|0|0|0|0|0|0|0|8000"));
        let info = DeviceInfo::from_setup_xml(&setup_xml(
            "urn:Belkin:device:insight:1",
            "Heater",
            "uuid:Insight-1_0-1",
        ))
        .unwrap();
        let device = Device::from_info_with_protocol(LOCATION, info, protocol).unwrap();

        match &device {
            Device::Insight(insight) => {
                assert_eq!(BinaryState::Standby, insight.get_state().unwrap());
            }
            _ => panic!("expected an insight switch"),
        }
        assert_eq!("Heater", device.name());
    }

    #[test]
    fn test_motion_is_not_a_switch() {
        let info = DeviceInfo::from_setup_xml(&setup_xml(
            "urn:Belkin:device:sensor:1",
            "Hallway",
            "uuid:Sensor-1_0-1",
        ))
        .unwrap();
        let device =
            Device::from_info_with_protocol(LOCATION, info, Arc::new(ProtocolMock::new())).unwrap();

        assert!(device.as_switch().is_none());
        assert!(device.as_motion().is_some());
    }

    #[test]
    fn test_insight_power_reading() {
        let protocol = Arc::new(ProtocolMock::new());
        protocol.push_return_value(Ok(String::from(
            "<u:GetInsightParamsResponse><InsightParams>1|1497306462|2095|4185|63421|1209600|61|41550|4770000|62433560|8000</InsightParams></u:GetInsightParamsResponse>",
        )));
        let info = DeviceInfo::from_setup_xml(&setup_xml(
            "urn:Belkin:device:insight:1",
            "Heater",
            "uuid:Insight-1_0-1",
        ))
        .unwrap();
        let insight = InsightSwitch::from_raw(
            RawDevice::with_protocol(LOCATION, info, protocol.clone()).unwrap(),
        );

        assert_eq!(41.55, insight.current_power().unwrap());
        assert_eq!("http://10.0.0.2:49153/upnp/control/insight1", protocol.requests()[0].url);
    }

    #[test]
    fn test_motion_detected() {
        let protocol = Arc::new(ProtocolMock::new());
        protocol.push_return_value(state_response("1"));
        let info = DeviceInfo::from_setup_xml(&setup_xml(
            "urn:Belkin:device:sensor:1",
            "Hallway",
            "uuid:Sensor-1_0-1",
        ))
        .unwrap();
        let device = Device::from_info_with_protocol(LOCATION, info, protocol).unwrap();

        assert!(device.as_motion().unwrap().motion_detected().unwrap());
    }
}
