//! The set of WeMo devices known on the local network
//!
//! An [`Environment`] owns every device found by SSDP discovery and hands out
//! switches and motion sensors by (fuzzy) name. Callbacks fire once for each
//! newly registered device.
use std::{
    collections::BTreeMap,
    net::UdpSocket,
    sync::Arc,
    time::Duration,
};

use regex::Regex;

use crate::{
    capabilities::{MotionSensor, Switch},
    datatypes::DeviceInfo,
    devices::Device,
    discovery,
    error::{Error, Result},
    protocol::{DefaultProtocol, Protocol},
};

pub type SwitchCallback = Box<dyn Fn(&dyn Switch) + Send + Sync>;
pub type MotionCallback = Box<dyn Fn(&dyn MotionSensor) + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct EnvironmentConfig {
    /// Local address for the discovery socket, e.g. `192.168.1.10:0`
    pub bind: Option<String>,
    /// Spoken name to device name
    pub aliases: BTreeMap<String, String>,
}

/// Key aliases by their trimmed, lowercased spoken name
///
/// Keys that differ only by case collapse into one. The entry whose original
/// key sorts last wins, so an all-lowercase key beats its capitalised twins.
pub fn normalize_aliases(aliases: BTreeMap<String, String>) -> BTreeMap<String, String> {
    aliases
        .into_iter()
        .map(|(spoken, device)| (spoken.trim().to_lowercase(), device))
        .collect()
}

pub struct Environment {
    config: EnvironmentConfig,
    protocol: Arc<dyn Protocol>,
    socket: Option<UdpSocket>,
    search_addr: String,
    devices: Vec<Device>,
    on_switch: SwitchCallback,
    on_motion: MotionCallback,
}

/// Case-insensitive subsequence matcher: "lr lamp" finds "Living Room Lamp"
pub fn matcher(name: &str) -> Result<Regex> {
    let pattern = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| regex::escape(&c.to_string()))
        .collect::<Vec<_>>()
        .join(".*?");
    Ok(Regex::new(&pattern)?)
}

impl Environment {
    pub fn new<S, M>(on_switch: S, on_motion: M) -> Environment
    where
        S: Fn(&dyn Switch) + Send + Sync + 'static,
        M: Fn(&dyn MotionSensor) + Send + Sync + 'static,
    {
        Self::with_config(on_switch, on_motion, EnvironmentConfig::default())
    }

    pub fn with_config<S, M>(on_switch: S, on_motion: M, config: EnvironmentConfig) -> Environment
    where
        S: Fn(&dyn Switch) + Send + Sync + 'static,
        M: Fn(&dyn MotionSensor) + Send + Sync + 'static,
    {
        Self::with_protocol(on_switch, on_motion, config, Arc::new(DefaultProtocol::new()))
    }

    pub(crate) fn with_protocol<S, M>(
        on_switch: S,
        on_motion: M,
        config: EnvironmentConfig,
        protocol: Arc<dyn Protocol>,
    ) -> Environment
    where
        S: Fn(&dyn Switch) + Send + Sync + 'static,
        M: Fn(&dyn MotionSensor) + Send + Sync + 'static,
    {
        Environment {
            config: EnvironmentConfig {
                aliases: normalize_aliases(config.aliases),
                ..config
            },
            protocol,
            socket: None,
            search_addr: String::from(discovery::SSDP_ADDR),
            devices: vec![],
            on_switch: Box::new(on_switch),
            on_motion: Box::new(on_motion),
        }
    }

    /// Bind the discovery socket. Calling it again is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.socket.is_none() {
            let socket = discovery::bind(self.config.bind.as_deref())?;
            log::debug!("WeMo environment listening on {}", socket.local_addr()?);
            self.socket = Some(socket);
        }
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.socket.is_some()
    }

    /// Scan the network for `seconds`, registering any new devices
    pub fn discover(&mut self, seconds: u64) -> Result<()> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| Error::Other(String::from("WeMo environment has not been started")))?;

        let responses = discovery::search_with_socket_to(
            socket,
            self.search_addr.as_str(),
            Duration::from_secs(seconds),
        )?;
        log::debug!("{} WeMo devices answered discovery", responses.len());

        for (location, info) in discovery::describe(self.protocol.as_ref(), &responses) {
            if let Err(err) = self.register(&location, info) {
                log::warn!("Could not register WeMo device at {}: {}", location, err);
            }
        }
        Ok(())
    }

    /// Add a device, firing the matching callback the first time its UDN is seen
    pub fn register(&mut self, location: &str, info: DeviceInfo) -> Result<()> {
        if let Some(index) = self.devices.iter().position(|d| d.info().udn == info.udn) {
            // port changes after a device reboots
            self.devices[index] =
                Device::from_info_with_protocol(location, info, self.protocol.clone())?;
            return Ok(());
        }

        let device = Device::from_info_with_protocol(location, info, self.protocol.clone())?;
        log::debug!("Registered WeMo device {} at {}", device.name(), location);
        if let Some(switch) = device.as_switch() {
            (self.on_switch)(switch);
        } else if let Some(motion) = device.as_motion() {
            (self.on_motion)(motion);
        }
        self.devices.push(device);
        Ok(())
    }

    /// Fetch a device description and register it
    pub fn register_location(&mut self, location: &str) -> Result<()> {
        let info = DeviceInfo::from_setup_xml(&self.protocol.get(location)?)?;
        self.register(location, info)
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    fn find<'a, T: ?Sized, F>(&'a self, name: &str, select: F) -> Result<&'a T>
    where
        F: Fn(&'a Device) -> Option<&'a T>,
    {
        let wanted = self
            .config
            .aliases
            .get(&name.trim().to_lowercase())
            .map(String::as_str)
            .unwrap_or(name)
            .trim();

        let candidates: Vec<(&str, &'a T)> = self
            .devices
            .iter()
            .filter_map(|device| select(device).map(|found| (device.name(), found)))
            .collect();

        if let Some((_, found)) = candidates.iter().find(|(n, _)| n.eq_ignore_ascii_case(wanted)) {
            return Ok(*found);
        }
        if wanted.is_empty() {
            return Err(Error::UnknownDevice(name.to_string()));
        }

        let pattern = matcher(wanted)?;
        candidates
            .into_iter()
            .find(|(n, _)| pattern.is_match(&n.to_lowercase()))
            .map(|(_, found)| found)
            .ok_or_else(|| Error::UnknownDevice(name.to_string()))
    }

    pub fn get_switch(&self, name: &str) -> Result<&dyn Switch> {
        self.find(name, Device::as_switch)
    }

    pub fn list_switches(&self) -> Vec<String> {
        self.devices
            .iter()
            .filter(|device| device.as_switch().is_some())
            .map(|device| device.name().to_string())
            .collect()
    }

    pub fn get_motion(&self, name: &str) -> Result<&dyn MotionSensor> {
        self.find(name, Device::as_motion)
    }

    pub fn list_motions(&self) -> Vec<String> {
        self.devices
            .iter()
            .filter(|device| device.as_motion().is_some())
            .map(|device| device.name().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::DeviceActions;
    use crate::datatypes::tests::setup_xml;
    use crate::protocol::ProtocolMock;
    use std::sync::Mutex;

    fn info(device_type: &str, name: &str, udn: &str) -> DeviceInfo {
        DeviceInfo::from_setup_xml(&setup_xml(device_type, name, udn)).unwrap()
    }

    fn environment(config: EnvironmentConfig) -> (Environment, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(vec![]));
        let switches = seen.clone();
        let motions = seen.clone();
        let mut env = Environment::with_protocol(
            move |s: &dyn Switch| switches.lock().unwrap().push(format!("switch {}", s.name())),
            move |m: &dyn MotionSensor| motions.lock().unwrap().push(format!("motion {}", m.name())),
            config,
            Arc::new(ProtocolMock::new()),
        );
        env.register(
            "http://10.0.0.2:49153/setup.xml",
            info("urn:Belkin:device:controllee:1", "Living Room Lamp", "uuid:Socket-1"),
        )
        .unwrap();
        env.register(
            "http://10.0.0.3:49153/setup.xml",
            info("urn:Belkin:device:sensor:1", "Hallway", "uuid:Sensor-1"),
        )
        .unwrap();
        env.register(
            "http://10.0.0.4:49153/setup.xml",
            info("urn:Belkin:device:insight:1", "Kitchen Kettle", "uuid:Insight-1"),
        )
        .unwrap();
        (env, seen)
    }

    #[test]
    fn test_callbacks_fire_once_per_device() {
        let (mut env, seen) = environment(EnvironmentConfig::default());
        env.register(
            "http://10.0.0.2:49154/setup.xml",
            info("urn:Belkin:device:controllee:1", "Living Room Lamp", "uuid:Socket-1"),
        )
        .unwrap();

        assert_eq!(
            vec!["switch Living Room Lamp", "motion Hallway", "switch Kitchen Kettle"],
            *seen.lock().unwrap()
        );
        assert_eq!(3, env.devices().len());
    }

    #[test]
    fn test_list_switches_in_discovery_order() {
        let (env, _) = environment(EnvironmentConfig::default());

        assert_eq!(vec!["Living Room Lamp", "Kitchen Kettle"], env.list_switches());
        assert_eq!(vec!["Hallway"], env.list_motions());
        assert_eq!("Hallway", env.get_motion("hall").unwrap().name());
    }

    #[test]
    fn test_get_switch_exact_and_fuzzy() {
        let (env, _) = environment(EnvironmentConfig::default());

        assert_eq!("Living Room Lamp", env.get_switch("living room lamp").unwrap().name());
        assert_eq!("Kitchen Kettle", env.get_switch("kettle").unwrap().name());
        assert_eq!("Living Room Lamp", env.get_switch("lr lamp").unwrap().name());
    }

    #[test]
    fn test_get_switch_unknown() {
        let (env, _) = environment(EnvironmentConfig::default());

        match env.get_switch("garage door") {
            Err(Error::UnknownDevice(name)) => assert_eq!("garage door", name),
            _ => panic!("expected an unknown device"),
        }
        assert!(env.get_switch("hallway").is_err());
        assert!(env.get_switch("").is_err());
    }

    #[test]
    fn test_get_switch_alias() {
        let mut aliases = BTreeMap::new();
        aliases.insert(String::from("tea"), String::from("Kitchen Kettle"));
        let (env, _) = environment(EnvironmentConfig {
            bind: None,
            aliases,
        });

        assert_eq!("Kitchen Kettle", env.get_switch("tea").unwrap().name());
    }

    #[test]
    fn test_alias_keys_ignore_case() {
        let mut aliases = BTreeMap::new();
        aliases.insert(String::from("Lamp"), String::from("Kitchen Kettle"));
        aliases.insert(String::from("lamp"), String::from("Living Room Lamp"));
        aliases.insert(String::from(" Tea "), String::from("Kitchen Kettle"));
        let (env, _) = environment(EnvironmentConfig {
            bind: None,
            aliases,
        });

        for _ in 0..10 {
            assert_eq!("Living Room Lamp", env.get_switch("LAMP").unwrap().name());
        }
        assert_eq!("Kitchen Kettle", env.get_switch("tea").unwrap().name());
    }

    #[test]
    fn test_discover_registers_responders_once() {
        let responder = UdpSocket::bind("127.0.0.1:0").unwrap();
        let target = responder.local_addr().unwrap().to_string();
        let answer = "HTTP/1.1 200 OK\r\n\
                      LOCATION: http://127.0.0.1:49153/setup.xml\r\n\
                      ST: urn:Belkin:service:basicevent:1\r\n\
                      USN: uuid:Socket-1::urn:Belkin:service:basicevent:1\r\n\r\n";
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 1024];
            // three searches per discover
            for _ in 0..6 {
                let (_, from) = responder.recv_from(&mut buf).unwrap();
                responder.send_to(answer.as_bytes(), from).unwrap();
            }
        });

        let protocol = Arc::new(ProtocolMock::new());
        for _ in 0..2 {
            protocol.push_return_value(Ok(setup_xml(
                "urn:Belkin:device:controllee:1",
                "Living Room Lamp",
                "uuid:Socket-1",
            )));
        }
        let seen = Arc::new(Mutex::new(vec![]));
        let switches = seen.clone();
        let mut env = Environment::with_protocol(
            move |s: &dyn Switch| switches.lock().unwrap().push(s.name().to_string()),
            |_: &dyn MotionSensor| {},
            EnvironmentConfig {
                bind: Some(String::from("127.0.0.1:0")),
                aliases: BTreeMap::new(),
            },
            protocol.clone(),
        );
        env.search_addr = target;

        env.start().unwrap();
        env.discover(1).unwrap();
        env.discover(1).unwrap();
        handle.join().unwrap();

        assert_eq!(vec!["Living Room Lamp"], *seen.lock().unwrap());
        assert_eq!(vec!["Living Room Lamp"], env.list_switches());
        let reqs = protocol.requests();
        assert_eq!(2, reqs.len());
        assert_eq!("http://127.0.0.1:49153/setup.xml", reqs[0].url);
    }

    #[test]
    fn test_discover_rejects_endless_scan() {
        let (mut env, _) = environment(EnvironmentConfig {
            bind: Some(String::from("127.0.0.1:0")),
            aliases: BTreeMap::new(),
        });

        env.start().unwrap();
        assert!(env.discover(u64::MAX).is_err());
        assert_eq!(3, env.devices().len());
    }

    #[test]
    fn test_discover_requires_start() {
        let (mut env, _) = environment(EnvironmentConfig::default());

        assert!(!env.is_started());
        assert!(env.discover(1).is_err());
    }
}
