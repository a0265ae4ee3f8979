use crate::{
    datatypes::{BinaryState, DeviceInfo, InsightParams, Service},
    error::{Error, Result},
    protocol::extract,
};

fn response_value(response: &str, tag: &str) -> Result<String> {
    extract(response, tag).ok_or_else(|| Error::Other(format!("No <{}> in device response", tag)))
}

pub trait DeviceActions {
    /// Description captured when the device was discovered
    fn info(&self) -> &DeviceInfo;

    /// Invoke a SOAP action on one of the device's services and return the raw response
    fn send(&self, service: Service, action: &str, args: &[(&str, &str)]) -> Result<String>;

    /// Name the device was discovered with
    fn name(&self) -> &str {
        &self.info().friendly_name
    }

    fn friendly_name(&self) -> Result<String> {
        let response = self.send(Service::BasicEvent, "GetFriendlyName", &[])?;
        response_value(&response, "FriendlyName")
    }

    fn set_friendly_name(&self, name: &str) -> Result<()> {
        self.send(Service::BasicEvent, "ChangeFriendlyName", &[("FriendlyName", name)])?;
        Ok(())
    }
}

pub trait Switch: DeviceActions {
    fn get_state(&self) -> Result<BinaryState> {
        let response = self.send(Service::BasicEvent, "GetBinaryState", &[])?;
        BinaryState::parse(&response_value(&response, "BinaryState")?)
    }

    fn is_on(&self) -> Result<bool> {
        Ok(self.get_state()?.is_on())
    }

    fn is_off(&self) -> Result<bool> {
        Ok(!self.is_on()?)
    }

    fn switch_on(&self) -> Result<()> {
        self.send(Service::BasicEvent, "SetBinaryState", &[("BinaryState", "1")])?;
        Ok(())
    }

    fn switch_off(&self) -> Result<()> {
        self.send(Service::BasicEvent, "SetBinaryState", &[("BinaryState", "0")])?;
        Ok(())
    }

    /// Flip the relay and return whether it is now on
    fn toggle(&self) -> Result<bool> {
        if self.is_on()? {
            self.switch_off()?;
            Ok(false)
        } else {
            self.switch_on()?;
            Ok(true)
        }
    }
}

pub trait Insight: Switch {
    fn insight_params(&self) -> Result<InsightParams> {
        let response = self.send(Service::Insight, "GetInsightParams", &[])?;
        InsightParams::parse(&response_value(&response, "InsightParams")?)
    }

    /// Instantaneous draw in watts
    fn current_power(&self) -> Result<f64> {
        Ok(self.insight_params()?.current_power_mw / 1000.0)
    }

    fn today_kwh(&self) -> Result<f64> {
        Ok(self.insight_params()?.today_kwh())
    }
}

pub trait MotionSensor: DeviceActions {
    fn motion_detected(&self) -> Result<bool> {
        let response = self.send(Service::BasicEvent, "GetBinaryState", &[])?;
        Ok(BinaryState::parse(&response_value(&response, "BinaryState")?)?.is_on())
    }
}
