use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result, SoapFault};

#[cfg(test)]
use std::collections::VecDeque;

const ENVELOPE_OPEN: &str = concat!(
    r#"<?xml version="1.0" encoding="utf-8"?>"#,
    r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" "#,
    r#"s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body>"#,
);
const ENVELOPE_CLOSE: &str = "</s:Body></s:Envelope>";

// Build the SOAP envelope for a UPnP action call
pub fn envelope(service_type: &str, action: &str, args: &[(&str, &str)]) -> String {
    let mut body = String::from(ENVELOPE_OPEN);
    body.push_str(&format!(r#"<u:{} xmlns:u="{}">"#, action, service_type));
    for (name, value) in args {
        body.push_str(&format!("<{0}>{1}</{0}>", name, escape(value)));
    }
    body.push_str(&format!("</u:{}>", action));
    body.push_str(ENVELOPE_CLOSE);
    body
}

// Element patterns, compiled once per tag name
static TAG_PATTERNS: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn tag_pattern(tag: &str) -> Option<Regex> {
    let mut patterns = TAG_PATTERNS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(re) = patterns.get(tag) {
        return Some(re.clone());
    }
    let re = Regex::new(&format!(
        r"(?s)<(?:[\w.-]+:)?{0}(?:\s[^>]*)?>(.*?)</(?:[\w.-]+:)?{0}>",
        regex::escape(tag)
    ))
    .ok()?;
    patterns.insert(tag.to_string(), re.clone());
    Some(re)
}

/// Value of the first element named `tag`, ignoring any namespace prefix
pub fn extract(xml: &str, tag: &str) -> Option<String> {
    tag_pattern(tag)?
        .captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|m| unescape(m.as_str().trim()))
}

pub fn parse_fault(xml: &str) -> Option<SoapFault> {
    if !xml.contains("Fault>") {
        return None;
    }
    let code = extract(xml, "errorCode")
        .or_else(|| extract(xml, "faultcode"))
        .unwrap_or_default();
    let description = extract(xml, "errorDescription")
        .or_else(|| extract(xml, "faultstring"))
        .unwrap_or_default();
    Some(SoapFault { code, description })
}

/// `http://host:port` part of a description `LOCATION` url
pub fn base_url(location: &str) -> Result<String> {
    let scheme_end = location
        .find("://")
        .ok_or_else(|| Error::Other(format!("Not a device location: {}", location)))?;
    let authority = &location[scheme_end + 3..];
    let host_end = authority.find('/').unwrap_or_else(|| authority.len());
    if host_end == 0 {
        return Err(Error::Other(format!("Not a device location: {}", location)));
    }
    Ok(location[..scheme_end + 3 + host_end].to_string())
}

pub fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub trait Protocol: Send + Sync {
    /// Fetch a document such as a device's `setup.xml`
    fn get(&self, url: &str) -> Result<String>;

    /// Invoke a SOAP action and return the raw response body
    fn call(&self, url: &str, service_type: &str, action: &str, args: &[(&str, &str)])
        -> Result<String>;
}

pub struct DefaultProtocol {
    agent: ureq::Agent,
}

impl DefaultProtocol {
    pub fn new() -> DefaultProtocol {
        DefaultProtocol {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::new(5, 0))
                .build(),
        }
    }
}

impl Default for DefaultProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for DefaultProtocol {
    fn get(&self, url: &str) -> Result<String> {
        Ok(self.agent.get(url).call()?.into_string()?)
    }

    fn call(
        &self,
        url: &str,
        service_type: &str,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<String> {
        let payload = envelope(service_type, action, args);
        log::debug!("SOAP {}#{} -> {}", service_type, action, url);

        let response = self
            .agent
            .post(url)
            .set("Content-Type", r#"text/xml; charset="utf-8""#)
            .set("SOAPACTION", &format!(r#""{}#{}""#, service_type, action))
            .send_string(&payload);

        match response {
            Ok(response) => Ok(response.into_string()?),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string()?;
                match parse_fault(&body) {
                    Some(fault) => Err(Error::from(fault)),
                    None => Err(Error::Other(format!(
                        "{} failed with HTTP status {}",
                        action, status
                    ))),
                }
            }
            Err(err) => Err(Error::from(err)),
        }
    }
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub struct MockRequest {
    pub url: String,
    pub action: Option<String>,
    pub args: Vec<(String, String)>,
}

#[cfg(test)]
pub struct ProtocolMock {
    reqs: Mutex<Vec<MockRequest>>,
    resps: Mutex<VecDeque<Result<String>>>,
}

#[cfg(test)]
impl ProtocolMock {
    pub fn new() -> ProtocolMock {
        ProtocolMock {
            reqs: Mutex::new(vec![]),
            resps: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_return_value(&self, resp: Result<String>) {
        self.resps.lock().unwrap().push_back(resp);
    }

    pub fn requests(&self) -> Vec<MockRequest> {
        self.reqs.lock().unwrap().clone()
    }

    fn next(&self, req: MockRequest) -> Result<String> {
        self.reqs.lock().unwrap().push(req);
        self.resps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::from("")))
    }
}

#[cfg(test)]
impl Protocol for ProtocolMock {
    fn get(&self, url: &str) -> Result<String> {
        self.next(MockRequest {
            url: url.to_string(),
            action: None,
            args: vec![],
        })
    }

    fn call(
        &self,
        url: &str,
        _service_type: &str,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<String> {
        self.next(MockRequest {
            url: url.to_string(),
            action: Some(action.to_string()),
            args: args
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }
}
