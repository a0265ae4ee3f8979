use std::{
    collections::HashSet,
    io::ErrorKind,
    net::{ToSocketAddrs, UdpSocket},
    time::{Duration, Instant},
};

use rayon::prelude::*;

use crate::{
    datatypes::{DeviceInfo, SsdpResponse, BASIC_EVENT},
    error::{Error, Result},
    protocol::{DefaultProtocol, Protocol},
};

pub const SSDP_ADDR: &str = "239.255.255.250:1900";

pub fn search_request(search_target: &str, mx: u64) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\r\n",
        SSDP_ADDR, mx, search_target
    )
}

/// Keep WeMo replies, once per location
pub fn collect_responses<'a, I>(datagrams: I) -> Vec<SsdpResponse>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    datagrams
        .into_iter()
        .filter_map(SsdpResponse::parse)
        .filter(|resp| resp.is_belkin())
        .filter(|resp| seen.insert(resp.location.clone()))
        .collect()
}

pub fn bind(addr: Option<&str>) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(addr.unwrap_or("0.0.0.0:0"))?;
    socket.set_multicast_ttl_v4(2)?;
    Ok(socket)
}

/// Latest instant a scan of `timeout` may run to
pub(crate) fn deadline(timeout: Duration) -> Result<Instant> {
    Instant::now()
        .checked_add(timeout)
        .ok_or_else(|| Error::Other(format!("Scan duration too long: {}s", timeout.as_secs())))
}

/// Multicast an `M-SEARCH` on `socket` and gather replies until `timeout`
pub fn search_with_socket(socket: &UdpSocket, timeout: Duration) -> Result<Vec<SsdpResponse>> {
    search_with_socket_to(socket, SSDP_ADDR, timeout)
}

/// Send the `M-SEARCH` to `target` instead of the SSDP multicast group
pub fn search_with_socket_to<A: ToSocketAddrs + Copy>(
    socket: &UdpSocket,
    target: A,
    timeout: Duration,
) -> Result<Vec<SsdpResponse>> {
    let deadline = deadline(timeout)?;
    let mx = timeout.as_secs().max(1).min(5);
    let req = search_request(BASIC_EVENT, mx);

    for _ in 0..3 {
        socket.send_to(req.as_bytes(), target)?;
    }

    let mut buf = [0u8; 4096];
    let mut datagrams = vec![];

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        socket.set_read_timeout(Some(deadline - now))?;
        match socket.recv_from(&mut buf) {
            Ok((size, addr)) => {
                let data = String::from_utf8_lossy(&buf[0..size]).into_owned();
                log::trace!("SSDP reply from {}: {}", addr, data);
                datagrams.push(data);
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut => {
                break
            }
            Err(err) => {
                log::debug!("Stopping SSDP search early: {}", err);
                break;
            }
        }
    }

    Ok(collect_responses(datagrams.iter().map(String::as_str)))
}

pub fn search(timeout: Duration) -> Result<Vec<SsdpResponse>> {
    search_with_socket(&bind(None)?, timeout)
}

/// Fetch each responder's description in parallel, skipping those that fail
pub(crate) fn describe(
    protocol: &dyn Protocol,
    responses: &[SsdpResponse],
) -> Vec<(String, DeviceInfo)> {
    responses
        .par_iter()
        .filter_map(|resp| {
            match protocol
                .get(&resp.location)
                .and_then(|xml| DeviceInfo::from_setup_xml(&xml))
            {
                Ok(info) => Some((resp.location.clone(), info)),
                Err(err) => {
                    log::warn!("Skipping WeMo device at {}: {}", resp.location, err);
                    None
                }
            }
        })
        .collect()
}

/// Discover WeMo devices on the local network
pub fn discover(timeout: Duration) -> Result<Vec<(String, DeviceInfo)>> {
    let responses = search(timeout)?;
    Ok(describe(&DefaultProtocol::new(), &responses))
}
