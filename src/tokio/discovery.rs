//! Discover devices on the local network asynchronously
//!
use std::time::{Duration, Instant};

use ::tokio::{
    net::UdpSocket,
    time::timeout as tokio_timeout,
};

use crate::{
    datatypes::{SsdpResponse, BASIC_EVENT},
    discovery::{collect_responses, deadline, search_request, SSDP_ADDR},
    error::Result,
};

/// Search for WeMo devices on the local network
pub async fn with_timeout(timeout: Duration) -> Result<Vec<SsdpResponse>> {
    let deadline = deadline(timeout)?;
    let mut socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.set_multicast_ttl_v4(2)?;

    let req = search_request(BASIC_EVENT, timeout.as_secs().max(1).min(5));

    for _ in 0_u8..3 {
        socket.send_to(req.as_bytes(), SSDP_ADDR).await?;
    }

    let mut buf = [0_u8; 4096];
    let mut datagrams = vec![];

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        match tokio_timeout(deadline - now, socket.recv_from(&mut buf)).await {
            Ok(Ok((size, _addr))) => {
                datagrams.push(String::from_utf8_lossy(&buf[0..size]).into_owned());
            }
            Ok(Err(err)) => {
                log::debug!("Stopping SSDP search early: {}", err);
                break;
            }
            Err(_elapsed) => break,
        }
    }

    Ok(collect_responses(datagrams.iter().map(String::as_str)))
}

/// Search for WeMo devices on the local network
///
/// Uses the default timeout of 5 seconds.
pub async fn search() -> Result<Vec<SsdpResponse>> {
    with_timeout(Duration::from_secs(5)).await
}
