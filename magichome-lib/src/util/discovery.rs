use std::cmp::max;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::time::Duration;

use derivative::Derivative;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

use crate::config::DiscoveryConfig;
use crate::control_interface::DeviceAddress;
use crate::error::Result;

/// Broadcast by the scanner. The sender may receive its own broadcast back,
/// which must be skipped.
pub const DISCOVERY_TOKEN: &[u8] = b"HF-A11ASSISTHREAD";

/// A controller that answered a discovery broadcast.
///
/// Two replies name the same device when ip and id agree. The model string
/// does not take part in comparisons.
#[derive(Derivative)]
#[derivative(Hash, PartialEq, Eq)]
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredDevice {
    pub ip: Ipv4Addr,
    pub id: String,
    #[derivative(Hash = "ignore", PartialEq = "ignore")]
    pub model: String,
}

impl DiscoveredDevice {
    pub fn new(ip: Ipv4Addr, id: &str, model: &str) -> Self {
        DiscoveredDevice {
            ip,
            id: id.to_string(),
            model: model.to_string(),
        }
    }

    pub fn into_address(self, port: u16) -> DeviceAddress {
        DeviceAddress {
            ip: self.ip,
            port,
            id: self.id,
            model: self.model,
        }
    }
}

impl Display for DiscoveredDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (ID: {}, Model: {})", self.ip, self.id, self.model)
    }
}

pub struct Discovery;

impl Discovery {
    /// Parses one `ip,id,model` reply. Returns `None` for anything else,
    /// including the echoed token.
    pub fn decode_discovery_response(data: &[u8]) -> Option<DiscoveredDevice> {
        if data == DISCOVERY_TOKEN {
            return None;
        }
        let text = std::str::from_utf8(data).ok()?;
        let text = text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());

        let mut fields = text.splitn(3, ',');
        let ip = fields.next()?.trim().parse::<Ipv4Addr>().ok()?;
        let id = fields.next()?.trim();
        let model = fields.next()?.trim();
        if id.is_empty() {
            return None;
        }

        Some(DiscoveredDevice::new(ip, id, model))
    }

    /// Scans with the default socket settings.
    pub async fn find_devices(given_timeout: Duration) -> Result<Vec<DiscoveredDevice>> {
        Self::scan(&DiscoveryConfig::default(), given_timeout).await
    }

    /**
    Broadcasts the discovery token and collects replies until `given_timeout`
    has elapsed.

    The token is sent again every time a receive wait passes without a reply,
    so controllers that missed the first broadcast still get a chance to
    answer. Devices are returned in the order their first reply arrived, each
    (ip, id) pair once. Finding nothing is not an error.
     */
    pub async fn scan(
        config: &DiscoveryConfig,
        given_timeout: Duration,
    ) -> Result<Vec<DiscoveredDevice>> {
        let socket = UdpSocket::bind(config.bind_address).await?;
        socket.set_broadcast(true)?;

        let mut discovered_devices = Vec::new();
        let mut seen = HashSet::<DiscoveredDevice>::new();
        let mut buffer = [0; 1024];

        let timeout_end = Instant::now() + given_timeout;

        'scan: while Instant::now() < timeout_end {
            debug!("Broadcasting discovery token to {}", config.target_address);
            socket
                .send_to(DISCOVERY_TOKEN, config.target_address)
                .await?;

            loop {
                let remaining_time = timeout_end.saturating_duration_since(Instant::now());
                if remaining_time.is_zero() {
                    break 'scan;
                }
                let wait = remaining_time.min(config.receive_wait());

                match timeout(wait, socket.recv_from(&mut buffer)).await {
                    Ok(Ok((number_of_bytes, src_addr))) => {
                        let received_data = &buffer[..number_of_bytes];
                        if received_data == DISCOVERY_TOKEN {
                            continue;
                        }
                        let Some(device) = Self::decode_discovery_response(received_data) else {
                            debug!("Ignoring unrecognized reply from {}", src_addr);
                            continue;
                        };
                        if seen.contains(&device) {
                            debug!("Found device {} again, skipping", device);
                            continue;
                        }
                        info!("Found device: {}", device);
                        seen.insert(device.clone());
                        discovered_devices.push(device);
                    }
                    Ok(Err(e)) => {
                        warn!("Failed to receive discovery response: {}", e);
                        break 'scan;
                    }
                    // quiet period, broadcast again
                    Err(_) => break,
                }
            }
        }

        info!(
            "Discovery finished with {} device(s)",
            discovered_devices.len()
        );
        Ok(discovered_devices)
    }

    /// Looks up a device by id, ignoring case.
    pub fn find_by_id<'a>(
        devices: &'a [DiscoveredDevice],
        id: &str,
    ) -> Option<&'a DiscoveredDevice> {
        devices.iter().find(|device| device.id.eq_ignore_ascii_case(id))
    }

    pub fn pretty_print_devices(devices: &[DiscoveredDevice]) {
        // Determine the maximum width for each column
        let max_ip_width = devices
            .iter()
            .map(|d| max(d.ip.to_string().len(), 10))
            .max()
            .unwrap_or(10);
        let max_id_width = devices
            .iter()
            .map(|d| max(d.id.len(), 9))
            .max()
            .unwrap_or(9);
        let max_model_width = devices
            .iter()
            .map(|d| max(d.model.len(), 5))
            .max()
            .unwrap_or(5);

        println!(
            "{:<ip_width$} {:<id_width$} {:<model_width$}",
            "IP Address",
            "Device ID",
            "Model",
            ip_width = max_ip_width + 2,
            id_width = max_id_width + 2,
            model_width = max_model_width + 2,
        );

        println!(
            "{:<ip_width$} {:<id_width$} {:<model_width$}",
            "-".repeat(max_ip_width),
            "-".repeat(max_id_width),
            "-".repeat(max_model_width),
            ip_width = max_ip_width + 2,
            id_width = max_id_width + 2,
            model_width = max_model_width + 2,
        );

        for device in devices {
            println!(
                "{:<ip_width$} {:<id_width$} {:<model_width$}",
                device.ip,
                device.id,
                device.model,
                ip_width = max_ip_width + 2,
                id_width = max_id_width + 2,
                model_width = max_model_width + 2,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    async fn loopback_config(responder: &UdpSocket) -> DiscoveryConfig {
        let _ = env_logger::builder().is_test(true).try_init();
        DiscoveryConfig {
            bind_address: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            target_address: responder.local_addr().unwrap(),
            receive_wait_ms: 200,
        }
    }

    #[test]
    fn test_decode_discovery_response() {
        let device = Discovery::decode_discovery_response(b"192.168.1.40,ACCF23A1B2C3,AK001-ZJ100")
            .unwrap();
        assert_eq!(device.ip, Ipv4Addr::new(192, 168, 1, 40));
        assert_eq!(device.id, "ACCF23A1B2C3");
        assert_eq!(device.model, "AK001-ZJ100");

        let padded = Discovery::decode_discovery_response(b"10.0.0.5,ABCDEF,HF-LPB100\r\n\0");
        assert_eq!(padded.map(|d| d.model), Some("HF-LPB100".to_string()));
    }

    #[test]
    fn test_decode_rejects_noise() {
        assert!(Discovery::decode_discovery_response(DISCOVERY_TOKEN).is_none());
        assert!(Discovery::decode_discovery_response(b"+ok").is_none());
        assert!(Discovery::decode_discovery_response(b"not-an-ip,ABC,model").is_none());
        assert!(Discovery::decode_discovery_response(b"10.0.0.5,ABC").is_none());
        assert!(Discovery::decode_discovery_response(&[0xff, 0xfe, 0x2c]).is_none());
    }

    #[test]
    fn test_model_ignored_in_comparisons() {
        let a = DiscoveredDevice::new(Ipv4Addr::new(10, 0, 0, 5), "ABCDEF", "AK001");
        let b = DiscoveredDevice::new(Ipv4Addr::new(10, 0, 0, 5), "ABCDEF", "");
        let c = DiscoveredDevice::new(Ipv4Addr::new(10, 0, 0, 6), "ABCDEF", "AK001");
        assert_eq!(a, b);
        assert_ne!(a, c);
        let set: HashSet<DiscoveredDevice> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_find_by_id() {
        let devices = vec![
            DiscoveredDevice::new(Ipv4Addr::new(10, 0, 0, 5), "ABCDEF", "AK001"),
            DiscoveredDevice::new(Ipv4Addr::new(10, 0, 0, 6), "123456", "AK001"),
        ];
        let found = Discovery::find_by_id(&devices, "abcdef").unwrap();
        assert_eq!(found.ip, Ipv4Addr::new(10, 0, 0, 5));
        assert!(Discovery::find_by_id(&devices, "000000").is_none());
    }

    #[tokio::test]
    async fn test_scan_collects_single_device() {
        let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = loopback_config(&responder).await;

        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            loop {
                let Ok((n, src)) = responder.recv_from(&mut buf).await else {
                    break;
                };
                assert_eq!(&buf[..n], DISCOVERY_TOKEN);
                // echo, then answer twice
                responder.send_to(DISCOVERY_TOKEN, src).await.unwrap();
                responder.send_to(b"10.0.0.5,ABCDEF,AK001", src).await.unwrap();
                responder.send_to(b"10.0.0.5,ABCDEF,AK001", src).await.unwrap();
            }
        });

        let started = Instant::now();
        let devices = Discovery::scan(&config, Duration::from_secs(2)).await.unwrap();
        let elapsed = started.elapsed();
        handle.abort();

        assert_eq!(
            devices,
            vec![DiscoveredDevice::new(Ipv4Addr::new(10, 0, 0, 5), "ABCDEF", "AK001")]
        );
        assert_eq!(devices[0].model, "AK001");
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_millis(2500), "scan overran: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_scan_rebroadcasts_until_answered() {
        let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = loopback_config(&responder).await;

        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            // ignore the first broadcast
            let _ = responder.recv_from(&mut buf).await.unwrap();
            let (_, src) = responder.recv_from(&mut buf).await.unwrap();
            responder.send_to(b"10.0.0.9,C0FFEE,AK001", src).await.unwrap();
        });

        let devices = Discovery::scan(&config, Duration::from_secs(1)).await.unwrap();
        handle.abort();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "C0FFEE");
    }

    #[tokio::test]
    async fn test_scan_without_devices() {
        let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = loopback_config(&responder).await;

        let devices = Discovery::scan(&config, Duration::from_millis(300)).await.unwrap();
        assert!(devices.is_empty());
    }
}
