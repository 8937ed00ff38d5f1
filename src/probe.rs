use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use surge_ping::{Client, Config, PingIdentifier, PingSequence, ICMP};
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time;

use crate::log::EventSink;
use crate::store::{ResultStore, StoreError};
use crate::types::Target;

/// Echo requests sent per liveness check.
const PING_ATTEMPTS: u16 = 4;
/// Spacing between echo requests.
const PING_INTERVAL: Duration = Duration::from_millis(800);
/// 56 data bytes, like classic ping.
const PING_PAYLOAD: [u8; 56] = [0; 56];

/// Probe one target: ICMP liveness first, then TCP/HTTP port
/// classification when the target answered and scanning was requested.
///
/// All network failures are absorbed here and recorded as `Unreachable`
/// or `closed`. Only store faults (programming errors) surface, and the
/// orchestrator contains those per target.
pub async fn probe_target(
    store: &ResultStore,
    sink: &Arc<dyn EventSink>,
    target: &Target,
    timeout: Duration,
) -> Result<(), StoreError> {
    let alive = match resolve(&target.address).await {
        Some(ip) => ping_host(sink, &target.address, ip, timeout).await,
        None => {
            sink.error(&format!("[ping]: cannot resolve {}", target.address));
            false
        }
    };
    store.set_reachability(&target.name, alive).await?;
    if !alive {
        return Ok(());
    }

    if target.scan && !target.ports.is_empty() {
        sink.notify(&format!(
            "checking port status on {} on ports: {:?}",
            target.address, target.ports
        ));
        scan_ports(store, sink, target, timeout).await?;
    }
    Ok(())
}

/// Resolve an address string to an IP, accepting literals and hostnames.
async fn resolve(address: &str) -> Option<IpAddr> {
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Some(ip);
    }
    // lookup_host wants a port; any value does for resolution.
    tokio::net::lookup_host((address, 0u16))
        .await
        .ok()?
        .next()
        .map(|sa| sa.ip())
}

/// Build an ICMP client: privileged raw socket first, unprivileged
/// datagram socket when raw sockets are not permitted. When neither can
/// be opened the caller fails closed instead of tearing down the round.
fn icmp_client(kind: ICMP) -> std::io::Result<Client> {
    let raw = Config::builder()
        .kind(kind)
        .sock_type_hint(socket2::Type::RAW)
        .build();
    match Client::new(&raw) {
        Ok(client) => Ok(client),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            let dgram = Config::builder()
                .kind(kind)
                .sock_type_hint(socket2::Type::DGRAM)
                .build();
            Client::new(&dgram)
        }
        Err(e) => Err(e),
    }
}

/// Send up to `PING_ATTEMPTS` echo requests, each bounded by `timeout`,
/// and report liveness. At least one reply means reachable; the loss
/// percentage is diagnostics only and never drives the decision. A host
/// that stayed silent through two requests is given up on early.
async fn ping_host(
    sink: &Arc<dyn EventSink>,
    address: &str,
    ip: IpAddr,
    timeout: Duration,
) -> bool {
    let kind = if ip.is_ipv4() { ICMP::V4 } else { ICMP::V6 };
    let client = match icmp_client(kind) {
        Ok(client) => client,
        Err(e) => {
            sink.error(&format!(
                "[ping]: no usable ICMP socket for {address}: {e}"
            ));
            return false;
        }
    };

    let mut pinger = client.pinger(ip, PingIdentifier(0x5748)).await;
    pinger.timeout(timeout);

    let mut sent = 0u16;
    let mut received = 0u16;
    for seq in 0..PING_ATTEMPTS {
        sent += 1;
        if pinger.ping(PingSequence(seq), &PING_PAYLOAD).await.is_ok() {
            received += 1;
        }
        if received == 0 && sent == 2 {
            break;
        }
        if seq + 1 < PING_ATTEMPTS {
            time::sleep(PING_INTERVAL).await;
        }
    }

    let loss = 100.0 * (1.0 - f64::from(received) / f64::from(sent));
    sink.notify(&format!(
        "pinged {address} ({ip}): sent={sent} received={received} loss={loss:.2}%"
    ));

    if received > 0 {
        sink.write(&format!("[ping]: {address} is up!"));
        true
    } else {
        sink.error(&format!("[ping]: {address} responded with 0 packets"));
        false
    }
}

/// Classify every declared port concurrently. Each port stands alone: a
/// failure on one becomes `closed` for that port and the rest carry on.
async fn scan_ports(
    store: &ResultStore,
    sink: &Arc<dyn EventSink>,
    target: &Target,
    timeout: Duration,
) -> Result<(), StoreError> {
    let http = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => Some(client),
        Err(e) => {
            sink.error(&format!(
                "[http]: client setup failed for {}: {e}",
                target.address
            ));
            None
        }
    };

    let mut set: JoinSet<(u16, bool)> = JoinSet::new();
    for &port in &target.ports {
        let address = target.address.clone();
        let sink = Arc::clone(sink);
        let http = http.clone();
        set.spawn(async move {
            let open = classify_port(&sink, http.as_ref(), &address, port, timeout).await;
            (port, open)
        });
    }

    while let Some(joined) = set.join_next().await {
        let Ok((port, open)) = joined else { continue };
        if open {
            sink.write(&format!(
                "[ports]: connected to {port} on {}!",
                target.address
            ));
            store.add_open_port(&target.name, port).await?;
        } else {
            sink.error(&format!(
                "[ports]: unable to connect to {port} on {}...",
                target.address
            ));
            store.add_closed_port(&target.name, port).await?;
        }
    }
    Ok(())
}

/// TCP connect first; when that fails, an HTTP GET gets the last word.
async fn classify_port(
    sink: &Arc<dyn EventSink>,
    http: Option<&reqwest::Client>,
    address: &str,
    port: u16,
    timeout: Duration,
) -> bool {
    if tcp_connect(address, port, timeout).await {
        return true;
    }
    http_probe(sink, http, address, port).await
}

async fn tcp_connect(address: &str, port: u16, timeout: Duration) -> bool {
    matches!(
        time::timeout(timeout, TcpStream::connect((address, port))).await,
        Ok(Ok(_))
    )
}

/// Any HTTP response at all counts as open, a 404 included; only a
/// connection error or timeout classifies the port closed.
async fn http_probe(
    sink: &Arc<dyn EventSink>,
    http: Option<&reqwest::Client>,
    address: &str,
    port: u16,
) -> bool {
    let Some(client) = http else { return false };
    sink.notify(&format!(
        "attempting to connect via http to {address} on port {port}..."
    ));
    match client.get(format!("http://{address}:{port}")).send().await {
        Ok(response) => {
            sink.write(&format!(
                "[http]: able to connect via http to {address}:{port}, status={}",
                response.status()
            ));
            true
        }
        Err(e) if e.is_timeout() => {
            sink.error(&format!(
                "[http]: connection timed out for {address} on port {port}"
            ));
            false
        }
        Err(_) => {
            sink.error(&format!(
                "[http]: unable to reach {address} on port {port}"
            ));
            false
        }
    }
}
