use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::rate_limit::RateLimiter;

/// Attempts one TCP handshake and returns the connect time when it succeeds.
///
/// Refusals, resets and timeouts all count as failure.
pub async fn handshake_probe(socket_addr: SocketAddr, probe_timeout: Duration) -> Option<Duration> {
    let started = Instant::now();
    match timeout(probe_timeout, TcpStream::connect(socket_addr)).await {
        Ok(Ok(_stream)) => Some(started.elapsed()),
        Ok(Err(_)) | Err(_) => None,
    }
}

/// Races handshakes against `ports` and returns the first port to accept.
///
/// Every attempt takes a token from `limiter` before connecting. Remaining
/// attempts are aborted once one succeeds.
pub async fn first_open(
    addr: IpAddr,
    ports: &[u16],
    probe_timeout: Duration,
    limiter: Arc<RateLimiter>,
) -> Option<(u16, Duration)> {
    let mut attempts: JoinSet<Option<(u16, Duration)>> = JoinSet::new();

    for &port in ports {
        let limiter = limiter.clone();
        attempts.spawn(async move {
            limiter.acquire(1).await;
            handshake_probe(SocketAddr::new(addr, port), probe_timeout)
                .await
                .map(|rtt| (port, rtt))
        });
    }

    while let Some(joined) = attempts.join_next().await {
        if let Ok(Some(found)) = joined {
            attempts.abort_all();
            return Some(found);
        }
    }
    None
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn handshake_probe_should_find_listening_port() {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let rtt = handshake_probe(addr, Duration::from_millis(500)).await;
        assert!(rtt.is_some());
    }

    #[tokio::test]
    async fn handshake_probe_should_fail_on_closed_port() {
        let port = closed_port().await;
        let rtt = handshake_probe(SocketAddr::new(LOCALHOST, port), Duration::from_millis(500)).await;
        assert!(rtt.is_none());
    }

    #[tokio::test]
    async fn first_open_picks_the_listening_port() {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let open = listener.local_addr().unwrap().port();
        let closed = closed_port().await;
        let limiter = Arc::new(RateLimiter::unlimited());

        let found = first_open(LOCALHOST, &[closed, open], Duration::from_millis(500), limiter.clone()).await;
        assert_eq!(found.map(|(port, _)| port), Some(open));
        assert!(limiter.stats().total_requests >= 1);
    }

    #[tokio::test]
    async fn first_open_is_none_when_all_closed() {
        let closed = closed_port().await;
        let limiter = Arc::new(RateLimiter::unlimited());
        let found = first_open(LOCALHOST, &[closed], Duration::from_millis(300), limiter.clone()).await;
        assert!(found.is_none());
        assert_eq!(limiter.stats().total_requests, 1);
    }
}
