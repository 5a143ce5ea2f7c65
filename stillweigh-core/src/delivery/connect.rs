//! Establishing the delivery channel

use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;

use super::channel::{DeliveryChannel, DeliveryResult};
use crate::config::{DeliveryConfig, LinkMode};
use crate::traits::{PeerEndpoint, PeerLink, ServiceUuid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectError {
    /// Discovery found no peer and no fallback is configured
    ServiceNotFound,
    /// The link refused or failed the connection
    ConnectFailed,
    /// No inbound connection before the deadline
    Timeout,
}

impl From<ConnectError> for DeliveryResult {
    fn from(e: ConnectError) -> Self {
        match e {
            ConnectError::ServiceNotFound => DeliveryResult::ServiceNotFound,
            ConnectError::ConnectFailed | ConnectError::Timeout => DeliveryResult::TransportError,
        }
    }
}

/// Resolve a peer offering `service` and connect to it
///
/// Discovery wins when it finds a peer; otherwise `fallback` is used.
pub async fn connect_outbound<L: PeerLink>(
    link: &mut L,
    service: &ServiceUuid,
    fallback: Option<&PeerEndpoint>,
) -> Result<DeliveryChannel<L::Transport>, ConnectError> {
    let discovered = match link.find_service(service).await {
        Ok(found) => found,
        Err(e) => {
            warn!("Service discovery failed: {:?}", e);
            None
        }
    };

    let endpoint = match (discovered, fallback) {
        (Some(endpoint), _) => endpoint,
        (None, Some(endpoint)) => {
            info!("No peer discovered, using fallback endpoint");
            *endpoint
        }
        (None, None) => return Err(ConnectError::ServiceNotFound),
    };

    info!(
        "Connecting to {:?} channel {}",
        endpoint.address, endpoint.channel
    );
    let transport = link.connect(&endpoint).await.map_err(|e| {
        warn!("Connect failed: {:?}", e);
        ConnectError::ConnectFailed
    })?;
    Ok(DeliveryChannel::new(transport))
}

/// Wait up to `timeout_ms` for a peer to connect to `service`
pub async fn accept_inbound<L, D>(
    link: &mut L,
    service: &ServiceUuid,
    delay: &mut D,
    timeout_ms: u32,
) -> Result<DeliveryChannel<L::Transport>, ConnectError>
where
    L: PeerLink,
    D: DelayNs,
{
    match select(link.accept(service), delay.delay_ms(timeout_ms)).await {
        Either::First(Ok(transport)) => {
            info!("Peer connected");
            Ok(DeliveryChannel::new(transport))
        }
        Either::First(Err(e)) => {
            warn!("Accept failed: {:?}", e);
            Err(ConnectError::ConnectFailed)
        }
        Either::Second(()) => Err(ConnectError::Timeout),
    }
}

/// Open the channel the configuration asks for, with optional handshake
///
/// A handshake that times out or is refused is logged and the channel kept;
/// a transport fault during the handshake releases the link.
pub async fn establish<L, D>(
    link: &mut L,
    config: &DeliveryConfig,
    delay: &mut D,
) -> Result<DeliveryChannel<L::Transport>, ConnectError>
where
    L: PeerLink,
    D: DelayNs,
{
    let mut channel = match config.mode {
        LinkMode::Outbound => {
            connect_outbound(link, &config.service, config.fallback.as_ref()).await?
        }
        LinkMode::Inbound => {
            accept_inbound(link, &config.service, delay, config.accept_timeout_ms).await?
        }
    };

    if !config.handshake {
        return Ok(channel);
    }

    let handshake = match config.mode {
        LinkMode::Outbound => channel.request_sync(config.ack_timeout_ms, delay).await,
        LinkMode::Inbound => channel.answer_sync(config.ack_timeout_ms, delay).await,
    };

    match handshake {
        DeliveryResult::Confirmed => {
            info!("Sync handshake complete");
            Ok(channel)
        }
        DeliveryResult::TransportError => {
            warn!("Link dropped during handshake");
            link.release(channel.into_transport()).await;
            Err(ConnectError::ConnectFailed)
        }
        other => {
            warn!("Sync handshake incomplete: {:?}", other);
            Ok(channel)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, MockLink, MockTransport, Rx, StepDelay};
    use crate::traits::{BdAddr, LinkError};
    use embassy_futures::block_on;

    const DISCOVERED: PeerEndpoint = PeerEndpoint {
        address: BdAddr([1, 2, 3, 4, 5, 6]),
        channel: 4,
    };
    const FALLBACK: PeerEndpoint = PeerEndpoint {
        address: BdAddr([9, 9, 9, 9, 9, 9]),
        channel: 1,
    };

    #[test]
    fn test_discovery_preferred_over_fallback() {
        let mut link = MockLink::new([MockTransport::silent()]);
        link.discovery = Ok(Some(DISCOVERED));
        let result = block_on(connect_outbound(
            &mut link,
            &ServiceUuid::WEIGHT_REPORT,
            Some(&FALLBACK),
        ));
        assert!(result.is_ok());
        assert_eq!(link.connected_to, [DISCOVERED]);
    }

    #[test]
    fn test_fallback_when_nothing_discovered() {
        let mut link = MockLink::new([MockTransport::silent()]);
        link.discovery = Err(LinkError::NoResponse);
        let result = block_on(connect_outbound(
            &mut link,
            &ServiceUuid::WEIGHT_REPORT,
            Some(&FALLBACK),
        ));
        assert!(result.is_ok());
        assert_eq!(link.connected_to, [FALLBACK]);
    }

    #[test]
    fn test_service_not_found() {
        let mut link = MockLink::new([]);
        let result = block_on(connect_outbound(&mut link, &ServiceUuid::WEIGHT_REPORT, None));
        assert_eq!(result.err(), Some(ConnectError::ServiceNotFound));
        assert_eq!(
            DeliveryResult::from(ConnectError::ServiceNotFound),
            DeliveryResult::ServiceNotFound
        );
    }

    #[test]
    fn test_connect_failed() {
        let mut link = MockLink::new([]);
        link.discovery = Ok(Some(DISCOVERED));
        link.connect_error = Some(LinkError::ConnectFailed);
        let result = block_on(connect_outbound(&mut link, &ServiceUuid::WEIGHT_REPORT, None));
        assert_eq!(result.err(), Some(ConnectError::ConnectFailed));
    }

    #[test]
    fn test_accept_timeout() {
        let clock = ManualClock::new();
        let mut delay = StepDelay::new(&clock);
        let mut link = MockLink::new([]);
        link.accept_pends = true;
        let result = block_on(accept_inbound(
            &mut link,
            &ServiceUuid::WEIGHT_REPORT,
            &mut delay,
            10_000,
        ));
        assert_eq!(result.err(), Some(ConnectError::Timeout));
        assert_eq!(clock.now(), 10_000);
    }

    #[test]
    fn test_establish_inbound_answers_sync() {
        let clock = ManualClock::new();
        let mut delay = StepDelay::new(&clock);
        let mut link = MockLink::new([MockTransport::new([Rx::Data(b"Sync")])]);
        let channel = block_on(establish(&mut link, &DeliveryConfig::default(), &mut delay)).unwrap();
        assert_eq!(channel.transport().sent(), "Sync Confirmed\n");
        assert_eq!(link.accepts, 1);
    }

    #[test]
    fn test_establish_keeps_channel_when_peer_skips_sync() {
        let clock = ManualClock::new();
        let mut delay = StepDelay::new(&clock);
        let mut link = MockLink::new([MockTransport::silent()]);
        let result = block_on(establish(&mut link, &DeliveryConfig::default(), &mut delay));
        assert!(result.is_ok());
    }

    #[test]
    fn test_establish_releases_on_drop_during_handshake() {
        let clock = ManualClock::new();
        let mut delay = StepDelay::new(&clock);
        let mut link = MockLink::new([MockTransport::new([Rx::Eof])]);
        let config = DeliveryConfig {
            mode: LinkMode::Outbound,
            fallback: Some(FALLBACK),
            ..DeliveryConfig::default()
        };
        let result = block_on(establish(&mut link, &config, &mut delay));
        assert_eq!(result.err(), Some(ConnectError::ConnectFailed));
        assert_eq!(link.released.len(), 1);
        assert_eq!(link.released[0].sent(), "Sync\n");
    }
}
