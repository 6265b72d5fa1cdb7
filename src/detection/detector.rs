// Probe loop: send each probe over a transport and match what comes back
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::DetectorConfig;
use crate::detection::matcher::{PatternMatcher, RegexMatcher, ResponseMatcher};
use crate::detection::transport::{Connector, Transport};
use crate::detection::ServiceIdentity;
use crate::error::TransportError;
use crate::probes::Probe;

pub struct ServiceDetector<M: PatternMatcher = RegexMatcher> {
    config: DetectorConfig,
    matcher: ResponseMatcher<M>,
}

impl ServiceDetector<RegexMatcher> {
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_matcher(config, Arc::new(RegexMatcher::new()))
    }
}

impl<M: PatternMatcher + 'static> ServiceDetector<M> {
    pub fn with_matcher(config: DetectorConfig, matcher: Arc<M>) -> Self {
        let matcher = ResponseMatcher::new(matcher, config.max_concurrent_matches);
        Self { config, matcher }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Send `probes` in order until one response matches.
    ///
    /// A probe whose exchange fails for any reason is skipped; `None` means
    /// every probe was tried without a match.
    pub async fn identify<C: Connector>(&self, connector: &C, probes: &[Probe]) -> Option<ServiceIdentity> {
        for probe in probes {
            let response = match self.exchange(connector, probe).await {
                Ok(response) => response,
                Err(e) => {
                    debug!("Skipping probe {} against {}: {}", probe.name, connector.host(), e);
                    continue;
                }
            };
            if response.is_empty() {
                debug!("Probe {} got no response from {}", probe.name, connector.host());
                continue;
            }

            if let Some(identity) = self.matcher.match_response_concurrent(probe, &response).await {
                info!(
                    "Identified {} on {} with probe {}",
                    identity.service,
                    connector.host(),
                    probe.name
                );
                return Some(identity);
            }
        }
        None
    }

    /// Match an already captured response against `probes`, first probe
    /// with a matching rule wins.
    pub fn identify_response(&self, probes: &[Probe], response: &[u8]) -> Option<ServiceIdentity> {
        probes
            .iter()
            .find_map(|probe| self.matcher.match_response(probe, response))
    }

    /// Same as [`identify_response`](Self::identify_response), with each
    /// probe's rules evaluated concurrently. The response is cut to
    /// `read_size` first, as a live read would be.
    pub async fn identify_captured(&self, probes: &[Probe], response: &[u8]) -> Option<ServiceIdentity> {
        let response = &response[..response.len().min(self.config.read_size)];
        for probe in probes {
            if let Some(identity) = self.matcher.match_response_concurrent(probe, response).await {
                return Some(identity);
            }
        }
        None
    }

    async fn exchange<C: Connector>(&self, connector: &C, probe: &Probe) -> Result<Vec<u8>, ExchangeError> {
        let payload = probe
            .payload(Some(connector.host()))
            .map_err(|e| ExchangeError::Payload(e.to_string()))?;

        let mut conn = connector.connect(probe.protocol).await?;
        conn.send(&payload).await?;
        let response = conn
            .receive(self.config.read_size, self.config.timeout_for(probe))
            .await?;
        Ok(response)
    }
}

#[derive(Debug, thiserror::Error)]
enum ExchangeError {
    #[error("Bad payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
