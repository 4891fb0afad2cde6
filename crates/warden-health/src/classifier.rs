//! Reduces probe results to a single [`HealthState`].

use std::collections::BTreeMap;

use warden_core::{ConfigError, HealthState, PortProbeResult};

/// Fixed classification policy over the configured ports.
///
/// 1. No port available → `Unhealthy`.
/// 2. Every port available and HTTP healthy → `Healthy`.
/// 3. Main port available → `Degraded`.
/// 4. Otherwise → `Unhealthy`.
#[derive(Debug, Clone)]
pub struct HealthClassifier {
    ports: Vec<u16>,
    main_port: u16,
}

impl HealthClassifier {
    /// Fails when `ports` is empty; there is nothing to classify.
    pub fn new(ports: Vec<u16>, main_port: u16) -> Result<Self, ConfigError> {
        let mut unique = Vec::with_capacity(ports.len());
        for port in ports {
            if !unique.contains(&port) {
                unique.push(port);
            }
        }
        if unique.is_empty() {
            return Err(ConfigError::NoPorts);
        }
        Ok(Self {
            ports: unique,
            main_port,
        })
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn main_port(&self) -> u16 {
        self.main_port
    }

    /// Number of configured ports reported available.
    ///
    /// A port missing from `results` counts as unavailable.
    pub fn available_count(&self, results: &BTreeMap<u16, PortProbeResult>) -> usize {
        self.ports
            .iter()
            .filter(|port| is_available(results, **port))
            .count()
    }

    pub fn classify(
        &self,
        results: &BTreeMap<u16, PortProbeResult>,
        http_healthy: bool,
    ) -> HealthState {
        let available = self.available_count(results);

        if available == 0 {
            return HealthState::Unhealthy;
        }
        if available == self.ports.len() && http_healthy {
            return HealthState::Healthy;
        }
        if self.ports.contains(&self.main_port) && is_available(results, self.main_port) {
            return HealthState::Degraded;
        }
        HealthState::Unhealthy
    }
}

fn is_available(results: &BTreeMap<u16, PortProbeResult>, port: u16) -> bool {
    results.get(&port).is_some_and(|r| r.available)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(states: &[(u16, bool)]) -> BTreeMap<u16, PortProbeResult> {
        states
            .iter()
            .map(|&(port, up)| {
                let result = if up {
                    PortProbeResult::available(port, 1.0)
                } else {
                    PortProbeResult::unavailable(port, "connection refused")
                };
                (port, result)
            })
            .collect()
    }

    fn web() -> HealthClassifier {
        HealthClassifier::new(vec![80, 443], 80).unwrap()
    }

    #[test]
    fn zero_ports_fails_construction() {
        let err = HealthClassifier::new(vec![], 80).unwrap_err();
        assert!(matches!(err, ConfigError::NoPorts));
    }

    #[test]
    fn main_port_up_secondary_down_is_degraded() {
        let state = web().classify(&results(&[(80, true), (443, false)]), false);
        assert_eq!(state, HealthState::Degraded);
    }

    #[test]
    fn all_down_is_unhealthy_regardless_of_http() {
        let down = results(&[(80, false), (443, false)]);
        assert_eq!(web().classify(&down, true), HealthState::Unhealthy);
        assert_eq!(web().classify(&down, false), HealthState::Unhealthy);
    }

    #[test]
    fn all_up_and_http_healthy_is_healthy() {
        let state = web().classify(&results(&[(80, true), (443, true)]), true);
        assert_eq!(state, HealthState::Healthy);
    }

    #[test]
    fn all_up_but_http_down_is_degraded() {
        let state = web().classify(&results(&[(80, true), (443, true)]), false);
        assert_eq!(state, HealthState::Degraded);
    }

    #[test]
    fn secondary_up_main_down_is_unhealthy() {
        let state = web().classify(&results(&[(80, false), (443, true)]), true);
        assert_eq!(state, HealthState::Unhealthy);
    }

    #[test]
    fn main_port_need_not_be_first() {
        let classifier = HealthClassifier::new(vec![22005, 30120], 30120).unwrap();
        let state = classifier.classify(&results(&[(22005, false), (30120, true)]), true);
        assert_eq!(state, HealthState::Degraded);
    }

    #[test]
    fn missing_port_result_counts_as_unavailable() {
        let state = web().classify(&results(&[(80, true)]), true);
        assert_eq!(state, HealthState::Degraded);
        assert_eq!(web().available_count(&results(&[(80, true)])), 1);
    }

    #[test]
    fn unconfigured_ports_in_results_are_ignored() {
        let state = web().classify(&results(&[(80, true), (443, true), (8080, false)]), true);
        assert_eq!(state, HealthState::Healthy);
    }

    #[test]
    fn duplicate_ports_are_collapsed() {
        let classifier = HealthClassifier::new(vec![80, 80, 443], 80).unwrap();
        assert_eq!(classifier.ports(), &[80, 443]);
    }

    #[test]
    fn classification_is_deterministic_over_all_combinations() {
        let classifier = web();
        for main_up in [false, true] {
            for other_up in [false, true] {
                for http in [false, true] {
                    let input = results(&[(80, main_up), (443, other_up)]);
                    let first = classifier.classify(&input, http);
                    let second = classifier.classify(&input, http);
                    assert_eq!(first, second);

                    let expected = match (main_up, other_up, http) {
                        (false, false, _) => HealthState::Unhealthy,
                        (true, true, true) => HealthState::Healthy,
                        (true, _, _) => HealthState::Degraded,
                        (false, true, _) => HealthState::Unhealthy,
                    };
                    assert_eq!(first, expected, "main={main_up} other={other_up} http={http}");
                }
            }
        }
    }
}
