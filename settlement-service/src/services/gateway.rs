//! Payment gateway adapters and routing.
//!
//! Retry and ledger logic never know whether a gateway is real or simulated;
//! they only see the `GatewayAdapter` contract. The simulated adapters model
//! each rail's latency and failure taxonomy for sandbox use.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use service_core::retry::RetryClassify;

use crate::models::transaction::DeclineCategory;
use crate::services::phone::{self, Network};

/// Successful gateway response.
#[derive(Debug, Clone)]
pub struct GatewayApproval {
    pub gateway_transaction_id: String,
    pub reference: String,
}

/// Declined or failed gateway attempt.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct GatewayDecline {
    pub code: String,
    pub message: String,
    pub category: DeclineCategory,
    pub retryable: bool,
}

impl RetryClassify for GatewayDecline {
    fn retryable(&self) -> bool {
        self.retryable
    }
}

#[async_trait]
pub trait GatewayAdapter: Send + Sync {
    fn name(&self) -> &str;
    fn supported_networks(&self) -> &[Network];
    async fn attempt(
        &self,
        amount: Decimal,
        phone: &str,
    ) -> Result<GatewayApproval, GatewayDecline>;
}

/// One probabilistic failure outcome. Bands are evaluated cumulatively
/// against a single uniform roll per attempt.
#[derive(Debug, Clone)]
struct FailureBand {
    probability: f64,
    code: &'static str,
    message: &'static str,
    category: DeclineCategory,
    retryable: bool,
}

/// Static description of one payment rail: naming, carrier allow-list,
/// latency and sandbox failure bands.
#[derive(Debug, Clone)]
pub struct GatewayProfile {
    name: &'static str,
    id_prefix: &'static str,
    supported_networks: Vec<Network>,
    latency: Duration,
    failure_bands: Vec<FailureBand>,
}

impl GatewayProfile {
    pub fn jazzcash(latency: Duration, simulate_failures: bool) -> Self {
        let failure_bands = if simulate_failures {
            vec![
                FailureBand {
                    probability: 0.05,
                    code: "NETWORK_TIMEOUT",
                    message: "JazzCash did not respond in time",
                    category: DeclineCategory::Network,
                    retryable: true,
                },
                FailureBand {
                    probability: 0.02,
                    code: "INSUFFICIENT_FUNDS",
                    message: "Insufficient balance in JazzCash account",
                    category: DeclineCategory::Gateway,
                    retryable: false,
                },
            ]
        } else {
            Vec::new()
        };
        Self {
            name: "jazzcash",
            id_prefix: "JC",
            supported_networks: vec![
                Network::Jazz,
                Network::Telenor,
                Network::Zong,
                Network::Ufone,
                Network::Warid,
            ],
            latency,
            failure_bands,
        }
    }

    pub fn easypaisa(latency: Duration, simulate_failures: bool) -> Self {
        let failure_bands = if simulate_failures {
            vec![FailureBand {
                probability: 0.03,
                code: "SERVICE_UNAVAILABLE",
                message: "EasyPaisa service is temporarily unavailable",
                category: DeclineCategory::Gateway,
                retryable: true,
            }]
        } else {
            Vec::new()
        };
        Self {
            name: "easypaisa",
            id_prefix: "EP",
            supported_networks: vec![
                Network::Jazz,
                Network::Telenor,
                Network::Zong,
                Network::Ufone,
                Network::Warid,
            ],
            latency: latency * 3 / 4,
            failure_bands,
        }
    }

    pub fn upaisa(latency: Duration, simulate_failures: bool) -> Self {
        let failure_bands = if simulate_failures {
            vec![FailureBand {
                probability: 0.05,
                code: "PAYMENT_FAILED",
                message: "UPaisa could not process the payment",
                category: DeclineCategory::Gateway,
                retryable: true,
            }]
        } else {
            Vec::new()
        };
        Self {
            name: "upaisa",
            id_prefix: "UP",
            supported_networks: vec![Network::Ufone, Network::Jazz, Network::Telenor],
            latency: latency / 2,
            failure_bands,
        }
    }

    pub fn sadapay(latency: Duration, simulate_failures: bool) -> Self {
        let failure_bands = if simulate_failures {
            vec![FailureBand {
                probability: 0.03,
                code: "PAYMENT_FAILED",
                message: "SadaPay could not process the payment",
                category: DeclineCategory::Gateway,
                retryable: true,
            }]
        } else {
            Vec::new()
        };
        Self {
            name: "sadapay",
            id_prefix: "SP",
            supported_networks: vec![
                Network::Jazz,
                Network::Telenor,
                Network::Zong,
                Network::Ufone,
            ],
            latency: latency / 2,
            failure_bands,
        }
    }

    /// Generic store-wallet rail. Accepts every known carrier.
    pub fn wallet(latency: Duration, simulate_failures: bool) -> Self {
        let failure_bands = if simulate_failures {
            vec![FailureBand {
                probability: 0.10,
                code: "PAYMENT_FAILED",
                message: "Wallet payment could not be processed",
                category: DeclineCategory::Gateway,
                retryable: true,
            }]
        } else {
            Vec::new()
        };
        Self {
            name: "wallet",
            id_prefix: "WL",
            supported_networks: vec![
                Network::Jazz,
                Network::Telenor,
                Network::Zong,
                Network::Ufone,
                Network::Warid,
                Network::Scom,
            ],
            latency: latency / 4,
            failure_bands,
        }
    }
}

/// Sandbox adapter driven by a `GatewayProfile`.
pub struct SimulatedGateway {
    profile: GatewayProfile,
}

impl SimulatedGateway {
    pub fn new(profile: GatewayProfile) -> Self {
        Self { profile }
    }
}

fn random_suffix(len: usize) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

#[async_trait]
impl GatewayAdapter for SimulatedGateway {
    fn name(&self) -> &str {
        self.profile.name
    }

    fn supported_networks(&self) -> &[Network] {
        &self.profile.supported_networks
    }

    async fn attempt(
        &self,
        amount: Decimal,
        phone: &str,
    ) -> Result<GatewayApproval, GatewayDecline> {
        tracing::debug!(
            gateway = self.profile.name,
            %amount,
            phone_suffix = &phone[phone.len().saturating_sub(4)..],
            "dispatching gateway attempt"
        );
        if !self.profile.latency.is_zero() {
            tokio::time::sleep(self.profile.latency).await;
        }

        let roll: f64 = rand::random();
        let mut cumulative = 0.0;
        for band in &self.profile.failure_bands {
            cumulative += band.probability;
            if roll < cumulative {
                return Err(GatewayDecline {
                    code: band.code.to_string(),
                    message: band.message.to_string(),
                    category: band.category,
                    retryable: band.retryable,
                });
            }
        }

        Ok(GatewayApproval {
            gateway_transaction_id: format!(
                "{}{}{}",
                self.profile.id_prefix,
                Utc::now().timestamp_millis(),
                random_suffix(4)
            ),
            reference: format!("REF-{}", random_suffix(8)),
        })
    }
}

/// Dispatches attempts to named gateways, enforcing the per-gateway carrier
/// allow-list and bounding every attempt with a timeout.
pub struct GatewayRouter {
    adapters: HashMap<String, Arc<dyn GatewayAdapter>>,
    attempt_timeout: Duration,
}

impl GatewayRouter {
    pub fn new(adapters: Vec<Arc<dyn GatewayAdapter>>, attempt_timeout: Duration) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.name().to_string(), adapter))
            .collect();
        Self {
            adapters,
            attempt_timeout,
        }
    }

    /// Build the full sandbox rail set.
    pub fn simulated(
        base_latency: Duration,
        attempt_timeout: Duration,
        simulate_failures: bool,
    ) -> Self {
        let profiles = vec![
            GatewayProfile::jazzcash(base_latency, simulate_failures),
            GatewayProfile::easypaisa(base_latency, simulate_failures),
            GatewayProfile::upaisa(base_latency, simulate_failures),
            GatewayProfile::sadapay(base_latency, simulate_failures),
            GatewayProfile::wallet(base_latency, simulate_failures),
        ];
        let adapters = profiles
            .into_iter()
            .map(|profile| Arc::new(SimulatedGateway::new(profile)) as Arc<dyn GatewayAdapter>)
            .collect();
        Self::new(adapters, attempt_timeout)
    }

    pub fn adapter(&self, name: &str) -> Option<&Arc<dyn GatewayAdapter>> {
        self.adapters.get(name)
    }

    /// One timeout-bounded attempt against a named gateway.
    ///
    /// The carrier allow-list is checked here so that a misrouted number is a
    /// deterministic, never-retryable decline rather than a wasted dispatch.
    pub async fn attempt(
        &self,
        gateway: &str,
        amount: Decimal,
        phone: &str,
    ) -> Result<GatewayApproval, GatewayDecline> {
        let adapter = self.adapters.get(gateway).ok_or_else(|| GatewayDecline {
            code: "UNKNOWN_GATEWAY".to_string(),
            message: format!("No gateway named '{gateway}' is configured"),
            category: DeclineCategory::Validation,
            retryable: false,
        })?;

        let network = phone::network_of(phone).ok_or_else(|| GatewayDecline {
            code: "INVALID_PHONE".to_string(),
            message: "Phone number is not a valid Pakistani mobile number".to_string(),
            category: DeclineCategory::Validation,
            retryable: false,
        })?;
        if !adapter.supported_networks().contains(&network) {
            return Err(GatewayDecline {
                code: format!("UNSUPPORTED_NETWORK_{}", gateway.to_uppercase()),
                message: format!(
                    "{} numbers are not supported by {gateway}",
                    network.as_str()
                ),
                category: DeclineCategory::Validation,
                retryable: false,
            });
        }

        match tokio::time::timeout(self.attempt_timeout, adapter.attempt(amount, phone)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayDecline {
                code: "NETWORK_TIMEOUT".to_string(),
                message: format!(
                    "{gateway} did not respond within {}ms",
                    self.attempt_timeout.as_millis()
                ),
                category: DeclineCategory::Network,
                retryable: true,
            }),
        }
    }
}
