//! Routing decision engine
//!
//! Decides, per request, whether a model runs on this node or on a friendly
//! server. Local execution is scored from this node's cluster status; each
//! peer is scored from its own self-reported status plus the measured round
//! trip. A peer replaces the current best only when it is cheaper by at least
//! the improvement margin, which keeps near-equal nodes from flapping.
//!
//! The engine never fails: every degraded path resolves to local execution
//! with a labelled reason.

use std::sync::Arc;

pub mod requirements;
pub mod scoring;


pub use requirements::RouteRequest;
pub use scoring::{beats, compute_cost, CostWeights};

use serde::Serialize;

use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::cluster::{model_placement, ClusterAggregator, ModelPlacement, RemoteFetchOptions};
use crate::config::RoutingConfig;
use crate::friendly::{FriendlyServer, FriendlyServerSource};

/// Why a routing verdict was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    /// Request named no model
    MissingModel,
    /// Peer routing turned off by configuration
    RoutingDisabled,
    /// Model is served by an external provider
    ExternalModel,
    /// Inbound request carried the loop-prevention marker
    NoForwardHeader,
    /// Model is resident locally and the accelerator is idle
    LocalWarmAndFree,
    /// No enabled, credentialed peers
    NoFriendlyServers,
    /// No peer beat local by the margin
    LocalDefault,
    /// A peer beat the previous best by the margin
    FriendlyBetter,
}

impl RouteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteReason::MissingModel => "missing_model",
            RouteReason::RoutingDisabled => "routing_disabled",
            RouteReason::ExternalModel => "external_model",
            RouteReason::NoForwardHeader => "no_forward_header",
            RouteReason::LocalWarmAndFree => "local_warm_and_free",
            RouteReason::NoFriendlyServers => "no_friendly_servers",
            RouteReason::LocalDefault => "local_default",
            RouteReason::FriendlyBetter => "friendly_better",
        }
    }
}

/// Where a request should execute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "server", rename_all = "snake_case")]
pub enum ExecutionTarget {
    Local,
    Friendly(FriendlyServer),
}

impl ExecutionTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionTarget::Local => "local",
            ExecutionTarget::Friendly(_) => "friendly",
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ExecutionTarget::Local)
    }
}

/// How one peer fared during a decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateOutcome {
    /// Status fetch failed; peer ineligible for this decision
    Unreachable { error: String },
    /// Peer does not have the model installed
    NotInstalled,
    Scored {
        placement: ModelPlacement,
        latency_ms: u64,
        cost: f64,
        selected: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateTrace {
    pub server: String,
    #[serde(flatten)]
    pub outcome: CandidateOutcome,
}

/// Diagnostic trail of a decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingTrace {
    pub reason: RouteReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<ModelPlacement>,
    /// Absent when the model is not installed locally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_cost: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<CandidateTrace>,
}

impl RoutingTrace {
    fn reason(reason: RouteReason) -> Self {
        Self {
            reason,
            local: None,
            local_cost: None,
            candidates: Vec::new(),
        }
    }
}

/// The routing verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    pub target: ExecutionTarget,
    /// Cost of the chosen target when one was computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    pub trace: RoutingTrace,
}

impl RoutingDecision {
    fn local(trace: RoutingTrace) -> Self {
        Self {
            target: ExecutionTarget::Local,
            cost: None,
            trace,
        }
    }

    pub fn reason(&self) -> RouteReason {
        self.trace.reason
    }
}

/// Picks an execution target for each request.
pub struct RoutingEngine {
    aggregator: Arc<ClusterAggregator>,
    friends: Arc<dyn FriendlyServerSource>,
    friends_cache: TtlCache<Arc<Vec<FriendlyServer>>>,
    config: RoutingConfig,
    weights: CostWeights,
    clock: Arc<dyn Clock>,
}

impl RoutingEngine {
    pub fn new(
        aggregator: Arc<ClusterAggregator>,
        friends: Arc<dyn FriendlyServerSource>,
        config: RoutingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let friends_cache = TtlCache::new(config.friendly_list_ttl());
        let weights = config.weights.clone().into();
        Self {
            aggregator,
            friends,
            friends_cache,
            config,
            weights,
            clock,
        }
    }

    pub fn aggregator(&self) -> &Arc<ClusterAggregator> {
        &self.aggregator
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Decide where `request` should execute.
    pub async fn pick_execution_target(&self, request: &RouteRequest) -> RoutingDecision {
        let decision = self.decide(request).await;

        metrics::counter!(
            "ollamify_routing_decisions_total",
            "target" => decision.target.as_str(),
            "reason" => decision.reason().as_str()
        )
        .increment(1);

        match &decision.target {
            ExecutionTarget::Local => tracing::debug!(
                model = request.model().unwrap_or_default(),
                reason = decision.reason().as_str(),
                cost = ?decision.cost,
                "Routing to local"
            ),
            ExecutionTarget::Friendly(server) => tracing::debug!(
                model = request.model().unwrap_or_default(),
                reason = decision.reason().as_str(),
                server = %server.name,
                cost = ?decision.cost,
                "Routing to friendly server"
            ),
        }

        decision
    }

    async fn decide(&self, request: &RouteRequest) -> RoutingDecision {
        // Early exits: no I/O
        let Some(model) = request.model() else {
            return RoutingDecision::local(RoutingTrace::reason(RouteReason::MissingModel));
        };
        if !self.config.enabled {
            return RoutingDecision::local(RoutingTrace::reason(RouteReason::RoutingDisabled));
        }
        if self.config.is_external_model(model) {
            return RoutingDecision::local(RoutingTrace::reason(RouteReason::ExternalModel));
        }
        if request.no_forward {
            return RoutingDecision::local(RoutingTrace::reason(RouteReason::NoForwardHeader));
        }

        let local_status = self.aggregator.local_status(false).await;
        let local = model_placement(Some(&local_status), Some(model));

        // Warm and free: skip peers entirely
        let gpu_idle = local
            .gpu_util_percent
            .is_none_or(|util| util < self.config.warm_gpu_util_threshold);
        if local.loaded && local.in_flight == 0 && gpu_idle {
            return RoutingDecision::local(RoutingTrace {
                local: Some(local),
                ..RoutingTrace::reason(RouteReason::LocalWarmAndFree)
            });
        }

        let friends = self.enabled_friends().await;
        if friends.is_empty() {
            return RoutingDecision::local(RoutingTrace {
                local: Some(local),
                ..RoutingTrace::reason(RouteReason::NoFriendlyServers)
            });
        }

        let local_cost = if local.installed {
            compute_cost(&local, 0, &self.weights)
        } else {
            f64::INFINITY
        };

        let mut best_cost = local_cost;
        let mut best: Option<(usize, FriendlyServer)> = None;
        let mut candidates = Vec::with_capacity(friends.len());

        for server in friends.iter() {
            let outcome = match self
                .aggregator
                .remote_status(server, RemoteFetchOptions::default())
                .await
            {
                Err(error) => CandidateOutcome::Unreachable {
                    error: error.to_string(),
                },
                Ok(status) => {
                    let placement = model_placement(Some(&status), Some(model));
                    if !placement.installed {
                        CandidateOutcome::NotInstalled
                    } else {
                        let latency_ms = status.latency_ms();
                        let cost = compute_cost(&placement, latency_ms, &self.weights);
                        let selected = beats(best_cost, cost, self.config.improvement_margin);
                        if selected {
                            best_cost = cost;
                            best = Some((candidates.len(), server.clone()));
                        }
                        CandidateOutcome::Scored {
                            placement,
                            latency_ms,
                            cost,
                            selected,
                        }
                    }
                }
            };
            candidates.push(CandidateTrace {
                server: server.label().to_string(),
                outcome,
            });
        }

        // Only the final winner stays marked as selected
        let winner = best.as_ref().map(|(index, _)| *index);
        for (index, candidate) in candidates.iter_mut().enumerate() {
            if let CandidateOutcome::Scored { selected, .. } = &mut candidate.outcome {
                *selected = Some(index) == winner;
            }
        }

        let trace = RoutingTrace {
            reason: if best.is_some() {
                RouteReason::FriendlyBetter
            } else {
                RouteReason::LocalDefault
            },
            local: Some(local),
            local_cost: Some(local_cost).filter(|cost| cost.is_finite()),
            candidates,
        };

        match best {
            Some((_, server)) => RoutingDecision {
                target: ExecutionTarget::Friendly(server),
                cost: Some(best_cost),
                trace,
            },
            None => RoutingDecision {
                target: ExecutionTarget::Local,
                cost: Some(local_cost).filter(|cost| cost.is_finite()),
                trace,
            },
        }
    }

    /// Enabled, credentialed peers, cached for the friendly-list TTL.
    ///
    /// A failing source yields no peers for this decision and is not cached.
    async fn enabled_friends(&self) -> Arc<Vec<FriendlyServer>> {
        let now = self.clock.now_ms();
        if let Some(friends) = self.friends_cache.get_fresh(now) {
            return friends;
        }

        match self.friends.list_enabled().await {
            Ok(servers) => {
                let servers = Arc::new(
                    servers
                        .into_iter()
                        .filter(|server| server.enabled && !server.api_key.trim().is_empty())
                        .collect::<Vec<_>>(),
                );
                self.friends_cache.insert(Arc::clone(&servers), now);
                servers
            }
            Err(error) => {
                tracing::warn!(error = %error, "Failed to list friendly servers");
                Arc::new(Vec::new())
            }
        }
    }
}
