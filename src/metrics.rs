//! Pipeline metrics
//!
//! Counters are always recorded through the `metrics` facade; they only leave
//! the process when [`init_metrics`] installed a Prometheus exporter.

use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

use crate::common::constants::METRICS_ADDR_ENV;
use crate::pipeline::validate::RejectionReason;

static INIT: Once = Once::new();

/// Metric names follow `caviar_{phase}_{name}_total` for counters.
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("caviar_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("caviar_", $phase, "_", $name)
    };
}

/// Install the Prometheus exporter when `CAVIAR_METRICS_ADDR` is set, then
/// register every phase's metrics. Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| {
        let addr = match std::env::var(METRICS_ADDR_ENV) {
            Ok(v) if !v.trim().is_empty() => v,
            _ => return,
        };

        let addr: SocketAddr = match addr.parse() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Invalid {} '{}': {}", METRICS_ADDR_ENV, addr, e);
                return;
            }
        };

        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => {
                info!("Prometheus exporter listening at http://{}/metrics", addr);
                register_all_metrics();
            }
            Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
        }
    });
}

/// Implemented by each phase to describe and pre-register its metrics.
pub trait PhaseMetrics {
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricType {
    Counter,
    Histogram,
}

pub fn register_all_metrics() {
    let mut total = 0;
    total += register_phase::<PipelineMetrics>();
    total += register_phase::<FetchMetrics>();
    info!("Registered {} metrics", total);
}

fn register_phase<T: PhaseMetrics>() -> usize {
    T::register_metrics();
    let docs = T::metrics_documentation();
    for doc in &docs {
        match doc.metric_type {
            MetricType::Counter => ::metrics::describe_counter!(doc.name, doc.help),
            MetricType::Histogram => ::metrics::describe_histogram!(doc.name, doc.help),
        }
    }
    docs.len()
}

/// Extraction pipeline counters
pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn record_listing_accepted() {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "listings_accepted")).increment(1);
    }

    pub fn record_listing_rejected(reason: RejectionReason) {
        ::metrics::counter!(
            phase_metric!(counter, "pipeline", "listings_rejected"),
            "reason" => reason.code()
        )
        .increment(1);
    }

    pub fn record_unbucketed() {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "records_unbucketed")).increment(1);
    }

    pub fn record_run(listings: usize, selections: usize, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "runs")).increment(1);
        ::metrics::counter!(phase_metric!(counter, "pipeline", "listings_processed"))
            .increment(listings as u64);
        ::metrics::counter!(phase_metric!(counter, "pipeline", "selections"))
            .increment(selections as u64);
        ::metrics::histogram!(phase_metric!(histogram, "pipeline", "run_duration_seconds"))
            .record(duration_secs);
    }
}

impl PhaseMetrics for PipelineMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "pipeline", "runs"));
        let _ = ::metrics::counter!(phase_metric!(counter, "pipeline", "listings_processed"));
        let _ = ::metrics::counter!(phase_metric!(counter, "pipeline", "listings_accepted"));
        let _ = ::metrics::counter!(phase_metric!(counter, "pipeline", "records_unbucketed"));
        let _ = ::metrics::counter!(phase_metric!(counter, "pipeline", "selections"));
        for reason in RejectionReason::ALL {
            let _ = ::metrics::counter!(
                phase_metric!(counter, "pipeline", "listings_rejected"),
                "reason" => reason.code()
            );
        }
    }

    fn phase_name() -> &'static str {
        "pipeline"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "runs"),
                metric_type: MetricType::Counter,
                help: "Digest runs completed",
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "listings_processed"),
                metric_type: MetricType::Counter,
                help: "Listings fed into the pipeline",
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "listings_accepted"),
                metric_type: MetricType::Counter,
                help: "Listings that produced a valid product record",
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "listings_rejected"),
                metric_type: MetricType::Counter,
                help: "Listings dropped by validation, labelled by reason",
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "records_unbucketed"),
                metric_type: MetricType::Counter,
                help: "Valid records whose weight fell outside every bucket",
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "selections"),
                metric_type: MetricType::Counter,
                help: "Bucket selections emitted",
            },
            MetricDoc {
                name: phase_metric!(histogram, "pipeline", "run_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of one pipeline run",
            },
        ]
    }
}

/// Page fetch counters
pub struct FetchMetrics;

impl FetchMetrics {
    pub fn record_page_fetched(bytes: usize) {
        ::metrics::counter!(phase_metric!(counter, "fetch", "pages")).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "fetch", "page_bytes")).record(bytes as f64);
    }

    pub fn record_fetch_error() {
        ::metrics::counter!(phase_metric!(counter, "fetch", "errors")).increment(1);
    }
}

impl PhaseMetrics for FetchMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "fetch", "pages"));
        let _ = ::metrics::counter!(phase_metric!(counter, "fetch", "errors"));
    }

    fn phase_name() -> &'static str {
        "fetch"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "fetch", "pages"),
                metric_type: MetricType::Counter,
                help: "Product pages fetched",
            },
            MetricDoc {
                name: phase_metric!(counter, "fetch", "errors"),
                metric_type: MetricType::Counter,
                help: "Product pages that failed to fetch",
            },
            MetricDoc {
                name: phase_metric!(histogram, "fetch", "page_bytes"),
                metric_type: MetricType::Histogram,
                help: "Size of fetched product pages",
            },
        ]
    }
}
