//! Request metrics recording using Prometheus.

use std::sync::Arc;
use std::time::Instant;

use http::{Request, Response};
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::{debug, trace, warn};

use super::labels::{extract_default_labels, extract_timing_seconds, RequestLabels, LABEL_NAMES};
use crate::error::RecorderError;

const REQUEST_COUNTER_SUFFIX: &str = "requests_total";
const TIMING_HISTOGRAM_SUFFIX: &str = "request_timing_seconds";

/// Options accepted when constructing a [`Recorder`].
#[derive(Debug, Clone, Default)]
pub struct RecorderOptions {
    /// Prefix applied to both metric names, e.g. `checkout` gives
    /// `checkout_requests_total`. Empty is the same as unset.
    pub app_name: Option<String>,
    /// Histogram buckets in seconds. Defaults to the Prometheus default buckets.
    pub buckets: Option<Vec<f64>>,
}

/// Records a request counter and a timing histogram for completed HTTP requests.
///
/// Cloning is cheap; clones share the same underlying metrics.
#[derive(Clone)]
pub struct Recorder {
    registry: Arc<Registry>,
    counter_name: String,
    histogram_name: String,
    requests_total: IntCounterVec,
    request_timing_seconds: HistogramVec,
}

impl Recorder {
    /// Creates both metrics and registers them with `registry`.
    ///
    /// # Errors
    ///
    /// Fails if either name is already registered (two recorders sharing an
    /// `app_name` on one registry) or is not a valid metric name, and if the
    /// buckets are not strictly increasing (a trailing `+Inf` is allowed) or
    /// contain NaN. On failure no metric is left registered.
    pub fn new(registry: Arc<Registry>, options: &RecorderOptions) -> Result<Self, RecorderError> {
        let app_name = options.app_name.as_deref();
        let counter_name = attach_prefix(REQUEST_COUNTER_SUFFIX, app_name);
        let histogram_name = attach_prefix(TIMING_HISTOGRAM_SUFFIX, app_name);

        let mut histogram_opts =
            HistogramOpts::new(histogram_name.clone(), "Request timing in seconds");
        if let Some(buckets) = &options.buckets {
            if buckets.iter().any(|b| b.is_nan()) {
                return Err(RecorderError::Config(format!(
                    "histogram buckets must not contain NaN, got {:?}",
                    buckets
                )));
            }
            histogram_opts = histogram_opts.buckets(buckets.clone());
        }

        let requests_total = IntCounterVec::new(
            Opts::new(counter_name.clone(), "Total number of requests"),
            &LABEL_NAMES,
        )
        .map_err(|source| registration_error(&counter_name, source))?;

        let request_timing_seconds = HistogramVec::new(histogram_opts.clone(), &LABEL_NAMES)
            .map_err(|source| registration_error(&histogram_name, source))?;

        // HistogramVec only checks buckets when a child is created, which would
        // be the first recorded request. Build one child now instead.
        Histogram::with_opts(histogram_opts).map_err(|e| {
            RecorderError::Config(format!(
                "histogram buckets must be strictly increasing: {}",
                e
            ))
        })?;

        registry
            .register(Box::new(requests_total.clone()))
            .map_err(|source| registration_error(&counter_name, source))?;

        if let Err(source) = registry.register(Box::new(request_timing_seconds.clone())) {
            // Roll back the counter; its name and help stay reserved in the registry.
            if let Err(e) = registry.unregister(Box::new(requests_total.clone())) {
                warn!(
                    counter = %counter_name,
                    error = %e,
                    "Failed to unregister request counter"
                );
            }
            return Err(registration_error(&histogram_name, source));
        }

        debug!(
            counter = %counter_name,
            histogram = %histogram_name,
            "Registered request metrics"
        );

        Ok(Recorder {
            registry,
            counter_name,
            histogram_name,
            requests_total,
            request_timing_seconds,
        })
    }

    /// Creates a recorder backed by its own fresh registry.
    pub fn with_default_registry(options: &RecorderOptions) -> Result<Self, RecorderError> {
        Self::new(Arc::new(Registry::new()), options)
    }

    /// Records one completed request: bumps the counter and observes the time
    /// elapsed since `start`, both under the same labels.
    pub fn record<B, R>(&self, request: &Request<B>, response: &Response<R>, start: Instant) {
        let labels = extract_default_labels(request, response);
        let seconds = extract_timing_seconds(start);
        self.record_labels(&labels, seconds);
    }

    /// Records an already extracted label set and duration.
    pub fn record_labels(&self, labels: &RequestLabels, seconds: f64) {
        let values = labels.values();

        self.requests_total.with_label_values(&values).inc();
        self.request_timing_seconds
            .with_label_values(&values)
            .observe(seconds);

        trace!(
            method = %labels.method,
            route = %labels.route,
            status = %labels.status,
            seconds,
            "Recorded request"
        );
    }

    /// Renders every metric in the registry in Prometheus text format.
    pub fn get_metrics(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .expect("Failed to encode metrics");
        String::from_utf8(buffer).expect("Metrics encoding produced invalid UTF-8")
    }

    pub fn counter_name(&self) -> &str {
        &self.counter_name
    }

    pub fn histogram_name(&self) -> &str {
        &self.histogram_name
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[cfg(test)]
    fn request_count(&self, labels: &RequestLabels) -> u64 {
        self.requests_total.with_label_values(&labels.values()).get()
    }

    #[cfg(test)]
    fn timing_samples(&self, labels: &RequestLabels) -> (u64, f64) {
        let histogram = self
            .request_timing_seconds
            .with_label_values(&labels.values());
        (histogram.get_sample_count(), histogram.get_sample_sum())
    }
}

fn attach_prefix(name: &str, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}_{}", prefix, name),
        _ => name.to_string(),
    }
}

fn registration_error(name: &str, source: prometheus::Error) -> RecorderError {
    RecorderError::Registration {
        name: name.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use prometheus::core::Collector;
    use std::time::Duration;

    fn options(app_name: Option<&str>) -> RecorderOptions {
        RecorderOptions {
            app_name: app_name.map(str::to_string),
            buckets: None,
        }
    }

    fn health_labels() -> RequestLabels {
        RequestLabels::from_parts(Some(&Method::GET), Some("/health"), StatusCode::OK)
    }

    #[test]
    fn prefix_is_applied_to_both_names() {
        let recorder = Recorder::with_default_registry(&options(Some("checkout"))).unwrap();

        assert_eq!(recorder.counter_name(), "checkout_requests_total");
        assert_eq!(recorder.histogram_name(), "checkout_request_timing_seconds");
    }

    #[test]
    fn unset_or_empty_prefix_gives_bare_names() {
        for app_name in [None, Some("")] {
            let recorder = Recorder::with_default_registry(&options(app_name)).unwrap();

            assert_eq!(recorder.counter_name(), "requests_total");
            assert_eq!(recorder.histogram_name(), "request_timing_seconds");
        }
    }

    #[test]
    fn duplicate_app_name_on_shared_registry_is_rejected() {
        let registry = Arc::new(Registry::new());
        let _first = Recorder::new(registry.clone(), &options(Some("checkout"))).unwrap();

        let err = Recorder::new(registry.clone(), &options(Some("checkout")))
            .err()
            .expect("second registration must fail");

        match err {
            RecorderError::Registration { name, source } => {
                assert_eq!(name, "checkout_requests_total");
                assert!(matches!(source, prometheus::Error::AlreadyReg));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn distinct_app_names_share_a_registry() {
        let registry = Arc::new(Registry::new());
        let checkout = Recorder::new(registry.clone(), &options(Some("checkout"))).unwrap();
        let billing = Recorder::new(registry.clone(), &options(Some("billing"))).unwrap();

        checkout.record_labels(&health_labels(), 0.01);
        billing.record_labels(&health_labels(), 0.02);

        let text = checkout.get_metrics();
        assert_eq!(text, billing.get_metrics());
        assert!(text.contains("checkout_requests_total{"));
        assert!(text.contains("billing_request_timing_seconds_count{"));
    }

    #[test]
    fn invalid_metric_name_is_a_registration_error() {
        let err = Recorder::with_default_registry(&options(Some("my-app")))
            .err()
            .expect("hyphenated name must be rejected");

        assert!(matches!(err, RecorderError::Registration { .. }));
    }

    #[test]
    fn failed_histogram_registration_rolls_back_counter() {
        let registry = Arc::new(Registry::new());
        let clash = HistogramVec::new(
            HistogramOpts::new("shop_request_timing_seconds", "taken"),
            &LABEL_NAMES,
        )
        .unwrap();
        registry.register(Box::new(clash)).unwrap();

        let err = Recorder::new(registry.clone(), &options(Some("shop")))
            .err()
            .expect("histogram name clash must fail");

        assert!(matches!(
            err,
            RecorderError::Registration { ref name, .. } if name == "shop_request_timing_seconds"
        ));
        let counter = IntCounterVec::new(
            Opts::new("shop_requests_total", "Total number of requests"),
            &LABEL_NAMES,
        )
        .unwrap();
        assert!(registry.register(Box::new(counter)).is_ok());
    }

    fn bucket_options(buckets: Vec<f64>) -> RecorderOptions {
        RecorderOptions {
            app_name: None,
            buckets: Some(buckets),
        }
    }

    #[test]
    fn nan_buckets_are_rejected() {
        let err = Recorder::with_default_registry(&bucket_options(vec![0.1, f64::NAN]))
            .err()
            .unwrap();
        assert!(matches!(err, RecorderError::Config(_)));
    }

    #[test]
    fn unsorted_buckets_are_rejected_at_construction() {
        let err = Recorder::with_default_registry(&bucket_options(vec![0.5, 0.1]))
            .err()
            .expect("decreasing buckets must be rejected");
        assert!(matches!(err, RecorderError::Config(_)));
    }

    #[test]
    fn duplicate_buckets_are_rejected_at_construction() {
        let err = Recorder::with_default_registry(&bucket_options(vec![0.1, 0.1]))
            .err()
            .expect("repeated buckets must be rejected");
        assert!(matches!(err, RecorderError::Config(_)));
    }

    #[test]
    fn rejected_buckets_leave_registry_empty() {
        let registry = Arc::new(Registry::new());

        assert!(Recorder::new(registry.clone(), &bucket_options(vec![0.5, 0.1])).is_err());
        assert!(Recorder::new(registry, &options(None)).is_ok());
    }

    #[test]
    fn trailing_infinity_bucket_is_accepted() {
        let recorder =
            Recorder::with_default_registry(&bucket_options(vec![0.1, 0.5, f64::INFINITY]))
                .unwrap();
        recorder.record_labels(&health_labels(), 0.2);

        let text = recorder.get_metrics();
        assert!(text.contains(r#"le="0.5""#));
        assert!(text.contains(r#"le="+Inf""#));
    }

    #[test]
    fn custom_buckets_are_used() {
        let opts = RecorderOptions {
            app_name: None,
            buckets: Some(vec![0.1, 0.5]),
        };
        let recorder = Recorder::with_default_registry(&opts).unwrap();
        recorder.record_labels(&health_labels(), 0.2);

        let text = recorder.get_metrics();
        assert!(text.contains(r#"le="0.5""#));
        assert!(!text.contains(r#"le="0.005""#));
    }

    #[test]
    fn record_adds_exactly_one_count_and_observation() {
        let recorder = Recorder::with_default_registry(&options(None)).unwrap();
        let labels = health_labels();
        let other = RequestLabels::from_parts(Some(&Method::POST), Some("/health"), StatusCode::OK);

        recorder.record_labels(&labels, 0.5);
        assert_eq!(recorder.request_count(&labels), 1);
        assert_eq!(recorder.timing_samples(&labels).0, 1);

        recorder.record_labels(&labels, 0.25);
        assert_eq!(recorder.request_count(&labels), 2);
        assert_eq!(recorder.timing_samples(&labels), (2, 0.75));
        assert_eq!(recorder.request_count(&other), 0);
    }

    #[test]
    fn record_reads_request_and_response() {
        let recorder = Recorder::with_default_registry(&options(None)).unwrap();
        let request = Request::builder()
            .method(Method::GET)
            .uri("/nowhere")
            .body(())
            .unwrap();
        let mut response = Response::new(());
        *response.status_mut() = StatusCode::NOT_FOUND;

        recorder.record(&request, &response, Instant::now());

        let labels = RequestLabels::from_parts(Some(&Method::GET), None, StatusCode::NOT_FOUND);
        assert_eq!(recorder.request_count(&labels), 1);
    }

    #[test]
    fn health_request_end_to_end() {
        let recorder = Recorder::with_default_registry(&options(None)).unwrap();
        let labels = health_labels();

        recorder.record_labels(&labels, 0.0123);

        let (count, sum) = recorder.timing_samples(&labels);
        assert_eq!(count, 1);
        assert!((sum - 0.0123).abs() < 1e-9);

        let text = recorder.get_metrics();
        assert!(text.contains(r#"requests_total{method="GET",route="/health",status="200"} 1"#));
        assert!(text.contains(r#"request_timing_seconds_count{method="GET",route="/health",status="200"} 1"#));
        assert!(text.contains(r#"request_timing_seconds_sum{method="GET",route="/health",status="200"} 0.0123"#));
        assert!(text.contains(r#"request_timing_seconds_bucket{method="GET",route="/health",status="200",le="0.025"} 1"#));
        assert!(text.contains(r#"request_timing_seconds_bucket{method="GET",route="/health",status="200",le="0.01"} 0"#));
    }

    #[test]
    fn record_measures_elapsed_time_since_start() {
        let recorder = Recorder::with_default_registry(&options(None)).unwrap();
        let request = Request::builder().method(Method::GET).uri("/").body(()).unwrap();
        let response = Response::new(());
        let start = Instant::now() - Duration::from_millis(15);

        recorder.record(&request, &response, start);

        let labels = RequestLabels::from_parts(Some(&Method::GET), None, StatusCode::OK);
        let (count, sum) = recorder.timing_samples(&labels);
        assert_eq!(count, 1);
        assert!(sum >= 0.015);
    }

    #[test]
    fn concurrent_records_are_all_counted() {
        let recorder = Recorder::with_default_registry(&options(None)).unwrap();
        let labels = health_labels();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        recorder.record_labels(&labels, 0.001);
                    }
                });
            }
        });

        assert_eq!(recorder.request_count(&labels), 800);
        assert_eq!(recorder.timing_samples(&labels).0, 800);
    }

    #[test]
    fn metrics_text_is_empty_before_any_request() {
        let recorder = Recorder::with_default_registry(&options(None)).unwrap();

        assert_eq!(recorder.requests_total.collect()[0].get_metric().len(), 0);
        assert!(!recorder.get_metrics().contains("requests_total{"));
    }
}
