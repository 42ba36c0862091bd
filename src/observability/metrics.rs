use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub socket_events_total: IntCounterVec,
    pub transitions_total: IntCounterVec,
    pub broadcasts_total: IntCounterVec,
    pub connected_clients: IntGauge,
    pub tracking_sweep_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let socket_events_total = IntCounterVec::new(
            Opts::new("socket_events_total", "Inbound socket events by kind"),
            &["event"],
        )
        .expect("valid socket_events_total metric");

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "transitions_total",
                "Order state transitions by kind and outcome",
            ),
            &["transition", "outcome"],
        )
        .expect("valid transitions_total metric");

        let broadcasts_total = IntCounterVec::new(
            Opts::new("broadcasts_total", "Room broadcasts by event name"),
            &["event"],
        )
        .expect("valid broadcasts_total metric");

        let connected_clients =
            IntGauge::new("connected_clients", "Currently connected websocket clients")
                .expect("valid connected_clients metric");

        let tracking_sweep_seconds = Histogram::with_opts(HistogramOpts::new(
            "tracking_sweep_seconds",
            "Duration of the periodic location sweep in seconds",
        ))
        .expect("valid tracking_sweep_seconds metric");

        registry
            .register(Box::new(socket_events_total.clone()))
            .expect("register socket_events_total");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(broadcasts_total.clone()))
            .expect("register broadcasts_total");
        registry
            .register(Box::new(connected_clients.clone()))
            .expect("register connected_clients");
        registry
            .register(Box::new(tracking_sweep_seconds.clone()))
            .expect("register tracking_sweep_seconds");

        Self {
            registry,
            socket_events_total,
            transitions_total,
            broadcasts_total,
            connected_clients,
            tracking_sweep_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
