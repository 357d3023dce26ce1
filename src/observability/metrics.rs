use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub deliveries_created_total: IntCounterVec,
    pub transitions_total: IntCounterVec,
    pub claims_total: IntCounter,
    pub deliveries_by_status: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let deliveries_created_total = IntCounterVec::new(
            Opts::new(
                "deliveries_created_total",
                "Delivery requests created, by originating role",
            ),
            &["origin"],
        )
        .expect("valid deliveries_created_total metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Status transition attempts by outcome"),
            &["outcome"],
        )
        .expect("valid transitions_total metric");

        let claims_total = IntCounter::new(
            "claims_total",
            "Deliveries claimed by a logistics agent",
        )
        .expect("valid claims_total metric");

        let deliveries_by_status = IntGaugeVec::new(
            Opts::new("deliveries_by_status", "Current delivery count per status"),
            &["status"],
        )
        .expect("valid deliveries_by_status metric");

        registry
            .register(Box::new(deliveries_created_total.clone()))
            .expect("register deliveries_created_total");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(claims_total.clone()))
            .expect("register claims_total");
        registry
            .register(Box::new(deliveries_by_status.clone()))
            .expect("register deliveries_by_status");

        Self {
            registry,
            deliveries_created_total,
            transitions_total,
            claims_total,
            deliveries_by_status,
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
