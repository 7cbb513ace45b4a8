use chrono::{DateTime, Utc};
use tibber_exporter_core::field::Field;
use tibber_exporter_core::model::sample::{Readings, TelemetrySample};

pub fn full_sample(ts: DateTime<Utc>) -> TelemetrySample {
    let mut readings = Readings::default();
    for (i, field) in Field::ALL.into_iter().enumerate() {
        readings.set(field, 10.0 + i as f64);
    }
    readings.voltage_phase1 = 230.1;
    readings.voltage_phase2 = 229.4;
    readings.voltage_phase3 = 231.0;
    readings.current_l1 = 4.2;
    readings.current_l2 = 1.1;
    readings.current_l3 = 0.7;
    readings.currency = 578.0;
    TelemetrySample::new(ts, readings)
}

pub fn sample_with(ts: DateTime<Utc>, values: &[(Field, f64)]) -> TelemetrySample {
    let mut readings = Readings::default();
    for (field, value) in values {
        readings.set(*field, *value);
    }
    TelemetrySample::new(ts, readings)
}

pub fn replay_lines(samples: &[TelemetrySample]) -> String {
    samples
        .iter()
        .map(|s| serde_json::to_string(s).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn live_measurement_json(ts: &str, power: f64) -> serde_json::Value {
    serde_json::json!({
        "timestamp": ts,
        "power": power,
        "lastMeterConsumption": 10234.5,
        "accumulatedConsumption": 12.3,
        "accumulatedProduction": 0.0,
        "accumulatedConsumptionLastHour": 0.8,
        "accumulatedProductionLastHour": 0.0,
        "accumulatedCost": 14.2,
        "accumulatedReward": null,
        "currency": "NOK",
        "minPower": 310.0,
        "averagePower": 980.0,
        "maxPower": 5400.0,
        "powerProduction": 0.0,
        "powerReactive": 120.0,
        "powerProductionReactive": 0.0,
        "minPowerProduction": 0.0,
        "maxPowerProduction": 0.0,
        "lastMeterProduction": 0.0,
        "powerFactor": 0.97,
        "voltagePhase1": 231.0,
        "voltagePhase2": null,
        "voltagePhase3": null,
        "currentL1": null,
        "currentL2": null,
        "currentL3": null,
        "signalStrength": -71
    })
}
