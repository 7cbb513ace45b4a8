use serde::Deserialize;
use tibber_exporter_core::error::Result;
use tibber_exporter_core::field::Field;
use tibber_exporter_core::model::sample::{Readings, TelemetrySample};
use tibber_exporter_core::time::parse_timestamp;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveMeasurement {
    pub timestamp: String,
    pub power: Option<f64>,
    pub last_meter_consumption: Option<f64>,
    pub accumulated_consumption: Option<f64>,
    pub accumulated_production: Option<f64>,
    pub accumulated_consumption_last_hour: Option<f64>,
    pub accumulated_production_last_hour: Option<f64>,
    pub accumulated_cost: Option<f64>,
    pub accumulated_reward: Option<f64>,
    pub currency: Option<String>,
    pub min_power: Option<f64>,
    pub average_power: Option<f64>,
    pub max_power: Option<f64>,
    pub power_production: Option<f64>,
    pub power_reactive: Option<f64>,
    pub power_production_reactive: Option<f64>,
    pub min_power_production: Option<f64>,
    pub max_power_production: Option<f64>,
    pub last_meter_production: Option<f64>,
    pub power_factor: Option<f64>,
    pub voltage_phase1: Option<f64>,
    pub voltage_phase2: Option<f64>,
    pub voltage_phase3: Option<f64>,
    pub current_l1: Option<f64>,
    pub current_l2: Option<f64>,
    pub current_l3: Option<f64>,
    pub signal_strength: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveMeasurementData {
    pub live_measurement: Option<LiveMeasurement>,
}

impl LiveMeasurement {
    pub fn into_sample(self) -> Result<TelemetrySample> {
        let timestamp = parse_timestamp(&self.timestamp)?;
        let mut readings = Readings::default();
        let values = [
            (Field::Power, self.power),
            (Field::LastMeterConsumption, self.last_meter_consumption),
            (Field::AccumulatedConsumption, self.accumulated_consumption),
            (Field::AccumulatedProduction, self.accumulated_production),
            (
                Field::AccumulatedConsumptionLastHour,
                self.accumulated_consumption_last_hour,
            ),
            (
                Field::AccumulatedProductionLastHour,
                self.accumulated_production_last_hour,
            ),
            (Field::AccumulatedCost, self.accumulated_cost),
            (Field::AccumulatedReward, self.accumulated_reward),
            (Field::Currency, self.currency.as_deref().map(currency_code)),
            (Field::MinPower, self.min_power),
            (Field::AveragePower, self.average_power),
            (Field::MaxPower, self.max_power),
            (Field::PowerProduction, self.power_production),
            (Field::PowerReactive, self.power_reactive),
            (
                Field::PowerProductionReactive,
                self.power_production_reactive,
            ),
            (Field::MinPowerProduction, self.min_power_production),
            (Field::MaxPowerProduction, self.max_power_production),
            (Field::LastMeterProduction, self.last_meter_production),
            (Field::PowerFactor, self.power_factor),
            (Field::VoltagePhase1, self.voltage_phase1),
            (Field::VoltagePhase2, self.voltage_phase2),
            (Field::VoltagePhase3, self.voltage_phase3),
            (Field::CurrentL1, self.current_l1),
            (Field::CurrentL2, self.current_l2),
            (Field::CurrentL3, self.current_l3),
            (Field::SignalStrength, self.signal_strength),
        ];
        for (field, value) in values {
            readings.set(field, value.unwrap_or(0.0));
        }
        Ok(TelemetrySample::new(timestamp, readings))
    }
}

pub fn currency_code(code: &str) -> f64 {
    match code.trim().to_ascii_uppercase().as_str() {
        "NOK" => 578.0,
        "SEK" => 752.0,
        "DKK" => 208.0,
        "EUR" => 978.0,
        _ => 0.0,
    }
}

pub fn selection_set() -> String {
    Field::ALL
        .iter()
        .map(|field| field.name())
        .collect::<Vec<_>>()
        .join("\n    ")
}

pub fn subscription_query() -> String {
    format!(
        "subscription LiveMeasurement($homeId: ID!) {{\n  liveMeasurement(homeId: $homeId) {{\n    {}\n  }}\n}}",
        selection_set()
    )
}
