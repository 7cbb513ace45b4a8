use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::field::Field;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Readings {
    pub power: f64,
    pub last_meter_consumption: f64,
    pub accumulated_consumption: f64,
    pub accumulated_production: f64,
    pub accumulated_consumption_last_hour: f64,
    pub accumulated_production_last_hour: f64,
    pub accumulated_cost: f64,
    pub accumulated_reward: f64,
    pub currency: f64,
    pub min_power: f64,
    pub average_power: f64,
    pub max_power: f64,
    pub power_production: f64,
    pub power_reactive: f64,
    pub power_production_reactive: f64,
    pub min_power_production: f64,
    pub max_power_production: f64,
    pub last_meter_production: f64,
    pub power_factor: f64,
    pub voltage_phase1: f64,
    pub voltage_phase2: f64,
    pub voltage_phase3: f64,
    pub current_l1: f64,
    pub current_l2: f64,
    pub current_l3: f64,
    pub signal_strength: f64,
}

impl Readings {
    pub fn get(&self, field: Field) -> f64 {
        *self.slot(field)
    }

    pub fn set(&mut self, field: Field, value: f64) {
        *self.slot_mut(field) = value;
    }

    fn slot(&self, field: Field) -> &f64 {
        match field {
            Field::Power => &self.power,
            Field::LastMeterConsumption => &self.last_meter_consumption,
            Field::AccumulatedConsumption => &self.accumulated_consumption,
            Field::AccumulatedProduction => &self.accumulated_production,
            Field::AccumulatedConsumptionLastHour => &self.accumulated_consumption_last_hour,
            Field::AccumulatedProductionLastHour => &self.accumulated_production_last_hour,
            Field::AccumulatedCost => &self.accumulated_cost,
            Field::AccumulatedReward => &self.accumulated_reward,
            Field::Currency => &self.currency,
            Field::MinPower => &self.min_power,
            Field::AveragePower => &self.average_power,
            Field::MaxPower => &self.max_power,
            Field::PowerProduction => &self.power_production,
            Field::PowerReactive => &self.power_reactive,
            Field::PowerProductionReactive => &self.power_production_reactive,
            Field::MinPowerProduction => &self.min_power_production,
            Field::MaxPowerProduction => &self.max_power_production,
            Field::LastMeterProduction => &self.last_meter_production,
            Field::PowerFactor => &self.power_factor,
            Field::VoltagePhase1 => &self.voltage_phase1,
            Field::VoltagePhase2 => &self.voltage_phase2,
            Field::VoltagePhase3 => &self.voltage_phase3,
            Field::CurrentL1 => &self.current_l1,
            Field::CurrentL2 => &self.current_l2,
            Field::CurrentL3 => &self.current_l3,
            Field::SignalStrength => &self.signal_strength,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut f64 {
        match field {
            Field::Power => &mut self.power,
            Field::LastMeterConsumption => &mut self.last_meter_consumption,
            Field::AccumulatedConsumption => &mut self.accumulated_consumption,
            Field::AccumulatedProduction => &mut self.accumulated_production,
            Field::AccumulatedConsumptionLastHour => &mut self.accumulated_consumption_last_hour,
            Field::AccumulatedProductionLastHour => &mut self.accumulated_production_last_hour,
            Field::AccumulatedCost => &mut self.accumulated_cost,
            Field::AccumulatedReward => &mut self.accumulated_reward,
            Field::Currency => &mut self.currency,
            Field::MinPower => &mut self.min_power,
            Field::AveragePower => &mut self.average_power,
            Field::MaxPower => &mut self.max_power,
            Field::PowerProduction => &mut self.power_production,
            Field::PowerReactive => &mut self.power_reactive,
            Field::PowerProductionReactive => &mut self.power_production_reactive,
            Field::MinPowerProduction => &mut self.min_power_production,
            Field::MaxPowerProduction => &mut self.max_power_production,
            Field::LastMeterProduction => &mut self.last_meter_production,
            Field::PowerFactor => &mut self.power_factor,
            Field::VoltagePhase1 => &mut self.voltage_phase1,
            Field::VoltagePhase2 => &mut self.voltage_phase2,
            Field::VoltagePhase3 => &mut self.voltage_phase3,
            Field::CurrentL1 => &mut self.current_l1,
            Field::CurrentL2 => &mut self.current_l2,
            Field::CurrentL3 => &mut self.current_l3,
            Field::SignalStrength => &mut self.signal_strength,
        }
    }

    pub fn any_nonzero(&self, fields: &[Field]) -> bool {
        fields.iter().any(|f| self.get(*f) != 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub readings: Readings,
}

impl TelemetrySample {
    pub fn new(timestamp: DateTime<Utc>, readings: Readings) -> Self {
        Self {
            timestamp,
            readings,
        }
    }

    pub fn get(&self, field: Field) -> f64 {
        self.readings.get(field)
    }
}
