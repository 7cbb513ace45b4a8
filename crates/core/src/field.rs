use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ExporterError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Power,
    LastMeterConsumption,
    AccumulatedConsumption,
    AccumulatedProduction,
    AccumulatedConsumptionLastHour,
    AccumulatedProductionLastHour,
    AccumulatedCost,
    AccumulatedReward,
    Currency,
    MinPower,
    AveragePower,
    MaxPower,
    PowerProduction,
    PowerReactive,
    PowerProductionReactive,
    MinPowerProduction,
    MaxPowerProduction,
    LastMeterProduction,
    PowerFactor,
    VoltagePhase1,
    VoltagePhase2,
    VoltagePhase3,
    CurrentL1,
    CurrentL2,
    CurrentL3,
    SignalStrength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldGroup {
    Core,
    Voltage,
    Current,
}

impl Field {
    pub const COUNT: usize = 26;

    pub const ALL: [Field; Field::COUNT] = [
        Field::Power,
        Field::LastMeterConsumption,
        Field::AccumulatedConsumption,
        Field::AccumulatedProduction,
        Field::AccumulatedConsumptionLastHour,
        Field::AccumulatedProductionLastHour,
        Field::AccumulatedCost,
        Field::AccumulatedReward,
        Field::Currency,
        Field::MinPower,
        Field::AveragePower,
        Field::MaxPower,
        Field::PowerProduction,
        Field::PowerReactive,
        Field::PowerProductionReactive,
        Field::MinPowerProduction,
        Field::MaxPowerProduction,
        Field::LastMeterProduction,
        Field::PowerFactor,
        Field::VoltagePhase1,
        Field::VoltagePhase2,
        Field::VoltagePhase3,
        Field::CurrentL1,
        Field::CurrentL2,
        Field::CurrentL3,
        Field::SignalStrength,
    ];

    pub const EXPORT_ORDER: [Field; Field::COUNT] = [
        Field::Power,
        Field::LastMeterConsumption,
        Field::LastMeterProduction,
        Field::AccumulatedConsumption,
        Field::AccumulatedProduction,
        Field::AccumulatedConsumptionLastHour,
        Field::AccumulatedProductionLastHour,
        Field::AccumulatedCost,
        Field::AccumulatedReward,
        Field::Currency,
        Field::MinPower,
        Field::AveragePower,
        Field::MaxPower,
        Field::PowerProduction,
        Field::PowerReactive,
        Field::PowerProductionReactive,
        Field::MinPowerProduction,
        Field::MaxPowerProduction,
        Field::PowerFactor,
        Field::VoltagePhase1,
        Field::VoltagePhase2,
        Field::VoltagePhase3,
        Field::CurrentL1,
        Field::CurrentL2,
        Field::CurrentL3,
        Field::SignalStrength,
    ];

    pub const VOLTAGE: [Field; 3] = [
        Field::VoltagePhase1,
        Field::VoltagePhase2,
        Field::VoltagePhase3,
    ];

    pub const CURRENT: [Field; 3] = [Field::CurrentL1, Field::CurrentL2, Field::CurrentL3];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Power => "power",
            Field::LastMeterConsumption => "lastMeterConsumption",
            Field::AccumulatedConsumption => "accumulatedConsumption",
            Field::AccumulatedProduction => "accumulatedProduction",
            Field::AccumulatedConsumptionLastHour => "accumulatedConsumptionLastHour",
            Field::AccumulatedProductionLastHour => "accumulatedProductionLastHour",
            Field::AccumulatedCost => "accumulatedCost",
            Field::AccumulatedReward => "accumulatedReward",
            Field::Currency => "currency",
            Field::MinPower => "minPower",
            Field::AveragePower => "averagePower",
            Field::MaxPower => "maxPower",
            Field::PowerProduction => "powerProduction",
            Field::PowerReactive => "powerReactive",
            Field::PowerProductionReactive => "powerProductionReactive",
            Field::MinPowerProduction => "minPowerProduction",
            Field::MaxPowerProduction => "maxPowerProduction",
            Field::LastMeterProduction => "lastMeterProduction",
            Field::PowerFactor => "powerFactor",
            Field::VoltagePhase1 => "voltagePhase1",
            Field::VoltagePhase2 => "voltagePhase2",
            Field::VoltagePhase3 => "voltagePhase3",
            Field::CurrentL1 => "currentL1",
            Field::CurrentL2 => "currentL2",
            Field::CurrentL3 => "currentL3",
            Field::SignalStrength => "signalStrength",
        }
    }

    pub fn metric_name(self) -> &'static str {
        match self {
            Field::Power => "tibber_power",
            Field::LastMeterConsumption => "tibber_last_meter_consumption",
            Field::AccumulatedConsumption => "tibber_accumulated_consumption",
            Field::AccumulatedProduction => "tibber_accumulated_production",
            Field::AccumulatedConsumptionLastHour => "tibber_accumulated_consumption_last_hour",
            Field::AccumulatedProductionLastHour => "tibber_accumulated_production_last_hour",
            Field::AccumulatedCost => "tibber_accumulated_cost",
            Field::AccumulatedReward => "tibber_accumulated_reward",
            Field::Currency => "tibber_currency",
            Field::MinPower => "tibber_min_power",
            Field::AveragePower => "tibber_average_power",
            Field::MaxPower => "tibber_max_power",
            Field::PowerProduction => "tibber_power_production",
            Field::PowerReactive => "tibber_power_reactive",
            Field::PowerProductionReactive => "tibber_power_production_reactive",
            Field::MinPowerProduction => "tibber_min_power_production",
            Field::MaxPowerProduction => "tibber_max_power_production",
            Field::LastMeterProduction => "tibber_last_meter_production",
            Field::PowerFactor => "tibber_power_factor",
            Field::VoltagePhase1 => "tibber_voltage_phase_1",
            Field::VoltagePhase2 => "tibber_voltage_phase_2",
            Field::VoltagePhase3 => "tibber_voltage_phase_3",
            Field::CurrentL1 => "tibber_current_line_1",
            Field::CurrentL2 => "tibber_current_line_2",
            Field::CurrentL3 => "tibber_current_line_3",
            Field::SignalStrength => "tibber_signal_strength",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            Field::Power => "Consumption at the moment (Watt)",
            Field::LastMeterConsumption => "Last meter active import register state (kWh)",
            Field::AccumulatedConsumption => "kWh consumed since midnight",
            Field::AccumulatedProduction => "net kWh produced since midnight",
            Field::AccumulatedConsumptionLastHour => "kWh consumed since since last hour shift",
            Field::AccumulatedProductionLastHour => "net kWh produced since last hour shift",
            Field::AccumulatedCost => {
                "Accumulated cost since midnight; requires active Tibber power deal"
            }
            Field::AccumulatedReward => {
                "Accumulated reward since midnight; requires active Tibber power deal"
            }
            Field::Currency => {
                "Currency of displayed cost (ISO 4217 numeric code); requires active Tibber power deal"
            }
            Field::MinPower => "Min consumption since midnight (Watt)",
            Field::AveragePower => "Average consumption since midnight (Watt)",
            Field::MaxPower => "Peak consumption since midnight (Watt)",
            Field::PowerProduction => "Net production (A-) at the moment (Watt)",
            Field::PowerReactive => "Reactive consumption (Q+) at the moment (kVAr)",
            Field::PowerProductionReactive => "Net reactive production (Q-) at the moment (kVAr)",
            Field::MinPowerProduction => "Min net production since midnight (Watt)",
            Field::MaxPowerProduction => "Max net production since midnight (Watt)",
            Field::LastMeterProduction => "Last meter active export register state (kWh)",
            Field::PowerFactor => "Power factor (active power / apparent power)",
            Field::VoltagePhase1 => "Voltage on phase 1",
            Field::VoltagePhase2 => "Voltage on phase 2",
            Field::VoltagePhase3 => "Voltage on phase 3",
            Field::CurrentL1 => "Current on L1",
            Field::CurrentL2 => "Current on L2",
            Field::CurrentL3 => "Current on L3",
            Field::SignalStrength => "Device signal strength (Pulse - dB; Watty - percent)",
        }
    }

    pub fn group(self) -> FieldGroup {
        match self {
            Field::VoltagePhase1 | Field::VoltagePhase2 | Field::VoltagePhase3 => {
                FieldGroup::Voltage
            }
            Field::CurrentL1 | Field::CurrentL2 | Field::CurrentL3 => FieldGroup::Current,
            _ => FieldGroup::Core,
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        Field::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ExporterError::Parse(format!("unknown field: {input}")))
    }

    pub fn parse_list(raw: &str) -> Result<Vec<Self>> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Field::parse)
            .collect()
    }
}

impl FieldGroup {
    pub fn members(self) -> Vec<Field> {
        Field::EXPORT_ORDER
            .into_iter()
            .filter(|f| f.group() == self)
            .collect()
    }
}

impl FromStr for Field {
    type Err = ExporterError;

    fn from_str(s: &str) -> Result<Self> {
        Field::parse(s)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
