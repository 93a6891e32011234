//! Sensor projection of the aggregate gas data.
//!
//! Each account yields one reading per descriptor whose key is present in its
//! record, plus one reading per monthly bill and per daily bill.

use crate::models::{AccountRecord, GasData};
use serde::Serialize;
use serde_json::{json, Map, Value};

pub const DOMAIN: &str = "bj_gas";
pub const STATE_UNKNOWN: &str = "unknown";

const CUBIC_METERS: &str = "m³";
const HISTORY_NAME_PREFIX: &str = "燃气消耗";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Gas,
    Voltage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    TotalIncreasing,
}

/// Static display metadata for one record field.
#[derive(Debug, Clone, Copy)]
pub struct SensorDescriptor {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: Option<&'static str>,
    pub unit: Option<&'static str>,
    pub device_class: Option<DeviceClass>,
    pub state_class: Option<StateClass>,
    /// Other record fields exposed as extra attributes.
    pub attributes: &'static [&'static str],
}

pub const GAS_SENSORS: &[SensorDescriptor] = &[
    SensorDescriptor {
        key: "balance",
        name: "燃气费余额",
        icon: Some("hass:cash-100"),
        unit: Some("元"),
        device_class: None,
        state_class: None,
        attributes: &["last_update"],
    },
    SensorDescriptor {
        key: "current_level",
        name: "当前燃气阶梯",
        icon: Some("hass:stairs"),
        unit: None,
        device_class: None,
        state_class: None,
        attributes: &[],
    },
    SensorDescriptor {
        key: "current_price",
        name: "当前气价",
        icon: Some("hass:cash-100"),
        unit: Some("元/m³"),
        device_class: None,
        state_class: None,
        attributes: &[],
    },
    SensorDescriptor {
        key: "current_level_remain",
        name: "当前阶梯剩余额度",
        icon: None,
        unit: Some(CUBIC_METERS),
        device_class: Some(DeviceClass::Gas),
        state_class: None,
        attributes: &[],
    },
    SensorDescriptor {
        key: "year_consume",
        name: "本年度用气量",
        icon: None,
        unit: Some(CUBIC_METERS),
        device_class: Some(DeviceClass::Gas),
        state_class: Some(StateClass::TotalIncreasing),
        attributes: &[],
    },
    SensorDescriptor {
        key: "month_reg_qty",
        name: "当月用气量",
        icon: None,
        unit: Some(CUBIC_METERS),
        device_class: Some(DeviceClass::Gas),
        state_class: Some(StateClass::TotalIncreasing),
        attributes: &[],
    },
    SensorDescriptor {
        key: "battery_voltage",
        name: "气表电量",
        icon: None,
        unit: Some("V"),
        device_class: Some(DeviceClass::Voltage),
        state_class: None,
        attributes: &[],
    },
    SensorDescriptor {
        key: "mtr_status",
        name: "阀门状态",
        icon: None,
        unit: Some(""),
        device_class: Some(DeviceClass::Gas),
        state_class: None,
        attributes: &[],
    },
];

/// One sensor state as published to the hub.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub unique_id: String,
    pub account: String,
    pub name: String,
    pub state: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<DeviceClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<StateClass>,
    pub attributes: Map<String, Value>,
}

pub fn unique_id(user_code: &str, suffix: &str) -> String {
    format!("{}.gas_{}_{}", DOMAIN, user_code, suffix)
}

fn unknown() -> Value {
    Value::String(STATE_UNKNOWN.to_string())
}

fn state_or_unknown(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Null) | None => unknown(),
        Some(v) => v.clone(),
    }
}

/// Builds every sensor reading for every account, in account order.
pub fn build_sensor_readings(data: &GasData) -> Vec<SensorReading> {
    data.iter()
        .flat_map(|(user_code, record)| account_readings(user_code, record))
        .collect()
}

fn account_readings(user_code: &str, record: &AccountRecord) -> Vec<SensorReading> {
    let fields = record.fields();
    let mut readings = Vec::new();

    for descriptor in GAS_SENSORS {
        let Some(value) = fields.get(descriptor.key) else {
            continue;
        };

        let attributes = descriptor
            .attributes
            .iter()
            .map(|attr| (attr.to_string(), state_or_unknown(fields.get(*attr))))
            .collect();

        readings.push(SensorReading {
            unique_id: unique_id(user_code, descriptor.key),
            account: user_code.to_string(),
            name: descriptor.name.to_string(),
            state: state_or_unknown(Some(value)),
            icon: descriptor.icon,
            unit_of_measurement: descriptor.unit,
            device_class: descriptor.device_class,
            state_class: descriptor.state_class,
            attributes,
        });
    }

    if let Some(year) = &record.year {
        for (index, month) in year.monthly_bills.iter().enumerate() {
            let mut attributes = Map::new();
            attributes.insert("consume_bill".to_string(), json!(month.amt.unwrap_or(0.0)));

            readings.push(SensorReading {
                unique_id: unique_id(user_code, &format!("monthly_{}", index + 1)),
                account: user_code.to_string(),
                name: history_name(month.mon.as_deref()),
                state: month.reg_qty.map(|q| json!(q)).unwrap_or_else(unknown),
                icon: None,
                unit_of_measurement: Some(CUBIC_METERS),
                device_class: Some(DeviceClass::Gas),
                state_class: None,
                attributes,
            });
        }
    }

    if let Some(week) = &record.week {
        for (index, day) in week.daily_bills.iter().enumerate() {
            // Vendor days carry a time part; the name keeps the date only.
            let date = day
                .day
                .as_deref()
                .map(|d| d.chars().take(10).collect::<String>());

            readings.push(SensorReading {
                unique_id: unique_id(user_code, &format!("daily_{}", index + 1)),
                account: user_code.to_string(),
                name: history_name(date.as_deref()),
                state: day.reg_qty.map(|q| json!(q)).unwrap_or_else(unknown),
                icon: None,
                unit_of_measurement: Some(CUBIC_METERS),
                device_class: Some(DeviceClass::Gas),
                state_class: None,
                attributes: Map::new(),
            });
        }
    }

    readings
}

fn history_name(label: Option<&str>) -> String {
    match label {
        Some(label) => format!("{} {}", HISTORY_NAME_PREFIX, label),
        None => STATE_UNKNOWN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use std::collections::HashSet;

    fn full_record() -> AccountRecord {
        let mut record = AccountRecord::default();
        record.merge(Facet::Status(StatusInfo {
            balance: 88.5,
            battery_voltage: 3.4,
            current_price: 2.61,
            month_reg_qty: 7.0,
            mtr_status: "开阀".to_string(),
            last_update: "2024-05-01".to_string(),
        }));
        record.merge(Facet::Week(WeeklyBills {
            daily_bills: vec![
                serde_json::from_value(json!({"day": "2024-05-01 00:00:00", "regQty": "0.5"}))
                    .unwrap(),
                serde_json::from_value(json!({"regQty": null})).unwrap(),
            ],
        }));
        record.merge(Facet::Year(YearlyBills {
            monthly_bills: vec![
                serde_json::from_value(json!({"mon": "2024-04", "regQty": 20, "amt": "52.2"}))
                    .unwrap(),
                serde_json::from_value(json!({"mon": "2024-03", "regQty": 25})).unwrap(),
            ],
        }));
        record.merge(Facet::Step(StepInfo {
            current_level: Some(1),
            year_consume: 45.0,
            current_level_remain: Some(305.0),
        }));
        record
    }

    fn find<'a>(readings: &'a [SensorReading], id: &str) -> &'a SensorReading {
        readings
            .iter()
            .find(|r| r.unique_id == id)
            .unwrap_or_else(|| panic!("missing sensor {}", id))
    }

    #[test]
    fn test_full_record_produces_all_sensors() {
        let data: GasData = [("1001".to_string(), full_record())].into_iter().collect();
        let readings = build_sensor_readings(&data);

        // 8 field sensors + 2 monthly + 2 daily
        assert_eq!(readings.len(), 12);
        let ids: HashSet<&str> = readings.iter().map(|r| r.unique_id.as_str()).collect();
        assert_eq!(ids.len(), readings.len());

        let balance = find(&readings, "bj_gas.gas_1001_balance");
        assert_eq!(balance.state, json!(88.5));
        assert_eq!(balance.unit_of_measurement, Some("元"));
        assert_eq!(balance.attributes.get("last_update"), Some(&json!("2024-05-01")));

        let level = find(&readings, "bj_gas.gas_1001_current_level");
        assert_eq!(level.state, json!(1));
        assert_eq!(level.icon, Some("hass:stairs"));

        let year = find(&readings, "bj_gas.gas_1001_year_consume");
        assert_eq!(year.state_class, Some(StateClass::TotalIncreasing));
    }

    #[test]
    fn test_history_sensors() {
        let data: GasData = [("1001".to_string(), full_record())].into_iter().collect();
        let readings = build_sensor_readings(&data);

        let april = find(&readings, "bj_gas.gas_1001_monthly_1");
        assert_eq!(april.name, "燃气消耗 2024-04");
        assert_eq!(april.state, json!(20.0));
        assert_eq!(april.attributes.get("consume_bill"), Some(&json!(52.2)));

        let march = find(&readings, "bj_gas.gas_1001_monthly_2");
        assert_eq!(march.attributes.get("consume_bill"), Some(&json!(0.0)));

        let day = find(&readings, "bj_gas.gas_1001_daily_1");
        assert_eq!(day.name, "燃气消耗 2024-05-01");
        assert_eq!(day.state, json!(0.5));

        let blank = find(&readings, "bj_gas.gas_1001_daily_2");
        assert_eq!(blank.name, STATE_UNKNOWN);
        assert_eq!(blank.state, json!(STATE_UNKNOWN));
    }

    #[test]
    fn test_absent_keys_produce_no_sensor() {
        let mut record = full_record();
        record.merge(Facet::Step(StepInfo {
            current_level: None,
            year_consume: 900.0,
            current_level_remain: None,
        }));
        let data: GasData = [("2002".to_string(), record)].into_iter().collect();
        let readings = build_sensor_readings(&data);

        assert!(readings
            .iter()
            .all(|r| r.unique_id != "bj_gas.gas_2002_current_level"
                && r.unique_id != "bj_gas.gas_2002_current_level_remain"));
        assert!(readings
            .iter()
            .any(|r| r.unique_id == "bj_gas.gas_2002_year_consume"));
    }

    #[test]
    fn test_descriptor_keys_are_record_fields() {
        let declared: HashSet<&str> = [
            StatusInfo::FIELDS,
            WeeklyBills::FIELDS,
            YearlyBills::FIELDS,
            StepInfo::FIELDS,
        ]
        .iter()
        .flat_map(|g| g.iter().copied())
        .collect();
        for descriptor in GAS_SENSORS {
            assert!(declared.contains(descriptor.key), "{}", descriptor.key);
            for attr in descriptor.attributes {
                assert!(declared.contains(attr), "{}", attr);
            }
        }
    }
}
