use crate::de::{f64_lenient, opt_f64_lenient, opt_string_lenient, string_lenient};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Vendor-issued identifier for one gas meter/account.
pub type AccountCode = String;

/// Aggregate result of one fetch: account code to merged facet record.
pub type GasData = BTreeMap<AccountCode, AccountRecord>;

// ============ Credentials ============

/// Login material for the password-grant token exchange.
///
/// Username and password are the vendor app's pre-encrypted strings, not
/// plaintext.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub encrypted_username: String,
    pub encrypted_password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("encrypted_username", &"[REDACTED]")
            .field("encrypted_password", &"[REDACTED]")
            .finish()
    }
}

// ============ Wire Models ============

/// Common envelope of the `/i/api` endpoints.
///
/// `rows` is kept raw so the `success` flag can be checked before the row
/// shape is validated.
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default)]
    pub rows: Value,
}

/// Token endpoint response. Only `access_token` is consumed.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

/// One identity returned by the user-id lookup.
#[derive(Debug, Deserialize)]
pub struct UserIdRow {
    #[serde(rename = "userId", default, deserialize_with = "opt_string_lenient")]
    pub user_id: Option<String>,
}

/// One gas account listed under an identity.
#[derive(Debug, Deserialize)]
pub struct GasAccountRow {
    #[serde(rename = "userCode", default, deserialize_with = "opt_string_lenient")]
    pub user_code: Option<String>,
}

/// Row wrapper shared by the weekly and yearly queries.
#[derive(Debug, Deserialize)]
pub struct InfoListRow<T> {
    #[serde(rename = "infoList")]
    pub info_list: Vec<T>,
}

// ============ Facets ============

/// Current meter and account status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInfo {
    /// Remaining prepaid balance, in yuan.
    #[serde(rename(deserialize = "remainAmt"), deserialize_with = "f64_lenient")]
    pub balance: f64,
    #[serde(rename(deserialize = "batteryVoltage"), deserialize_with = "f64_lenient")]
    pub battery_voltage: f64,
    #[serde(rename(deserialize = "gasPrice"), deserialize_with = "f64_lenient")]
    pub current_price: f64,
    /// Quantity registered this month, in m³.
    #[serde(rename(deserialize = "regQty"), deserialize_with = "f64_lenient")]
    pub month_reg_qty: f64,
    #[serde(rename(deserialize = "mtrStatus"), deserialize_with = "string_lenient")]
    pub mtr_status: String,
    #[serde(rename(deserialize = "fiscalDate"), deserialize_with = "string_lenient")]
    pub last_update: String,
}

impl StatusInfo {
    pub const FIELDS: &'static [&'static str] = &[
        "balance",
        "battery_voltage",
        "current_price",
        "month_reg_qty",
        "mtr_status",
        "last_update",
    ];
}

/// One day of the weekly query. Unknown vendor fields are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    #[serde(
        default,
        deserialize_with = "opt_string_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub day: Option<String>,
    #[serde(
        rename = "regQty",
        default,
        deserialize_with = "opt_f64_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub reg_qty: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One month of the yearly query. Unknown vendor fields are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyUsage {
    #[serde(
        default,
        deserialize_with = "opt_string_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub mon: Option<String>,
    #[serde(
        rename = "regQty",
        default,
        deserialize_with = "opt_f64_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub reg_qty: Option<f64>,
    /// Billed amount for the month, in yuan.
    #[serde(
        default,
        deserialize_with = "opt_f64_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub amt: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyBills {
    pub daily_bills: Vec<DailyUsage>,
}

impl WeeklyBills {
    pub const FIELDS: &'static [&'static str] = &["daily_bills"];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyBills {
    pub monthly_bills: Vec<MonthlyUsage>,
}

impl YearlyBills {
    pub const FIELDS: &'static [&'static str] = &["monthly_bills"];
}

/// Tiered-pricing position for the current year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInfo {
    /// 1-based tier index; unset when every tier reports consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_level: Option<u8>,
    /// Year-to-date consumption, in m³.
    pub year_consume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_level_remain: Option<f64>,
}

impl StepInfo {
    pub const FIELDS: &'static [&'static str] =
        &["current_level", "year_consume", "current_level_remain"];
}

/// The four independent data categories fetched per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacetKind {
    Status,
    Week,
    Year,
    Step,
}

impl FacetKind {
    pub const ALL: [FacetKind; 4] = [
        FacetKind::Status,
        FacetKind::Week,
        FacetKind::Year,
        FacetKind::Step,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FacetKind::Status => "status",
            FacetKind::Week => "week",
            FacetKind::Year => "year",
            FacetKind::Step => "step",
        }
    }
}

/// Result of one facet fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Facet {
    Status(StatusInfo),
    Week(WeeklyBills),
    Year(YearlyBills),
    Step(StepInfo),
}

impl Facet {
    pub fn kind(&self) -> FacetKind {
        match self {
            Facet::Status(_) => FacetKind::Status,
            Facet::Week(_) => FacetKind::Week,
            Facet::Year(_) => FacetKind::Year,
            Facet::Step(_) => FacetKind::Step,
        }
    }
}

// ============ Aggregate ============

/// Merged facets of one account. Serializes as one flat map of facet fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccountRecord {
    #[serde(flatten)]
    pub status: Option<StatusInfo>,
    #[serde(flatten)]
    pub week: Option<WeeklyBills>,
    #[serde(flatten)]
    pub year: Option<YearlyBills>,
    #[serde(flatten)]
    pub step: Option<StepInfo>,
}

impl AccountRecord {
    /// Stores a facet result, replacing an earlier result of the same facet.
    pub fn merge(&mut self, facet: Facet) {
        match facet {
            Facet::Status(info) => self.status = Some(info),
            Facet::Week(bills) => self.week = Some(bills),
            Facet::Year(bills) => self.year = Some(bills),
            Facet::Step(step) => self.step = Some(step),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status.is_some() && self.week.is_some() && self.year.is_some() && self.step.is_some()
    }

    /// Flat view keyed by facet field name.
    pub fn fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}
