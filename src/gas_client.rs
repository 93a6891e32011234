use crate::de::value_to_f64;
use crate::errors::{GasError, GasResult};
use crate::models::{
    AccountCode, ApiResponse, Credentials, DailyUsage, Facet, FacetKind, GasAccountRow, GasData,
    InfoListRow, MonthlyUsage, StatusInfo, StepInfo, TokenResponse, UserIdRow, WeeklyBills,
    YearlyBills,
};
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE,
    ORIGIN, USER_AGENT,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::RwLock;
use std::time::Duration;
use tracing;

pub const DEFAULT_BASE_URL: &str = "https://zt.bjgas.com";

/// Number of pricing tiers the vendor reports.
pub const MAX_PRICE_STEP: u8 = 5;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const TOKEN_PATH: &str = "/bjgas-server/oauth/token";
const USER_ID_PATH: &str = "/bjgas-server/i/api/getUserId";
const GAS_LIST_PATH: &str = "/bjgas-server/i/api/nsgetUserGasListEncrypt";
const USER_INFO_PATH: &str = "/bjgas-server/i/api/intelligent/queryUserInfo";
const WEEK_QRY_PATH: &str = "/bjgas-server/i/api/intelligent/getWeekQry";
const YEAR_QRY_PATH: &str = "/bjgas-server/i/api/intelligent/getYearQry";
const STEP_QRY_PATH: &str = "/bjgas-server/r/api?sysName=CCB&apiName=CM-MOB-IF07";
const STEP_OUTPUT_POINTER: &str = "/soapenv:Envelope/soapenv:Body/CM-MOB-IF07/output";

const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) \
    AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148 MicroMessenger/8.0.7(0x1800072c) \
    NetType/WIFI Language/zh_CN";

/// Client for the Beijing Gas mobile API.
///
/// Holds one HTTP session and the current access token. Every data fetch is
/// wrapped in [`GasClient::with_reauth`], so callers never need to log in
/// explicitly: the first call finds no token, logs in and retries.
pub struct GasClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    // Replaced wholesale on refresh; the guard is never held across an await.
    token: RwLock<Option<String>>,
}

impl GasClient {
    /// Creates a new `GasClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Vendor host, e.g. [`DEFAULT_BASE_URL`].
    /// * `credentials` - Login material for the token exchange.
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> GasResult<Self> {
        Self::with_timeout(base_url, credentials, REQUEST_TIMEOUT)
    }

    /// Same as [`GasClient::new`] with a custom per-request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> GasResult<Self> {
        let client = Client::builder()
            .default_headers(default_headers())
            .timeout(timeout)
            .build()
            .map_err(|e| GasError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ============ Authentication ============

    /// Returns the cached access token, or `AuthFailed` before the first login.
    pub fn get_token(&self) -> GasResult<String> {
        let guard = self.token.read().unwrap_or_else(|e| e.into_inner());
        guard
            .clone()
            .ok_or_else(|| GasError::AuthFailed("no access token obtained yet".to_string()))
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Exchanges the stored credentials for a fresh access token.
    ///
    /// Any failure is reported as `LoginFailed` wrapping the cause; the
    /// previous token, if any, is left untouched in that case.
    pub async fn refresh_token(&self) -> GasResult<()> {
        let token = self
            .request_token()
            .await
            .map_err(|e| GasError::LoginFailed(Box::new(e)))?;

        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
        tracing::info!("Beijing Gas access token refreshed");
        Ok(())
    }

    async fn request_token(&self) -> GasResult<String> {
        let request = self.client.post(self.url(TOKEN_PATH)).query(&[
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("grant_type", "password"),
            ("username", self.credentials.encrypted_username.as_str()),
            ("password", self.credentials.encrypted_password.as_str()),
        ]);
        let body = send_json(request).await?;

        let parsed: TokenResponse = serde_json::from_value(body.clone()).map_err(|e| {
            GasError::InvalidData(format!("unexpected token response: {}, body= {}", e, body))
        })?;

        parsed
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                GasError::InvalidData(format!("cannot find access token, body= {}", body))
            })
    }

    /// Runs `op`; on `AuthFailed` or HTTP 401, refreshes the token and runs
    /// it exactly once more. Other errors and second failures propagate as-is.
    pub async fn with_reauth<T, F, Fut>(&self, op: F) -> GasResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = GasResult<T>>,
    {
        match op().await {
            Err(e) if e.needs_reauth() => {
                tracing::info!("Auth failed, refreshing token and retrying: {}", e);
                self.refresh_token().await?;
                op().await
            }
            result => result,
        }
    }

    fn bearer(&self) -> GasResult<String> {
        Ok(format!("Bearer {}", self.get_token()?))
    }

    // ============ Account Discovery ============

    /// Lists the account codes reachable from the configured login.
    ///
    /// Identities without a user id and accounts without a code are skipped.
    /// Duplicates are kept.
    pub async fn get_gas_list(&self) -> GasResult<Vec<AccountCode>> {
        self.with_reauth(move || self.fetch_gas_list()).await
    }

    async fn fetch_gas_list(&self) -> GasResult<Vec<AccountCode>> {
        let token = self.get_token()?;
        let auth = format!("Bearer {}", token);
        tracing::debug!("Fetching user ids: {}/[REDACTED]", USER_ID_PATH);

        let request = self
            .client
            .get(self.url(&format!("{}/{}", USER_ID_PATH, token)))
            .header(AUTHORIZATION, &auth);
        let body = send_json(request).await?;
        let rows: Vec<UserIdRow> = parse_rows(success_rows(body, "get user ids")?, "get user ids")?;

        let mut user_codes = Vec::new();
        for row in rows {
            let Some(user_id) = row.user_id.filter(|id| !id.is_empty()) else {
                continue;
            };

            let request = self
                .client
                .get(self.url(&format!("{}/{}", GAS_LIST_PATH, user_id)))
                .header(AUTHORIZATION, &auth);
            let body = send_json(request).await?;
            let context = format!("get gas list for user {}", user_id);
            let accounts: Vec<GasAccountRow> =
                parse_rows(success_rows(body, &context)?, &context)?;

            user_codes.extend(
                accounts
                    .into_iter()
                    .filter_map(|account| account.user_code)
                    .filter(|code| !code.is_empty()),
            );
        }

        tracing::info!("Discovered {} gas accounts", user_codes.len());
        Ok(user_codes)
    }

    // ============ Facet Fetchers ============

    /// Balance, battery, price and meter status of one account.
    pub async fn get_userinfo(&self, user_code: &str) -> GasResult<StatusInfo> {
        self.with_reauth(move || self.fetch_userinfo(user_code)).await
    }

    async fn fetch_userinfo(&self, user_code: &str) -> GasResult<StatusInfo> {
        let body = self.query_by_user_code(USER_INFO_PATH, user_code).await?;
        let context = format!("query user info for {}", user_code);
        first_row(success_rows(body, &context)?, &context)
    }

    /// Daily usage over the last week.
    pub async fn get_week(&self, user_code: &str) -> GasResult<WeeklyBills> {
        self.with_reauth(move || self.fetch_week(user_code)).await
    }

    async fn fetch_week(&self, user_code: &str) -> GasResult<WeeklyBills> {
        let body = self.query_by_user_code(WEEK_QRY_PATH, user_code).await?;
        let context = format!("query week for {}", user_code);
        let row: InfoListRow<DailyUsage> = first_row(success_rows(body, &context)?, &context)?;
        Ok(WeeklyBills {
            daily_bills: row.info_list,
        })
    }

    /// Monthly usage and bills over the last year.
    pub async fn get_year(&self, user_code: &str) -> GasResult<YearlyBills> {
        self.with_reauth(move || self.fetch_year(user_code)).await
    }

    async fn fetch_year(&self, user_code: &str) -> GasResult<YearlyBills> {
        let body = self.query_by_user_code(YEAR_QRY_PATH, user_code).await?;
        let context = format!("query year for {}", user_code);
        let row: InfoListRow<MonthlyUsage> = first_row(success_rows(body, &context)?, &context)?;
        Ok(YearlyBills {
            monthly_bills: row.info_list,
        })
    }

    /// Current pricing tier and year-to-date consumption.
    pub async fn get_step(&self, user_code: &str) -> GasResult<StepInfo> {
        self.with_reauth(move || self.fetch_step(user_code)).await
    }

    async fn fetch_step(&self, user_code: &str) -> GasResult<StepInfo> {
        let request = self
            .client
            .post(self.url(STEP_QRY_PATH))
            .header(AUTHORIZATION, self.bearer()?)
            .header(CONTENT_TYPE, "application/json;charset=UTF-8")
            .header(ORIGIN, "file://")
            .json(&json!({
                "CM-MOB-IF07": {
                    "input": { "UniUserCode": user_code }
                }
            }));
        let body = send_json(request).await?;

        let output = body
            .pointer(STEP_OUTPUT_POINTER)
            .and_then(Value::as_object)
            .ok_or_else(|| {
                GasError::InvalidData(format!("query step for {} error: {}", user_code, body))
            })?;

        parse_step(output)
    }

    async fn query_by_user_code(&self, path: &str, user_code: &str) -> GasResult<Value> {
        let request = self
            .client
            .get(self.url(path))
            .query(&[("userCode", user_code)])
            .header(AUTHORIZATION, self.bearer()?);
        send_json(request).await
    }

    async fn fetch_facet<'a>(
        &self,
        user_code: &'a str,
        kind: FacetKind,
    ) -> GasResult<(&'a str, Facet)> {
        let facet = match kind {
            FacetKind::Status => Facet::Status(self.get_userinfo(user_code).await?),
            FacetKind::Week => Facet::Week(self.get_week(user_code).await?),
            FacetKind::Year => Facet::Year(self.get_year(user_code).await?),
            FacetKind::Step => Facet::Step(self.get_step(user_code).await?),
        };
        Ok((user_code, facet))
    }

    // ============ Aggregate ============

    /// Discovers every account and fetches all four facets for each.
    ///
    /// All facet fetches run concurrently on the calling task. The first
    /// unrecovered failure fails the whole call and drops the fetches still in
    /// flight; no partial result is returned.
    pub async fn async_get_data(&self) -> GasResult<GasData> {
        let user_codes = self.get_gas_list().await?;

        let mut tasks = FuturesUnordered::new();
        for user_code in &user_codes {
            for kind in FacetKind::ALL {
                tasks.push(self.fetch_facet(user_code, kind));
            }
        }

        let mut results = GasData::new();
        while let Some(outcome) = tasks.next().await {
            let (user_code, facet) = outcome?;
            tracing::debug!("Fetched {} facet for {}", facet.kind().as_str(), user_code);
            results
                .entry(user_code.to_string())
                .or_default()
                .merge(facet);
        }

        tracing::debug!("Gas data fetched successfully, results= {:?}", results);
        Ok(results)
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(
        HeaderName::from_static("x-requested-with"),
        HeaderValue::from_static("XMLHttpRequest"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-cn, zh-Hans; q=0.9"));
    headers.insert(USER_AGENT, HeaderValue::from_static(MOBILE_USER_AGENT));
    headers
}

/// Sends the request, rejects non-2xx statuses and decodes the JSON body.
async fn send_json(request: RequestBuilder) -> GasResult<Value> {
    let response = request.send().await?.error_for_status()?;
    Ok(response.json().await?)
}

/// Checks the envelope's `success` flag and returns its raw `rows`.
fn success_rows(body: Value, context: &str) -> GasResult<Value> {
    let envelope: ApiResponse = serde_json::from_value(body.clone())
        .map_err(|e| GasError::InvalidData(format!("{} error: {}, body= {}", context, e, body)))?;

    if !envelope.success {
        return Err(GasError::InvalidData(format!("{} error: {}", context, body)));
    }
    Ok(envelope.rows)
}

fn parse_rows<T: DeserializeOwned>(rows: Value, context: &str) -> GasResult<Vec<T>> {
    if rows.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(rows)
        .map_err(|e| GasError::InvalidData(format!("{} error: malformed rows: {}", context, e)))
}

fn first_row<T: DeserializeOwned>(rows: Value, context: &str) -> GasResult<T> {
    let row = match rows {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => {
            return Err(GasError::InvalidData(format!(
                "{} error: no rows in {}",
                context, other
            )))
        }
    };
    serde_json::from_value(row)
        .map_err(|e| GasError::InvalidData(format!("{} error: malformed row: {}", context, e)))
}

/// Builds [`StepInfo`] from the step query's `output` object.
pub fn parse_step(output: &Map<String, Value>) -> GasResult<StepInfo> {
    let year_consume = output
        .get("TotalSq")
        .and_then(value_to_f64)
        .ok_or_else(|| GasError::InvalidData(format!("step output lacks TotalSq: {:?}", output)))?;

    let (current_level, current_level_remain) = scan_price_steps(output)?;

    Ok(StepInfo {
        current_level,
        year_consume,
        current_level_remain,
    })
}

/// Finds the current pricing tier from the `Step{i}LeftoverQty` fields.
///
/// A missing leftover marks the current tier with no remaining quantity; a
/// leftover above zero marks the current tier with that remainder; anything
/// else means the tier is used up. Returns `(None, None)` when all
/// [`MAX_PRICE_STEP`] tiers are used up.
pub fn scan_price_steps(output: &Map<String, Value>) -> GasResult<(Option<u8>, Option<f64>)> {
    for step in 1..=MAX_PRICE_STEP {
        let key = format!("Step{}LeftoverQty", step);
        let leftover = match output.get(&key) {
            None | Some(Value::Null) => return Ok((Some(step), None)),
            Some(value) => value_to_f64(value).ok_or_else(|| {
                GasError::InvalidData(format!("{} is not a number: {}", key, value))
            })?,
        };

        if leftover > 0.0 {
            return Ok((Some(step), Some(leftover)));
        }
    }

    Ok((None, None))
}
