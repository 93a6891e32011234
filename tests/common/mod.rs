#![allow(dead_code)]
/// Shared wiremock fixtures for the Beijing Gas API
use bjgas_api::gas_client::GasClient;
use bjgas_api::models::Credentials;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/bjgas-server/oauth/token";
pub const USER_ID_PATH: &str = "/bjgas-server/i/api/getUserId";
pub const GAS_LIST_PATH: &str = "/bjgas-server/i/api/nsgetUserGasListEncrypt";
pub const USER_INFO_PATH: &str = "/bjgas-server/i/api/intelligent/queryUserInfo";
pub const WEEK_QRY_PATH: &str = "/bjgas-server/i/api/intelligent/getWeekQry";
pub const YEAR_QRY_PATH: &str = "/bjgas-server/i/api/intelligent/getYearQry";
pub const STEP_QRY_PATH: &str = "/bjgas-server/r/api";

pub fn test_credentials() -> Credentials {
    Credentials {
        client_id: "test_client".to_string(),
        client_secret: "test_secret".to_string(),
        encrypted_username: "enc_user".to_string(),
        encrypted_password: "enc_pass".to_string(),
    }
}

pub fn create_test_client(server: &MockServer) -> GasClient {
    GasClient::new(server.uri(), test_credentials()).unwrap()
}

pub async fn mount_token(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "bearer",
            "expires_in": 7199
        })))
        .mount(server)
        .await;
}

/// One identity (`enc-1`) owning the given accounts.
pub async fn mount_discovery(server: &MockServer, token: &str, user_codes: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("{}/{}", USER_ID_PATH, token)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "rows": [{"userId": "enc-1"}]
        })))
        .mount(server)
        .await;

    let rows: Vec<Value> = user_codes
        .iter()
        .map(|code| json!({"userCode": code}))
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("{}/enc-1", GAS_LIST_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "rows": rows
        })))
        .mount(server)
        .await;
}

pub fn user_info_body() -> Value {
    json!({
        "success": true,
        "rows": [{
            "fiscalDate": "2024-05-01 08:30:00",
            "remainAmt": "156.30",
            "batteryVoltage": "3.58",
            "gasPrice": "2.61",
            "regQty": "18",
            "mtrStatus": "开阀"
        }]
    })
}

pub fn week_body() -> Value {
    json!({
        "success": true,
        "rows": [{
            "infoList": [
                {"day": "2024-04-30 00:00:00", "regQty": "0.6"},
                {"day": "2024-05-01 00:00:00", "regQty": "0.9"}
            ]
        }]
    })
}

pub fn year_body() -> Value {
    json!({
        "success": true,
        "rows": [{
            "infoList": [
                {"mon": "2024-04", "regQty": "21", "amt": "54.81"},
                {"mon": "2024-03", "regQty": "30", "amt": "78.30"}
            ]
        }]
    })
}

pub fn step_body(output: Value) -> Value {
    json!({
        "soapenv:Envelope": {
            "soapenv:Body": {
                "CM-MOB-IF07": {
                    "output": output
                }
            }
        }
    })
}

pub fn default_step_output() -> Value {
    json!({
        "TotalSq": "142.5",
        "Step1LeftoverQty": "207.5",
        "Step2LeftoverQty": "150"
    })
}

/// Mounts all four facet endpoints, each answering any account code.
pub async fn mount_facets(server: &MockServer, expected_calls_each: u64) {
    Mock::given(method("GET"))
        .and(path(USER_INFO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_info_body()))
        .expect(expected_calls_each)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(WEEK_QRY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(week_body()))
        .expect(expected_calls_each)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(YEAR_QRY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(year_body()))
        .expect(expected_calls_each)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(STEP_QRY_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(step_body(default_step_output())),
        )
        .expect(expected_calls_each)
        .mount(server)
        .await;
}
