use crate::Result;
use crate::http::serialization;
use crate::http::types::Status;
use reqwest::header::HeaderMap as Headers;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 规范化后的 HTTP 响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,

    #[serde(with = "serialization::header_map")]
    pub headers: Headers,

    pub body: String,

    /// 网络耗时
    #[serde(with = "serialization::millis")]
    pub duration: Duration,
}

impl Response {
    pub fn new(status: u16, headers: Headers, body: String, duration: Duration) -> Result<Self> {
        Ok(Self {
            status: Status::new(status)?,
            headers,
            body,
            duration,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// 把 Body 解析为 JSON
    pub fn json(&self) -> std::result::Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_body() {
        let response = Response::new(
            200,
            Headers::new(),
            r#"{"ok": true}"#.to_string(),
            Duration::from_millis(3),
        )
        .unwrap();
        assert!(response.is_success());
        assert_eq!(response.json().unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_serialize_round_trips_headers_and_duration() {
        let mut headers = Headers::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        let response =
            Response::new(404, headers, "{}".to_string(), Duration::from_millis(120)).unwrap();

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], 404);
        assert_eq!(value["duration"], 120);
        assert_eq!(value["headers"]["content-type"], "application/json");

        let back: Response = serde_json::from_value(value).unwrap();
        assert!(back.is_client_error());
        assert_eq!(back.duration, Duration::from_millis(120));
    }
}
