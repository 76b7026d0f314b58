use crate::types::{DataPoint, DeleteScope, Dimension, Row, TimeWindow, Variable};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store answered with something other than 200; `body` is its
    /// explanation.
    #[error("store returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid store response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait DimensionalStore: Send + Sync {
    async fn save_dimension(&self, dimension: &Dimension) -> Result<(), StoreError>;
    async fn save_row(&self, dimension_code: &str, row: &Row) -> Result<(), StoreError>;
    async fn save_variable(&self, variable: &Variable) -> Result<(), StoreError>;
    async fn delete_period(
        &self,
        variable_code: &str,
        window: TimeWindow,
        scope: DeleteScope,
    ) -> Result<(), StoreError>;
    async fn post_data(&self, point: &DataPoint) -> Result<(), StoreError>;
}

#[derive(Serialize)]
struct DataBody<'a> {
    time: i64,
    value: f64,
    data: &'a BTreeMap<String, String>,
}

pub struct MinzClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl MinzClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, StoreError> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&T>,
    ) -> Result<serde_json::Value, StoreError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("{} {}", method, url);
        let mut req = self.http.request(method, &url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if status != StatusCode::OK {
            return Err(StoreError::Status { status, body: text });
        }
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

pub fn delete_period_path(variable_code: &str, window: TimeWindow, scope: DeleteScope) -> String {
    let mut path = format!(
        "data/{}/period?startTime={}&endTime={}",
        variable_code, window.start, window.end
    );
    if scope.var_data {
        path.push_str("&varData=true");
    }
    if scope.details {
        path.push_str("&details=true");
    }
    path
}

#[async_trait]
impl DimensionalStore for MinzClient {
    async fn save_dimension(&self, dimension: &Dimension) -> Result<(), StoreError> {
        self.request(Method::POST, "dim", Some(dimension)).await?;
        Ok(())
    }

    async fn save_row(&self, dimension_code: &str, row: &Row) -> Result<(), StoreError> {
        let path = format!("dim/{}/rows", dimension_code);
        self.request(Method::POST, &path, Some(row)).await?;
        Ok(())
    }

    async fn save_variable(&self, variable: &Variable) -> Result<(), StoreError> {
        self.request(Method::POST, "var", Some(variable)).await?;
        Ok(())
    }

    async fn delete_period(
        &self,
        variable_code: &str,
        window: TimeWindow,
        scope: DeleteScope,
    ) -> Result<(), StoreError> {
        let path = delete_period_path(variable_code, window, scope);
        self.request::<()>(Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn post_data(&self, point: &DataPoint) -> Result<(), StoreError> {
        let path = format!("data/{}", point.variable_code);
        let body = DataBody {
            time: point.time,
            value: point.value,
            data: &point.classifier_values,
        };
        self.request(Method::POST, &path, Some(&body)).await?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn delete_path_carries_window_and_flags() {
        let w = TimeWindow { start: 1, end: 2 };
        assert_eq!(
            delete_period_path("fipafan2019.oxigeno", w, DeleteScope::VARIABLE_DATA),
            "data/fipafan2019.oxigeno/period?startTime=1&endTime=2&varData=true"
        );
        assert_eq!(
            delete_period_path("v", w, DeleteScope { var_data: false, details: true }),
            "data/v/period?startTime=1&endTime=2&details=true"
        );
    }

    #[test]
    fn data_body_shape() {
        let mut data = BTreeMap::new();
        data.insert("estacion".to_string(), "101".to_string());
        let body = DataBody {
            time: 1_546_300_800_000,
            value: 7.5,
            data: &data,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"time": 1_546_300_800_000i64, "value": 7.5, "data": {"estacion": "101"}})
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = MinzClient::new("http://localhost:8096/", None).unwrap();
        assert_eq!(client.base_url, "http://localhost:8096");
    }
}
