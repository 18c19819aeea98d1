//! Price prediction pass-through
//!
//! Forecasting lives in an external analytics service; this tool only
//! forwards the ticker and formats the reply.

use super::{require_str, soft_fail, Tool};
use crate::error::AgentError;
use crate::models::ToolParams;
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Seven-day forecast returned by the analytics capability
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Forecast {
    pub target_price: f64,
    pub change_pct: f64,
    /// 0.0..=1.0
    pub confidence: f64,
}

#[async_trait::async_trait]
pub trait PricePredictor: Send + Sync {
    async fn forecast(&self, ticker: &str) -> Result<Forecast>;
}

/// Analytics service reached over HTTP
pub struct HttpPredictor {
    client: Client,
    base_url: String,
}

impl HttpPredictor {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl PricePredictor for HttpPredictor {
    async fn forecast(&self, ticker: &str) -> Result<Forecast> {
        let url = format!("{}/api/v1/predict", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "ticker": ticker }))
            .send()
            .await
            .map_err(|e| {
                AgentError::ToolError(format!("Analytics request failed for {}: {}", ticker, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::ToolError(format!(
                "Analytics service returned {} for {}: {}",
                status, ticker, body
            )));
        }

        response
            .json::<Forecast>()
            .await
            .map_err(|e| AgentError::ToolError(format!("Invalid forecast response: {}", e)))
    }
}

pub struct PredictPriceTool {
    predictor: Option<Arc<dyn PricePredictor>>,
}

impl PredictPriceTool {
    pub fn new(predictor: Option<Arc<dyn PricePredictor>>) -> Self {
        Self { predictor }
    }

    async fn predict(&self, params: &ToolParams) -> Result<String> {
        let ticker = require_str(params, "ticker")?;
        let predictor = self.predictor.as_ref().ok_or_else(|| {
            AgentError::ToolError("FINANCIAL_API_BASE_URL is not configured".to_string())
        })?;

        let forecast = predictor.forecast(ticker).await?;
        Ok(format_forecast(ticker, &forecast))
    }
}

fn format_forecast(ticker: &str, forecast: &Forecast) -> String {
    format!(
        "Neural Forecast for {}:\n- Target Price (7D): ${:.6}\n- Predicted Trend: {:.2}%\n- ML Confidence: {:.1}%",
        ticker,
        forecast.target_price,
        forecast.change_pct,
        forecast.confidence * 100.0
    )
}

#[async_trait::async_trait]
impl Tool for PredictPriceTool {
    fn name(&self) -> &str {
        "predict_price"
    }

    fn description(&self) -> &str {
        "Predict price direction with the analytics model (7D forecast). Param: 'ticker'. Example tickers: BTC/USDT, ETH/USDT."
    }

    async fn execute(&self, params: &ToolParams) -> String {
        soft_fail(self.predict(params).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    struct FixedPredictor(Option<Forecast>);

    #[async_trait::async_trait]
    impl PricePredictor for FixedPredictor {
        async fn forecast(&self, ticker: &str) -> Result<Forecast> {
            self.0
                .clone()
                .ok_or_else(|| AgentError::ToolError(format!("No data found for {}", ticker)))
        }
    }

    fn params(value: Value) -> ToolParams {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_formats_three_line_summary() {
        let tool = PredictPriceTool::new(Some(Arc::new(FixedPredictor(Some(Forecast {
            target_price: 64250.5,
            change_pct: 3.456,
            confidence: 0.72,
        })))));

        let out = tool.execute(&params(json!({"ticker": "BTC/USDT"}))).await;
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Neural Forecast for BTC/USDT:");
        assert_eq!(lines[1], "- Target Price (7D): $64250.500000");
        assert_eq!(lines[2], "- Predicted Trend: 3.46%");
        assert_eq!(lines[3], "- ML Confidence: 72.0%");
    }

    #[tokio::test]
    async fn test_errors_are_soft() {
        let tool = PredictPriceTool::new(Some(Arc::new(FixedPredictor(None))));
        let out = tool.execute(&params(json!({"ticker": "ATH/USDT"}))).await;
        assert!(out.starts_with("[Error]"));
        assert!(out.contains("ATH/USDT"));

        let unconfigured = PredictPriceTool::new(None);
        let out = unconfigured.execute(&params(json!({"ticker": "BTC/USDT"}))).await;
        assert!(out.contains("not configured"));

        let out = unconfigured.execute(&params(json!({}))).await;
        assert!(out.contains("'ticker' is required"));
    }
}
