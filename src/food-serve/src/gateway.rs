use std::time::Duration;

use log::{debug, warn};
pub use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::preprocess::{NestedTensor, NormalizedTensor};
use crate::{Error, Result, Timer};

pub const DEFAULT_INFERENCE_URL: &str = "http://localhost:9000/v1/models/ImageClassifier:predict";

/// How to reach the model server.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Full `:predict` URL of the model
    pub endpoint: Url,

    /// Upper bound for a single request, connection included
    pub timeout: Duration,

    /// Extra attempts after a connection failure or timeout
    pub retries: u32,

    /// Delay before the first retry, doubled for every following one
    pub backoff: Duration,

    /// Narrow the tensor to half precision before sending it
    pub legacy_precision: bool,
}

impl GatewayConfig {
    /// `http://<host>:<port>/v1/models/<model>:predict`
    pub fn endpoint_for(host: &str, port: u16, model: &str) -> Result<Url> {
        let url = format!("http://{}:{}/v1/models/{}:predict", host, port, model);
        Url::parse(&url).map_err(|e| Error::InvalidRequest(format!("bad inference url {}: {}", url, e)))
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            endpoint: Url::parse(DEFAULT_INFERENCE_URL).expect("default inference url is valid"),
            timeout: Duration::from_secs(30),
            retries: 2,
            backoff: Duration::from_millis(250),
            legacy_precision: true,
        }
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: [Instance<'a>; 1],
}

#[derive(Serialize)]
struct Instance<'a> {
    input_image: NestedTensor<'a>,
}

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<Vec<f64>>,
}

/// Client side of the model server's REST predict API.
pub struct InferenceGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl InferenceGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Internal(format!("could not build http client: {}", e)))?;

        Ok(InferenceGateway { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Send one tensor to the model and return its raw scores.
    pub async fn predict(&self, tensor: &NormalizedTensor) -> Result<Vec<f64>> {
        let mut t = Timer::new_start("Running inference");

        let body = serde_json::to_vec(&PredictRequest {
            instances: [Instance {
                input_image: tensor.as_nested(self.config.legacy_precision),
            }],
        })
        .map_err(|e| Error::Internal(format!("could not encode tensor: {}", e)))?;

        let resp = self.send_with_retry(body).await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "model server answered {}: {}",
                status, text
            )));
        }

        let payload = resp
            .bytes()
            .await
            .map_err(|e| Error::from_transport("could not read model server response", e))?;
        let decoded: PredictResponse = serde_json::from_slice(&payload)
            .map_err(|e| Error::Inference(format!("malformed model server response: {}", e)))?;

        t.stop();

        decoded
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| Error::ContractViolation("model server returned no predictions".into()))
    }

    async fn send_with_retry(&self, body: Vec<u8>) -> Result<reqwest::Response> {
        let mut delay = self.config.backoff;
        let mut attempt = 0;

        loop {
            debug!(
                "posting {} bytes to {} (attempt {})",
                body.len(),
                self.config.endpoint,
                attempt + 1
            );

            let result = self
                .client
                .post(self.config.endpoint.clone())
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(resp) => return Ok(resp),
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.config.retries => {
                    warn!(
                        "model server at {} unavailable ({}), retrying in {} ms",
                        self.config.endpoint,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(Error::from_transport("could not reach model server", e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use image::{DynamicImage, Rgb, RgbImage};
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    async fn spawn(app: Router) -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service());
        tokio::spawn(server);
        addr
    }

    fn gateway(addr: SocketAddr) -> InferenceGateway {
        InferenceGateway::new(GatewayConfig {
            endpoint: GatewayConfig::endpoint_for(&addr.ip().to_string(), addr.port(), "ImageClassifier")
                .unwrap(),
            backoff: Duration::from_millis(1),
            ..Default::default()
        })
        .unwrap()
    }

    fn tensor() -> NormalizedTensor {
        NormalizedTensor::from_image(&DynamicImage::ImageRgb8(RgbImage::from_pixel(
            10,
            10,
            Rgb([0, 128, 255]),
        )))
    }

    #[test]
    fn endpoint_follows_rest_layout() {
        let url = GatewayConfig::endpoint_for("tfserving", 9000, "ImageClassifier").unwrap();
        assert_eq!(url.as_str(), "http://tfserving:9000/v1/models/ImageClassifier:predict");
        assert_eq!(GatewayConfig::default().endpoint.as_str(), DEFAULT_INFERENCE_URL);
    }

    #[tokio::test]
    async fn request_carries_one_instance() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let captured = seen.clone();
        let app = Router::new().route(
            "/v1/models/*model",
            post(move |Json(body): Json<Value>| async move {
                *captured.lock().unwrap() = Some(body);
                Json(json!({"predictions": [[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0]]}))
            }),
        );
        let addr = spawn(app).await;

        let scores = gateway(addr).predict(&tensor()).await.unwrap();
        assert_eq!(scores.len(), 10);
        assert_eq!(scores[9], 1.0);

        let body = seen.lock().unwrap().take().unwrap();
        let instances = body["instances"].as_array().unwrap();
        assert_eq!(instances.len(), 1);
        let image = &instances[0]["input_image"];
        assert_eq!(image.as_array().unwrap().len(), 224);
        assert_eq!(image[0].as_array().unwrap().len(), 224);
        assert_eq!(image[0][0].as_array().unwrap().len(), 3);
        assert_eq!(image[3][4][2].as_f64(), Some(1.0));
    }

    #[tokio::test]
    async fn error_status_is_an_inference_error() {
        let app = Router::new().route(
            "/v1/models/*model",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded") }),
        );
        let addr = spawn(app).await;

        let err = gateway(addr).predict(&tensor()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Inference);
        assert!(err.to_string().contains("model not loaded"));
    }

    #[tokio::test]
    async fn malformed_json_is_an_inference_error() {
        let app = Router::new().route(
            "/v1/models/*model",
            post(|| async { Json(json!({"outputs": "nope"})) }),
        );
        let addr = spawn(app).await;

        let err = gateway(addr).predict(&tensor()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Inference);
    }

    #[tokio::test]
    async fn empty_predictions_violate_the_contract() {
        let app = Router::new().route(
            "/v1/models/*model",
            post(|| async { Json(json!({"predictions": []})) }),
        );
        let addr = spawn(app).await;

        let err = gateway(addr).predict(&tensor()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContractViolation);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connectivity_error() {
        // Grab a free port and release it so nothing is listening there.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();

        let err = gateway(addr).predict(&tensor()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
    }
}
