use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use food_serve::{Classifier, Error, GatewayConfig, ImageReference, Result, ResultEnvelope};
use image::{DynamicImage, ImageOutputFormat};
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;

/// Upper bound for any single request to the classification server.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can turn an image reference into a result document.
#[async_trait]
pub trait Estimator: Send + Sync {
    async fn estimate(&self, reference: &ImageReference) -> Result<Value>;
}

/// Sends images to a running food-server instance.
pub struct ServerEstimator {
    address: String,
    client: reqwest::Client,
}

impl ServerEstimator {
    /// Check that the server at `ip:port` is alive before handing out an
    /// estimator for it.
    pub async fn connect(ip: &str, port: u16) -> Result<Self> {
        Self::connect_with_timeout(ip, port, DEFAULT_TIMEOUT).await
    }

    pub async fn connect_with_timeout(ip: &str, port: u16, timeout: Duration) -> Result<Self> {
        let address = format!("http://{}:{}", ip, port);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("could not build http client: {}", e)))?;

        info!("sending request to: {}", address);

        let resp = client
            .get(format!("{}/ping/", address))
            .send()
            .await
            .map_err(|e| Error::Connectivity(format!("Can't connect to server: {}: {}", address, e)))?;

        if resp.status() != StatusCode::OK {
            return Err(Error::Connectivity(format!(
                "Can't connect to server: {}",
                address
            )));
        }

        Ok(ServerEstimator { address, client })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Upload one image as JPEG and return the server's JSON answer.
    pub async fn analyze_image(&self, image: &DynamicImage) -> Result<Value> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageOutputFormat::Jpeg(75))?;
        let jpeg = buf.into_inner();

        debug!("uploading {} bytes of JPEG", jpeg.len());

        let part = Part::bytes(jpeg)
            .file_name("filename")
            .mime_str("image/jpeg")
            .map_err(|e| Error::Internal(format!("could not build upload: {}", e)))?;

        let resp = self
            .client
            .post(format!("{}/analyse/", self.address))
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(|e| Error::Connectivity(format!("Can't connect to server: {}: {}", self.address, e)))?;

        if resp.status() != StatusCode::OK {
            return Err(Error::Inference(format!(
                "Request fail with code: {}",
                resp.status().as_u16()
            )));
        }

        resp.json()
            .await
            .map_err(|e| Error::Inference(format!("malformed server response: {}", e)))
    }
}

#[async_trait]
impl Estimator for ServerEstimator {
    async fn estimate(&self, reference: &ImageReference) -> Result<Value> {
        let image = reference.load(&self.client).await?;
        self.analyze_image(&image).await
    }
}

/// Runs the classification pipeline in this process, talking to the model
/// server directly. Answers with the same envelope as the HTTP service.
pub struct LocalEstimator {
    classifier: Classifier,
    client: reqwest::Client,
}

impl LocalEstimator {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        Ok(LocalEstimator {
            classifier: Classifier::new(config)?,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl Estimator for LocalEstimator {
    async fn estimate(&self, reference: &ImageReference) -> Result<Value> {
        let image = reference.load(&self.client).await?;
        let envelope = ResultEnvelope::from(self.classifier.classify(image).await);

        serde_json::to_value(&envelope)
            .map_err(|e| Error::Internal(format!("could not encode result: {}", e)))
    }
}
