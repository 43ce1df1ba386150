use std::sync::Arc;

use image::DynamicImage;
use log::info;

use crate::gateway::{GatewayConfig, InferenceGateway};
use crate::loader::{decode_bytes, ImageReference};
use crate::preprocess::NormalizedTensor;
use crate::{CategoryPercentages, Error, Result, Timer};

/// Food classifier backed by a remote model server.
///
/// Decoding and resizing are CPU bound and run on the blocking pool; only
/// the call to the model server is awaited on the reactor.
#[derive(Clone)]
pub struct Classifier {
    gateway: Arc<InferenceGateway>,
}

impl Classifier {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        Ok(Classifier {
            gateway: Arc::new(InferenceGateway::new(config)?),
        })
    }

    pub fn gateway(&self) -> &InferenceGateway {
        &self.gateway
    }

    async fn run(&self, tensor: NormalizedTensor) -> Result<CategoryPercentages> {
        let scores = self.gateway.predict(&tensor).await?;
        CategoryPercentages::from_scores(&scores)
    }

    pub async fn classify(&self, image: DynamicImage) -> Result<CategoryPercentages> {
        let mut t = Timer::new_start("Classifying image");

        let tensor = blocking(move || Ok(NormalizedTensor::from_image(&image))).await?;
        let percentages = self.run(tensor).await?;

        t.stop();
        info!("processed time: {} msec", t.duration());

        Ok(percentages)
    }

    /// Classify an encoded image (JPEG, PNG, ...) received as raw bytes.
    pub async fn classify_from_raw(&self, data: Vec<u8>) -> Result<CategoryPercentages> {
        let mut t = Timer::new_start("Classifying upload");

        let tensor = blocking(move || {
            let image = decode_bytes(&data)?;
            Ok(NormalizedTensor::from_image(&image))
        })
        .await?;
        let percentages = self.run(tensor).await?;

        t.stop();
        info!("processed time: {} msec", t.duration());

        Ok(percentages)
    }

    pub async fn classify_reference(
        &self,
        reference: &ImageReference,
        client: &reqwest::Client,
    ) -> Result<CategoryPercentages> {
        let image = reference.load(client).await?;
        self.classify(image).await
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("preprocessing task failed: {}", e)))?
}
