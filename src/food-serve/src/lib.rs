//! Food image classification on top of a TensorFlow Serving model.
//!
//! Images are decoded, resized to the model input and scaled into `[0, 1]`
//! locally; the model itself runs behind the REST predict API of a separate
//! model server.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

pub mod classifier;
pub mod envelope;
pub mod error;
pub mod formatter;
pub mod gateway;
pub mod loader;
pub mod preprocess;

pub use classifier::Classifier;
pub use envelope::{ResultEnvelope, StructuredError};
pub use error::{Error, ErrorKind, Result};
pub use formatter::{CategoryPercentages, CATEGORIES};
pub use gateway::{GatewayConfig, InferenceGateway};
pub use loader::ImageReference;
pub use preprocess::NormalizedTensor;

pub struct Timer {
    name: String,
    tstamp: Option<DateTime<Utc>>,
    duration: Option<Duration>,
}

impl Timer {
    /// Create a new timer
    pub fn new(name: &str) -> Self {
        Timer {
            name: name.to_owned(),
            tstamp: None,
            duration: None,
        }
    }

    pub fn new_start(name: &str) -> Self {
        let mut t = Timer::new(name);
        t.start();
        t
    }

    /// Start the timer
    pub fn start(&mut self) {
        debug!("{}: starting", self.name);

        self.tstamp = Some(Utc::now());
        self.duration = None;
    }

    /// Stop the timer
    pub fn stop(&mut self) {
        match self.tstamp {
            None => debug!("{}: not running!", self.name),
            Some(tstamp) => {
                let d = Utc::now() - tstamp;

                self.duration = Some(d);
                self.tstamp = None;
                info!("{} duration: {} msec", self.name, d.num_milliseconds());
            }
        }
    }

    /// Get duration in milliseconds
    pub fn duration(&self) -> i64 {
        match self.duration {
            None => 0,
            Some(dur) => dur.num_milliseconds(),
        }
    }
}
