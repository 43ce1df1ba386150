use std::error::Error;
use std::net::SocketAddr;
use std::time::Duration;

use food_serve::gateway::{GatewayConfig, Url};
use food_server::{serve, ErrorContract, ServerConfig};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "food-server",
    about = "HTTP service classifying food images through a TensorFlow Serving model"
)]
struct CmdArgs {
    /// Address to listen on
    #[structopt(long, env = "FOOD_SERVER_BIND", default_value = "0.0.0.0:5015")]
    bind: SocketAddr,

    /// REST predict endpoint of the model server
    #[structopt(
        long,
        env = "FOOD_SERVER_INFERENCE_URL",
        default_value = "http://localhost:9000/v1/models/ImageClassifier:predict"
    )]
    inference_url: Url,

    /// Timeout for a single model server request, in seconds
    #[structopt(long, env = "FOOD_SERVER_INFERENCE_TIMEOUT", default_value = "30")]
    inference_timeout: u64,

    /// Extra attempts when the model server cannot be reached
    #[structopt(long, env = "FOOD_SERVER_INFERENCE_RETRIES", default_value = "2")]
    inference_retries: u32,

    /// Send the image tensor in half precision (needed by TF Serving < 1.11)
    #[structopt(
        long,
        env = "FOOD_SERVER_LEGACY_PRECISION",
        parse(try_from_str),
        default_value = "true"
    )]
    legacy_precision: bool,

    /// Report failures with HTTP status codes and a structured body instead
    /// of the always-200 string envelope
    #[structopt(long)]
    structured_errors: bool,

    /// Largest accepted upload, in bytes
    #[structopt(long, env = "FOOD_SERVER_MAX_UPLOAD_BYTES", default_value = "52428800")]
    max_upload_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args = CmdArgs::from_args();

    let config = ServerConfig {
        bind: args.bind,
        gateway: GatewayConfig {
            endpoint: args.inference_url,
            timeout: Duration::from_secs(args.inference_timeout),
            retries: args.inference_retries,
            legacy_precision: args.legacy_precision,
            ..Default::default()
        },
        contract: if args.structured_errors {
            ErrorContract::Structured
        } else {
            ErrorContract::Legacy
        },
        max_upload_bytes: args.max_upload_bytes,
    };

    serve(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_errors_is_a_bare_switch() {
        let args = CmdArgs::from_iter_safe(["food-server", "--structured-errors"]).unwrap();
        assert!(args.structured_errors);

        let args = CmdArgs::from_iter_safe(["food-server"]).unwrap();
        assert!(!args.structured_errors);
    }

    #[test]
    fn structured_errors_ignores_the_environment() {
        std::env::set_var("FOOD_SERVER_STRUCTURED_ERRORS", "false");
        let args = CmdArgs::from_iter_safe(["food-server"]).unwrap();
        std::env::remove_var("FOOD_SERVER_STRUCTURED_ERRORS");

        assert!(!args.structured_errors);
    }

    #[test]
    fn legacy_precision_takes_a_value() {
        let args = CmdArgs::from_iter_safe(["food-server"]).unwrap();
        assert!(args.legacy_precision);

        let args =
            CmdArgs::from_iter_safe(["food-server", "--legacy-precision", "false"]).unwrap();
        assert!(!args.legacy_precision);
    }
}
