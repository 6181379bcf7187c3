//! Binary entrypoint for the sms-mock tool

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    sms_mock::cli::run().await
}
