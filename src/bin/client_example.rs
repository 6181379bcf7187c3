//! Example of embedding the mock server and talking to it with the client

use sms_mock::{
    Client, ClientConfig, CreateMessageRequest, HttpClientImpl, MockServer, ServerConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Port 0 lets the OS pick a free port
    let server = MockServer::new(ServerConfig::default().with_port(0));
    let address = server.start().await?;

    let client = HttpClientImpl::new(
        ClientConfig::new(format!("http://localhost:{}", address.port()))
            .with_account_sid("AC1234567890")
            .with_debug(true),
    )?;
    println!("SMS Mock Client Example");
    println!("-----------------------");

    // Send a few messages
    println!("\nSending messages...");
    for i in 0..3 {
        let message = client
            .create(CreateMessageRequest::new(
                format!("+123456789{}", i),
                "+0987654321",
                format!("Test message {}", i + 1),
            ))
            .await?;
        println!("Sent message {}: {}", i + 1, message.sid);
    }

    // List them back through the API and directly from the server
    let messages = client.list().await?;
    println!("\nServer reports {} messages", messages.len());
    println!("Most recent: {:?}", messages.first().map(|m| &m.body));
    println!("Stored in-process: {}", server.messages().len());

    // Missing fields are rejected by the server
    println!("\nSending an invalid message...");
    match client
        .create(CreateMessageRequest::new("", "+0987654321", "This should fail"))
        .await
    {
        Ok(message) => println!("Unexpectedly accepted: {}", message.sid),
        Err(e) => println!("Caught expected error: {}", e),
    }

    // Clear and verify
    client.clear().await?;
    println!("\nMessages after clear: {}", client.list().await?.len());

    server.stop().await?;
    println!("\nAll operations completed successfully!");
    Ok(())
}
