//! CLI module
//!
//! This module provides the command-line interface for the sms-mock tool.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::io;

use crate::{
    api::{serve, Client, ClientConfig, HttpClientImpl, ServerConfig, DEFAULT_PORT},
    models::{preview_body, CreateMessageRequest, Message, ACCOUNT_SID_ENV, DEFAULT_ACCOUNT_SID},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Mock server URL
    #[arg(
        short,
        long,
        env = "SMS_MOCK_URL",
        default_value = "http://localhost:3030"
    )]
    server: String,

    /// Account SID used for sent messages
    #[arg(long, env = ACCOUNT_SID_ENV, default_value = DEFAULT_ACCOUNT_SID)]
    account_sid: String,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 10_000)]
    timeout: u64,

    /// Log every request and failure
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the mock SMS server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Do not send CORS headers
        #[arg(long)]
        no_cors: bool,

        /// Serve the UI from this directory instead of the built-in page
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Send a message through the mock server
    Send {
        /// Recipient phone number
        #[arg(long)]
        to: String,

        /// Sender phone number or alphanumeric sender ID
        #[arg(long)]
        from: String,

        /// Message text
        #[arg(long)]
        body: String,

        /// Messaging service SID (accepted, not stored)
        #[arg(long)]
        messaging_service_sid: Option<String>,
    },

    /// List the messages stored by the mock server
    List,

    /// Remove all messages from the mock server
    Clear,

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Run the CLI application
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    // Embedding callers may already have installed a subscriber
    let _ = tracing_subscriber::fmt::try_init();

    match &cli.command {
        Commands::Serve {
            host,
            port,
            no_cors,
            static_dir,
        } => {
            let mut config = ServerConfig::default()
                .with_host(*host)
                .with_port(*port)
                .with_cors(!no_cors);
            if let Some(dir) = static_dir {
                config = config.with_static_dir(dir);
            }

            serve(config).await?;
            Ok(())
        }

        Commands::Send {
            to,
            from,
            body,
            messaging_service_sid,
        } => {
            let client = create_client(&cli)?;

            let mut params = CreateMessageRequest::new(to, from, body);
            if let Some(sid) = messaging_service_sid {
                params = params.with_messaging_service_sid(sid);
            }

            let message = client.create(params).await?;
            println!("{} {}", "Sent".green().bold(), message.sid);
            Ok(())
        }

        Commands::List => {
            let client = create_client(&cli)?;
            let messages = client.list().await?;
            print_messages(&messages);
            Ok(())
        }

        Commands::Clear => {
            let client = create_client(&cli)?;
            client.clear().await?;
            println!("{}", "All messages cleared".green());
            Ok(())
        }

        Commands::Completions { shell } => {
            // Generate completions for the specified shell
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn create_client(cli: &Cli) -> Result<HttpClientImpl, Box<dyn std::error::Error>> {
    let config = ClientConfig::new(cli.server.as_str())
        .with_account_sid(cli.account_sid.as_str())
        .with_timeout(Duration::from_millis(cli.timeout))
        .with_debug(cli.debug);

    Ok(HttpClientImpl::new(config)?)
}

fn print_messages(messages: &[Message]) {
    if messages.is_empty() {
        println!("No messages yet. Send one with 'sms-mock send'");
        return;
    }

    println!("{} message(s), most recent first:\n", messages.len());
    for message in messages {
        println!(
            "{}  {} {} {}  {}",
            message.date_sent.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            message.from.cyan(),
            "->".dimmed(),
            message.to.cyan(),
            message.sid.yellow()
        );
        println!("    {}", preview_body(&message.body));
    }
}
