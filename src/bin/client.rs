//! `roomkeeper-client` entry point: submit a named claim against the
//! server's inventory, then relay stdin lines to the room's chat while
//! printing whatever the server broadcasts back.

use anyhow::{Context, Result};
use roomkeeper::config::{self, ParseOutcome, DEFAULT_PORT};
use roomkeeper::logging::{self, LoggingConfig};
use roomkeeper::protocol;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let settings = match config::parse_client_args(&args) {
        Ok(ParseOutcome::Settings(settings)) => settings,
        Ok(ParseOutcome::PrintConfig) => {
            println!("default port: {DEFAULT_PORT}");
            println!("usage: roomkeeper-client -n <player_name> -i <claim_file> <hostname>");
            return Ok(());
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    logging::init(&LoggingConfig {
        file_dir: settings.log_dir.clone(),
    });

    let inventory = match config::load_claim_file(&settings.claim_path) {
        Ok(inventory) => inventory,
        Err(err) => {
            tracing::error!(%err, "failed to load claim file");
            std::process::exit(1);
        }
    };

    let addr = format!("{}:{}", settings.hostname, DEFAULT_PORT);
    let mut socket = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;
    tracing::info!(%addr, player = %settings.player_name, "connected");

    let request = protocol::AdmissionRequest {
        player_name: settings.player_name.clone(),
        inventory,
    };
    let frame = protocol::serialize_request(&request).context("request does not fit in a frame")?;
    socket.write_all(&frame).await.context("failed to send admission request")?;

    let mut reply = [0u8; protocol::REPLY_FRAME_LEN];
    socket.read_exact(&mut reply).await.context("server closed the connection before replying")?;
    if !protocol::is_ok_reply(&reply) {
        eprintln!("Encountered a problem");
        std::process::exit(1);
    }
    println!("OK, waiting for the room to fill...");

    let (mut read_half, mut write_half) = socket.into_split();

    let reader_task = tokio::spawn(async move {
        let mut buf = [0u8; protocol::CHAT_FRAME_LEN];
        loop {
            match read_half.read_exact(&mut buf).await {
                Ok(_) => print!("{}", protocol::extract_text(&buf)),
                Err(_) => {
                    println!("\nconnection closed");
                    break;
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let frame = protocol::outgoing_message(&format!("{line}\n"));
        if write_half.write_all(&frame).await.is_err() {
            break;
        }
    }

    reader_task.abort();
    Ok(())
}
