// =============================================================================
// relay-monitor — terminal view of a running relay's `/ws` feed
// =============================================================================
//
// Overwrites a single line with the latest ticker as packets arrive:
//
//   >> BTC-USD  | $42,000.50
// =============================================================================

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relay-monitor", about = "Stream live tickers from a ticker relay")]
struct Args {
    /// Relay WebSocket URL.
    #[arg(default_value = "ws://127.0.0.1:8000/ws")]
    url: String,
}

#[derive(Debug, Deserialize)]
struct TickerPacket {
    ticker: String,
    price: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    println!("Connecting to relay at {}...", args.url);
    let (mut socket, _) = connect_async(args.url.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", args.url))?;
    println!("Connected. Streaming live data...\n");

    let mut stdout = std::io::stdout();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!("\nStopped.");
                break;
            }
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<TickerPacket>(&text) {
                    Ok(packet) => {
                        write!(stdout, "\r{}   ", format_line(&packet))?;
                        stdout.flush()?;
                    }
                    Err(e) => warn!(error = %e, "unexpected frame from relay"),
                },
                Some(Ok(Message::Close(frame))) => {
                    println!("\nRelay closed the stream: {frame:?}");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("relay connection failed"),
                None => {
                    println!("\nRelay disconnected.");
                    break;
                }
            },
        }
    }

    Ok(())
}

fn format_line(packet: &TickerPacket) -> String {
    format!(
        " >> {:<8} | ${}",
        packet.ticker,
        with_thousands(packet.price)
    )
}

/// `42000.5` -> `42,000.50`
fn with_thousands(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value.is_sign_negative() && value != 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_thousands_separator() {
        assert_eq!(with_thousands(42000.5), "42,000.50");
        assert_eq!(with_thousands(999.999), "1,000.00");
        assert_eq!(with_thousands(12.3), "12.30");
        assert_eq!(with_thousands(1234567.0), "1,234,567.00");
        assert_eq!(with_thousands(-1500.0), "-1,500.00");
    }

    #[test]
    fn line_pads_ticker() {
        let packet = TickerPacket {
            ticker: "SOL-USD".into(),
            price: 101.25,
        };
        assert_eq!(format_line(&packet), " >> SOL-USD  | $101.25");
    }

    #[test]
    fn args_default_url() {
        let args = Args::parse_from(["relay-monitor"]);
        assert_eq!(args.url, "ws://127.0.0.1:8000/ws");
    }
}
