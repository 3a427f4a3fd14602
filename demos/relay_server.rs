//! Live relay server example
//!
//! Run with: cargo run --example relay_server [RTMP_ADDR]
//!
//! Examples:
//!   cargo run --example relay_server                    # RTMP on 0.0.0.0:1935
//!   cargo run --example relay_server localhost          # RTMP on 127.0.0.1:1935
//!   cargo run --example relay_server 127.0.0.1:1936     # RTMP on 127.0.0.1:1936
//!
//! ## Publishing (send stream)
//!
//! With OBS:
//!   Server: rtmp://localhost/live
//!   Stream Key: test
//!
//! With ffmpeg:
//!   ffmpeg -re -i input.mp4 -c copy -f flv rtmp://localhost/live/test
//!
//! ## Playing (receive stream)
//!
//! Low-latency relay:
//!   ffplay http://localhost:8081/live/test.flv
//!
//! Adaptive playlists (written by the transcoder, serve them statically):
//!   /tmp/streamcast/hls/test/master.m3u8
//!
//! ## Statistics
//!
//!   curl http://localhost:8081/api/stats
//!   curl http://localhost:8081/api/archives

use std::net::SocketAddr;
use std::sync::Arc;

use streamcast::{MemoryArchiveSink, RelayConfig, RelayServer};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:1935
/// - "localhost:1936" -> 127.0.0.1:1936
/// - "127.0.0.1" -> 127.0.0.1:1935
/// - "0.0.0.0:1935" -> 0.0.0.0:1935
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 1935;

    // Replace "localhost" with "127.0.0.1"
    let normalized = arg.replace("localhost", "127.0.0.1");

    // Try parsing as SocketAddr first (includes port)
    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    // Try parsing as IP address without port
    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: relay_server [RTMP_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  RTMP_ADDR    Address the RTMP listener binds to (default: 0.0.0.0:1935)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  relay_server                     # binds to 0.0.0.0:1935");
    eprintln!("  relay_server localhost           # binds to 127.0.0.1:1935");
    eprintln!("  relay_server 127.0.0.1:1936      # binds to 127.0.0.1:1936");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let rtmp_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => "0.0.0.0:1935".parse()?,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("streamcast=debug".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    let config = RelayConfig::default()
        .rtmp_bind(rtmp_addr)
        .hls_root("/tmp/streamcast/hls")
        .archive_root("/tmp/streamcast/archive");

    println!("Starting relay server");
    println!("  RTMP ingest : rtmp://{}", config.rtmp_addr);
    println!("  HTTP gateway: http://{}", config.http_addr);
    println!();
    println!("=== Publish a stream ===");
    println!("OBS:    Server: rtmp://localhost/live  Stream Key: test");
    println!("ffmpeg: ffmpeg -re -i input.mp4 -c copy -f flv rtmp://localhost/live/test");
    println!();
    println!("=== Play a stream ===");
    println!("ffplay: ffplay http://localhost:8081/live/test.flv");
    println!("stats:  curl http://localhost:8081/api/stats");
    println!();

    let server = Arc::new(RelayServer::new(config, MemoryArchiveSink::new()));

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    Ok(())
}
