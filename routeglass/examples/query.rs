//! Looking-glass query example
//!
//! Loads a configuration file and runs one query against one router,
//! either buffered (default) or streaming JSON events to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example query -- --config config.json --router r1 --query summary
//! ```
//!
//! Ping with streamed output:
//! ```bash
//! cargo run --example query -- --config config.json --router r1 \
//!     --query ping --protocol IPv6 --addr 2001:db8::1 --stream
//! ```

use std::env;
use std::path::PathBuf;

use routeglass::driver::JsonLines;
use routeglass::{Config, ExecutionRequest, LookingGlass};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let glass = LookingGlass::from_config(Config::from_path(&args.config)?)?;

    if args.router.is_empty() {
        println!("=== Routers ===\n");
        for device in glass.list_devices() {
            println!("{:<12} {} ({})", device.value, device.text, device.location);
        }
        return Ok(());
    }

    let mut request = ExecutionRequest::new(&args.query, &args.protocol, &args.router)
        .with_client("127.0.0.1");
    if let Some(addr) = &args.addr {
        request = request.with_address(addr);
    }

    if args.stream {
        let mut sink = JsonLines::new(tokio::io::stdout());
        let outcome = glass.execute_streaming(&request, &mut sink).await?;
        eprintln!("\nOutcome: {:?}", outcome);
    } else {
        let result = glass.execute_buffered(&request).await?;
        println!("{}", result.output);
        if let Some(warning) = &result.warning {
            eprintln!("\nWarning: {}", warning);
        }
        eprintln!("({} raw bytes in {:?})", result.raw_len, result.elapsed);
    }

    Ok(())
}

/// Simple argument parser
struct Args {
    config: PathBuf,
    router: String,
    query: String,
    protocol: String,
    addr: Option<String>,
    stream: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = PathBuf::from("config.json");
        let mut router = String::new();
        let mut query = "summary".to_string();
        let mut protocol = "IPv4".to_string();
        let mut addr = None;
        let mut stream = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        config = PathBuf::from(&args[i]);
                    }
                }
                "--router" | "-r" => {
                    i += 1;
                    if i < args.len() {
                        router = args[i].clone();
                    }
                }
                "--query" | "-q" => {
                    i += 1;
                    if i < args.len() {
                        query = args[i].clone();
                    }
                }
                "--protocol" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        protocol = args[i].clone();
                    }
                }
                "--addr" | "-a" => {
                    i += 1;
                    if i < args.len() {
                        addr = Some(args[i].clone());
                    }
                }
                "--stream" | "-s" => stream = true,
                "--help" => {
                    println!("Usage: query [OPTIONS]");
                    println!();
                    println!("Options:");
                    println!("  -c, --config <PATH>      Configuration file [default: config.json]");
                    println!("  -r, --router <NAME>      Router to query (omit to list routers)");
                    println!("  -q, --query <QUERY>      bgp, summary, unicast neighbors, ping, trace");
                    println!("  -p, --protocol <FAMILY>  IPv4 or IPv6 [default: IPv4]");
                    println!("  -a, --addr <ADDRESS>     Target address or prefix");
                    println!("  -s, --stream             Stream JSON events instead of buffering");
                    std::process::exit(0);
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            config,
            router,
            query,
            protocol,
            addr,
            stream,
        }
    }
}
