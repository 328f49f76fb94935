use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use mpv_sync::config::{BridgeConfig, RelayConfig};
use mpv_sync::{client, server};

fn main() {
    let args: Vec<String> = env::args().collect();

    let result = match args.get(1).map(String::as_str) {
        Some("server") => server::main(parse_server_args(&args[2..])),
        Some("client") => client::main(parse_client_args(&args[2..])),
        Some("--help" | "-h") => {
            print_usage();
            return;
        }
        _ => {
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn parse_server_args(args: &[String]) -> RelayConfig {
    let mut config = RelayConfig::default();
    let mut args = args.iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => config.bind = value(&mut args, "--bind"),
            "--port" => config.port = parsed(&mut args, "--port"),
            "--max-read-failures" => {
                config.max_read_failures = parsed(&mut args, "--max-read-failures")
            }
            other => unknown(other),
        }
    }

    config
}

fn parse_client_args(args: &[String]) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    let mut positional = Vec::new();
    let mut args = args.iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--socket" => config.socket_path = Some(PathBuf::from(value(&mut args, "--socket"))),
            "--player" => config.player_binary = value(&mut args, "--player"),
            "--echo-timeout-ms" => {
                config.echo_timeout = Duration::from_millis(parsed(&mut args, "--echo-timeout-ms"))
            }
            "--no-launch" => config.launch_player = false,
            other if other.starts_with("--") => unknown(other),
            other => positional.push(other.to_string()),
        }
    }

    let mut positional = positional.into_iter();
    config.relay_addr = positional.next().unwrap_or_else(|| {
        eprintln!("client requires a relay address");
        print_usage();
        process::exit(1);
    });
    config.media = positional.next();

    config
}

fn value<'a>(args: &mut impl Iterator<Item = &'a String>, flag: &str) -> String {
    args.next().cloned().unwrap_or_else(|| {
        eprintln!("{flag} requires a value");
        process::exit(1);
    })
}

fn parsed<'a, T: std::str::FromStr>(args: &mut impl Iterator<Item = &'a String>, flag: &str) -> T {
    value(args, flag).parse().unwrap_or_else(|_| {
        eprintln!("{flag} requires a valid number");
        process::exit(1);
    })
}

fn unknown(arg: &str) -> ! {
    eprintln!("Unknown argument: {arg}");
    print_usage();
    process::exit(1);
}

fn print_usage() {
    println!("mpv-sync");
    println!("Usage:");
    println!("  mpv-sync server [--bind ADDR] [--port PORT] [--max-read-failures N]");
    println!("  mpv-sync client <relay-addr> [<media>] [--socket PATH] [--player BIN]");
    println!("                  [--echo-timeout-ms MS] [--no-launch]");
}
