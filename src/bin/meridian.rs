use std::env;
use std::path::Path;
use std::sync::Arc;

use getopts::Options;

use meridian::dns::context::{ServerContext, ServerHandle, ServiceConfig};
use meridian::dns::server::{DnsServer, DnsUdpServer};

const DEFAULT_CONFIG_PATH: &str = "dnsserver.conf";

fn print_usage(program: &str, opts: Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

/// Main entry point for the Meridian DNS server
fn main() {
    simple_logger::init().expect("Failed to initialize logger");

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optopt(
        "c",
        "config",
        "Path to the service configuration file",
        "FILE",
    );
    opts.optopt(
        "t",
        "threads",
        "Number of worker threads servicing requests",
        "COUNT",
    );

    let opt_matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            eprintln!("{}", f);
            print_usage(&program, opts);
            std::process::exit(1);
        }
    };

    if opt_matches.opt_present("h") {
        print_usage(&program, opts);
        return;
    }

    let config_path = opt_matches
        .opt_str("c")
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let thread_count = match opt_matches.opt_str("t").map(|x| x.parse::<usize>()) {
        Some(Ok(count)) if count > 0 => count,
        Some(_) => {
            eprintln!("threads must be a positive number");
            std::process::exit(1);
        }
        None => 4,
    };

    let config = match ServiceConfig::load(Path::new(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Need valid configuration to start server: {}", e);
            std::process::exit(1);
        }
    };

    let context = match ServerContext::from_config(&config) {
        Ok(context) => context,
        Err(e) => {
            log::error!("Failed to build server context: {}", e);
            std::process::exit(1);
        }
    };

    let host = context.host.clone();
    let port = context.port;

    let handle = Arc::new(ServerHandle::new(Arc::new(context)));

    let server = DnsUdpServer::new(handle, thread_count);
    if let Err(e) = server.run_server() {
        log::error!("Failed to start UDP server: {}", e);
        std::process::exit(1);
    }

    log::info!("Started server on {}:{}", host, port);

    loop {
        std::thread::park();
    }
}
