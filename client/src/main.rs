use clap::Parser;
use client::config::{parse_target, DEFAULT_DIRECTORY_HOST, DEFAULT_DIRECTORY_PORT};
use client::{ClientConfig, DirectoryClient, QueryDispatcher, QueryEvent};
use log::{error, info, warn};
use shared::ServerInfo;
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory (master server) host
    #[arg(short = 'm', long, default_value = DEFAULT_DIRECTORY_HOST)]
    master: String,

    /// Directory port
    #[arg(short = 'p', long, default_value_t = DEFAULT_DIRECTORY_PORT)]
    master_port: u16,

    /// Skip the directory and only query --server targets
    #[arg(long)]
    no_directory: bool,

    /// Extra server to query, as host or host:port (repeatable)
    #[arg(short = 's', long = "server")]
    servers: Vec<String>,

    /// Seconds to collect replies before printing
    #[arg(short = 'w', long, default_value = "3")]
    wait: u64,

    /// Report servers that have not answered after this many milliseconds
    #[arg(long)]
    query_timeout: Option<u64>,

    /// Fail instead of truncating when the directory sends a short record
    #[arg(long)]
    strict_directory: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ClientConfig {
        directory_host: args.master.clone(),
        directory_port: args.master_port,
        strict_directory: args.strict_directory,
        query_timeout: args.query_timeout.map(Duration::from_millis),
        ..ClientConfig::default()
    };

    let mut targets = Vec::new();

    if !args.no_directory {
        let directory = DirectoryClient::new(&config);
        match directory
            .get_server_list(&config.directory_host, config.directory_port)
            .await
        {
            Ok(entries) => {
                targets.extend(entries.into_iter().map(|e| (e.address, e.port)));
            }
            Err(e) => error!("Could not fetch server list: {}", e),
        }
    }

    for server in &args.servers {
        targets.push(parse_target(server)?);
    }

    if targets.is_empty() {
        eprintln!("No servers to query");
        return Ok(());
    }

    let mut dispatcher = QueryDispatcher::open(&config).await?;
    let mut events = dispatcher.listen_channel()?;

    info!("Querying {} servers", targets.len());
    for (host, port) in &targets {
        dispatcher.send_query(host, *port)?;
    }

    let mut servers = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(args.wait);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(QueryEvent::Info(server)) => servers.push(server),
                Some(QueryEvent::Error(e)) => warn!("{}", e),
                None => break,
            },
            _ = sleep(deadline.saturating_duration_since(Instant::now())) => break,
        }
    }

    dispatcher.close();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&servers)?);
    } else {
        print_table(&servers);
    }

    Ok(())
}

fn print_table(servers: &[ServerInfo]) {
    println!(
        "{:<32} {:<21} {:>7} {:<8} {:>6} {:<8} {:>5}",
        "NAME", "ADDRESS", "PLAYERS", "MAP", "PING", "VERSION", "FILES"
    );

    for server in servers {
        println!(
            "{:<32} {:<21} {:>3}/{:<3} {:<8} {:>6} {:<8} {:>5}",
            server.server_name,
            server.addr.to_string(),
            server.players,
            server.max_players,
            server.map_name,
            server.ping_ms,
            server.version,
            server.files.len()
        );
    }

    println!("{} servers answered", servers.len());
}
