use clap::{Parser, ValueEnum};
use log::info;
use server::{DirectoryHost, InfoResponder};
use shared::{AddedFile, DirectoryEntry, DownloadPolicy, Layout, ServerStatus, DEFAULT_GAME_PORT};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    Legacy,
    Release,
}

impl From<LayoutArg> for Layout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Legacy => Layout::Legacy,
            LayoutArg::Release => Layout::Release,
        }
    }
}

/// Runs a stand-in game server, and optionally a directory advertising it.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to answer info requests on
    #[arg(short, long, default_value_t = DEFAULT_GAME_PORT)]
    port: u16,

    /// Also serve a directory listing this server on the given port
    #[arg(short, long)]
    directory_port: Option<u16>,

    /// Reply layout
    #[arg(short, long, value_enum, default_value = "release")]
    layout: LayoutArg,

    /// Server name
    #[arg(short, long, default_value = "Stand-in Server")]
    name: String,

    /// Map short name
    #[arg(short, long, default_value = "MAP01")]
    map: String,

    /// Version number reported in replies
    #[arg(long, default_value = "210")]
    game_version: u8,

    #[arg(long, default_value = "0")]
    players: u8,

    #[arg(long, default_value = "8")]
    max_players: u8,

    #[arg(long, default_value = "0")]
    game_type: u8,

    /// Loaded file as name:size (repeatable)
    #[arg(short, long = "file", value_parser = parse_file)]
    files: Vec<AddedFile>,
}

fn parse_file(spec: &str) -> Result<AddedFile, String> {
    let (filename, size) = spec
        .rsplit_once(':')
        .ok_or_else(|| format!("expected name:size, got {:?}", spec))?;
    let size = size
        .parse::<u32>()
        .map_err(|_| format!("invalid size in {:?}", spec))?;

    Ok(AddedFile {
        filename: filename.to_string(),
        size,
        important: true,
        policy: DownloadPolicy::Sendable,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let status = ServerStatus {
        version: args.game_version,
        players: args.players,
        max_players: args.max_players,
        game_type: args.game_type,
        modified: !args.files.is_empty(),
        map_name: args.map.clone(),
        server_name: args.name.clone(),
        files: args.files.clone(),
        ..ServerStatus::default()
    };

    let responder = InfoResponder::bind(
        &format!("{}:{}", args.host, args.port),
        status,
        args.layout.into(),
    )
    .await?;
    let game_port = responder.local_addr()?.port();
    let responder_handle = responder.spawn();

    let directory_handle = match args.directory_port {
        Some(port) => {
            let entry = DirectoryEntry {
                address: args.host.clone(),
                port: game_port,
                name: args.name.clone(),
                version: args.game_version.to_string(),
            };
            let host = DirectoryHost::bind(&format!("{}:{}", args.host, port), vec![entry]).await?;
            Some(host.spawn())
        }
        None => None,
    };

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");

    responder_handle.abort();
    if let Some(handle) = directory_handle {
        handle.abort();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file() {
        let file = parse_file("extra.wad:12345").unwrap();
        assert_eq!(file.filename, "extra.wad");
        assert_eq!(file.size, 12345);
        assert!(file.important);

        assert!(parse_file("extra.wad").is_err());
        assert!(parse_file("extra.wad:big").is_err());
    }
}
