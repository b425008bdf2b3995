//! Performance checks for the packet codec

use shared::{
    build_info_request, checksum, encode_info_response, parse_info_response, AddedFile,
    DownloadPolicy, Layout, ServerStatus,
};
use std::net::SocketAddr;
use std::time::Instant;

fn busy_status() -> ServerStatus {
    ServerStatus {
        version: 210,
        players: 16,
        max_players: 32,
        server_name: "Benchmark".to_string(),
        map_name: "MAP99".to_string(),
        files: (0..20)
            .map(|i| AddedFile {
                filename: format!("addon_{}.pk3", i),
                size: i * 1000,
                important: i % 2 == 0,
                policy: DownloadPolicy::Sendable,
            })
            .collect(),
        ..ServerStatus::default()
    }
}

/// Benchmarks checksum over a full-size legacy packet
#[test]
fn benchmark_checksum() {
    let packet = vec![0xA5u8; 8 + 65 + 4096];

    let iterations = 1_000;
    let start = Instant::now();

    let mut acc = 0u32;
    for _ in 0..iterations {
        acc = acc.wrapping_add(checksum(&packet));
    }

    let duration = start.elapsed();
    println!(
        "Checksum: {} iterations in {:?} ({:.2} μs/iter), acc={}",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64,
        acc
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks request building
#[test]
fn benchmark_request_building() {
    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let _ = build_info_request(i);
    }

    let duration = start.elapsed();
    println!(
        "Request building: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks response decoding, including the failed legacy attempt
#[test]
fn benchmark_response_decoding() {
    let from: SocketAddr = "127.0.0.1:5029".parse().unwrap();
    let packet = encode_info_response(&busy_status(), Layout::Release, 0);

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let info = parse_info_response(&packet, from, 10).unwrap();
        assert_eq!(info.files.len(), 20);
    }

    let duration = start.elapsed();
    println!(
        "Response decoding: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 5000);
}
