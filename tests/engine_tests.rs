mod common;

use common::*;
use std::net::IpAddr;
use std::time::Duration;
use tempfile::TempDir;
use zonesweep::dns::enums::ResponseCode;
use zonesweep::dns::resource::DNSResource;
use zonesweep::engine::TransferEngine;
use zonesweep::error::DnsError;
use zonesweep::model::{NameserverRecord, ResolvedEndpoint, Target, TransferResult};

fn endpoint(host: &str, ip: &str) -> ResolvedEndpoint {
    ResolvedEndpoint::new(NameserverRecord::new(host), ip.parse().unwrap())
}

fn zone_records() -> Vec<Vec<DNSResource>> {
    vec![
        vec![soa_record("example."), a_record("www.example.", 300, [10, 0, 0, 1])],
        vec![a_record("mail.example.", 300, [10, 0, 0, 2])],
    ]
}

#[tokio::test]
async fn test_first_success_wins() {
    let dir = TempDir::new().unwrap();
    let stub = client(
        StubClient::new()
            .with_transfer(
                "10.0.0.1",
                StubTransfer::Refused(DnsError::ConnectionRefused("10.0.0.1:53".parse().unwrap())),
            )
            .with_transfer("10.0.0.2", StubTransfer::Messages(zone_records()))
            .with_transfer("10.0.0.3", StubTransfer::Messages(zone_records())),
    );
    let engine = TransferEngine::new(stub.clone(), Duration::from_secs(1));
    let endpoints = vec![
        endpoint("ns1.example", "10.0.0.1"),
        endpoint("ns2.example", "10.0.0.2"),
        endpoint("ns3.example", "10.0.0.3"),
    ];
    let destination = dir.path().join("example.txt");

    let result = engine
        .attempt(&Target::new("example"), &endpoints, &destination)
        .await;

    assert_eq!(
        result,
        TransferResult::Success {
            record_count: 3,
            path: destination.clone()
        }
    );
    let attempted: Vec<IpAddr> = vec!["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()];
    assert_eq!(stub.transfers_attempted(), attempted);
    assert_eq!(files_under(dir.path()), vec![destination.clone()]);

    let contents = std::fs::read_to_string(&destination).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("example 3600 ns1.example. hostmaster.example. 2024010101"));
    assert_eq!(lines[1], "www.example 300 10.0.0.1");
    assert_eq!(lines[2], "mail.example 300 10.0.0.2");
    assert!(contents.ends_with('\n'));
}

#[tokio::test]
async fn test_all_endpoints_failing_leaves_no_files() {
    let dir = TempDir::new().unwrap();
    let stub = client(
        StubClient::new()
            .with_transfer(
                "10.0.0.1",
                StubTransfer::Refused(DnsError::Rcode(ResponseCode::Refused)),
            )
            .with_transfer(
                "10.0.0.2",
                StubTransfer::BreaksAfter(
                    vec![vec![soa_record("example."), a_record("www.example.", 300, [10, 0, 0, 1])]],
                    DnsError::Protocol("transfer truncated".into()),
                ),
            )
            .with_transfer("2001:db8::53", StubTransfer::Hangs),
    );
    let engine = TransferEngine::new(stub.clone(), Duration::from_millis(100));
    let endpoints = vec![
        endpoint("ns1.example", "10.0.0.1"),
        endpoint("ns2.example", "10.0.0.2"),
        endpoint("ns2.example", "2001:db8::53"),
    ];
    let destination = dir.path().join("example.txt");

    let result = engine
        .attempt(&Target::new("example"), &endpoints, &destination)
        .await;

    match result {
        TransferResult::Failure { reason } => assert!(reason.contains("did not finish")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(stub.transfers_attempted().len(), 3);
    assert!(files_under(dir.path()).is_empty());
}

#[tokio::test]
async fn test_no_endpoints() {
    let dir = TempDir::new().unwrap();
    let engine = TransferEngine::new(client(StubClient::new()), Duration::from_secs(1));

    let result = engine
        .attempt(&Target::new("example"), &[], &dir.path().join("example.txt"))
        .await;

    assert_eq!(result, TransferResult::failure("no endpoints"));
    assert!(files_under(dir.path()).is_empty());
}

#[tokio::test]
async fn test_empty_transfer_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let stub = client(
        StubClient::new().with_transfer("10.0.0.1", StubTransfer::Messages(vec![vec![]])),
    );
    let engine = TransferEngine::new(stub, Duration::from_secs(1));

    let result = engine
        .attempt(
            &Target::new("example"),
            &[endpoint("ns1.example", "10.0.0.1")],
            &dir.path().join("example.txt"),
        )
        .await;

    assert_eq!(result, TransferResult::failure("Server returned no records"));
    assert!(files_under(dir.path()).is_empty());
}

#[tokio::test]
async fn test_repeated_transfer_is_identical() {
    let dir = TempDir::new().unwrap();
    let stub = client(
        StubClient::new().with_transfer("10.0.0.1", StubTransfer::Messages(zone_records())),
    );
    let engine = TransferEngine::new(stub, Duration::from_secs(1));
    let endpoints = [endpoint("ns1.example", "10.0.0.1")];
    let destination = dir.path().join("example.txt");

    engine.attempt(&Target::new("example"), &endpoints, &destination).await;
    let first = std::fs::read(&destination).unwrap();
    engine.attempt(&Target::new("example"), &endpoints, &destination).await;
    let second = std::fs::read(&destination).unwrap();

    assert_eq!(first, second);
    assert!(temp_files_under(dir.path()).is_empty());
}
