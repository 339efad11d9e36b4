use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::net::Ipv4Addr;
use zonesweep::DNSPacket;
use zonesweep::dns::enums::DNSResourceType;
use zonesweep::dns::rdata::RData;
use zonesweep::dns::resource::DNSResource;

fn sample_message() -> DNSPacket {
    let mut packet = DNSPacket::query(1, "example.", DNSResourceType::AXFR, false);
    packet.header.qr = true;
    for i in 0..200u32 {
        packet.answers.push(DNSResource::new(
            &format!("host{}.example.", i),
            DNSResourceType::A,
            300,
            RData::A(Ipv4Addr::from(0x0a00_0000 + i)),
        ));
        packet.answers.push(DNSResource::new(
            &format!("host{}.example.", i),
            DNSResourceType::DS,
            86400,
            RData::Ds {
                key_tag: i as u16,
                algorithm: 13,
                digest_type: 2,
                digest: vec![0xab; 32],
            },
        ));
    }
    packet
}

fn bench_record_rendering(c: &mut Criterion) {
    let packet = sample_message();
    let wire = packet.serialize().expect("sample message serializes");

    c.bench_function("parse axfr message", |b| {
        b.iter(|| DNSPacket::parse(black_box(&wire)))
    });

    c.bench_function("render record lines", |b| {
        b.iter(|| {
            black_box(&packet)
                .answers
                .iter()
                .map(|record| record.to_record_line().len())
                .sum::<usize>()
        })
    });
}

criterion_group!(benches, bench_record_rendering);
criterion_main!(benches);
