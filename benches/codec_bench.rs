//! Performance benchmarks for the wire codec

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use meridian::dns::protocol::{DnsPacket, DnsQuestion, DnsRecord, QueryType};

fn sample_query() -> Vec<u8> {
    let mut packet = DnsPacket::new();
    packet.header.id = 0x1234;
    packet.header.questions = 1;
    packet.questions.push(DnsQuestion::new(
        "www.example.com".to_string(),
        QueryType::A,
    ));

    packet.to_datagram().unwrap()
}

fn sample_response() -> DnsPacket {
    let mut packet = DnsPacket::new();
    packet.header.id = 0x1234;
    packet.header.response = true;
    packet.header.questions = 1;
    packet.header.answers = 4;
    packet.questions.push(DnsQuestion::new(
        "www.example.com".to_string(),
        QueryType::A,
    ));
    for i in 1..=4u8 {
        packet.answers.push(DnsRecord::A {
            domain: "www.example.com".to_string(),
            addr: std::net::Ipv4Addr::new(10, 0, 0, i),
            ttl: 3600,
        });
    }

    packet
}

fn bench_decode_query(c: &mut Criterion) {
    let data = sample_query();
    c.bench_function("decode_query", |b| {
        b.iter(|| DnsPacket::from_datagram(black_box(&data)).unwrap())
    });
}

fn bench_encode_response(c: &mut Criterion) {
    let packet = sample_response();
    c.bench_function("encode_response", |b| {
        b.iter(|| black_box(&packet).to_datagram().unwrap())
    });
}

criterion_group!(benches, bench_decode_query, bench_encode_response);
criterion_main!(benches);
