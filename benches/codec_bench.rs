//! Criterion benchmark untuk codec dan pipeline handler
//!
//! Run dengan: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use talaria::diag::NullSink;
use talaria::network::{ConnHandler, HandlerConfig, RateCounter, Transport, TransportError};
use talaria::protocol::{decode, Encoder, Message, Side, MAX_FRAME_SIZE};

const PAYLOAD_SIZE: usize = 64;

struct BlackholeTransport;

impl Transport for BlackholeTransport {
    fn send(&mut self, _bytes: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

fn encoded_data_frame() -> Vec<u8> {
    let payload = vec![0u8; PAYLOAD_SIZE];
    let mut encoder = Encoder::new(MAX_FRAME_SIZE);
    let frame = encoder
        .encode(&Message::Data { payload: &payload }, Side::Originator)
        .unwrap();
    frame.bytes().unwrap().to_vec()
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(PAYLOAD_SIZE as u64));

    group.bench_function("encode", |b| {
        let payload = vec![0u8; PAYLOAD_SIZE];
        let mut encoder = Encoder::new(MAX_FRAME_SIZE);
        b.iter(|| {
            encoder.reset();
            let frame = encoder
                .encode(&Message::Data { payload: black_box(&payload) }, Side::Originator)
                .unwrap();
            black_box(frame.len());
        });
    });

    group.bench_function("decode", |b| {
        let encoded = encoded_data_frame();
        b.iter(|| {
            let msg = decode(black_box(&encoded), Side::Recipient).unwrap();
            black_box(msg.kind());
        });
    });

    group.finish();
}

fn bench_handler(c: &mut Criterion) {
    let mut group = c.benchmark_group("handler");
    group.throughput(Throughput::Elements(1));

    // Budget besar supaya benchmark tidak memutus koneksinya sendiri
    let config = HandlerConfig {
        max_inbound_bytes_per_tick: u64::MAX / 128,
        max_outbound_bytes_per_tick: u64::MAX / 128,
        overflow_window_ticks: 60,
    };

    group.bench_function("read", |b| {
        let mut handler = ConnHandler::new(
            BlackholeTransport,
            Side::Recipient,
            config.clone(),
            Box::new(NullSink),
        );
        let encoded = encoded_data_frame();
        b.iter(|| {
            let msg = handler.read(black_box(&encoded));
            black_box(&msg);
        });
    });

    group.bench_function("write", |b| {
        let mut handler = ConnHandler::new(
            BlackholeTransport,
            Side::Recipient,
            config.clone(),
            Box::new(NullSink),
        );
        let payload = vec![0u8; PAYLOAD_SIZE];
        b.iter(|| {
            handler.write(&Message::Data { payload: black_box(&payload) });
        });
    });

    group.bench_function("tick", |b| {
        let mut handler = ConnHandler::new(
            BlackholeTransport,
            Side::Recipient,
            config.clone(),
            Box::new(NullSink),
        );
        b.iter(|| {
            handler.tick();
        });
    });

    group.finish();
}

fn bench_rate_counter(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_counter");
    group.throughput(Throughput::Elements(1));

    group.bench_function("charge_tick", |b| {
        let mut counter = RateCounter::new(50_000, 60);
        b.iter(|| {
            counter.charge(black_box(64));
            black_box(counter.on_tick());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_codec, bench_handler, bench_rate_counter);
criterion_main!(benches);
