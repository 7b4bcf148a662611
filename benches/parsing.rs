//! Benchmarks for upstream frame parsing
//!
//! Target: <5us per ticker frame

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use ticker_relay::exchanges::parsing::BinanceParser;

// Test data - real exchange message formats
const SINGLE_TICKER: &str = r#"{"e":"24hrTicker","E":1672515782136,"s":"BTCUSDT","p":"-94.99","P":"-0.57","w":"16542.10","x":"16635.00","c":"16540.01","Q":"0.01","b":"16540.00","B":"1.2","a":"16540.01","A":"0.3","o":"16635.00","h":"16700.00","l":"16450.00","v":"211541.12","q":"3499999999.99","O":1672429382136,"C":1672515782136,"F":1,"L":200,"n":200}"#;

const COMBINED_TICKER: &str = r#"{"stream":"ethusdt@ticker","data":{"e":"24hrTicker","E":1672515782136,"s":"ETHUSDT","p":"3.12","P":"0.26","c":"1203.44","o":"1200.32","h":"1210.00","l":"1190.00","v":"48211.5","q":"58000000.1"}}"#;

const MALFORMED: &str = r#"{"e":"24hrTicker","E":1672515782136,"s":"BTCUSDT","c":"165"#;

fn bench_single_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("binance_parse");
    group.throughput(Throughput::Bytes(SINGLE_TICKER.len() as u64));

    group.bench_function("single_stream", |b| {
        b.iter(|| {
            let result = BinanceParser::parse_ticker(black_box(SINGLE_TICKER));
            black_box(result)
        })
    });

    group.finish();
}

fn bench_combined_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("binance_parse");
    group.throughput(Throughput::Bytes(COMBINED_TICKER.len() as u64));

    group.bench_function("combined_stream", |b| {
        b.iter(|| {
            let result = BinanceParser::parse_ticker(black_box(COMBINED_TICKER));
            black_box(result)
        })
    });

    group.finish();
}

fn bench_malformed(c: &mut Criterion) {
    c.bench_function("binance_parse/malformed", |b| {
        b.iter(|| {
            let result = BinanceParser::parse_ticker(black_box(MALFORMED));
            black_box(result.is_err())
        })
    });
}

criterion_group!(
    benches,
    bench_single_stream,
    bench_combined_stream,
    bench_malformed
);
criterion_main!(benches);
