use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use httparse::{ParserConfig, Request};
use http_request_view::{parse_http, JsonBodyOptions, RequestConfig, RequestView};

const SAMPLE: &[u8] = b"GET /somepath?page=2 HTTP/1.1\nHost: ifconfig.me\nUser-Agent: curl/8.5.0\nAccept: */*\nContent-Type: text/html; charset=ISO-8859-4\r\n\r\n{\"json_key\": 10}";

const OVERRIDE_SAMPLE: &[u8] = b"POST /items/3 HTTP/1.1\r\nHost: localhost\r\nX-HTTP-Method-Override: PUT\r\nContent-Type: application/json\r\nContent-Length: 16\r\n\r\n{\"json_key\": 10}";

fn bench_http_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("http_parse");
    let config = RequestConfig::default();

    group.bench_function(BenchmarkId::new("parse_http", "sample http"), |c| {
        c.iter(|| parse_http(black_box(SAMPLE), None, &config))
    });
    group.bench_function(BenchmarkId::new("parse_http", "method override"), |c| {
        c.iter(|| parse_http(black_box(OVERRIDE_SAMPLE), None, &config))
    });
    group.bench_function(BenchmarkId::new("HTTP parse", "sample http"), |c| {
        c.iter(move || {
            let mut headers = [httparse::EMPTY_HEADER; 4];
            let mut req = Request::new(&mut headers);
            ParserConfig::default()
                .parse_request(black_box(&mut req), black_box(SAMPLE))
                .unwrap();
            assert_eq!(req.path, Some("/somepath?page=2"));
        })
    });
}

fn bench_json_body(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_body");
    let request = parse_http(OVERRIDE_SAMPLE, None, &RequestConfig::default()).unwrap();

    group.bench_function(BenchmarkId::new("json_body", "object"), |c| {
        c.iter(|| request.json_body(black_box(JsonBodyOptions::default())))
    });
}

criterion_group!(http_parse, bench_http_parsing);
criterion_group!(json_body, bench_json_body);

criterion_main!(http_parse, json_body);
