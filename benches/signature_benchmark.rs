use criterion::{criterion_group, criterion_main, Criterion};
use fitlog::services::analysis::normalize_body;
use fitlog::services::stripe_webhook::{parse_event, verify_signature};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::hint::black_box;

const SECRET: &str = "whsec_benchmark_secret";
const NOW: i64 = 1_767_225_600;

fn signed(payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(format!("{}.", NOW).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", NOW, hex::encode(mac.finalize().into_bytes()))
}

fn benchmark_webhook_verification(c: &mut Criterion) {
    // A typical subscription event, padded to roughly Stripe's usual size
    let small = br#"{"id":"evt_1","type":"customer.subscription.updated","data":{"object":{"id":"sub_1","customer":"cus_A1","status":"active"}}}"#.to_vec();
    let large = format!(
        r#"{{"id":"evt_2","type":"checkout.session.completed","data":{{"object":{{"customer":"cus_A1","padding":"{}"}}}}}}"#,
        "x".repeat(16 * 1024)
    )
    .into_bytes();

    let small_header = signed(&small);
    let large_header = signed(&large);
    let bad_header = format!("t={},v1={}", NOW, "0".repeat(64));

    let mut group = c.benchmark_group("webhook_signature");

    group.bench_function("verify_small", |b| {
        b.iter(|| verify_signature(black_box(&small), black_box(&small_header), SECRET, NOW))
    });

    group.bench_function("verify_16k", |b| {
        b.iter(|| verify_signature(black_box(&large), black_box(&large_header), SECRET, NOW))
    });

    group.bench_function("reject_mismatch", |b| {
        b.iter(|| verify_signature(black_box(&small), black_box(&bad_header), SECRET, NOW))
    });

    group.bench_function("verify_and_parse_small", |b| {
        b.iter(|| parse_event(black_box(&small), black_box(&small_header), SECRET, NOW))
    });

    group.finish();
}

fn benchmark_analysis_normalization(c: &mut Criterion) {
    let nested = r#"[{"data":{"response":"Steady aerobic effort with a strong finish."}}]"#;
    let unknown = r#"{"unrelated":{"deeply":{"nested":[1,2,3]}}}"#;

    c.bench_function("normalize_nested", |b| {
        b.iter(|| normalize_body(black_box(nested)))
    });
    c.bench_function("normalize_fallback", |b| {
        b.iter(|| normalize_body(black_box(unknown)))
    });
}

criterion_group!(
    benches,
    benchmark_webhook_verification,
    benchmark_analysis_normalization
);
criterion_main!(benches);
