//! Compact vs Native encode/decode on a single representative message

#![allow(missing_docs)]

use {
	blink_codec::{compact, native, DecimalValue, Message, QName, Registry, Value},
	criterion::{criterion_group, criterion_main, Criterion},
};

const SCHEMA: &str = "
namespace Bench

Side = Buy | Sell

Order/1 ->
	string (8) Symbol,
	Side Side,
	decimal Price,
	u64 Quantity,
	u32 [] Lots,
	millitime Transact
";

fn order() -> Message {
	Message::new(QName::parse("Bench:Order", None))
		.with("Symbol", "AAPL")
		.with("Side", Value::Enum("Buy".to_owned()))
		.with("Price", DecimalValue::new(-2, 15005))
		.with("Quantity", 250u64)
		.with("Lots", Value::seq([100u32, 100, 50]))
		.with("Transact", 1_700_000_000_123i64)
}

fn bench_codecs(c: &mut Criterion) {
	let registry = Registry::from_schema_text(SCHEMA).unwrap();
	let message = order();
	let compact_bytes = compact::encode_message(&message, &registry).unwrap();
	let native_bytes = native::encode_native(&message, &registry).unwrap();

	c.bench_function("compact/encode", |b| {
		b.iter(|| compact::encode_message(&message, &registry).unwrap())
	});
	c.bench_function("compact/decode", |b| {
		b.iter(|| compact::decode_message(&compact_bytes, &registry, 0).unwrap())
	});
	c.bench_function("native/encode", |b| {
		b.iter(|| native::encode_native(&message, &registry).unwrap())
	});
	c.bench_function("native/decode", |b| {
		b.iter(|| native::decode_native(&native_bytes, &registry, 0).unwrap())
	});
}

criterion_group!(benches, bench_codecs);
criterion_main!(benches);
