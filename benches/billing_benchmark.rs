//! Performance benchmarks for billing-kit
//!
//! This benchmark suite measures:
//! - Billing engine rules (next due date, status derivation)
//! - Service operations on the in-memory backend (payments, listings, dashboard)
//! - Document encoding of customers and payment records
//!
//! Run with: cargo bench
//! View results: open target/criterion/report/index.html

use billing_kit::backend::InMemoryBackend;
use billing_kit::engine::{BillingEngine, StatusDerivation};
use billing_kit::filter::PaymentFilter;
use billing_kit::model::{BillingState, Customer, NewCustomer, PaymentRecord, PaymentUpdate};
use billing_kit::{
    BillingService, BillingStatus, FixedClock, LedgerDocument, PaymentPlan, PaymentRecorder,
};
use chrono::{Duration, NaiveDate, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;

// ============================================================================
// Benchmark Fixtures
// ============================================================================

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn bench_service() -> BillingService<InMemoryBackend> {
    BillingService::from_recorder(
        PaymentRecorder::new(InMemoryBackend::new())
            .with_clock(Arc::new(FixedClock::at_date(date(2024, 6, 1)))),
    )
}

/// Service holding `customers` customers with `payments` records each.
fn seeded_service(
    rt: &tokio::runtime::Runtime,
    customers: usize,
    payments: usize,
) -> BillingService<InMemoryBackend> {
    let service = bench_service();
    rt.block_on(async {
        for i in 0..customers {
            let customer = service
                .create_customer(NewCustomer::new(format!("Customer {}", i)))
                .await
                .expect("Failed to create customer");
            for p in 0..payments {
                let paid_on = date(2024, 1, 1) + Duration::days(p as i64);
                service
                    .record_payment(customer.id, PaymentUpdate::paid_on(paid_on))
                    .await
                    .expect("Failed to record payment");
            }
        }
    });
    service
}

// ============================================================================
// Engine Benchmarks
// ============================================================================

fn engine_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("billing_engine");
    let today = date(2024, 6, 1);

    for plan in PaymentPlan::KNOWN.iter() {
        group.bench_with_input(
            BenchmarkId::new("next_due_date", plan.as_str()),
            plan,
            |b, plan| {
                b.iter(|| BillingEngine::compute_next_due_date(black_box(plan), black_box(today)))
            },
        );
    }

    group.bench_function("derive_overdue", |b| {
        let due = Some(date(2024, 5, 1));
        b.iter(|| {
            BillingEngine::derive_status(
                black_box(due),
                black_box(StatusDerivation::paid()),
                black_box(today),
            )
        })
    });

    group.bench_function("derive_current", |b| {
        let due = Some(date(2024, 7, 1));
        b.iter(|| {
            BillingEngine::derive_status(
                black_box(due),
                black_box(StatusDerivation::due_but_active()),
                black_box(today),
            )
        })
    });

    group.finish();
}

// ============================================================================
// Service Benchmarks
// ============================================================================

fn service_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("billing_service");

    // Create tokio runtime for async operations
    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");

    group.bench_function("record_payment", |b| {
        let service = bench_service();
        let customer = rt
            .block_on(service.create_customer(NewCustomer::new("Asha")))
            .expect("Failed to create customer");

        b.to_async(&rt).iter(|| async {
            service
                .record_payment(
                    black_box(customer.id),
                    PaymentUpdate::paid_on(date(2024, 5, 20)),
                )
                .await
                .expect("Failed to record payment")
        });
    });

    group.bench_function("get_customer", |b| {
        let service = bench_service();
        let customer = rt
            .block_on(service.create_customer(NewCustomer::new("Asha")))
            .expect("Failed to create customer");

        b.to_async(&rt)
            .iter(|| async { service.get_customer(black_box(customer.id)).await });
    });

    for count in [10usize, 100, 1_000].iter() {
        group
            .throughput(Throughput::Elements(*count as u64))
            .bench_with_input(BenchmarkId::new("list_customers", count), count, |b, &count| {
                let service = seeded_service(&rt, count, 0);
                b.to_async(&rt).iter(|| async {
                    service.list_customers().await.expect("Failed to list")
                });
            });

        group
            .throughput(Throughput::Elements(*count as u64))
            .bench_with_input(BenchmarkId::new("dashboard", count), count, |b, &count| {
                let service = seeded_service(&rt, count, 0);
                b.to_async(&rt).iter(|| async {
                    service.dashboard_stats().await.expect("Failed to compute")
                });
            });
    }

    group.bench_function("all_payments_joined", |b| {
        let service = seeded_service(&rt, 50, 4);
        b.to_async(&rt).iter(|| async {
            service
                .all_payments(PaymentFilter::default())
                .await
                .expect("Failed to list payments")
        });
    });

    group.finish();
}

// ============================================================================
// Document Encoding Benchmarks
// ============================================================================

fn serialization_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");

    let mut customer = Customer::new(
        "S-1".to_string(),
        "Asha Rao".to_string(),
        PaymentPlan::HalfYearly,
        Utc::now(),
    );
    customer.billing = BillingState::paid_on(&PaymentPlan::HalfYearly, date(2024, 1, 10))
        .expect("valid due date");
    customer.notes = "Prefers cash collection on weekends".to_string();

    let record = PaymentRecord::new(
        customer.id,
        PaymentPlan::HalfYearly,
        BillingStatus::Paid,
        date(2024, 1, 10),
        "cash".to_string(),
        Utc::now(),
    );

    group.bench_function("customer_encode", |b| {
        b.iter(|| black_box(&customer).to_document_bytes())
    });

    let bytes = customer.to_document_bytes().expect("Failed to encode");
    group
        .throughput(Throughput::Bytes(bytes.len() as u64))
        .bench_function("customer_decode", |b| {
            b.iter(|| Customer::from_document_bytes(black_box(&bytes)))
        });

    group.bench_function("record_encode", |b| {
        b.iter(|| black_box(&record).to_document_bytes())
    });

    group.finish();
}

// ============================================================================
// Benchmark Registration
// ============================================================================

criterion_group!(
    benches,
    engine_benchmarks,
    service_benchmarks,
    serialization_benchmarks
);
criterion_main!(benches);
