//! Performance benchmarks for the payroll engine.
//!
//! This benchmark suite measures:
//! - Single employee calculation: < 100μs mean
//! - Bulk run of 100 employees: < 50ms mean
//! - Bulk run of 1000 employees: < 500ms mean
//!
//! Run with: `cargo bench`
//! HTML reports are generated in `target/criterion/`

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use paie_engine::bulk::{BulkOptions, BulkPayrollOrchestrator};
use paie_engine::config::{ConfigLoader, RuleBook};
use paie_engine::engine::calculate;
use paie_engine::models::{AttendanceInput, OvertimeCategory, PayrollPeriod, PayrollRequest};

fn load_rules() -> Arc<RuleBook> {
    let config = ConfigLoader::load("./config/senegal").expect("Failed to load config");
    Arc::new(config.rules().clone())
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
}

/// Creates a request with overtime, allowances and a late arrival.
fn create_request(index: usize) -> PayrollRequest {
    PayrollRequest {
        hours_by_category: BTreeMap::from([
            (OvertimeCategory::Regular, Decimal::from(8 + index % 10)),
            (OvertimeCategory::Night, Decimal::from(index % 4)),
        ]),
        allowances: BTreeMap::from([
            ("transport".to_string(), Decimal::from(26_000)),
            ("housing".to_string(), Decimal::from(40_000)),
        ]),
        attendance: AttendanceInput {
            delay_minutes: (index % 90) as u32,
            ..AttendanceInput::default()
        },
        ..PayrollRequest::new(
            format!("emp_bench_{:04}", index),
            PayrollPeriod::new(2024, 3).unwrap(),
            Decimal::from(150_000 + (index % 50) * 10_000),
            Decimal::new(17333, 2),
        )
    }
}

/// Benchmark: Single employee through the full pipeline.
///
/// Target: < 100μs mean
fn bench_single_employee(c: &mut Criterion) {
    let rules = load_rules();
    let request = create_request(7);

    c.bench_function("single_employee", |b| {
        b.iter(|| black_box(calculate(black_box(&request), &rules, as_of())))
    });
}

/// Benchmark: Bulk runs at increasing batch sizes.
fn bench_bulk(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let orchestrator = BulkPayrollOrchestrator::new(
        load_rules(),
        BulkOptions {
            max_concurrency: 8,
            as_of: as_of(),
        },
    );

    let mut group = c.benchmark_group("bulk_processing");
    group.sample_size(10);

    for batch_size in [100, 1000] {
        let requests: Vec<PayrollRequest> = (0..batch_size).map(create_request).collect();
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("employees", batch_size),
            &requests,
            |b, requests| {
                b.to_async(&rt).iter(|| async {
                    let cancel = CancellationToken::new();
                    black_box(orchestrator.compute_bulk(requests.clone(), &cancel).await)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_single_employee, bench_bulk);
criterion_main!(benches);
