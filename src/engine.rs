//! The single-employee payroll pipeline and its collaborators.
//!
//! [`calculate`] runs one request through validation, the four calculators
//! and aggregation against the rule snapshot in force for the request's
//! period. [`PayrollService`] wires the pipeline to a [`RuleSource`] and an
//! [`EmployeeDataSource`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bulk::{BulkOperationResult, BulkOptions, BulkPayrollOrchestrator};
use crate::calculation::{
    IncomeTaxResult, aggregate, compute_adjustment, compute_contributions, compute_overtime,
    resolve_income_tax, taxable_income,
};
use crate::config::{MoneyRounding, RuleBook, RuleSnapshot};
use crate::error::{EngineResult, PayrollError};
use crate::models::{PayrollPeriod, PayrollRequest, PayrollResult};
use crate::validation::validate;

/// Runs the pipeline for one request against an explicit rule snapshot.
///
/// Every calculator output is rounded to the ledger currency before it feeds
/// the next stage, so the net identity holds exactly on the rounded amounts.
///
/// # Arguments
///
/// * `request` - The payroll request
/// * `snapshot` - The rules to apply
/// * `rounding` - Money rounding for the ledger currency
/// * `as_of` - Today's date, used to reject future periods
///
/// # Errors
///
/// - [`PayrollError::Validation`] when the request fails validation
/// - [`PayrollError::Calculation`] when a result invariant breaks
pub fn calculate_with_snapshot(
    request: &PayrollRequest,
    snapshot: &RuleSnapshot,
    rounding: MoneyRounding,
    as_of: NaiveDate,
) -> EngineResult<PayrollResult> {
    let validation = validate(request, snapshot, as_of);
    if !validation.valid {
        debug!(
            employee_id = %request.employee_id,
            errors = validation.errors.len(),
            "Request rejected by validation"
        );
        return Err(PayrollError::Validation { result: validation });
    }

    let overtime = compute_overtime(
        &request.hours_by_category,
        snapshot.hourly_rate(request.base_salary),
        &snapshot.overtime,
    )?
    .rounded(rounding);
    debug!(
        employee_id = %request.employee_id,
        total_overtime = %overtime.total_amount,
        "Overtime computed"
    );

    let gross_salary = request.base_salary + request.total_allowances() + overtime.total_amount;

    let contributions = compute_contributions(gross_salary, &snapshot.contributions)?.rounded(rounding);
    debug!(
        employee_id = %request.employee_id,
        gross_salary = %gross_salary,
        employee_contributions = %contributions.employee_total(),
        "Contributions computed"
    );

    let taxable = taxable_income(
        gross_salary,
        contributions.employee_total(),
        snapshot.income_tax.tax_base,
    );
    let tax = resolve_income_tax(taxable, &snapshot.income_tax)?;
    let tax = IncomeTaxResult {
        tax: rounding.round(tax.tax),
        ..tax
    };
    debug!(
        employee_id = %request.employee_id,
        taxable_income = %taxable,
        income_tax = %tax.tax,
        "Income tax computed"
    );

    let adjustment = compute_adjustment(
        &request.attendance,
        snapshot.daily_rate(request.base_salary),
        &snapshot.attendance,
        snapshot.standard_daily_hours,
    )?
    .rounded(rounding);
    debug!(
        employee_id = %request.employee_id,
        tier = ?adjustment.tier,
        delay_penalty = %adjustment.delay_penalty,
        absence_deduction = %adjustment.absence_deduction,
        "Attendance adjustment computed"
    );

    aggregate(
        request,
        &tax,
        &contributions,
        &overtime,
        &adjustment,
        snapshot.effective_date,
    )
}

/// Runs the pipeline for one request, picking the snapshot for its period.
///
/// # Errors
///
/// Returns [`PayrollError::RulesNotFound`] if no rules were in force on the
/// first day of the period, otherwise as [`calculate_with_snapshot`].
///
/// # Example
///
/// ```no_run
/// use chrono::NaiveDate;
/// use paie_engine::config::ConfigLoader;
/// use paie_engine::engine::calculate;
/// use paie_engine::models::{PayrollPeriod, PayrollRequest};
/// use rust_decimal::Decimal;
///
/// let loader = ConfigLoader::load("./config/senegal")?;
/// let request = PayrollRequest::new(
///     "emp_001",
///     PayrollPeriod::new(2024, 3).unwrap(),
///     Decimal::new(350_000, 0),
///     Decimal::new(17333, 2),
/// );
///
/// let result = calculate(&request, loader.rules(), NaiveDate::from_ymd_opt(2024, 3, 31).unwrap())?;
/// println!("Net salary: {}", result.net_salary);
/// # Ok::<(), paie_engine::error::PayrollError>(())
/// ```
pub fn calculate(
    request: &PayrollRequest,
    rules: &RuleBook,
    as_of: NaiveDate,
) -> EngineResult<PayrollResult> {
    let snapshot = rules.snapshot_for_period(request.period)?;
    calculate_with_snapshot(request, &snapshot, rules.rounding(), as_of)
}

/// Supplies the current rule book.
pub trait RuleSource: Send + Sync {
    /// Returns the rule book to calculate with.
    fn rule_book(&self) -> EngineResult<Arc<RuleBook>>;
}

impl RuleSource for Arc<RuleBook> {
    fn rule_book(&self) -> EngineResult<Arc<RuleBook>> {
        Ok(Arc::clone(self))
    }
}

/// Supplies the payroll facts of an employee for a period.
pub trait EmployeeDataSource: Send + Sync {
    /// Returns the request for `employee_id` in `period`.
    ///
    /// # Errors
    ///
    /// Returns [`PayrollError::EmployeeNotFound`] when nothing is on record.
    fn payroll_request(
        &self,
        employee_id: &str,
        period: PayrollPeriod,
    ) -> EngineResult<PayrollRequest>;
}

/// An [`EmployeeDataSource`] backed by a map, for tests and batch imports.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEmployeeSource {
    requests: BTreeMap<(String, PayrollPeriod), PayrollRequest>,
}

impl InMemoryEmployeeSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a request, replacing any earlier one for the same employee and period.
    pub fn insert(&mut self, request: PayrollRequest) {
        self.requests
            .insert((request.employee_id.clone(), request.period), request);
    }

    /// Number of stored requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl FromIterator<PayrollRequest> for InMemoryEmployeeSource {
    fn from_iter<I: IntoIterator<Item = PayrollRequest>>(iter: I) -> Self {
        let mut source = Self::new();
        for request in iter {
            source.insert(request);
        }
        source
    }
}

impl EmployeeDataSource for InMemoryEmployeeSource {
    fn payroll_request(
        &self,
        employee_id: &str,
        period: PayrollPeriod,
    ) -> EngineResult<PayrollRequest> {
        self.requests
            .get(&(employee_id.to_string(), period))
            .cloned()
            .ok_or_else(|| PayrollError::EmployeeNotFound {
                employee_id: employee_id.to_string(),
                period,
            })
    }
}

/// Payroll entry point combining rules and employee data.
///
/// # Example
///
/// ```no_run
/// use paie_engine::config::ConfigLoader;
/// use paie_engine::engine::{InMemoryEmployeeSource, PayrollService};
/// use paie_engine::models::PayrollPeriod;
///
/// let loader = ConfigLoader::load("./config/senegal")?;
/// let service = PayrollService::new(loader, InMemoryEmployeeSource::new());
///
/// let result = service.calculate_payroll("emp_001", PayrollPeriod::new(2024, 3).unwrap());
/// assert!(result.is_err());
/// # Ok::<(), paie_engine::error::PayrollError>(())
/// ```
pub struct PayrollService<R, E> {
    rules: R,
    employees: E,
    max_concurrency: usize,
    as_of: Option<NaiveDate>,
}

impl<R: RuleSource, E: EmployeeDataSource> PayrollService<R, E> {
    /// Creates a service with the default bulk concurrency.
    pub fn new(rules: R, employees: E) -> Self {
        Self {
            rules,
            employees,
            max_concurrency: BulkOptions::default().max_concurrency,
            as_of: None,
        }
    }

    /// Sets how many employees a bulk run computes at once.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Pins "today" instead of reading the clock.
    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    fn as_of(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Calculates payroll for one employee and period.
    ///
    /// # Errors
    ///
    /// Returns the employee source's error, [`PayrollError::RulesNotFound`],
    /// [`PayrollError::Validation`] or [`PayrollError::Calculation`].
    pub fn calculate_payroll(
        &self,
        employee_id: &str,
        period: PayrollPeriod,
    ) -> EngineResult<PayrollResult> {
        let start_time = Instant::now();
        let rules = self.rules.rule_book()?;
        let request = self.employees.payroll_request(employee_id, period)?;
        let result = calculate(&request, &rules, self.as_of())?;

        info!(
            employee_id = %employee_id,
            period = %period,
            gross_salary = %result.gross_salary,
            net_salary = %result.net_salary,
            duration_us = start_time.elapsed().as_micros(),
            "Payroll calculated"
        );
        Ok(result)
    }

    /// Calculates payroll for a batch of requests.
    ///
    /// The rule book is read once and shared by every item in the batch.
    ///
    /// # Errors
    ///
    /// Fails only when the rule book cannot be obtained; per-employee
    /// failures are reported inside the [`BulkOperationResult`].
    pub async fn calculate_bulk(
        &self,
        requests: Vec<PayrollRequest>,
        cancel: &CancellationToken,
    ) -> EngineResult<BulkOperationResult> {
        let rules = self.rules.rule_book()?;
        let orchestrator = BulkPayrollOrchestrator::new(
            rules,
            BulkOptions {
                max_concurrency: self.max_concurrency,
                as_of: self.as_of(),
            },
        );
        Ok(orchestrator.compute_bulk(requests, cancel).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::TaxBracketTable;
    use crate::config::{
        AttendancePolicy, JurisdictionMetadata, OvertimeRule, SocialContributionRate, TaxBase,
        TaxSchedule,
    };
    use crate::models::{AttendanceInput, OvertimeCategory};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn snapshot() -> RuleSnapshot {
        RuleSnapshot {
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            minimum_monthly_wage: dec("64223"),
            standard_monthly_hours: dec("231"),
            working_days_per_month: dec("25"),
            standard_daily_hours: dec("8"),
            attendance: AttendancePolicy::default(),
            income_tax: TaxSchedule {
                tax_base: TaxBase::Gross,
                annualized: false,
                brackets: TaxBracketTable::from_marginal_rates(&[
                    (dec("0"), dec("0")),
                    (dec("115000"), dec("0.15")),
                ])
                .unwrap(),
            },
            contributions: vec![
                SocialContributionRate {
                    scheme_name: "pension".to_string(),
                    employee_rate: dec("0.05"),
                    employer_rate: dec("0.08"),
                    income_ceiling: None,
                },
                SocialContributionRate {
                    scheme_name: "health".to_string(),
                    employee_rate: dec("0.035"),
                    employer_rate: dec("0.035"),
                    income_ceiling: None,
                },
            ],
            overtime: vec![OvertimeRule {
                category: OvertimeCategory::Regular,
                multiplier: dec("1.1"),
                max_hours_per_period: None,
            }],
        }
    }

    fn rule_book() -> Arc<RuleBook> {
        let metadata = JurisdictionMetadata {
            code: "SN".to_string(),
            name: "Senegal".to_string(),
            currency: "XOF".to_string(),
            currency_scale: 0,
            source_url: None,
        };
        Arc::new(RuleBook::new(metadata, vec![snapshot()]).unwrap())
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
    }

    fn documented_request() -> PayrollRequest {
        PayrollRequest {
            hours_by_category: BTreeMap::from([(OvertimeCategory::Regular, dec("10.5"))]),
            allowances: BTreeMap::from([
                ("performance_bonus".to_string(), dec("50000")),
                ("transport".to_string(), dec("25000")),
                ("meal".to_string(), dec("15000")),
            ]),
            ..PayrollRequest::new(
                "emp_001",
                PayrollPeriod::new(2024, 3).unwrap(),
                dec("500000"),
                dec("173.33"),
            )
        }
    }

    #[test]
    fn test_documented_scenario() {
        let result = calculate(&documented_request(), &rule_book(), as_of()).unwrap();

        assert_eq!(result.total_overtime, dec("25000"));
        assert_eq!(result.gross_salary, dec("615000"));
        assert_eq!(result.income_tax, dec("75000"));
        assert_eq!(result.contributions_by_scheme["pension"], dec("30750"));
        assert_eq!(result.contributions_by_scheme["health"], dec("21525"));
        assert_eq!(result.net_salary, dec("487725"));
        assert_eq!(
            result.rules_effective_date,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_invalid_request_is_not_calculated() {
        let request = PayrollRequest {
            base_salary: dec("1000"),
            ..documented_request()
        };
        let result = calculate(&request, &rule_book(), as_of());
        match result {
            Err(PayrollError::Validation { result }) => {
                assert!(result.has_business_rule_violation());
            }
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_period_before_any_rules() {
        let request = PayrollRequest {
            period: PayrollPeriod::new(2023, 12).unwrap(),
            ..documented_request()
        };
        let result = calculate(&request, &rule_book(), as_of());
        assert!(matches!(result, Err(PayrollError::RulesNotFound { .. })));
    }

    #[test]
    fn test_amounts_are_whole_francs() {
        let request = PayrollRequest {
            base_salary: dec("333333"),
            attendance: AttendanceInput {
                delay_minutes: 37,
                absence_days: dec("1.5"),
                is_paid_absence: false,
            },
            ..documented_request()
        };
        let result = calculate(&request, &rule_book(), as_of()).unwrap();
        for amount in [
            result.gross_salary,
            result.income_tax,
            result.total_overtime,
            result.total_deductions,
            result.net_salary,
        ] {
            assert_eq!(amount, amount.round(), "{} is not rounded", amount);
        }
        assert_eq!(
            result.net_salary,
            result.gross_salary
                - result.income_tax
                - result.total_contributions()
                - result.total_deductions
        );
    }

    #[test]
    fn test_identical_inputs_give_identical_results() {
        let rules = rule_book();
        let first = calculate(&documented_request(), &rules, as_of()).unwrap();
        let second = calculate(&documented_request(), &rules, as_of()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_in_memory_source_lookup() {
        let source: InMemoryEmployeeSource = [documented_request()].into_iter().collect();
        assert_eq!(source.len(), 1);

        let period = PayrollPeriod::new(2024, 3).unwrap();
        assert!(source.payroll_request("emp_001", period).is_ok());

        match source.payroll_request("emp_404", period) {
            Err(PayrollError::EmployeeNotFound { employee_id, .. }) => {
                assert_eq!(employee_id, "emp_404");
            }
            other => panic!("Expected EmployeeNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_service_calculates_from_sources() {
        let source: InMemoryEmployeeSource = [documented_request()].into_iter().collect();
        let service = PayrollService::new(rule_book(), source).with_as_of(as_of());

        let result = service
            .calculate_payroll("emp_001", PayrollPeriod::new(2024, 3).unwrap())
            .unwrap();
        assert_eq!(result.net_salary, dec("487725"));
    }

    #[tokio::test]
    async fn test_service_bulk_uses_one_rule_book() {
        let service =
            PayrollService::new(rule_book(), InMemoryEmployeeSource::new()).with_as_of(as_of());
        let requests = vec![
            documented_request(),
            PayrollRequest {
                employee_id: "emp_002".to_string(),
                ..documented_request()
            },
        ];

        let result = service
            .calculate_bulk(requests, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.success_count, 2);
        assert_eq!(
            result.results["emp_001"].net_salary,
            result.results["emp_002"].net_salary
        );
    }
}
