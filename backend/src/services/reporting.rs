//! Reporting service for movement reports and dashboard summaries

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cache::{keys, ReadThroughCache};
use crate::error::{AppError, AppResult};
use crate::store::Store;
use shared::{
    count_per_day, BusinessClock, DailyCount, DailyTotal, DateRange, MovementDetail,
    MovementKind, MovementSpecialization, ReportKind,
};

/// One line of a movement report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovementReportRow {
    pub movement_id: i64,
    pub date: NaiveDate,
    pub kind: MovementKind,
    pub user_id: i64,
    /// `B001-12` style number for sales
    pub document: Option<String>,
    pub product_id: i64,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub reason: Option<String>,
}

/// An adjustment line on a given day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustmentLine {
    pub movement_id: i64,
    pub kind: MovementKind,
    pub product_id: i64,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub reason: Option<String>,
}

/// Report query parameters as received
#[derive(Debug, Deserialize)]
pub struct ReportFilter {
    pub from: Option<String>,
    pub to: Option<String>,
    pub kind: Option<String>,
    pub format: Option<String>, // "json" or "csv"
}

impl ReportFilter {
    /// Both dates (`YYYY-MM-DD`, `from <= to`) and the kind are required
    pub fn resolve(&self) -> AppResult<(DateRange, ReportKind)> {
        let from = parse_date("from", self.from.as_deref())?;
        let to = parse_date("to", self.to.as_deref())?;
        let range = DateRange::new(from, to)
            .ok_or_else(|| AppError::validation("to", "End date is before start date"))?;
        let kind = self
            .kind
            .as_deref()
            .ok_or_else(|| AppError::validation("kind", "A report kind is required"))?
            .parse::<ReportKind>()?;
        Ok((range, kind))
    }

    pub fn wants_csv(&self) -> bool {
        self.format.as_deref() == Some("csv")
    }
}

fn parse_date(field: &str, value: Option<&str>) -> AppResult<NaiveDate> {
    let value = value.ok_or_else(|| AppError::validation(field, "Date is required"))?;
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::validation(field, "Date must be YYYY-MM-DD"))
}

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    store: Arc<dyn Store>,
    cache: ReadThroughCache,
    clock: BusinessClock,
}

impl ReportingService {
    pub fn new(store: Arc<dyn Store>, cache: ReadThroughCache, clock: BusinessClock) -> Self {
        Self {
            store,
            cache,
            clock,
        }
    }

    /// Movement lines within an inclusive range of business-local dates
    pub async fn movement_report(
        &self,
        range: DateRange,
        kind: ReportKind,
    ) -> AppResult<Vec<MovementReportRow>> {
        let (start, end) = self.clock.range_bounds(range);
        let movements = self.store.movements_between(start, end).await?;
        let rows: Vec<_> = movements
            .iter()
            .filter(|m| kind.includes(m.movement.kind))
            .flat_map(|m| report_rows(&self.clock, m))
            .collect();

        tracing::debug!(
            from = %range.start,
            to = %range.end,
            ?kind,
            rows = rows.len(),
            "movement report built"
        );
        Ok(rows)
    }

    /// Shortage movements per day over the last 30 days
    pub async fn shortages_30_days(&self) -> AppResult<Vec<DailyCount>> {
        self.adjustments_per_day(keys::SHORTAGES_30_DAYS, MovementKind::Shortage)
            .await
    }

    /// Overage movements per day over the last 30 days
    pub async fn overages_30_days(&self) -> AppResult<Vec<DailyCount>> {
        self.adjustments_per_day(keys::OVERAGES_30_DAYS, MovementKind::Overage)
            .await
    }

    async fn adjustments_per_day(
        &self,
        key: &str,
        kind: MovementKind,
    ) -> AppResult<Vec<DailyCount>> {
        let store = self.store.clone();
        let clock = self.clock;
        self.cache
            .get_or_set(key, || async move {
                let (start, end) = clock.range_bounds(clock.last_days(30));
                let movements = store.movements_between(start, end).await?;
                Ok::<_, AppError>(count_per_day(
                    &clock,
                    movements
                        .iter()
                        .filter(|m| m.movement.kind == kind)
                        .map(|m| m.movement.occurred_at),
                ))
            })
            .await
    }

    /// Sales totals per day over the last 30 days
    pub async fn sales_totals_30_days(&self) -> AppResult<Vec<DailyTotal>> {
        let (start, end) = self.clock.range_bounds(self.clock.last_days(30));
        let movements = self.store.movements_between(start, end).await?;
        Ok(daily_sales_totals(&self.clock, &movements))
    }

    /// Shortage and overage lines recorded on a business-local date
    pub async fn adjustments_on_date(&self, date: NaiveDate) -> AppResult<Vec<AdjustmentLine>> {
        let (start, end) = self.clock.day_bounds(date);
        let movements = self.store.movements_between(start, end).await?;
        Ok(movements
            .iter()
            .filter(|m| {
                matches!(
                    m.movement.kind,
                    MovementKind::Shortage | MovementKind::Overage
                )
            })
            .flat_map(|m| {
                let reason = match &m.specialization {
                    Some(MovementSpecialization::Adjustment(a)) => Some(a.reason.clone()),
                    _ => None,
                };
                m.lines.iter().map(move |line| AdjustmentLine {
                    movement_id: m.movement.id,
                    kind: m.movement.kind,
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    quantity: line.quantity,
                    reason: reason.clone(),
                })
            })
            .collect())
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

fn report_rows(clock: &BusinessClock, detail: &MovementDetail) -> Vec<MovementReportRow> {
    let movement = &detail.movement;
    let (document, reason) = match &detail.specialization {
        Some(MovementSpecialization::Sale(sale)) => (
            Some(format!("{}-{}", sale.series, sale.sequence_number)),
            None,
        ),
        Some(MovementSpecialization::Adjustment(adjustment)) => {
            (None, Some(adjustment.reason.clone()))
        }
        _ => (None, None),
    };

    detail
        .lines
        .iter()
        .map(|line| MovementReportRow {
            movement_id: movement.id,
            date: clock.local_date(movement.occurred_at),
            kind: movement.kind,
            user_id: movement.user_id,
            document: document.clone(),
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            subtotal: line.subtotal,
            reason: reason.clone(),
        })
        .collect()
}

/// Sum sale totals per business-local date, oldest first
pub fn daily_sales_totals(clock: &BusinessClock, movements: &[MovementDetail]) -> Vec<DailyTotal> {
    let mut totals: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for detail in movements
        .iter()
        .filter(|m| m.movement.kind == MovementKind::Sale)
    {
        let total = detail
            .specialization
            .as_ref()
            .and_then(MovementSpecialization::total)
            .unwrap_or_else(|| detail.lines_total());
        let day = totals
            .entry(clock.local_date(detail.movement.occurred_at))
            .or_default();
        *day = day.saturating_add(total);
    }
    totals
        .into_iter()
        .map(|(date, total)| DailyTotal { date, total })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shared::{DocumentType, LineItem, Movement, SaleRecord};

    fn sale(id: i64, hour_utc: u32, total: i64) -> MovementDetail {
        MovementDetail {
            movement: Movement {
                id,
                user_id: 1,
                kind: MovementKind::Sale,
                occurred_at: Utc.with_ymd_and_hms(2024, 3, 10, hour_utc, 0, 0).unwrap(),
                note: None,
            },
            specialization: Some(MovementSpecialization::Sale(SaleRecord {
                movement_id: id,
                client_id: 1,
                document_type: DocumentType::Receipt,
                series: "B001".into(),
                sequence_number: id as i32,
                total: Decimal::from(total),
            })),
            lines: vec![LineItem {
                movement_id: id,
                product_id: 7,
                product_name: Some("Arroz".into()),
                quantity: 2,
                unit_price: Decimal::from(total) / Decimal::from(2),
                subtotal: Decimal::from(total),
            }],
        }
    }

    #[test]
    fn test_daily_sales_totals_group_by_business_date() {
        let clock = BusinessClock::default();
        // 03:00 UTC is still March 9th in Lima
        let totals = daily_sales_totals(&clock, &[sale(1, 3, 10), sale(2, 15, 20), sale(3, 16, 5)]);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].date, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert_eq!(totals[0].total, Decimal::from(10));
        assert_eq!(totals[1].total, Decimal::from(25));
    }

    #[test]
    fn test_report_rows_carry_document_number() {
        let rows = report_rows(&BusinessClock::default(), &sale(4, 15, 8));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].document.as_deref(), Some("B001-4"));
    }

    #[test]
    fn test_export_to_csv_has_header() {
        let rows = report_rows(&BusinessClock::default(), &sale(4, 15, 8));
        let csv = ReportingService::export_to_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("movement_id,date,kind"));
        assert!(lines.next().unwrap().contains("B001-4"));
    }

    #[test]
    fn test_filter_requires_ordered_dates() {
        let filter = |from: &str, to: &str, kind: &str| ReportFilter {
            from: Some(from.into()),
            to: Some(to.into()),
            kind: Some(kind.into()),
            format: None,
        };
        let (range, kind) = filter("2024-03-01", "2024-03-10", "Merma").resolve().unwrap();
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(kind, ReportKind::Shortages);

        assert!(matches!(
            filter("2024-03-10", "2024-03-01", "Todos").resolve(),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            filter("10/03/2024", "2024-03-11", "Todos").resolve(),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            filter("2024-03-01", "2024-03-11", "Ventas").resolve(),
            Err(AppError::ValidationError(_))
        ));
    }
}
