//! Экспорт отсутствий для импорта в Silae и PayFit.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::database::models::{absences, employees};
use crate::database::types::{AbsenceKind, ApprovalStatus};
use crate::errors::AppError;

pub const SILAE_HEADER: [&str; 7] = [
    "Matricule",
    "Nom",
    "Prénom",
    "Code absence",
    "Date début",
    "Date fin",
    "Nombre de jours",
];

pub const PAYFIT_HEADER: [&str; 8] = [
    "employee_id",
    "last_name",
    "first_name",
    "email",
    "absence_type",
    "start_date",
    "end_date",
    "duration_days",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PayrollDialect {
    Silae,
    Payfit,
}

impl PayrollDialect {
    fn delimiter(&self) -> u8 {
        match self {
            PayrollDialect::Silae => b';',
            PayrollDialect::Payfit => b',',
        }
    }

    pub fn file_name(&self, period: &PayrollPeriod) -> String {
        let name = match self {
            PayrollDialect::Silae => "silae",
            PayrollDialect::Payfit => "payfit",
        };
        format!("absences-{}-{}.csv", name, period.label())
    }

    fn absence_code(&self, kind: AbsenceKind) -> &'static str {
        match self {
            PayrollDialect::Silae => match kind {
                AbsenceKind::PaidLeave => "CP",
                AbsenceKind::Rtt => "RTT",
                AbsenceKind::SickLeave => "MAL",
                AbsenceKind::UnpaidLeave => "SS",
                AbsenceKind::Other => "AUT",
            },
            PayrollDialect::Payfit => kind.as_str(),
        }
    }
}

impl FromStr for PayrollDialect {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silae" => Ok(PayrollDialect::Silae),
            "payfit" => Ok(PayrollDialect::Payfit),
            other => Err(AppError::InvalidInput(format!(
                "Unknown payroll dialect `{}`, expected silae or payfit",
                other
            ))),
        }
    }
}

/// Календарный месяц выгрузки, границы включительно
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PayrollPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PayrollPeriod {
    /// Разбирает `YYYY-MM`
    pub fn parse_month(value: &str) -> Result<Self, AppError> {
        let invalid =
            || AppError::InvalidInput(format!("Invalid month `{}`, expected YYYY-MM", value));
        let (year, month) = value.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(invalid)?;
        Ok(Self {
            start,
            end: next - Duration::days(1),
        })
    }

    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.start.year(), self.start.month())
    }

    /// Пересечение с интервалом `[start, end]`, если оно есть
    pub fn clip(&self, start: NaiveDate, end: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let from = start.max(self.start);
        let to = end.min(self.end);
        (from <= to).then_some((from, to))
    }
}

/// Рабочие дни (пн-пт) в интервале, границы включительно
pub fn working_days(start: NaiveDate, end: NaiveDate) -> u32 {
    if end < start {
        return 0;
    }
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as u32
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct PayrollRow {
    pub registration_number: String,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub kind: AbsenceKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: u32,
}

/// Строит строки из пар сотрудник/отсутствие. Одна пара - одна строка.
pub fn build_rows(
    pairs: &[(employees::Model, absences::Model)],
    period: &PayrollPeriod,
) -> Result<Vec<PayrollRow>, AppError> {
    let mut rows = Vec::with_capacity(pairs.len());
    for (employee, absence) in pairs {
        let kind: AbsenceKind = absence.kind.parse()?;
        // выборка уже отфильтрована по периоду, но даты всё равно обрезаем
        let (start, end, days) = match period.clip(absence.start_date, absence.end_date) {
            Some((start, end)) => (start, end, working_days(start, end)),
            None => (absence.start_date, absence.end_date, 0),
        };
        rows.push(PayrollRow {
            registration_number: employee.registration_number.clone(),
            last_name: employee.last_name.clone(),
            first_name: employee.first_name.clone(),
            email: employee.email.clone(),
            kind,
            start_date: start,
            end_date: end,
            days,
        });
    }
    rows.sort_by(|a, b| {
        (&a.last_name, &a.first_name, a.start_date).cmp(&(&b.last_name, &b.first_name, b.start_date))
    });
    Ok(rows)
}

fn record(dialect: PayrollDialect, row: &PayrollRow) -> Vec<String> {
    let code = dialect.absence_code(row.kind).to_string();
    match dialect {
        PayrollDialect::Silae => vec![
            row.registration_number.clone(),
            row.last_name.clone(),
            row.first_name.clone(),
            code,
            row.start_date.format("%d/%m/%Y").to_string(),
            row.end_date.format("%d/%m/%Y").to_string(),
            format!("{},00", row.days),
        ],
        PayrollDialect::Payfit => vec![
            row.registration_number.clone(),
            row.last_name.clone(),
            row.first_name.clone(),
            row.email.clone(),
            code,
            row.start_date.format("%Y-%m-%d").to_string(),
            row.end_date.format("%Y-%m-%d").to_string(),
            row.days.to_string(),
        ],
    }
}

pub fn write_csv(dialect: PayrollDialect, rows: &[PayrollRow]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(dialect.delimiter())
        .from_writer(Vec::new());

    match dialect {
        PayrollDialect::Silae => writer.write_record(SILAE_HEADER)?,
        PayrollDialect::Payfit => writer.write_record(PAYFIT_HEADER)?,
    }
    for row in rows {
        writer.write_record(record(dialect, row))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::IoError(e.into_error()))
}

/// Одобренные отсутствия организации, пересекающие период, вместе с сотрудником
pub async fn load_rows<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    period: &PayrollPeriod,
) -> Result<Vec<PayrollRow>, AppError> {
    let found = absences::Entity::find()
        .filter(absences::Column::OrganizationId.eq(organization_id))
        .filter(absences::Column::Status.eq(ApprovalStatus::Approved.as_str()))
        .filter(absences::Column::StartDate.lte(period.end))
        .filter(absences::Column::EndDate.gte(period.start))
        .find_also_related(employees::Entity)
        .order_by_asc(absences::Column::StartDate)
        .all(db)
        .await?;

    // отсутствия без сотрудника в выгрузку не попадают
    let pairs: Vec<(employees::Model, absences::Model)> = found
        .into_iter()
        .filter_map(|(absence, employee)| employee.map(|e| (e, absence)))
        .collect();

    log::debug!(
        "Payroll export for organization {} ({}): {} absences",
        organization_id,
        period.label(),
        pairs.len()
    );

    build_rows(&pairs, period)
}

pub async fn export<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    dialect: PayrollDialect,
    period: &PayrollPeriod,
) -> Result<Vec<u8>, AppError> {
    let rows = load_rows(db, organization_id, period).await?;
    write_csv(dialect, &rows)
}
