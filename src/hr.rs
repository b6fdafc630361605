//! Staff, employment contracts, their split across sites, and the monthly
//! payroll cost projection derived from them.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info};

use crate::error::{ReleveError, Result};
use crate::normalize::{cents, from_cents};
use crate::registry::{client_id, entity_id, entity_name};

pub const UNASSIGNED: &str = "unassigned";

#[derive(Debug, Clone)]
pub struct Person {
    pub id: i64,
    pub last_name: String,
    pub first_name: String,
    pub job_title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Contract {
    pub id: i64,
    pub person_id: i64,
    pub contract_type: String,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub monthly_gross: Decimal,
    /// Employer charges as a percentage of gross pay.
    pub employer_rate: Decimal,
    pub weekly_hours: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct Affectation {
    pub id: i64,
    pub contract_id: i64,
    pub entity_id: i64,
    pub share_pct: Decimal,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

fn iso(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn date_col(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn opt_date_col(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(_) => date_col(row, idx).map(Some),
    }
}

fn decimal_col(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = row.get(idx)?;
    s.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn check_period(start: NaiveDate, end: Option<NaiveDate>) -> Result<()> {
    match end {
        Some(end) if end < start => Err(ReleveError::Invalid(format!("period ends ({end}) before it starts ({start})"))),
        _ => Ok(()),
    }
}

/// Inclusive overlap of two periods, an open end meaning "still running".
fn overlap(
    a: (NaiveDate, Option<NaiveDate>),
    b: (NaiveDate, Option<NaiveDate>),
) -> Option<(NaiveDate, Option<NaiveDate>)> {
    let start = a.0.max(b.0);
    let end = match (a.1, b.1) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    };
    match end {
        Some(end) if end < start => None,
        _ => Some((start, end)),
    }
}

fn covers(period: (NaiveDate, Option<NaiveDate>), day: NaiveDate) -> bool {
    period.0 <= day && period.1.map_or(true, |end| day <= end)
}

// ---------------------------------------------------------------------------
// Staff and contracts
// ---------------------------------------------------------------------------

pub fn add_person(
    conn: &Connection,
    client: &str,
    last_name: &str,
    first_name: &str,
    job_title: Option<&str>,
) -> Result<i64> {
    let client_id = client_id(conn, client)?;
    if last_name.trim().is_empty() {
        return Err(ReleveError::Invalid("last name is empty".into()));
    }
    conn.execute(
        "INSERT INTO personnel (client_id, last_name, first_name, job_title) VALUES (?1, ?2, ?3, ?4)",
        params![client_id, last_name.trim(), first_name.trim(), job_title],
    )?;
    let id = conn.last_insert_rowid();
    info!(person_id = id, client, "person added");
    Ok(id)
}

pub fn list_people(conn: &Connection, client: &str) -> Result<Vec<Person>> {
    let client_id = client_id(conn, client)?;
    let mut stmt = conn.prepare(
        "SELECT id, last_name, first_name, job_title FROM personnel WHERE client_id = ?1 \
         ORDER BY last_name, first_name",
    )?;
    let rows = stmt
        .query_map([client_id], |row| {
            Ok(Person {
                id: row.get(0)?,
                last_name: row.get(1)?,
                first_name: row.get(2)?,
                job_title: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn person_client(conn: &Connection, person_id: i64) -> Result<i64> {
    conn.query_row("SELECT client_id FROM personnel WHERE id = ?1", [person_id], |row| row.get(0))
        .optional()?
        .ok_or(ReleveError::UnknownPerson(person_id))
}

pub struct NewContract<'a> {
    pub person_id: i64,
    pub contract_type: &'a str,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub monthly_gross: Decimal,
    pub employer_rate: Decimal,
    pub weekly_hours: Option<Decimal>,
}

pub fn add_contract(conn: &Connection, contract: &NewContract) -> Result<i64> {
    person_client(conn, contract.person_id)?;
    check_period(contract.start, contract.end)?;
    if contract.monthly_gross.is_sign_negative() {
        return Err(ReleveError::Invalid("monthly gross pay is negative".into()));
    }
    if contract.employer_rate.is_sign_negative() {
        return Err(ReleveError::Invalid("employer charge rate is negative".into()));
    }
    conn.execute(
        "INSERT INTO contracts (personnel_id, contract_type, start_date, end_date, monthly_gross_cents, \
         employer_rate, weekly_hours) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            contract.person_id,
            contract.contract_type.trim().to_uppercase(),
            iso(contract.start),
            contract.end.map(iso),
            cents(contract.monthly_gross)?,
            contract.employer_rate.normalize().to_string(),
            contract.weekly_hours.map(|h| h.normalize().to_string()),
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(contract_id = id, person_id = contract.person_id, "contract added");
    Ok(id)
}

const CONTRACT_COLUMNS: &str = "c.id, c.personnel_id, c.contract_type, c.start_date, c.end_date, \
     c.monthly_gross_cents, c.employer_rate, c.weekly_hours";

fn contract_from_row(row: &rusqlite::Row) -> rusqlite::Result<Contract> {
    Ok(Contract {
        id: row.get(0)?,
        person_id: row.get(1)?,
        contract_type: row.get(2)?,
        start: date_col(row, 3)?,
        end: opt_date_col(row, 4)?,
        monthly_gross: from_cents(row.get(5)?),
        employer_rate: decimal_col(row, 6)?,
        weekly_hours: match row.get::<_, Option<String>>(7)? {
            None => None,
            Some(_) => Some(decimal_col(row, 7)?),
        },
    })
}

pub fn load_contract(conn: &Connection, contract_id: i64) -> Result<Contract> {
    conn.query_row(
        &format!("SELECT {CONTRACT_COLUMNS} FROM contracts c WHERE c.id = ?1"),
        [contract_id],
        contract_from_row,
    )
    .optional()?
    .ok_or(ReleveError::UnknownContract(contract_id))
}

pub fn list_contracts(conn: &Connection, person_id: i64) -> Result<Vec<Contract>> {
    person_client(conn, person_id)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONTRACT_COLUMNS} FROM contracts c WHERE c.personnel_id = ?1 ORDER BY c.start_date"
    ))?;
    let rows = stmt
        .query_map([person_id], contract_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Affectations
// ---------------------------------------------------------------------------

fn affectation_from_row(row: &rusqlite::Row) -> rusqlite::Result<Affectation> {
    Ok(Affectation {
        id: row.get(0)?,
        contract_id: row.get(1)?,
        entity_id: row.get(2)?,
        share_pct: decimal_col(row, 3)?,
        start: date_col(row, 4)?,
        end: opt_date_col(row, 5)?,
    })
}

pub fn list_affectations(conn: &Connection, contract_id: i64) -> Result<Vec<Affectation>> {
    let mut stmt = conn.prepare(
        "SELECT id, contract_id, entity_id, share_pct, start_date, end_date FROM affectations \
         WHERE contract_id = ?1 ORDER BY start_date",
    )?;
    let rows = stmt
        .query_map([contract_id], affectation_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Highest total share reached anywhere in `period` once `share` is added
/// to the existing affectations. Totals only rise where an affectation
/// starts, so those days are the only ones worth checking.
fn peak_share(existing: &[Affectation], period: (NaiveDate, Option<NaiveDate>), share: Decimal) -> Decimal {
    let mut days = vec![period.0];
    days.extend(existing.iter().map(|a| a.start).filter(|d| covers(period, *d)));
    days.into_iter()
        .map(|day| {
            share
                + existing
                    .iter()
                    .filter(|a| covers((a.start, a.end), day))
                    .map(|a| a.share_pct)
                    .sum::<Decimal>()
        })
        .max()
        .unwrap_or(share)
}

pub struct NewAffectation<'a> {
    pub contract_id: i64,
    pub entity: &'a str,
    pub share_pct: Decimal,
    /// Defaults to the contract start.
    pub start: Option<NaiveDate>,
    /// Defaults to the contract end.
    pub end: Option<NaiveDate>,
}

pub fn assign(conn: &Connection, affectation: &NewAffectation) -> Result<i64> {
    let contract = load_contract(conn, affectation.contract_id)?;
    // Only sites of the employer can take a share of the contract.
    let entity_id = entity_id(conn, person_client(conn, contract.person_id)?, affectation.entity)?;

    let share = affectation.share_pct;
    if share <= Decimal::ZERO || share > Decimal::ONE_HUNDRED {
        return Err(ReleveError::Invalid(format!("share {share}% is not within 0-100%")));
    }
    let start = affectation.start.unwrap_or(contract.start);
    let end = affectation.end.or(contract.end);
    check_period(start, end)?;
    if overlap((start, end), (contract.start, contract.end)) != Some((start, end)) {
        return Err(ReleveError::Invalid(format!(
            "affectation period falls outside contract {}",
            contract.id
        )));
    }

    let tx = conn.unchecked_transaction()?;
    let existing = list_affectations(&tx, contract.id)?;
    let peak = peak_share(&existing, (start, end), share);
    if peak > Decimal::ONE_HUNDRED {
        return Err(ReleveError::OverAssigned {
            contract: contract.id,
            total: peak.normalize(),
        });
    }
    tx.execute(
        "INSERT INTO affectations (contract_id, entity_id, share_pct, start_date, end_date) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![contract.id, entity_id, share.normalize().to_string(), iso(start), end.map(iso)],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    info!(affectation_id = id, contract_id = contract.id, entity = affectation.entity, %share, "contract assigned");
    Ok(id)
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthCost {
    pub gross: Decimal,
    pub charges: Decimal,
}

impl MonthCost {
    pub fn total(&self) -> Decimal {
        self.gross + self.charges
    }

    fn add(&mut self, gross: Decimal, rate: Decimal) {
        self.gross += gross;
        self.charges += gross * rate / Decimal::ONE_HUNDRED;
    }

    fn rounded(&self) -> Self {
        let round = |d: Decimal| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Self {
            gross: round(self.gross),
            charges: round(self.charges),
        }
    }
}

/// Payroll cost per entity (or [`UNASSIGNED`]) per month of a year.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub year: i32,
    pub costs: BTreeMap<String, [MonthCost; 12]>,
}

impl Projection {
    pub fn entity_total(&self, entity: &str) -> MonthCost {
        let mut total = MonthCost::default();
        for m in self.costs.get(entity).into_iter().flatten() {
            total.gross += m.gross;
            total.charges += m.charges;
        }
        total
    }

    /// All entities together for `month` (1-12); `None` outside that range.
    pub fn month_total(&self, month: u32) -> Option<MonthCost> {
        let idx = (month as usize).checked_sub(1).filter(|i| *i < 12)?;
        let mut total = MonthCost::default();
        for months in self.costs.values() {
            let m = &months[idx];
            total.gross += m.gross;
            total.charges += m.charges;
        }
        Some(total)
    }
}

fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ReleveError::Invalid(format!("year {year} is out of range")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| ReleveError::Invalid(format!("year {year} is out of range")))?;
    Ok((first, next.pred_opt().unwrap_or(first)))
}

fn days_in(period: Option<(NaiveDate, Option<NaiveDate>)>, month_end: NaiveDate) -> i64 {
    match period {
        Some((start, end)) => (end.unwrap_or(month_end).min(month_end) - start).num_days() + 1,
        None => 0,
    }
}

/// Monthly cost of every contract of `client` in `year`. A contract's gross
/// pay is prorated by the days it runs in the month and split between the
/// entities it is assigned to on those days; days without assignment are
/// booked as unassigned. Charges are `gross * employer_rate / 100`.
pub fn project(conn: &Connection, client: &str, year: i32, entity: Option<&str>) -> Result<Projection> {
    let client_id = client_id(conn, client)?;
    let only = entity.map(|e| entity_id(conn, client_id, e)).transpose()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {CONTRACT_COLUMNS} FROM contracts c JOIN personnel p ON p.id = c.personnel_id \
         WHERE p.client_id = ?1 AND c.start_date <= ?2 AND (c.end_date IS NULL OR c.end_date >= ?3) \
         ORDER BY c.id"
    ))?;
    let contracts = stmt
        .query_map(params![client_id, format!("{year}-12-31"), format!("{year}-01-01")], contract_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut names: BTreeMap<i64, String> = BTreeMap::new();
    let mut raw: BTreeMap<String, [MonthCost; 12]> = BTreeMap::new();

    for contract in &contracts {
        let affectations = list_affectations(conn, contract.id)?;
        for month in 1..=12u32 {
            let (first, last) = month_bounds(year, month)?;
            let month_period = (first, Some(last));
            let worked = overlap((contract.start, contract.end), month_period);
            let worked_days = days_in(worked, last);
            if worked_days == 0 {
                continue;
            }
            let month_days = Decimal::from((last - first).num_days() + 1);
            let daily = contract.monthly_gross / month_days;

            let mut assigned_days = Decimal::ZERO;
            for a in &affectations {
                let days = days_in(worked.and_then(|w| overlap(w, (a.start, a.end))), last);
                if days == 0 {
                    continue;
                }
                let share_days = Decimal::from(days) * a.share_pct / Decimal::ONE_HUNDRED;
                assigned_days += share_days;
                if only.is_some_and(|id| id != a.entity_id) {
                    continue;
                }
                if !names.contains_key(&a.entity_id) {
                    names.insert(a.entity_id, entity_name(conn, a.entity_id)?);
                }
                let name = names[&a.entity_id].clone();
                let slot = raw.entry(name).or_insert_with(Default::default);
                slot[month as usize - 1].add(daily * share_days, contract.employer_rate);
            }

            let unassigned_days = Decimal::from(worked_days) - assigned_days;
            if only.is_none() && unassigned_days > Decimal::ZERO {
                let slot = raw.entry(UNASSIGNED.to_string()).or_insert_with(Default::default);
                slot[month as usize - 1].add(daily * unassigned_days, contract.employer_rate);
            }
        }
        debug!(contract_id = contract.id, affectations = affectations.len(), "contract projected");
    }

    let costs = raw
        .into_iter()
        .map(|(name, months)| (name, months.map(|m| m.rounded())))
        .collect();
    Ok(Projection { year, costs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_db;
    use crate::registry::{add_client, add_entity};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup(conn: &Connection) -> i64 {
        add_client(conn, "Bistro Group").unwrap();
        add_entity(conn, "Bistro Group", "Bistro Lyon", Some("LYO")).unwrap();
        add_entity(conn, "Bistro Group", "Bistro Paris", Some("PAR")).unwrap();
        add_person(conn, "Bistro Group", "Martin", "Claire", Some("Chef de cuisine")).unwrap()
    }

    fn contract(conn: &Connection, person: i64, start: NaiveDate, end: Option<NaiveDate>) -> i64 {
        add_contract(
            conn,
            &NewContract {
                person_id: person,
                contract_type: "cdi",
                start,
                end,
                monthly_gross: dec("3100"),
                employer_rate: dec("42"),
                weekly_hours: Some(dec("35")),
            },
        )
        .unwrap()
    }

    fn assign_to(conn: &Connection, contract_id: i64, entity: &str, share: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<i64> {
        assign(
            conn,
            &NewAffectation {
                contract_id,
                entity,
                share_pct: dec(share),
                start,
                end,
            },
        )
    }

    #[test]
    fn test_full_month_split_between_sites() {
        let (_dir, conn) = test_db();
        let person = setup(&conn);
        let c = contract(&conn, person, date(2023, 6, 1), None);
        assign_to(&conn, c, "LYO", "60", None, None).unwrap();
        assign_to(&conn, c, "PAR", "40", None, None).unwrap();

        let p = project(&conn, "Bistro Group", 2024, None).unwrap();
        let lyon = &p.costs["Bistro Lyon"][0];
        assert_eq!(lyon.gross, dec("1860"));
        assert_eq!(lyon.charges, dec("781.20"));
        assert_eq!(lyon.total(), dec("2641.20"));
        assert_eq!(p.costs["Bistro Paris"][11].gross, dec("1240"));
        assert!(!p.costs.contains_key(UNASSIGNED));
        assert_eq!(p.month_total(3).map(|m| m.gross), Some(dec("3100")));
        assert!(p.month_total(0).is_none());
        assert!(p.month_total(13).is_none());
    }

    #[test]
    fn test_partial_month_and_unassigned_share() {
        let (_dir, conn) = test_db();
        let person = setup(&conn);
        // Starts on the 16th of a 31-day month: 16 days worked.
        let c = contract(&conn, person, date(2024, 1, 16), Some(date(2024, 12, 31)));
        assign_to(&conn, c, "LYO", "50", None, None).unwrap();

        let p = project(&conn, "Bistro Group", 2024, None).unwrap();
        assert_eq!(p.costs["Bistro Lyon"][0].gross, dec("800"));
        assert_eq!(p.costs[UNASSIGNED][0].gross, dec("800"));
        assert_eq!(p.costs["Bistro Lyon"][1].gross, dec("1550"));
    }

    #[test]
    fn test_affectation_changes_mid_month() {
        let (_dir, conn) = test_db();
        let person = setup(&conn);
        let c = contract(&conn, person, date(2024, 1, 1), None);
        // April has 30 days: 10 in Lyon, 20 in Paris.
        assign_to(&conn, c, "LYO", "100", None, Some(date(2024, 4, 10))).unwrap();
        assign_to(&conn, c, "PAR", "100", Some(date(2024, 4, 11)), None).unwrap();

        let p = project(&conn, "Bistro Group", 2024, None).unwrap();
        assert_eq!(p.costs["Bistro Lyon"][3].gross, dec("1033.33"));
        assert_eq!(p.costs["Bistro Paris"][3].gross, dec("2066.67"));
        assert_eq!(p.costs["Bistro Lyon"][4].gross, Decimal::ZERO);
        assert!(!p.costs.contains_key(UNASSIGNED));
    }

    #[test]
    fn test_entity_filter() {
        let (_dir, conn) = test_db();
        let person = setup(&conn);
        let c = contract(&conn, person, date(2024, 1, 1), None);
        assign_to(&conn, c, "LYO", "30", None, None).unwrap();
        assign_to(&conn, c, "PAR", "70", None, None).unwrap();

        let p = project(&conn, "Bistro Group", 2024, Some("PAR")).unwrap();
        assert_eq!(p.costs.keys().collect::<Vec<_>>(), vec!["Bistro Paris"]);
        assert_eq!(p.entity_total("Bistro Paris").gross, dec("26040"));
    }

    #[test]
    fn test_sites_of_another_client_are_out_of_reach() {
        let (_dir, conn) = test_db();
        let person = setup(&conn);
        add_client(&conn, "Brasserie SA").unwrap();
        add_entity(&conn, "Brasserie SA", "Brasserie Nord", Some("NOR")).unwrap();
        add_entity(&conn, "Brasserie SA", "Bistro Lyon", None).unwrap();
        let c = contract(&conn, person, date(2024, 1, 1), None);

        assert!(matches!(
            assign_to(&conn, c, "NOR", "50", None, None),
            Err(ReleveError::UnknownEntity(_))
        ));
        // Same name on both sides: the employer's site is the one picked.
        let id = assign_to(&conn, c, "Bistro Lyon", "100", None, None).unwrap();
        let lyon = list_affectations(&conn, c).unwrap();
        assert_eq!(lyon[0].id, id);
        assert_eq!(entity_name(&conn, lyon[0].entity_id).unwrap(), "Bistro Lyon");
        assert_eq!(entity_id(&conn, client_id(&conn, "Bistro Group").unwrap(), "LYO").unwrap(), lyon[0].entity_id);

        assert!(matches!(
            project(&conn, "Bistro Group", 2024, Some("NOR")),
            Err(ReleveError::UnknownEntity(_))
        ));
        assert!(project(&conn, "Brasserie SA", 2024, None).unwrap().costs.is_empty());
    }

    #[test]
    fn test_ended_contract_is_not_projected() {
        let (_dir, conn) = test_db();
        let person = setup(&conn);
        contract(&conn, person, date(2022, 1, 1), Some(date(2023, 12, 31)));
        assert!(project(&conn, "Bistro Group", 2024, None).unwrap().costs.is_empty());
    }

    #[test]
    fn test_over_assignment_is_refused() {
        let (_dir, conn) = test_db();
        let person = setup(&conn);
        let c = contract(&conn, person, date(2024, 1, 1), None);
        assign_to(&conn, c, "LYO", "60", None, Some(date(2024, 6, 30))).unwrap();
        let err = assign_to(&conn, c, "PAR", "50", Some(date(2024, 6, 1)), None).unwrap_err();
        assert!(matches!(err, ReleveError::OverAssigned { total, .. } if total == dec("110")));
        // Does not overlap the Lyon period.
        assign_to(&conn, c, "PAR", "100", Some(date(2024, 7, 1)), None).unwrap();
    }

    #[test]
    fn test_affectation_outside_contract() {
        let (_dir, conn) = test_db();
        let person = setup(&conn);
        let c = contract(&conn, person, date(2024, 3, 1), Some(date(2024, 8, 31)));
        assert!(assign_to(&conn, c, "LYO", "50", Some(date(2024, 1, 1)), None).is_err());
        assert!(assign_to(&conn, c, "LYO", "0", None, None).is_err());
    }

    #[test]
    fn test_contract_validation() {
        let (_dir, conn) = test_db();
        let person = setup(&conn);
        let bad = NewContract {
            person_id: person,
            contract_type: "cdd",
            start: date(2024, 5, 1),
            end: Some(date(2024, 4, 1)),
            monthly_gross: dec("2000"),
            employer_rate: dec("40"),
            weekly_hours: None,
        };
        assert!(matches!(add_contract(&conn, &bad), Err(ReleveError::Invalid(_))));
        let orphan = NewContract { person_id: 99, end: None, ..bad };
        assert!(matches!(add_contract(&conn, &orphan), Err(ReleveError::UnknownPerson(99))));

        let c = contract(&conn, person, date(2024, 1, 1), None);
        let loaded = load_contract(&conn, c).unwrap();
        assert_eq!(loaded.contract_type, "CDI");
        assert_eq!(loaded.employer_rate, dec("42"));
        assert_eq!(list_contracts(&conn, person).unwrap().len(), 1);
        assert_eq!(list_people(&conn, "Bistro Group").unwrap()[0].last_name, "Martin");
    }
}
