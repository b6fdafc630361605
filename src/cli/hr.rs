use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::{amount, money, percent};
use crate::hr::{self, MonthCost, NewAffectation, NewContract};
use crate::registry::entity_name;
use crate::settings::Settings;

pub fn add_person(settings: &Settings, client: &str, last_name: &str, first_name: &str, title: Option<&str>) -> Result<()> {
    let conn = open_db(settings)?;
    let id = hr::add_person(&conn, client, last_name, first_name, title)?;
    println!("Added person #{id}: {first_name} {last_name}");
    Ok(())
}

pub fn list_people(settings: &Settings, client: &str) -> Result<()> {
    let conn = open_db(settings)?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Last name", "First name", "Job title"]);
    for p in hr::list_people(&conn, client)? {
        table.add_row(vec![
            Cell::new(p.id),
            Cell::new(p.last_name),
            Cell::new(p.first_name),
            Cell::new(p.job_title.unwrap_or_default()),
        ]);
    }
    println!("Staff ({client})\n{table}");
    Ok(())
}

pub fn add_contract(settings: &Settings, contract: &NewContract) -> Result<()> {
    let conn = open_db(settings)?;
    let id = hr::add_contract(&conn, contract)?;
    println!(
        "Added contract #{id}: {} from {}, {} gross/month",
        contract.contract_type.to_uppercase(),
        contract.start,
        money(contract.monthly_gross)
    );
    Ok(())
}

pub fn list_contracts(settings: &Settings, person_id: i64) -> Result<()> {
    let conn = open_db(settings)?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Type", "Start", "End", "Gross", "Charges", "Hours", "Assigned to"]);
    for c in hr::list_contracts(&conn, person_id)? {
        let mut assigned = Vec::new();
        for a in hr::list_affectations(&conn, c.id)? {
            let until = a.end.map(|d| d.to_string()).unwrap_or_else(|| "...".into());
            assigned.push(format!(
                "{} {} ({} - {until})",
                entity_name(&conn, a.entity_id)?,
                percent(a.share_pct),
                a.start
            ));
        }
        table.add_row(vec![
            Cell::new(c.id),
            Cell::new(c.contract_type),
            Cell::new(c.start),
            Cell::new(c.end.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(amount(c.monthly_gross)),
            Cell::new(percent(c.employer_rate)),
            Cell::new(c.weekly_hours.map(|h| h.normalize().to_string()).unwrap_or_default()),
            Cell::new(assigned.join("\n")),
        ]);
    }
    println!("Contracts of #{person_id}\n{table}");
    Ok(())
}

pub fn assign(settings: &Settings, affectation: &NewAffectation) -> Result<()> {
    let conn = open_db(settings)?;
    let id = hr::assign(&conn, affectation)?;
    println!(
        "Assignment #{id}: contract #{} -> {} at {}",
        affectation.contract_id,
        affectation.entity,
        percent(affectation.share_pct)
    );
    Ok(())
}

fn cost_row(label: &str, month: &MonthCost) -> Vec<Cell> {
    let right = |s: String| Cell::new(s).set_alignment(CellAlignment::Right);
    vec![
        Cell::new(label),
        right(amount(month.gross)),
        right(amount(month.charges)),
        right(amount(month.total())),
    ]
}

pub fn project(settings: &Settings, client: &str, year: i32, entity: Option<&str>) -> Result<()> {
    let conn = open_db(settings)?;
    let projection = hr::project(&conn, client, year, entity)?;
    if projection.costs.is_empty() {
        println!("No contract runs in {year}.");
        return Ok(());
    }

    for (name, months) in &projection.costs {
        let mut table = Table::new();
        table.set_header(vec!["Month", "Gross", "Charges", "Total"]);
        for (i, m) in months.iter().enumerate() {
            table.add_row(cost_row(&format!("{year}-{:02}", i + 1), m));
        }
        table.add_row(cost_row("Total", &projection.entity_total(name)));
        println!("Payroll {year} - {name}\n{table}\n");
    }

    if projection.costs.len() > 1 {
        let mut table = Table::new();
        table.set_header(vec!["Month", "Gross", "Charges", "Total"]);
        let mut year_total = MonthCost::default();
        for month in 1..=12 {
            let m = projection.month_total(month).unwrap_or_default();
            year_total.gross += m.gross;
            year_total.charges += m.charges;
            table.add_row(cost_row(&format!("{year}-{month:02}"), &m));
        }
        table.add_row(cost_row("Total", &year_total));
        println!("Payroll {year} - all entities\n{table}");
    }
    Ok(())
}
