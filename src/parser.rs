use std::collections::BTreeMap;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::descriptor::{ColumnKind, Descriptor, Field};
use crate::models::{BankFormat, ParsedLine, RawRow};
use crate::normalize::{clean_label, normalize_account, parse_amount, parse_date_with, to_cents, DateOrder};

/// Why a statement row could not be turned into a ledger candidate. The
/// message is what the user sees on the flagged import line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LineError {
    #[error("expected at least {expected} columns, found {found}")]
    TooFewColumns { expected: usize, found: usize },
    #[error("{field} is empty")]
    Missing { field: String },
    #[error("{field}: '{value}' is not a date")]
    InvalidDate { field: String, value: String },
    #[error("{field}: '{value}' is not an amount")]
    InvalidAmount { field: String, value: String },
    #[error("sens: '{0}' is neither debit nor credit")]
    InvalidDirection(String),
    #[error("no amount: montant, debit and credit are all empty")]
    NoAmount,
    #[error("amount {0} is out of range")]
    AmountOutOfRange(Decimal),
}

struct Row<'a> {
    descriptor: &'a Descriptor,
    cells: &'a [String],
    order: DateOrder,
}

impl<'a> Row<'a> {
    fn cell(&self, field: &Field) -> Option<(&'a str, &'a ColumnKind)> {
        let (idx, column) = self.descriptor.column(field)?;
        let value = self.cells.get(idx).map(|s| s.trim()).filter(|s| !s.is_empty())?;
        Some((value, &column.kind))
    }

    fn date(&self, field: &Field) -> Result<Option<chrono::NaiveDate>, LineError> {
        let Some((value, kind)) = self.cell(field) else {
            return Ok(None);
        };
        let pattern = match kind {
            ColumnKind::Date(p) => p.as_deref(),
            _ => None,
        };
        parse_date_with(value, pattern, self.order)
            .map(Some)
            .ok_or_else(|| LineError::InvalidDate {
                field: field.name().to_string(),
                value: value.to_string(),
            })
    }

    fn amount(&self, field: &Field) -> Result<Option<Decimal>, LineError> {
        let Some((value, kind)) = self.cell(field) else {
            return Ok(None);
        };
        let decimal = match kind {
            ColumnKind::Number(sep) => *sep,
            _ => None,
        };
        // A lone dash is how many banks print "nothing in this column".
        if value == "-" {
            return Ok(None);
        }
        parse_amount(value, decimal)
            .map(Some)
            .ok_or_else(|| LineError::InvalidAmount {
                field: field.name().to_string(),
                value: value.to_string(),
            })
    }

    fn text(&self, field: &Field) -> Option<String> {
        self.cell(field).and_then(|(v, _)| clean_label(v))
    }

    /// Non-empty cells of the columns the ledger has no field for.
    fn extras(&self) -> BTreeMap<String, String> {
        self.descriptor
            .columns
            .iter()
            .filter_map(|c| match &c.field {
                Field::Other(name) => self.text(&c.field).map(|v| (name.clone(), v)),
                _ => None,
            })
            .collect()
    }
}

fn direction_sign(raw: &str) -> Result<Decimal, LineError> {
    match raw.trim().to_uppercase().as_str() {
        "D" | "DB" | "DEBIT" | "DÉBIT" | "-" => Ok(Decimal::NEGATIVE_ONE),
        "C" | "CR" | "CREDIT" | "CRÉDIT" | "+" => Ok(Decimal::ONE),
        other => Err(LineError::InvalidDirection(other.to_string())),
    }
}

/// Applies a descriptor to one raw row.
///
/// The amount is signed from the bank account's point of view: `montant`
/// as printed (flipped when a `sens` column says debit), otherwise
/// `credit - |debit|`.
pub fn parse_row(descriptor: &Descriptor, format: &BankFormat, raw: &RawRow) -> Result<ParsedLine, LineError> {
    let row = Row {
        descriptor,
        cells: &raw.cells,
        order: format.date_order,
    };

    let date_column = descriptor.position(&Field::DateOperation).unwrap_or(0);
    if raw.cells.len() <= date_column {
        return Err(LineError::TooFewColumns {
            expected: descriptor.min_width(),
            found: raw.cells.len(),
        });
    }

    let date_operation = row.date(&Field::DateOperation)?.ok_or_else(|| LineError::Missing {
        field: Field::DateOperation.name().to_string(),
    })?;
    let date_valeur = row.date(&Field::DateValeur)?;

    let amount = match row.amount(&Field::Montant)? {
        Some(montant) => match row.cell(&Field::Sens) {
            Some((sens, _)) => montant.abs() * direction_sign(sens)?,
            None => montant,
        },
        None => {
            let debit = row.amount(&Field::Debit)?;
            let credit = row.amount(&Field::Credit)?;
            match (debit, credit) {
                (None, None) => return Err(LineError::NoAmount),
                (d, c) => c.unwrap_or_default() - d.unwrap_or_default().abs(),
            }
        }
    };
    if to_cents(amount).is_none() {
        return Err(LineError::AmountOutOfRange(amount));
    }

    Ok(ParsedLine {
        date_operation,
        date_valeur,
        libelle: row.text(&Field::Libelle),
        reference: row.text(&Field::Reference),
        amount,
        account_ref: row.cell(&Field::Compte).map(|(v, _)| normalize_account(v)).filter(|s| !s.is_empty()),
        balance: row.amount(&Field::Solde).ok().flatten(),
        currency: row.text(&Field::Devise).map(|c| c.to_uppercase()),
        extras: row.extras(),
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;

    use super::*;

    fn raw(cells: &[&str]) -> RawRow {
        RawRow {
            line: 1,
            cells: cells.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn parse(descriptor: &str, cells: &[&str]) -> Result<ParsedLine, LineError> {
        let format = BankFormat::adhoc(descriptor);
        let d = Descriptor::parse(descriptor).unwrap();
        parse_row(&d, &format, &raw(cells))
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_debit_credit_columns() {
        let desc = "date; valeur; libelle; debit; credit";
        let l = parse(desc, &["15/01/2024", "16/01/2024", "CB  METRO", "12,50", ""]).unwrap();
        assert_eq!(l.date_operation, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(l.date_valeur, NaiveDate::from_ymd_opt(2024, 1, 16));
        assert_eq!(l.libelle.as_deref(), Some("CB METRO"));
        assert_eq!(l.amount, dec("-12.50"));

        let l = parse(desc, &["15/01/2024", "", "VIR", "", "1 200,00"]).unwrap();
        assert_eq!(l.amount, dec("1200"));
        assert_eq!(l.date_valeur, None);
    }

    #[test]
    fn test_negative_debit_column_is_not_double_negated() {
        let l = parse("date; libelle; debit; credit", &["15/01/2024", "CB", "-12,50", ""]).unwrap();
        assert_eq!(l.amount, dec("-12.50"));
    }

    #[test]
    fn test_signed_amount_with_direction() {
        let desc = "date; libelle; montant; sens";
        assert_eq!(parse(desc, &["15/01/2024", "X", "10,00", "D"]).unwrap().amount, dec("-10"));
        assert_eq!(parse(desc, &["15/01/2024", "X", "10,00", "Crédit"]).unwrap().amount, dec("10"));
        assert_eq!(
            parse(desc, &["15/01/2024", "X", "10,00", "?"]),
            Err(LineError::InvalidDirection("?".into()))
        );
    }

    #[test]
    fn test_amount_with_forced_separator() {
        let l = parse("date; montant:number(en)", &["2024-01-15", "1,234"]).unwrap();
        assert_eq!(l.amount, dec("1234"));
    }

    #[test]
    fn test_account_reference_is_normalized() {
        let l = parse("date; montant; compte", &["15/01/2024", "1", "fr76 3000 6000 0112"]).unwrap();
        assert_eq!(l.account_ref.as_deref(), Some("FR76300060000112"));
    }

    #[test]
    fn test_errors_are_descriptive() {
        let desc = "date; libelle; montant";
        assert_eq!(
            parse(desc, &["Solde au 31/01", "", "1 000,00"]).unwrap_err().to_string(),
            "date_operation: 'Solde au 31/01' is not a date"
        );
        assert_eq!(
            parse(desc, &["", "X", "1"]).unwrap_err(),
            LineError::Missing { field: "date_operation".into() }
        );
        assert_eq!(
            parse(desc, &["15/01/2024", "X", "abc"]).unwrap_err().to_string(),
            "montant: 'abc' is not an amount"
        );
        assert_eq!(parse("date; debit; credit", &["15/01/2024", "-", ""]), Err(LineError::NoAmount));
    }

    #[test]
    fn test_amount_beyond_cents_range_is_flagged() {
        let err = parse("date; montant:number(fr)", &["15/01/2024", "123456789012345678901,00"]).unwrap_err();
        assert!(matches!(err, LineError::AmountOutOfRange(_)));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_unknown_columns_are_kept_as_extras() {
        let l = parse(
            "date; montant; categorie:text; _; ticket",
            &["15/01/2024", "-9,90", " Fournitures  bar ", "ignored", ""],
        )
        .unwrap();
        assert_eq!(l.extras.len(), 1);
        assert_eq!(l.extras["categorie"], "Fournitures bar");
    }

    #[test]
    fn test_short_row() {
        let err = parse("libelle; date; montant", &["only"]).unwrap_err();
        assert_eq!(err, LineError::TooFewColumns { expected: 3, found: 1 });
    }

    #[test]
    fn test_missing_trailing_cells_are_empty() {
        let l = parse("date; montant; libelle; reference", &["15/01/2024", "5"]).unwrap();
        assert_eq!(l.libelle, None);
        assert_eq!(l.reference, None);
    }

    #[test]
    fn test_custom_date_pattern_and_extras() {
        let l = parse(
            "date:date(%Y%m%d); montant; devise; solde",
            &["20240115", "-3.10", "eur", "1 000,00"],
        )
        .unwrap();
        assert_eq!(l.date_operation, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(l.currency.as_deref(), Some("EUR"));
        assert_eq!(l.balance, Some(dec("1000")));
    }
}
