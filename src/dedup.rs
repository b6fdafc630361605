use chrono::NaiveDate;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::normalize::{cents, from_cents, to_cents};

/// What identifies a bank transaction. Optional parts are compared only
/// when both sides carry them.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryKey {
    pub bank_account_id: i64,
    pub date_operation: NaiveDate,
    pub amount: Decimal,
    pub date_valeur: Option<NaiveDate>,
    pub libelle: Option<String>,
    pub reference: Option<String>,
}

fn same_label(a: &str, b: &str) -> bool {
    let norm = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    norm(a) == norm(b)
}

fn agree_when_present<T>(a: &Option<T>, b: &Option<T>, eq: impl Fn(&T, &T) -> bool) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => eq(x, y),
        _ => true,
    }
}

pub fn same_transaction(a: &EntryKey, b: &EntryKey) -> bool {
    a.bank_account_id == b.bank_account_id
        && a.date_operation == b.date_operation
        && to_cents(a.amount) == to_cents(b.amount)
        && agree_when_present(&a.date_valeur, &b.date_valeur, |x, y| x == y)
        && agree_when_present(&a.libelle, &b.libelle, |x, y| same_label(x, y))
        && agree_when_present(&a.reference, &b.reference, |x, y| x.trim() == y.trim())
}

fn parse_stored_date(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

/// Returns the id of a ledger entry already recording `key`, ignoring the
/// entries written by `exclude_import` itself.
pub fn find_duplicate(conn: &Connection, key: &EntryKey, exclude_import: Option<i64>) -> Result<Option<i64>> {
    let amount_cents = cents(key.amount)?;
    let mut stmt = conn.prepare_cached(
        "SELECT id, date_valeur, libelle, reference FROM bank_entries \
         WHERE bank_account_id = ?1 AND date_operation = ?2 AND amount_cents = ?3 \
         AND (?4 IS NULL OR import_id IS NULL OR import_id <> ?4) \
         ORDER BY id",
    )?;
    let candidates = stmt
        .query_map(
            params![
                key.bank_account_id,
                key.date_operation.format("%Y-%m-%d").to_string(),
                amount_cents,
                exclude_import,
            ],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (id, date_valeur, libelle, reference) in candidates {
        let existing = EntryKey {
            bank_account_id: key.bank_account_id,
            date_operation: key.date_operation,
            amount: from_cents(amount_cents),
            date_valeur: parse_stored_date(date_valeur),
            libelle,
            reference,
        };
        if same_transaction(key, &existing) {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_db;

    fn key(libelle: Option<&str>, reference: Option<&str>, valeur: Option<u32>) -> EntryKey {
        EntryKey {
            bank_account_id: 1,
            date_operation: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            amount: Decimal::new(-1250, 2),
            date_valeur: valeur.and_then(|d| NaiveDate::from_ymd_opt(2024, 1, d)),
            libelle: libelle.map(str::to_string),
            reference: reference.map(str::to_string),
        }
    }

    #[test]
    fn test_nulls_match_anything() {
        assert!(same_transaction(&key(Some("CB METRO"), None, None), &key(None, Some("R1"), Some(16))));
    }

    #[test]
    fn test_present_fields_must_agree() {
        assert!(!same_transaction(&key(Some("CB METRO"), None, None), &key(Some("CB AUCHAN"), None, None)));
        assert!(!same_transaction(&key(None, Some("R1"), None), &key(None, Some("R2"), None)));
        assert!(!same_transaction(&key(None, None, Some(16)), &key(None, None, Some(17))));
    }

    #[test]
    fn test_label_comparison_is_loose_on_case_and_spaces() {
        assert!(same_transaction(&key(Some("CB  Metro"), None, None), &key(Some("cb metro "), None, None)));
    }

    #[test]
    fn test_amount_and_account_are_mandatory() {
        let mut other = key(None, None, None);
        other.amount = Decimal::new(1250, 2);
        assert!(!same_transaction(&key(None, None, None), &other));
        let mut other = key(None, None, None);
        other.bank_account_id = 2;
        assert!(!same_transaction(&key(None, None, None), &other));
    }

    fn setup(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO clients (name) VALUES ('C');
             INSERT INTO bank_accounts (client_id, label, account_number) VALUES (1, 'Main', '123');
             INSERT INTO bank_formats (name, descriptor) VALUES ('f', 'date;montant');
             INSERT INTO imports (client_id, format_id, file_name, checksum) VALUES (1, 1, 'a.csv', 'a');
             INSERT INTO imports (client_id, format_id, file_name, checksum) VALUES (1, 1, 'b.csv', 'b');
             INSERT INTO bank_entries (bank_account_id, import_id, date_operation, libelle, reference, amount_cents)
                 VALUES (1, 1, '2024-01-15', 'CB METRO', NULL, -1250);",
        )
        .unwrap();
    }

    #[test]
    fn test_find_duplicate_across_imports() {
        let (_dir, conn) = test_db();
        setup(&conn);
        let found = find_duplicate(&conn, &key(Some("CB METRO"), Some("R9"), Some(16)), Some(2)).unwrap();
        assert_eq!(found, Some(1));
        let found = find_duplicate(&conn, &key(Some("CB AUCHAN"), None, None), Some(2)).unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn test_same_import_is_not_a_duplicate_of_itself() {
        let (_dir, conn) = test_db();
        setup(&conn);
        let found = find_duplicate(&conn, &key(Some("CB METRO"), None, None), Some(1)).unwrap();
        assert_eq!(found, None);
        let found = find_duplicate(&conn, &key(Some("CB METRO"), None, None), None).unwrap();
        assert_eq!(found, Some(1));
    }
}
