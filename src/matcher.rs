//! Matches the account reference printed on a statement row against the
//! client's chart of bank accounts.
//!
//! References come in every shape: full IBANs, bare account numbers with or
//! without leading zeros, masked numbers (`****12345`). Candidates are tried
//! from the strictest rule to the loosest; the first rule that singles out
//! exactly one account wins.

use std::fmt;

use thiserror::Error;

use crate::models::BankAccount;
use crate::normalize::{iban_account_number, normalize_account, strip_leading_zeros, trailing_digits};

const MIN_CONTAINED_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    Iban,
    AccountNumber,
    IbanAccountNumber,
    Contains,
    Suffix,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Iban => "iban",
            Self::AccountNumber => "account number",
            Self::IbanAccountNumber => "account number in iban",
            Self::Contains => "partial number",
            Self::Suffix => "trailing digits",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMatch {
    pub account_id: i64,
    pub kind: MatchKind,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchFailure {
    #[error("no bank account matches '{0}'")]
    NotFound(String),
    #[error("'{reference}' matches several bank accounts ({labels}) by {kind}")]
    Ambiguous {
        reference: String,
        kind: MatchKind,
        labels: String,
    },
}

struct Candidate<'a> {
    account: &'a BankAccount,
    iban: Option<String>,
    number: Option<String>,
}

impl Candidate<'_> {
    /// Account number with leading zeros removed, taken from the explicit
    /// number or, failing that, from a French IBAN.
    fn bare_number(&self) -> Option<String> {
        self.number
            .clone()
            .or_else(|| self.iban.as_deref().and_then(iban_account_number))
            .map(|n| strip_leading_zeros(&n).to_string())
    }

    fn matches(&self, kind: MatchKind, reference: &str, suffix_digits: usize) -> bool {
        match kind {
            MatchKind::Iban => self.iban.as_deref() == Some(reference),
            MatchKind::AccountNumber => self
                .number
                .as_deref()
                .is_some_and(|n| strip_leading_zeros(n) == strip_leading_zeros(reference)),
            MatchKind::IbanAccountNumber => match (iban_account_number(reference), self.bare_number()) {
                (Some(embedded), Some(own)) => strip_leading_zeros(&embedded) == own,
                _ => false,
            },
            MatchKind::Contains => {
                if reference.len() < MIN_CONTAINED_LEN {
                    return false;
                }
                let hay = [self.iban.as_deref(), self.number.as_deref()];
                hay.iter().flatten().any(|h| {
                    h.len() >= MIN_CONTAINED_LEN && (h.contains(reference) || reference.contains(h))
                })
            }
            MatchKind::Suffix => {
                let wanted = trailing_digits(reference);
                if suffix_digits == 0 || wanted.len() < suffix_digits {
                    return false;
                }
                let wanted = &wanted[wanted.len() - suffix_digits..];
                let bare = self.bare_number();
                let own = [self.number.as_deref(), bare.as_deref(), self.iban.as_deref()];
                own.iter().flatten().any(|o| {
                    let digits = trailing_digits(o);
                    digits.len() >= suffix_digits && digits.ends_with(wanted)
                })
            }
        }
    }
}

const LEVELS: [MatchKind; 5] = [
    MatchKind::Iban,
    MatchKind::AccountNumber,
    MatchKind::IbanAccountNumber,
    MatchKind::Contains,
    MatchKind::Suffix,
];

fn is_masked(raw: &str) -> bool {
    raw.contains(['*', '•']) || raw.trim().to_ascii_uppercase().starts_with("XX")
}

pub fn match_account(
    reference: &str,
    accounts: &[BankAccount],
    suffix_digits: usize,
) -> Result<AccountMatch, MatchFailure> {
    let masked = is_masked(reference);
    let reference = normalize_account(reference);
    if reference.is_empty() {
        return Err(MatchFailure::NotFound(reference));
    }
    // Only the visible digits of a masked reference mean anything.
    let levels: &[MatchKind] = if masked { &LEVELS[4..] } else { &LEVELS };
    let candidates: Vec<Candidate> = accounts
        .iter()
        .map(|a| Candidate {
            account: a,
            iban: a.iban.as_deref().map(normalize_account).filter(|s| !s.is_empty()),
            number: a.account_number.as_deref().map(normalize_account).filter(|s| !s.is_empty()),
        })
        .collect();

    for &kind in levels {
        let hits: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.matches(kind, &reference, suffix_digits))
            .collect();
        match hits.as_slice() {
            [] => continue,
            [only] => {
                return Ok(AccountMatch {
                    account_id: only.account.id,
                    kind,
                })
            }
            many => {
                return Err(MatchFailure::Ambiguous {
                    reference,
                    kind,
                    labels: many.iter().map(|c| c.account.label.as_str()).collect::<Vec<_>>().join(", "),
                })
            }
        }
    }
    Err(MatchFailure::NotFound(reference))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: i64, label: &str, iban: Option<&str>, number: Option<&str>) -> BankAccount {
        BankAccount {
            id,
            client_id: 1,
            entity_id: None,
            label: label.to_string(),
            bank_name: None,
            iban: iban.map(str::to_string),
            account_number: number.map(str::to_string),
        }
    }

    fn chart() -> Vec<BankAccount> {
        vec![
            account(1, "Lyon", Some("FR7630006000011234567890189"), None),
            account(2, "Paris", None, Some("00098765432")),
            account(3, "Nice", Some("GB82WEST12345698765432"), None),
        ]
    }

    #[test]
    fn test_exact_iban_with_spaces() {
        let m = match_account("fr76 3000 6000 0112 3456 7890 189", &chart(), 5).unwrap();
        assert_eq!(m, AccountMatch { account_id: 1, kind: MatchKind::Iban });
    }

    #[test]
    fn test_account_number_ignores_leading_zeros() {
        let m = match_account("98765432", &chart(), 5).unwrap();
        assert_eq!(m, AccountMatch { account_id: 2, kind: MatchKind::AccountNumber });
    }

    #[test]
    fn test_iban_reference_against_bare_number() {
        // IBAN whose embedded account number is 00098765432.
        let accounts = vec![account(2, "Paris", None, Some("98765432"))];
        let m = match_account("FR7612345678900009876543212", &accounts, 5).unwrap();
        assert_eq!(m.kind, MatchKind::IbanAccountNumber);
    }

    #[test]
    fn test_partial_number_contained_in_iban() {
        let m = match_account("12345678901", &chart(), 5).unwrap();
        assert_eq!(m, AccountMatch { account_id: 1, kind: MatchKind::Contains });
    }

    #[test]
    fn test_masked_suffix() {
        let m = match_account("****78901", &chart(), 5).unwrap();
        assert_eq!(m.account_id, 1);
        assert_eq!(m.kind, MatchKind::Suffix);
    }

    #[test]
    fn test_masked_reference_skips_partial_matching() {
        // "65432" alone would be contained in both Paris and Nice.
        let err = match_account("****65432", &chart(), 5).unwrap_err();
        assert!(matches!(err, MatchFailure::Ambiguous { kind: MatchKind::Suffix, .. }));
    }

    #[test]
    fn test_short_suffix_is_not_enough() {
        assert_eq!(
            match_account("XX432", &chart(), 5),
            Err(MatchFailure::NotFound("XX432".into()))
        );
    }

    #[test]
    fn test_ambiguous_suffix() {
        let accounts = vec![
            account(1, "A", None, Some("11155555")),
            account(2, "B", None, Some("22255555")),
        ];
        let err = match_account("****55555", &accounts, 5).unwrap_err();
        assert!(matches!(err, MatchFailure::Ambiguous { kind: MatchKind::Suffix, .. }));
        assert!(err.to_string().contains("A, B"));
    }

    #[test]
    fn test_stricter_level_wins_over_ambiguity_below() {
        let accounts = vec![
            account(1, "A", None, Some("12345")),
            account(2, "B", None, Some("9912345")),
        ];
        let m = match_account("12345", &accounts, 5).unwrap();
        assert_eq!(m, AccountMatch { account_id: 1, kind: MatchKind::AccountNumber });
    }

    #[test]
    fn test_empty_reference() {
        assert!(matches!(match_account(" - ", &chart(), 5), Err(MatchFailure::NotFound(_))));
    }
}
