//! Column-format descriptors.
//!
//! A descriptor lists the columns of a statement file in order, one
//! `name[:type[(arg)]]` entry per column, separated by `;`, `|` or newlines:
//!
//! ```text
//! date:date(%d/%m/%Y); libelle; _; debit:number(fr); credit:number(fr)
//! ```

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    DateOperation,
    DateValeur,
    Libelle,
    Reference,
    Montant,
    Debit,
    Credit,
    Sens,
    Compte,
    Solde,
    Devise,
    Ignore,
    Other(String),
}

impl Field {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "date_operation" | "date" | "date_op" => Self::DateOperation,
            "date_valeur" | "valeur" | "value_date" => Self::DateValeur,
            "libelle" | "label" | "description" => Self::Libelle,
            "reference" | "ref" => Self::Reference,
            "montant" | "amount" => Self::Montant,
            "debit" => Self::Debit,
            "credit" => Self::Credit,
            "sens" | "direction" => Self::Sens,
            "compte" | "iban" | "account" => Self::Compte,
            "solde" | "balance" => Self::Solde,
            "devise" | "currency" => Self::Devise,
            "" | "_" | "ignore" => Self::Ignore,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::DateOperation => "date_operation",
            Self::DateValeur => "date_valeur",
            Self::Libelle => "libelle",
            Self::Reference => "reference",
            Self::Montant => "montant",
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Sens => "sens",
            Self::Compte => "compte",
            Self::Solde => "solde",
            Self::Devise => "devise",
            Self::Ignore => "_",
            Self::Other(name) => name,
        }
    }

    fn natural_kind(&self) -> ColumnKind {
        match self {
            Self::DateOperation | Self::DateValeur => ColumnKind::Date(None),
            Self::Montant | Self::Debit | Self::Credit | Self::Solde => ColumnKind::Number(None),
            Self::Compte => ColumnKind::Account,
            Self::Ignore => ColumnKind::Skip,
            _ => ColumnKind::Text,
        }
    }

    fn accepts(&self, kind: &ColumnKind) -> bool {
        match self {
            Self::DateOperation | Self::DateValeur => matches!(kind, ColumnKind::Date(_)),
            Self::Montant | Self::Debit | Self::Credit | Self::Solde => matches!(kind, ColumnKind::Number(_)),
            Self::Compte => matches!(kind, ColumnKind::Account | ColumnKind::Text),
            Self::Ignore => matches!(kind, ColumnKind::Skip),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    /// Optional strftime pattern tried before the heuristics.
    Date(Option<String>),
    /// Optional forced decimal separator.
    Number(Option<char>),
    Account,
    Skip,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Date(None) => write!(f, "date"),
            Self::Date(Some(p)) => write!(f, "date({p})"),
            Self::Number(None) => write!(f, "number"),
            Self::Number(Some(c)) => write!(f, "number({c})"),
            Self::Account => write!(f, "account"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub field: Field,
    pub kind: ColumnKind,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DescriptorError {
    #[error("descriptor is empty")]
    Empty,
    #[error("column {position}: cannot read '{entry}'")]
    Syntax { position: usize, entry: String },
    #[error("column {position}: unknown type '{kind}'")]
    UnknownType { position: usize, kind: String },
    #[error("column {position}: '{field}' cannot be of type {kind}")]
    Incompatible { position: usize, field: String, kind: String },
    #[error("column '{0}' appears more than once")]
    Duplicate(String),
    #[error("no date_operation column")]
    MissingDate,
    #[error("no montant, debit or credit column")]
    MissingAmount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub columns: Vec<Column>,
}

fn entry_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<name>[A-Za-z_][A-Za-z0-9_]*)?\s*(?::\s*(?P<kind>[A-Za-z]+)\s*(?:\((?P<arg>[^)]*)\))?)?$")
            .expect("static regex")
    })
}

fn parse_kind(position: usize, kind: &str, arg: Option<&str>) -> Result<ColumnKind, DescriptorError> {
    let arg = arg.map(str::trim).filter(|a| !a.is_empty());
    let kind = match kind.to_ascii_lowercase().as_str() {
        "text" | "string" => ColumnKind::Text,
        "date" => ColumnKind::Date(arg.map(str::to_string)),
        "number" | "amount" | "decimal" => {
            let sep = match arg {
                None => None,
                Some("fr") | Some(",") => Some(','),
                Some("en") | Some(".") => Some('.'),
                Some(other) => {
                    return Err(DescriptorError::UnknownType {
                        position,
                        kind: format!("number({other})"),
                    })
                }
            };
            ColumnKind::Number(sep)
        }
        "account" | "iban" => ColumnKind::Account,
        "skip" | "ignore" => ColumnKind::Skip,
        other => {
            return Err(DescriptorError::UnknownType {
                position,
                kind: other.to_string(),
            })
        }
    };
    Ok(kind)
}

impl Descriptor {
    pub fn parse(input: &str) -> Result<Self, DescriptorError> {
        let entries: Vec<&str> = input.split([';', '|', '\n']).map(str::trim).collect();
        // Tolerate a trailing separator.
        let entries = match entries.split_last() {
            Some((last, rest)) if last.is_empty() => rest.to_vec(),
            _ => entries,
        };
        if entries.iter().all(|e| e.is_empty()) {
            return Err(DescriptorError::Empty);
        }

        let mut columns = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let position = i + 1;
            let caps = entry_regex().captures(entry).ok_or_else(|| DescriptorError::Syntax {
                position,
                entry: entry.to_string(),
            })?;
            let field = Field::from_name(caps.name("name").map_or("", |m| m.as_str()));
            let kind = match caps.name("kind") {
                Some(k) => parse_kind(position, k.as_str(), caps.name("arg").map(|a| a.as_str()))?,
                None => field.natural_kind(),
            };
            // An explicit `skip` type wins over whatever name was given.
            let field = if kind == ColumnKind::Skip { Field::Ignore } else { field };
            if !field.accepts(&kind) {
                return Err(DescriptorError::Incompatible {
                    position,
                    field: field.name().to_string(),
                    kind: kind.to_string(),
                });
            }
            if field != Field::Ignore && columns.iter().any(|c: &Column| c.field == field) {
                return Err(DescriptorError::Duplicate(field.name().to_string()));
            }
            columns.push(Column { field, kind });
        }

        let descriptor = Self { columns };
        if descriptor.position(&Field::DateOperation).is_none() {
            return Err(DescriptorError::MissingDate);
        }
        if [Field::Montant, Field::Debit, Field::Credit]
            .iter()
            .all(|f| descriptor.position(f).is_none())
        {
            return Err(DescriptorError::MissingAmount);
        }
        Ok(descriptor)
    }

    pub fn position(&self, field: &Field) -> Option<usize> {
        self.columns.iter().position(|c| &c.field == field)
    }

    pub fn column(&self, field: &Field) -> Option<(usize, &Column)> {
        self.columns.iter().enumerate().find(|(_, c)| &c.field == field)
    }

    /// Number of cells a row needs so that every mapped column exists.
    pub fn min_width(&self) -> usize {
        self.columns
            .iter()
            .rposition(|c| c.field != Field::Ignore)
            .map_or(0, |i| i + 1)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .columns
            .iter()
            .map(|c| match c.kind {
                ColumnKind::Skip => "_".to_string(),
                _ => format!("{}:{}", c.field.name(), c.kind),
            })
            .collect();
        write!(f, "{}", rendered.join("; "))
    }
}
