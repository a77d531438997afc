//! Domain models for the treasury ledger

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Label shown for the "drop this row" category choice
pub const IGNORE_LABEL: &str = "Ignorar";

/// Label shown for an unidentified counterparty
pub const UNIDENTIFIED_LABEL: &str = "N/A";

/// Direction of a cash movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money in (Entrada)
    Credit,
    /// Money out (Saída)
    Debit,
}

impl Direction {
    /// Derive the direction from a signed bank amount.
    ///
    /// Positive amounts are credits; zero and negative amounts are debits.
    pub fn from_amount(amount: &Decimal) -> Self {
        if amount.is_sign_positive() && !amount.is_zero() {
            Self::Credit
        } else {
            Self::Debit
        }
    }

    /// Rebuild the signed bank amount from an unsigned ledger amount
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            Self::Credit => amount,
            Self::Debit => -amount,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "credit" | "entrada" | "in" => Ok(Self::Credit),
            "debit" | "saida" | "saída" | "out" => Ok(Self::Debit),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a ledger entry was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Typed in by the treasurer
    #[default]
    Manual,
    /// Imported from a bank statement
    Auto,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
        }
    }
}

impl std::str::FromStr for Provenance {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "auto" | "auto-banco" => Ok(Self::Auto),
            _ => Err(format!("Unknown provenance: {}", s)),
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bank movement parsed from a statement, not yet owned by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedTransaction {
    pub date: NaiveDate,
    pub description: String,
    /// Signed amount as the bank reported it
    pub amount: Decimal,
}

impl StagedTransaction {
    pub fn direction(&self) -> Direction {
        Direction::from_amount(&self.amount)
    }
}

/// Category picked for a staged row
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryChoice {
    /// Drop the row; it is never committed
    #[default]
    Ignore,
    Named(String),
}

impl CategoryChoice {
    /// Parse a UI label, mapping the "Ignorar" sentinel to `Ignore`
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.is_empty() || label.eq_ignore_ascii_case(IGNORE_LABEL) {
            Self::Ignore
        } else {
            Self::Named(label.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Ignore => IGNORE_LABEL,
            Self::Named(name) => name,
        }
    }

    pub fn is_ignore(&self) -> bool {
        matches!(self, Self::Ignore)
    }
}

impl std::fmt::Display for CategoryChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for CategoryChoice {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for CategoryChoice {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::from_label(&label))
    }
}

/// Member, donor or supplier on the other side of a movement
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Counterparty {
    #[default]
    Unidentified,
    Named(String),
}

impl Counterparty {
    /// Parse a UI label, mapping "N/A" (and the manual form's "Não Identificado") to `Unidentified`
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.is_empty()
            || label.eq_ignore_ascii_case(UNIDENTIFIED_LABEL)
            || label.eq_ignore_ascii_case("unidentified")
            || label == "Não Identificado"
        {
            Self::Unidentified
        } else {
            Self::Named(label.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Unidentified => UNIDENTIFIED_LABEL,
            Self::Named(name) => name,
        }
    }
}

impl std::fmt::Display for Counterparty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for Counterparty {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Counterparty {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::from_label(&label))
    }
}

/// A staged transaction with the treasurer's classification attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedTransaction {
    pub staged: StagedTransaction,
    /// Derived from the staged amount when the row was staged
    pub direction: Direction,
    pub category: CategoryChoice,
    pub counterparty: Counterparty,
    pub account: Option<String>,
    pub cost_center: Option<String>,
}

/// An entry about to be appended to a ledger store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub date: NaiveDate,
    pub direction: Direction,
    pub account: Option<String>,
    pub category: String,
    pub cost_center: Option<String>,
    pub description: String,
    /// Unsigned amount; the sign lives in `direction`
    pub amount: Decimal,
    pub counterparty: Counterparty,
    pub provenance: Provenance,
    /// Import fingerprint for auto entries (date, amount, description, source file hash)
    pub fingerprint: Option<String>,
}

/// A committed ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub date: NaiveDate,
    pub direction: Direction,
    pub account: Option<String>,
    pub category: String,
    pub cost_center: Option<String>,
    pub description: String,
    pub amount: Decimal,
    pub counterparty: Counterparty,
    pub provenance: Provenance,
    pub fingerprint: Option<String>,
}

impl LedgerEntry {
    pub fn from_new(id: i64, entry: NewLedgerEntry) -> Self {
        Self {
            id,
            date: entry.date,
            direction: entry.direction,
            account: entry.account,
            category: entry.category,
            cost_center: entry.cost_center,
            description: entry.description,
            amount: entry.amount,
            counterparty: entry.counterparty,
            provenance: entry.provenance,
            fingerprint: entry.fingerprint,
        }
    }

    /// Signed value as it appeared on the bank statement
    pub fn signed_amount(&self) -> Decimal {
        self.direction.signed(self.amount)
    }
}

/// A member or donor of the organization
///
/// The name is the join key into `LedgerEntry::counterparty`; removing a member
/// leaves existing entries untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default = "default_member_status")]
    pub status: String,
    #[serde(default)]
    pub email: Option<String>,
}

fn default_member_status() -> String {
    "Ativo".to_string()
}

impl Member {
    pub fn new(name: &str, phone: &str) -> Self {
        Self {
            name: name.to_string(),
            phone: phone.to_string(),
            status: default_member_status(),
            email: None,
        }
    }
}

/// Row handed to the receipt/report rendering collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptRow {
    pub id: i64,
    pub date: NaiveDate,
    pub category: String,
    pub description: String,
    pub amount: Decimal,
    pub counterparty: String,
    pub account: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_amount() {
        assert_eq!(Direction::from_amount(&Decimal::new(100, 0)), Direction::Credit);
        assert_eq!(Direction::from_amount(&Decimal::new(-40, 0)), Direction::Debit);
        assert_eq!(Direction::from_amount(&Decimal::ZERO), Direction::Debit);
    }

    #[test]
    fn test_direction_signed_roundtrip() {
        let amount: Decimal = "-40.50".parse().unwrap();
        let direction = Direction::from_amount(&amount);
        assert_eq!(direction.signed(amount.abs()), amount);
    }

    #[test]
    fn test_category_choice_labels() {
        assert_eq!(CategoryChoice::from_label("Ignorar"), CategoryChoice::Ignore);
        assert_eq!(CategoryChoice::from_label(""), CategoryChoice::Ignore);
        assert_eq!(
            CategoryChoice::from_label("Mensalidade"),
            CategoryChoice::Named("Mensalidade".to_string())
        );
        assert_eq!(CategoryChoice::Ignore.to_string(), "Ignorar");
    }

    #[test]
    fn test_counterparty_labels() {
        assert_eq!(Counterparty::from_label("N/A"), Counterparty::Unidentified);
        assert_eq!(Counterparty::from_label("Não Identificado"), Counterparty::Unidentified);
        assert_eq!(
            Counterparty::from_label("Joel Silva"),
            Counterparty::Named("Joel Silva".to_string())
        );
    }

    #[test]
    fn test_counterparty_serializes_as_label() {
        let json = serde_json::to_string(&Counterparty::Unidentified).unwrap();
        assert_eq!(json, "\"N/A\"");
        let back: Counterparty = serde_json::from_str("\"Maria Oliveira\"").unwrap();
        assert_eq!(back, Counterparty::Named("Maria Oliveira".to_string()));
    }

    #[test]
    fn test_provenance_parse() {
        assert_eq!("auto".parse::<Provenance>().unwrap(), Provenance::Auto);
        assert_eq!("Auto-Banco".parse::<Provenance>().unwrap(), Provenance::Auto);
        assert_eq!("manual".parse::<Provenance>().unwrap(), Provenance::Manual);
        assert!("other".parse::<Provenance>().is_err());
    }
}
