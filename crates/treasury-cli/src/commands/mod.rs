//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, open_session)
//! - `import` - Statement import: preview, classify, commit
//! - `ledger` - Ledger listing, manual entries, members
//! - `reports` - Report and receipt-row commands
//! - `serve` - Web server command

pub mod core;
pub mod import;
pub mod ledger;
pub mod reports;
pub mod serve;

// Re-export command functions for main.rs
pub use core::*;
pub use import::*;
pub use ledger::*;
pub use reports::*;
pub use serve::*;

use rust_decimal::Decimal;
use treasury_core::models::Direction;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Amount with the bank sign, green for credits and red for debits
pub fn format_amount(direction: Direction, amount: Decimal) -> String {
    match direction {
        Direction::Credit => format!("\x1b[32m+{:.2}\x1b[0m", amount),
        Direction::Debit => format!("\x1b[31m-{:.2}\x1b[0m", amount),
    }
}
