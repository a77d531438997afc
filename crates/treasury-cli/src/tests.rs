//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Write;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::NamedTempFile;
use treasury_core::models::{Counterparty, Direction, Member, Provenance};
use treasury_core::{Database, ManualEntry, ReferenceData, Session, SqliteLedger};

use crate::commands::{self, parse_assignment, parse_cost_center, truncate};

const CSV: &str = "Data;Descrição;Valor\n15/03/2024;PIX RECEBIDO JOEL;100,00\n16/03/2024;CIA ENERGIA;-40,00\n17/03/2024;TARIFA;-5,00\n";

fn setup_session() -> Session<SqliteLedger> {
    let db = Database::in_memory().unwrap();
    Session::new(SqliteLedger::new(db), ReferenceData::default()).unwrap()
}

/// Statement file with the right extension
fn statement_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn manual(direction: Direction, category: &str, amount: i64) -> ManualEntry {
    ManualEntry {
        date: NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
        direction,
        category: category.to_string(),
        amount: Decimal::new(amount, 0),
        description: String::new(),
        counterparty: Counterparty::Unidentified,
        account: None,
        cost_center: None,
    }
}

// ========== Helpers ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("Manutenção Predial", 10), "Manuten...");
}

#[test]
fn test_parse_assignment() {
    let (index, assignment) = parse_assignment("0=Mensalidade:Joel Silva").unwrap();
    assert_eq!(index, 0);
    assert_eq!(assignment.category.label(), "Mensalidade");
    assert_eq!(assignment.counterparty, Counterparty::Named("Joel Silva".into()));

    let (index, assignment) = parse_assignment("12=Energia").unwrap();
    assert_eq!(index, 12);
    assert_eq!(assignment.counterparty, Counterparty::Unidentified);

    assert!(parse_assignment("Energia").is_err());
    assert!(parse_assignment("x=Energia").is_err());
}

#[test]
fn test_parse_cost_center() {
    let (index, cc) = parse_cost_center("1=Administrativo").unwrap();
    assert_eq!(index, 1);
    assert_eq!(cc, "Administrativo");
    assert!(parse_cost_center("Administrativo").is_err());
}

// ========== Import Command Tests ==========

#[test]
fn test_cmd_import_preview_commits_nothing() {
    let mut session = setup_session();
    let file = statement_file(".csv", CSV);

    let result =
        commands::cmd_import(&mut session, file.path(), None, None, None, &[], &[]).unwrap();
    assert!(result.is_none());
    assert!(session.ledger().unwrap().is_empty());
}

#[test]
fn test_cmd_import_commits_assigned_rows() {
    let mut session = setup_session();
    let file = statement_file(".csv", CSV);

    let summary = commands::cmd_import(
        &mut session,
        file.path(),
        None,
        None,
        None,
        &["0=Mensalidade:Joel Silva".to_string(), "1=Energia".to_string()],
        &["1=Administrativo".to_string()],
    )
    .unwrap()
    .unwrap();

    assert_eq!(summary.committed_ids(), vec![1, 2]);
    assert_eq!(summary.ignored, 1);

    let ledger = session.ledger().unwrap();
    assert_eq!(ledger[0].counterparty, Counterparty::Named("Joel Silva".into()));
    assert_eq!(ledger[0].cost_center.as_deref(), Some("Geral"));
    assert_eq!(ledger[1].cost_center.as_deref(), Some("Administrativo"));
    assert_eq!(ledger[1].amount, Decimal::new(4000, 2));
    assert!(ledger.iter().all(|e| e.provenance == Provenance::Auto));
}

#[test]
fn test_cmd_import_limit_hides_rows() {
    let mut session = setup_session();
    let file = statement_file(".csv", CSV);

    // Row 2 is past the limit and cannot be classified
    let result = commands::cmd_import(
        &mut session,
        file.path(),
        None,
        None,
        Some(2),
        &["2=Internet".to_string()],
        &[],
    );
    assert!(result.is_err());
    assert!(session.ledger().unwrap().is_empty());
}

#[test]
fn test_cmd_import_rejects_bad_input() {
    let mut session = setup_session();
    let file = statement_file(".csv", CSV);

    // Category not offered for a credit row
    let result = commands::cmd_import(
        &mut session,
        file.path(),
        None,
        None,
        None,
        &["0=Energia".to_string()],
        &[],
    );
    assert!(result.is_err());

    // Same row twice
    let result = commands::cmd_import(
        &mut session,
        file.path(),
        None,
        None,
        None,
        &["1=Energia".to_string(), "1=Internet".to_string()],
        &[],
    );
    assert!(result.is_err());

    // Cost center without an assignment for that row
    let result = commands::cmd_import(
        &mut session,
        file.path(),
        None,
        None,
        None,
        &["1=Energia".to_string()],
        &["2=Geral".to_string()],
    );
    assert!(result.is_err());

    assert!(session.ledger().unwrap().is_empty());
}

#[test]
fn test_cmd_import_pdf_year_override() {
    let mut session = setup_session();
    // Not a real PDF: extraction fails and the run has no rows
    let file = statement_file(".pdf", "not a pdf");

    let result = commands::cmd_import(&mut session, file.path(), None, Some(2023), None, &[], &[]);
    assert!(result.is_ok());
    assert!(session.ledger().unwrap().is_empty());
}

#[test]
fn test_cmd_import_malformed_ofx() {
    let mut session = setup_session();
    let file = statement_file(".ofx", "<OFX><STMTRS><BANKTRANLIST></STMTRS></OFX>");

    let result = commands::cmd_import(
        &mut session,
        file.path(),
        None,
        None,
        None,
        &["0=Mensalidade".to_string()],
        &[],
    );
    assert!(result.is_err());
    assert!(session.ledger().unwrap().is_empty());
}

#[test]
fn test_cmd_import_missing_file() {
    let mut session = setup_session();
    let result = commands::cmd_import(
        &mut session,
        std::path::Path::new("/nonexistent/extrato.csv"),
        None,
        None,
        None,
        &[],
        &[],
    );
    assert!(result.is_err());
}

// ========== Ledger Command Tests ==========

#[test]
fn test_cmd_ledger_empty_and_filled() {
    let mut session = setup_session();
    assert!(commands::cmd_ledger(&session, 20).is_ok());

    commands::cmd_add(&mut session, manual(Direction::Credit, "Cantina", 25)).unwrap();
    assert!(commands::cmd_ledger(&session, 20).is_ok());
    assert!(commands::cmd_ledger(&session, 0).is_ok());
}

#[test]
fn test_cmd_add_validates() {
    let mut session = setup_session();

    commands::cmd_add(&mut session, manual(Direction::Debit, "Energia", 40)).unwrap();
    let ledger = session.ledger().unwrap();
    assert_eq!(ledger[0].id, 1);
    assert_eq!(ledger[0].provenance, Provenance::Manual);

    assert!(commands::cmd_add(&mut session, manual(Direction::Debit, "Mensalidade", 40)).is_err());
    assert!(commands::cmd_add(&mut session, manual(Direction::Credit, "Bazar", 0)).is_err());
    assert_eq!(session.ledger().unwrap().len(), 1);
}

#[test]
fn test_cmd_ledger_export() {
    let mut session = setup_session();
    commands::cmd_add(&mut session, manual(Direction::Credit, "Bazar", 12)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.csv");
    commands::cmd_ledger_export(&session, &path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text.lines().nth(1).unwrap().contains("Entrada"));
}

// ========== Member Command Tests ==========

#[test]
fn test_cmd_members() {
    let mut session = setup_session();
    assert!(commands::cmd_members_list(&session).is_ok());

    commands::cmd_members_add(&mut session, Member::new("Ana Souza", "95999999999")).unwrap();
    assert!(session.reference().find_member("Ana Souza").is_some());
    assert!(commands::cmd_members_add(&mut session, Member::new("N/A", "")).is_err());

    commands::cmd_members_remove(&mut session, "Ana Souza").unwrap();
    assert!(session.reference().find_member("Ana Souza").is_none());
    assert!(commands::cmd_members_remove(&mut session, "Ana Souza").is_err());
}

#[test]
fn test_cmd_members_update() {
    let mut session = setup_session();
    commands::cmd_members_add(&mut session, Member::new("Ana Souza", "95999999999")).unwrap();

    let changes = commands::MemberChanges {
        status: Some("Inativo".into()),
        ..Default::default()
    };
    commands::cmd_members_update(&mut session, "Ana Souza", changes).unwrap();
    let member = session.reference().find_member("Ana Souza").unwrap();
    assert_eq!(member.status, "Inativo");
    assert_eq!(member.phone, "95999999999");

    let changes = commands::MemberChanges {
        rename: Some("Ana Souza Lima".into()),
        ..Default::default()
    };
    commands::cmd_members_update(&mut session, "Ana Souza", changes).unwrap();
    assert!(session.reference().find_member("Ana Souza").is_none());
    assert!(session.reference().find_member("Ana Souza Lima").is_some());

    // Unknown member, and a rename onto an existing one
    let result = commands::cmd_members_update(&mut session, "Ninguem", Default::default());
    assert!(result.is_err());
    let changes = commands::MemberChanges {
        rename: Some("Joel Silva".into()),
        ..Default::default()
    };
    assert!(commands::cmd_members_update(&mut session, "Ana Souza Lima", changes).is_err());
}

// ========== Report Command Tests ==========

#[test]
fn test_cmd_reports() {
    let mut session = setup_session();
    commands::cmd_add(&mut session, manual(Direction::Credit, "Mensalidade", 100)).unwrap();
    commands::cmd_add(&mut session, manual(Direction::Debit, "Energia", 40)).unwrap();

    let from = NaiveDate::from_ymd_opt(2024, 3, 1);
    let to = NaiveDate::from_ymd_opt(2024, 3, 31);
    assert!(commands::cmd_report_balance(&session, None, None).is_ok());
    assert!(commands::cmd_report_accounts(&session, from, to).is_ok());
    assert!(commands::cmd_report_categories(&session, from, None).is_ok());
    assert!(commands::cmd_report_cost_centers(&session, None, to).is_ok());
    assert!(commands::cmd_report_member(&session, "Joel Silva", None, None).is_ok());
}

#[test]
fn test_cmd_receipts_to_file() {
    let mut session = setup_session();
    let mut credit = manual(Direction::Credit, "Mensalidade", 100);
    credit.counterparty = Counterparty::Named("Joel Silva".into());
    commands::cmd_add(&mut session, credit).unwrap();
    commands::cmd_add(&mut session, manual(Direction::Debit, "Energia", 40)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recibos.csv");
    commands::cmd_receipts(&session, Some(&[1, 2][..]), Some(path.as_path())).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "ID,Data,Categoria,Descrição,Valor,Membro,Conta");
    assert!(lines[1].starts_with("1,20/03/2024,Mensalidade,"));
    assert!(lines[1].contains("Joel Silva"));
}

// ========== Init ==========

#[test]
fn test_cmd_init_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("treasury.db");
    let config_path = dir.path().join("config.toml");
    std::fs::write(&config_path, treasury_core::config::DEFAULT_CONFIG).unwrap();

    commands::cmd_init(&db_path, Some(config_path.as_path())).unwrap();
    assert!(db_path.exists());

    // Members were seeded into the new database
    let db = commands::open_db(&db_path).unwrap();
    assert_eq!(db.list_members().unwrap().len(), 3);
}

#[test]
fn test_load_reference_missing_explicit_file() {
    let result = commands::load_reference(Some(std::path::Path::new("/nonexistent/config.toml")));
    assert!(result.is_err());
}
