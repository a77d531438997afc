//! Database tests

use super::*;
use crate::models::*;
use chrono::NaiveDate;
use rust_decimal::Decimal;

fn new_entry(amount: i64, direction: Direction) -> NewLedgerEntry {
    NewLedgerEntry {
        date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        direction,
        account: Some("Conta Corrente (Banco)".into()),
        category: "Mensalidade".into(),
        cost_center: Some("Geral".into()),
        description: "Pix Recebido".into(),
        amount: Decimal::new(amount, 2),
        counterparty: Counterparty::Named("Joel Silva".into()),
        provenance: Provenance::Auto,
        fingerprint: Some(format!("fp-{}", amount)),
    }
}

#[test]
fn test_in_memory_db() {
    let db = Database::in_memory().unwrap();
    assert_eq!(db.count_entries().unwrap(), 0);
    assert!(db.list_entries().unwrap().is_empty());
}

#[test]
fn test_schema_exists() {
    let db = Database::in_memory().unwrap();
    let conn = db.conn().unwrap();

    let result: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('ledger_entries') WHERE name IN ('id', 'date', 'direction', 'amount', 'provenance', 'fingerprint')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(result, 6, "ledger_entries should have the expected columns");

    let result: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('members')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(result >= 4);
}

#[test]
fn test_entry_roundtrip() {
    let db = Database::in_memory().unwrap();

    let inserted = db.insert_entry(&new_entry(15000, Direction::Credit)).unwrap();
    assert_eq!(inserted.id, 1);

    let loaded = db.get_entry(1).unwrap().unwrap();
    assert_eq!(loaded, inserted);
    assert_eq!(loaded.amount, Decimal::new(15000, 2));
    assert_eq!(loaded.counterparty, Counterparty::Named("Joel Silva".into()));

    assert!(db.get_entry(2).unwrap().is_none());
}

#[test]
fn test_unidentified_counterparty_stored_as_null() {
    let db = Database::in_memory().unwrap();
    let mut entry = new_entry(500, Direction::Debit);
    entry.counterparty = Counterparty::Unidentified;
    db.insert_entry(&entry).unwrap();

    let conn = db.conn().unwrap();
    let raw: Option<String> = conn
        .query_row("SELECT counterparty FROM ledger_entries WHERE id = 1", [], |row| row.get(0))
        .unwrap();
    assert!(raw.is_none());
    assert_eq!(db.get_entry(1).unwrap().unwrap().counterparty, Counterparty::Unidentified);
}

#[test]
fn test_batch_ids_are_consecutive() {
    let db = Database::in_memory().unwrap();
    db.insert_entry(&new_entry(100, Direction::Credit)).unwrap();

    let batch = vec![
        new_entry(200, Direction::Credit),
        new_entry(300, Direction::Debit),
        new_entry(400, Direction::Debit),
    ];
    let inserted = db.insert_entries(&batch).unwrap();
    let ids: Vec<i64> = inserted.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![2, 3, 4]);
    assert_eq!(db.count_entries().unwrap(), 4);
}

#[test]
fn test_fingerprint_lookup() {
    let db = Database::in_memory().unwrap();
    db.insert_entry(&new_entry(100, Direction::Credit)).unwrap();
    assert!(db.fingerprint_exists("fp-100").unwrap());
    assert!(!db.fingerprint_exists("fp-999").unwrap());
}

#[test]
fn test_member_crud() {
    let db = Database::in_memory().unwrap();

    db.upsert_member(&Member::new("Maria Oliveira", "95988888888")).unwrap();
    db.upsert_member(&Member::new("Joel Silva", "1")).unwrap();

    let mut updated = Member::new("Joel Silva", "5595981136537");
    updated.status = "Inativo".into();
    db.upsert_member(&updated).unwrap();

    let members = db.list_members().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].name, "Joel Silva");
    assert_eq!(members[0].phone, "5595981136537");
    assert_eq!(members[0].status, "Inativo");

    db.delete_member("Joel Silva").unwrap();
    assert_eq!(db.list_members().unwrap().len(), 1);
    assert!(matches!(
        db.delete_member("Joel Silva"),
        Err(crate::error::Error::NotFound(_))
    ));
}

#[test]
fn test_rename_member_is_atomic() {
    let db = Database::in_memory().unwrap();
    db.upsert_member(&Member::new("Ana Souza", "1")).unwrap();
    db.upsert_member(&Member::new("Joel Silva", "2")).unwrap();

    // Target name taken: the insert fails and the delete is rolled back
    let result = db.rename_member("Ana Souza", &Member::new("Joel Silva", "3"));
    assert!(result.is_err());
    let members = db.list_members().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].name, "Ana Souza");
    assert_eq!(members[1].phone, "2");

    db.rename_member("Ana Souza", &Member::new("Ana Souza Lima", "1")).unwrap();
    let names: Vec<String> = db.list_members().unwrap().into_iter().map(|m| m.name).collect();
    assert_eq!(names, vec!["Ana Souza Lima", "Joel Silva"]);

    assert!(matches!(
        db.rename_member("Ninguem", &Member::new("Outro", "")),
        Err(crate::error::Error::NotFound(_))
    ));
}
