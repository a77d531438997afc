//! Member operations

use rusqlite::params;

use super::Database;
use crate::error::{Error, Result};
use crate::models::Member;

impl Database {
    /// List members by name
    pub fn list_members(&self) -> Result<Vec<Member>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT name, phone, status, email FROM members ORDER BY name")?;

        let members = stmt
            .query_map([], |row| {
                Ok(Member {
                    name: row.get(0)?,
                    phone: row.get(1)?,
                    status: row.get(2)?,
                    email: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(members)
    }

    /// Insert or replace a member, keyed by name
    pub fn upsert_member(&self, member: &Member) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO members (name, phone, status, email) VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET phone = excluded.phone, status = excluded.status, email = excluded.email
            "#,
            params![member.name, member.phone, member.status, member.email],
        )?;
        Ok(())
    }

    /// Rename a member and replace their details in one transaction
    ///
    /// Fails without changes when `old_name` is unknown or `member.name` is
    /// already taken.
    pub fn rename_member(&self, old_name: &str, member: &Member) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let deleted = tx.execute("DELETE FROM members WHERE name = ?", params![old_name])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("member '{}'", old_name)));
        }
        tx.execute(
            "INSERT INTO members (name, phone, status, email) VALUES (?, ?, ?, ?)",
            params![member.name, member.phone, member.status, member.email],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Delete a member; ledger entries naming them are left as they are
    pub fn delete_member(&self, name: &str) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM members WHERE name = ?", params![name])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("member '{}'", name)));
        }
        Ok(())
    }
}
