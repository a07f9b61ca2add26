use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "roster.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            fullname TEXT NOT NULL,
            matricule TEXT NOT NULL,
            group_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    // The unique index is what makes insert/update duplicate detection atomic.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_students_matricule ON students(matricule)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_created ON students(created_at)",
        [],
    )?;

    // Workspaces created before edits were tracked have no updated_at column.
    ensure_students_updated_at(conn)?;

    Ok(())
}

fn ensure_students_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("first init");
        init_schema(&conn).expect("second init");
        assert!(table_has_column(&conn, "students", "updated_at").unwrap());
        assert!(!table_has_column(&conn, "students", "nope").unwrap());
    }

    #[test]
    fn adds_updated_at_to_old_tables() {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute(
            "CREATE TABLE students(
                id TEXT PRIMARY KEY,
                fullname TEXT NOT NULL,
                matricule TEXT NOT NULL,
                group_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .unwrap();
        assert!(!table_has_column(&conn, "students", "updated_at").unwrap());
        init_schema(&conn).expect("init");
        assert!(table_has_column(&conn, "students", "updated_at").unwrap());
    }
}
