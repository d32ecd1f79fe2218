use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::uuid_column;
use crate::db::DatabaseError;
use crate::models::*;

fn row_to_practitioner(row: &rusqlite::Row) -> Result<Practitioner, rusqlite::Error> {
    Ok(Practitioner {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        specialty: row.get(2)?,
    })
}

pub fn insert_practitioner(
    conn: &Connection,
    name: &str,
    specialty: Option<&str>,
) -> Result<Practitioner, DatabaseError> {
    let practitioner = Practitioner {
        id: Uuid::new_v4(),
        name: name.to_string(),
        specialty: specialty.map(|s| s.to_string()),
    };
    conn.execute(
        "INSERT INTO practitioners (doctor_id, name, specialty) VALUES (?1, ?2, ?3)",
        params![
            practitioner.id.to_string(),
            practitioner.name,
            practitioner.specialty,
        ],
    )?;
    Ok(practitioner)
}

/// Practitioners in provisioning order, optionally restricted to one specialty
/// (case-insensitive exact match).
pub fn find_practitioners(
    conn: &Connection,
    specialty: Option<&str>,
) -> Result<Vec<Practitioner>, DatabaseError> {
    let specialty = specialty.map(str::trim).filter(|s| !s.is_empty());
    let mut stmt = conn.prepare(
        "SELECT doctor_id, name, specialty FROM practitioners
         WHERE ?1 IS NULL OR lower(specialty) = lower(?1)
         ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![specialty], row_to_practitioner)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn get_practitioner(conn: &Connection, id: &Uuid) -> Result<Option<Practitioner>, DatabaseError> {
    conn.query_row(
        "SELECT doctor_id, name, specialty FROM practitioners WHERE doctor_id = ?1",
        params![id.to_string()],
        row_to_practitioner,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn count_practitioners(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM practitioners", [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn seeded() -> Connection {
        let conn = open_memory_database().unwrap();
        insert_practitioner(&conn, "Dr. Smith", Some("Cardiology")).unwrap();
        insert_practitioner(&conn, "Dr. Patel", Some("Dermatology")).unwrap();
        insert_practitioner(&conn, "Dr. Jones", Some("cardiology")).unwrap();
        conn
    }

    #[test]
    fn unfiltered_returns_all_in_order() {
        let conn = seeded();
        let names: Vec<String> = find_practitioners(&conn, None)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Dr. Smith", "Dr. Patel", "Dr. Jones"]);
    }

    #[test]
    fn specialty_filter_is_case_insensitive_exact() {
        let conn = seeded();
        let cardio = find_practitioners(&conn, Some("CARDIOLOGY")).unwrap();
        assert_eq!(cardio.len(), 2);

        let partial = find_practitioners(&conn, Some("Cardio")).unwrap();
        assert!(partial.is_empty());
    }

    #[test]
    fn blank_specialty_means_no_filter() {
        let conn = seeded();
        assert_eq!(find_practitioners(&conn, Some("  ")).unwrap().len(), 3);
    }

    #[test]
    fn get_by_id() {
        let conn = seeded();
        let first = &find_practitioners(&conn, None).unwrap()[0];
        let fetched = get_practitioner(&conn, &first.id).unwrap().unwrap();
        assert_eq!(&fetched, first);
        assert!(get_practitioner(&conn, &Uuid::new_v4()).unwrap().is_none());
        assert_eq!(count_practitioners(&conn).unwrap(), 3);
    }
}
