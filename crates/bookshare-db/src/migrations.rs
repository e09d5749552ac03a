use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
    )?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                username                TEXT NOT NULL UNIQUE,
                email                   TEXT NOT NULL UNIQUE,
                password                TEXT NOT NULL,
                latitude                REAL,
                longitude               REAL,
                about_me                TEXT NOT NULL DEFAULT '',
                created_at              TEXT NOT NULL,
                last_seen               TEXT NOT NULL,
                last_message_read_at    TEXT
            );

            -- (title, author) uniqueness is checked by the catalog, not here
            CREATE TABLE books (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                title               TEXT NOT NULL,
                author              TEXT NOT NULL,
                isbn_10             INTEGER,
                isbn_13             INTEGER,
                created_by          INTEGER REFERENCES users(id),
                created_at          TEXT NOT NULL,
                instance_counter    INTEGER NOT NULL DEFAULT 0 CHECK (instance_counter >= 0)
            );

            CREATE INDEX idx_books_title_author ON books(title, author);

            CREATE TABLE book_instances (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                book_id     INTEGER NOT NULL REFERENCES books(id),
                owner_id    INTEGER NOT NULL REFERENCES users(id),
                price       INTEGER NOT NULL,
                condition   INTEGER NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                is_active   INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_book_instances_book ON book_instances(book_id);
            CREATE INDEX idx_book_instances_owner ON book_instances(owner_id);
            CREATE INDEX idx_book_instances_created ON book_instances(created_at);

            -- book_id NULL means no listing context; book_instance_id 0 likewise
            CREATE TABLE messages (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                book_id                 INTEGER REFERENCES books(id),
                book_instance_id        INTEGER NOT NULL DEFAULT 0,
                sender_id               INTEGER NOT NULL REFERENCES users(id),
                recipient_id            INTEGER NOT NULL REFERENCES users(id),
                exists_for_sender       INTEGER NOT NULL DEFAULT 1,
                exists_for_recipient    INTEGER NOT NULL DEFAULT 1,
                body                    TEXT NOT NULL,
                created_at              TEXT NOT NULL,
                CHECK (exists_for_sender = 1 OR exists_for_recipient = 1)
            );

            CREATE INDEX idx_messages_sender ON messages(sender_id, created_at);
            CREATE INDEX idx_messages_recipient ON messages(recipient_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rerunning_is_a_noop() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn counter_cannot_go_negative_at_the_schema_level() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute(
            "INSERT INTO books (title, author, created_at) VALUES ('Ulysses', 'James Joyce', '2024-01-01 00:00:00+00:00')",
            [],
        )
        .unwrap();

        let res = conn.execute("UPDATE books SET instance_counter = -1", []);
        assert!(res.is_err());
    }
}
