use std::fmt::Display;

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use rusqlite::OptionalExtension;
use tracing::{info, warn};

use crate::catalog::{insert_book, query_book_id};
use crate::directory::insert_user;
use crate::models::{SeedSummary, SweepReport};
use crate::{Database, DbError, Result};

/// Seed users, one per letter; each gets a three-letter username that doubles
/// as their password.
const SEED_USER_LETTERS: &str = "cdefghikz";

/// Seed users are scattered around this point.
const SEED_CENTER: (f64, f64) = (50.4547, 30.520);

const SEED_LISTINGS: usize = 25;

const SEED_BOOKS: &[(&str, &str)] = &[
    ("In Search of Lost Time", "Marcel Proust"),
    ("Ulysses", "James Joyce"),
    ("Don Quixote", "Miguel de Cervantes"),
    ("The Great Gatsby", "F. Scott Fitzgerald"),
    ("One Hundred Years of Solitude", "Gabriel Garcia Marquez"),
    ("Moby Dick", "Herman Melville"),
    ("War and Peace", "Leo Tolstoy"),
    ("Lolita", "Vladimir Nabokov"),
    ("Hamlet", "William Shakespeare"),
    ("The Catcher in the Rye", "J. D. Salinger"),
    ("The Odyssey", "Homer"),
    ("The Brothers Karamazov", "Fyodor Dostoyevsky"),
    ("Crime and Punishment", "Fyodor Dostoyevsky"),
    ("Madame Bovary", "Gustave Flaubert"),
    ("The Divine Comedy", "Dante Alighieri"),
];

/// Tables in the order they can be emptied without tripping a foreign key.
const CLEAR_ORDER: &[&str] = &["book_instances", "messages", "books", "users"];

impl Database {
    /// Fill the store with demo data: the seed users, the classic catalog and
    /// a batch of randomly attributed listings. Users and books that already
    /// exist are reused, so running it twice only adds more listings.
    pub fn seed<R, F, E>(&self, rng: &mut R, mut hash_password: F) -> Result<SeedSummary>
    where
        R: Rng,
        F: FnMut(&str) -> std::result::Result<String, E>,
        E: Display,
    {
        let mut user_ids = Vec::new();
        for letter in SEED_USER_LETTERS.chars() {
            let username = letter.to_string().repeat(3);
            let existing: Option<i64> = self.with_conn(|conn| {
                Ok(conn
                    .query_row("SELECT id FROM users WHERE username = ?1", [&username], |row| {
                        row.get(0)
                    })
                    .optional()?)
            })?;
            if let Some(id) = existing {
                user_ids.push(id);
                continue;
            }

            let hash = hash_password(&username).map_err(|e| {
                DbError::Internal(format!("hashing seed password for {}: {}", username, e))
            })?;
            let latitude = SEED_CENTER.0 + (rng.random::<f64>() - 0.5) / 10.0;
            let longitude = SEED_CENTER.1 + (rng.random::<f64>() - 0.5) / 10.0;
            let id = self.with_conn(|conn| {
                let id = insert_user(
                    conn,
                    &username,
                    &format!("{}@gmail.com", username),
                    &hash,
                    Some(latitude),
                    Some(longitude),
                )?;
                conn.execute(
                    "UPDATE users SET about_me = 'No info about the user yet.' WHERE id = ?1",
                    [id],
                )?;
                Ok(id)
            })?;
            user_ids.push(id);
        }

        let book_ids = self.with_tx(|tx| {
            let mut ids = Vec::with_capacity(SEED_BOOKS.len());
            for (title, author) in SEED_BOOKS {
                let id = match query_book_id(tx, title, author)? {
                    Some(id) => id,
                    None => insert_book(tx, title, author, (None, None), None)?.id,
                };
                ids.push(id);
            }
            Ok(ids)
        })?;

        for _ in 0..SEED_LISTINGS {
            let book_id = book_ids[rng.random_range(0..book_ids.len())];
            let owner_id = user_ids[rng.random_range(0..user_ids.len())];
            self.create_listing(
                book_id,
                owner_id,
                rng.random_range(20..=200),
                rng.random_range(1..=12),
                "Lorem ipsum...",
            )?;
        }

        let summary = SeedSummary {
            users: user_ids.len(),
            books: book_ids.len(),
            listings: SEED_LISTINGS,
        };
        info!(
            "Seeded {} users, {} books, {} listings",
            summary.users, summary.books, summary.listings
        );
        Ok(summary)
    }

    /// Delete every row of every domain table in one transaction.
    pub fn clear(&self) -> Result<()> {
        self.with_tx(|tx| {
            for table in CLEAR_ORDER {
                let removed = tx.execute(&format!("DELETE FROM {}", table), [])?;
                info!("Cleared {} rows from {}", removed, table);
            }
            Ok(())
        })
    }

    /// Deactivate active listings older than `retention`.
    pub fn expire_stale_listings(&self, retention: TimeDelta) -> Result<SweepReport> {
        self.expire_listings_created_before(Utc::now() - retention)
    }

    /// Deactivate every active listing created before `cutoff`. Rows are
    /// flipped one statement at a time so interactive requests can interleave;
    /// a row that fails is logged and skipped. Counters are never touched.
    pub fn expire_listings_created_before(&self, cutoff: DateTime<Utc>) -> Result<SweepReport> {
        let stale: Vec<i64> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM book_instances
                 WHERE is_active = 1 AND created_at < ?1
                 ORDER BY id",
            )?;
            let ids = stmt
                .query_map([cutoff], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })?;

        let mut report = SweepReport {
            examined: stale.len(),
            ..SweepReport::default()
        };

        for id in stale {
            let res = self.with_conn(|conn| {
                Ok(conn.execute(
                    "UPDATE book_instances SET is_active = 0 WHERE id = ?1 AND is_active = 1",
                    [id],
                )?)
            });
            match res {
                Ok(changed) => report.deactivated += changed,
                Err(e) => {
                    warn!("Expiry: could not deactivate book instance {}: {}", id, e);
                    report.failed += 1;
                }
            }
        }

        if report.deactivated > 0 {
            info!("Expiry: deactivated {} stale listings", report.deactivated);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::test_support::{book, counter, db, user};

    fn plain(password: &str) -> std::result::Result<String, Infallible> {
        Ok(format!("plain:{password}"))
    }

    fn table_count(db: &Database, table: &str) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?)
        })
        .unwrap()
    }

    #[test]
    fn seed_builds_consistent_counters() {
        let db = db();
        let mut rng = StdRng::seed_from_u64(7);

        let summary = db.seed(&mut rng, plain).unwrap();
        assert_eq!(summary, SeedSummary { users: 9, books: 15, listings: 25 });

        let total: i64 = db.list_books().unwrap().iter().map(|b| b.instance_counter).sum();
        assert_eq!(total, 25);
        for b in db.list_books().unwrap() {
            assert_eq!(b.instance_counter, db.list_listings_by_book(b.id).unwrap().len() as i64);
        }

        let zzz = db.get_user_by_username("zzz").unwrap();
        assert_eq!(zzz.password, "plain:zzz");
        assert_eq!(zzz.email, "zzz@gmail.com");
        let lat = zzz.latitude.unwrap();
        assert!((lat - SEED_CENTER.0).abs() <= 0.05);
    }

    #[test]
    fn reseeding_reuses_users_and_books() {
        let db = db();
        let mut rng = StdRng::seed_from_u64(1);
        db.seed(&mut rng, plain).unwrap();
        db.seed(&mut rng, plain).unwrap();

        assert_eq!(db.list_users().unwrap().len(), 9);
        assert_eq!(db.list_books().unwrap().len(), 15);
        assert_eq!(db.list_all_listings().unwrap().len(), 50);
    }

    #[test]
    fn seed_then_clear_empties_everything() {
        let db = db();
        let mut rng = StdRng::seed_from_u64(3);
        db.seed(&mut rng, plain).unwrap();
        let ccc = db.get_user_by_username("ccc").unwrap().id;
        let ddd = db.get_user_by_username("ddd").unwrap().id;
        let hamlet = db.find_book_id("Hamlet", "William Shakespeare").unwrap().unwrap();
        db.send_message(ccc, ddd, hamlet, 0, "trade?").unwrap();

        db.clear().unwrap();
        for table in CLEAR_ORDER {
            assert_eq!(table_count(&db, table), 0, "{table} not empty");
        }
    }

    #[test]
    fn failing_hasher_aborts_seed() {
        let db = db();
        let mut rng = StdRng::seed_from_u64(3);
        let res = db.seed(&mut rng, |_| Err::<String, _>("no entropy"));
        assert!(matches!(res, Err(DbError::Internal(_))));
        assert!(db.list_users().unwrap().is_empty());
    }

    #[test]
    fn expiry_only_deactivates() {
        let db = db();
        let owner = user(&db, "ccc");
        let hamlet = book(&db, "Hamlet", "William Shakespeare");
        let a = db.create_listing(hamlet, owner, 50, 5, "").unwrap();
        let b = db.create_listing(hamlet, owner, 60, 5, "").unwrap();
        db.deactivate_listing(b.id).unwrap();

        let report = db.expire_stale_listings(TimeDelta::days(30)).unwrap();
        assert_eq!(report, SweepReport::default());
        assert!(db.get_listing(a.id).unwrap().is_active);

        let report = db.expire_stale_listings(TimeDelta::zero()).unwrap();
        assert_eq!(report, SweepReport { examined: 1, deactivated: 1, failed: 0 });
        assert!(!db.get_listing(a.id).unwrap().is_active);
        assert_eq!(counter(&db, hamlet), 2);

        // nothing left to do on a second pass
        let report = db.expire_stale_listings(TimeDelta::zero()).unwrap();
        assert_eq!(report.examined, 0);
    }

    #[test]
    fn expiry_skips_a_failing_row_and_carries_on() {
        let db = db();
        let owner = user(&db, "ccc");
        let hamlet = book(&db, "Hamlet", "William Shakespeare");
        let a = db.create_listing(hamlet, owner, 50, 5, "").unwrap();
        let b = db.create_listing(hamlet, owner, 60, 5, "").unwrap();
        let c = db.create_listing(hamlet, owner, 70, 5, "").unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(&format!(
                "CREATE TRIGGER pin_listing BEFORE UPDATE ON book_instances
                 WHEN NEW.id = {} BEGIN SELECT RAISE(ABORT, 'pinned'); END;",
                b.id
            ))?;
            Ok(())
        })
        .unwrap();

        let report = db.expire_stale_listings(TimeDelta::zero()).unwrap();
        assert_eq!(report, SweepReport { examined: 3, deactivated: 2, failed: 1 });
        assert!(!db.get_listing(a.id).unwrap().is_active);
        assert!(db.get_listing(b.id).unwrap().is_active);
        assert!(!db.get_listing(c.id).unwrap().is_active);
        assert_eq!(counter(&db, hamlet), 3);
    }
}
