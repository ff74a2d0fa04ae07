//! Employee and A&R assignment repair pass
//!
//! Legacy imports created employee records from whatever text sat in the
//! A&R column, including notes fragments and platform statuses, with
//! synthesized login emails. This pass deletes such employees when no
//! release references them, flags the referenced ones for manual review,
//! and moves contaminated `ar_contact` text on releases into notes.

use sqlx::SqlitePool;
use tracing::info;

use crate::classify::ContentClassifier;
use crate::db::{employees, releases};
use crate::import::row_mapper::append_note;
use crate::repair::{RepairAction, RepairReport};

/// Legacy import synthesized login addresses under the reserved
/// `.invalid` TLD
fn is_placeholder_email(email: &str) -> bool {
    let email = email.to_lowercase();
    email.ends_with(".invalid") || email.contains("placeholder")
}

pub struct EmployeeRepair {
    db: SqlitePool,
    classifier: ContentClassifier,
}

impl EmployeeRepair {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            classifier: ContentClassifier::new(),
        }
    }

    /// Scan employees and release A&R assignments. `scanned` counts
    /// employee records; contaminated `ar_contact` cleanups show up in
    /// `flagged`/`fixed` and the action list alongside employee actions.
    pub async fn run(&self, dry_run: bool) -> Result<RepairReport, waxline_common::Error> {
        let mut report = RepairReport {
            dry_run,
            ..Default::default()
        };

        let all = employees::scan_employees(&self.db).await?;
        report.scanned = all.len();

        for employee in &all {
            let bad_name = !self.classifier.is_valid_employee_name(&employee.name);
            let bad_email = employee
                .email
                .as_deref()
                .map(is_placeholder_email)
                .unwrap_or(false);
            if !bad_name && !bad_email {
                continue;
            }
            report.flagged += 1;

            let assigned = employees::count_assigned_releases(&self.db, employee.id).await?;
            if assigned > 0 {
                // Referenced by releases; leave for manual review
                report.skipped += 1;
                report.actions.push(RepairAction {
                    id: employee.id,
                    description: format!(
                        "Flagged employee {:?} for review ({} assigned releases)",
                        employee.name, assigned
                    ),
                });
                continue;
            }

            report.actions.push(RepairAction {
                id: employee.id,
                description: format!("Delete employee {:?} (no assignments)", employee.name),
            });
            if dry_run {
                report.skipped += 1;
            } else {
                employees::delete_employee_cascade(&self.db, employee).await?;
                info!(employee_id = %employee.id, name = %employee.name, "Deleted invalid employee");
                report.fixed += 1;
            }
        }

        self.repair_ar_contacts(dry_run, &mut report).await?;

        info!(
            scanned = report.scanned,
            flagged = report.flagged,
            fixed = report.fixed,
            dry_run,
            "Employee repair pass finished"
        );
        Ok(report)
    }

    async fn repair_ar_contacts(
        &self,
        dry_run: bool,
        report: &mut RepairReport,
    ) -> Result<(), waxline_common::Error> {
        for release in releases::scan_releases(&self.db).await? {
            let Some(contact) = release.ar_contact.as_deref() else {
                continue;
            };
            if self.classifier.is_valid_employee_name(contact) {
                continue;
            }
            report.flagged += 1;
            report.actions.push(RepairAction {
                id: release.id,
                description: format!("Clear contaminated A&R contact {:?}", contact),
            });

            if dry_run {
                report.skipped += 1;
                continue;
            }
            let notes = append_note(
                release.notes.as_deref(),
                &format!("Imported A&R cell: {}", contact),
            );
            releases::clear_ar_contact(&self.db, release.id, &notes).await?;
            info!(release_id = %release.id, "Cleared contaminated A&R contact");
            report.fixed += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        waxline_common::db::init_schema(&pool)
            .await
            .expect("schema init");
        pool
    }

    async fn seed_employee(pool: &SqlitePool, name: &str, email: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, username, role) VALUES (?, ?, 'staff')")
            .bind(user_id.to_string())
            .bind(email)
            .execute(pool)
            .await
            .unwrap();
        let employee_id = Uuid::new_v4();
        sqlx::query("INSERT INTO employees (id, user_id, name, email) VALUES (?, ?, ?, ?)")
            .bind(employee_id.to_string())
            .bind(user_id.to_string())
            .bind(name)
            .bind(email)
            .execute(pool)
            .await
            .unwrap();
        employee_id
    }

    async fn seed_release_for(pool: &SqlitePool, employee_id: Option<Uuid>, ar_contact: Option<&str>) -> Uuid {
        let artist_id = Uuid::new_v4();
        sqlx::query("INSERT INTO artists (id, name) VALUES (?, ?)")
            .bind(artist_id.to_string())
            .bind(format!("Artist {}", artist_id))
            .execute(pool)
            .await
            .unwrap();
        let release_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO releases (id, title, release_type, primary_artist_id, ar_employee_id, ar_contact) \
             VALUES (?, 'Starlight', 'single', ?, ?, ?)",
        )
        .bind(release_id.to_string())
        .bind(artist_id.to_string())
        .bind(employee_id.map(|id| id.to_string()))
        .bind(ar_contact)
        .execute(pool)
        .await
        .unwrap();
        release_id
    }

    #[tokio::test]
    async fn unreferenced_invalid_employee_is_deleted_with_user() {
        let pool = pool().await;
        seed_employee(&pool, "uploaded, monetized", "x@agency.example").await;

        let repair = EmployeeRepair::new(pool.clone());
        let report = repair.run(false).await.unwrap();
        assert_eq!(report.fixed, 1);

        let employees: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees")
            .fetch_one(&pool)
            .await
            .unwrap();
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(employees, 0);
        assert_eq!(users, 0);
    }

    #[tokio::test]
    async fn referenced_invalid_employee_is_flagged_not_deleted() {
        let pool = pool().await;
        let employee_id = seed_employee(&pool, "please note: rotating roster", "y@agency.example").await;
        seed_release_for(&pool, Some(employee_id), None).await;

        let repair = EmployeeRepair::new(pool.clone());
        let report = repair.run(false).await.unwrap();
        assert_eq!(report.flagged, 1);
        assert_eq!(report.fixed, 0);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn placeholder_email_marks_employee_invalid() {
        let pool = pool().await;
        seed_employee(&pool, "Dana Reyes", "dana.reyes@import.invalid").await;

        let repair = EmployeeRepair::new(pool.clone());
        let report = repair.run(false).await.unwrap();
        assert_eq!(report.flagged, 1);
        assert_eq!(report.fixed, 1);
    }

    #[tokio::test]
    async fn valid_employee_untouched() {
        let pool = pool().await;
        seed_employee(&pool, "Dana Reyes", "dana@agency.example").await;

        let repair = EmployeeRepair::new(pool.clone());
        let report = repair.run(false).await.unwrap();
        assert_eq!(report.flagged, 0);
        assert!(report.actions.is_empty());
    }

    #[tokio::test]
    async fn contaminated_ar_contact_moved_into_notes() {
        let pool = pool().await;
        let release_id =
            seed_release_for(&pool, None, Some("will whitelist after upload, pending")).await;

        let repair = EmployeeRepair::new(pool.clone());
        let report = repair.run(false).await.unwrap();
        assert_eq!(report.fixed, 1);

        let (contact, notes): (Option<String>, Option<String>) =
            sqlx::query_as("SELECT ar_contact, notes FROM releases WHERE id = ?")
                .bind(release_id.to_string())
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(contact.is_none());
        assert!(notes.unwrap().contains("will whitelist after upload"));
    }

    #[tokio::test]
    async fn dry_run_leaves_everything_in_place() {
        let pool = pool().await;
        seed_employee(&pool, "12/04/2021", "z@agency.example").await;

        let repair = EmployeeRepair::new(pool.clone());
        let report = repair.run(true).await.unwrap();
        assert_eq!(report.flagged, 1);
        assert_eq!(report.fixed, 0);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
