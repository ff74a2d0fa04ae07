//! Employee records, scanned and pruned by the repair pass

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Employee {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: Option<String>,
}

/// Load every employee for a repair scan
pub async fn scan_employees(pool: &SqlitePool) -> Result<Vec<Employee>, sqlx::Error> {
    let rows = sqlx::query("SELECT id, user_id, name, email FROM employees ORDER BY name")
        .fetch_all(pool)
        .await?;

    let mut employees = Vec::with_capacity(rows.len());
    for row in rows {
        let id_str: String = row.get("id");
        let id = Uuid::parse_str(&id_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let user_id: Option<String> = row.get("user_id");
        let user_id = user_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        employees.push(Employee {
            id,
            user_id,
            name: row.get("name"),
            email: row.get("email"),
        });
    }
    Ok(employees)
}

/// How many releases this employee is assigned to as A&R
pub async fn count_assigned_releases(
    pool: &SqlitePool,
    employee_id: Uuid,
) -> Result<usize, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM releases WHERE ar_employee_id = ?")
        .bind(employee_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count as usize)
}

/// Delete an employee and their user record in one transaction
pub async fn delete_employee_cascade(
    pool: &SqlitePool,
    employee: &Employee,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee.id.to_string())
        .execute(tx.as_mut())
        .await?;

    if let Some(user_id) = employee.user_id {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id.to_string())
            .execute(tx.as_mut())
            .await?;
    }

    tx.commit().await?;
    Ok(())
}
