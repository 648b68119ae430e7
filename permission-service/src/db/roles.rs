use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::Role;

const ROLE_COLUMNS: &str =
    "role_id, role_name, role_code, description, permissions, is_active, created_utc, updated_utc";

pub async fn insert_role<'e, E>(executor: E, role: &Role) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO roles (role_id, role_name, role_code, description, permissions, is_active, created_utc, updated_utc)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(role.role_id)
    .bind(&role.role_name)
    .bind(&role.role_code)
    .bind(&role.description)
    .bind(&role.permissions)
    .bind(role.is_active)
    .bind(role.created_utc)
    .bind(role.updated_utc)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn find_role_by_id<'e, E>(executor: E, role_id: Uuid) -> Result<Option<Role>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Role>(&format!("SELECT {} FROM roles WHERE role_id = $1", ROLE_COLUMNS))
        .bind(role_id)
        .fetch_optional(executor)
        .await
}

pub async fn lock_role<'e, E>(executor: E, role_id: Uuid) -> Result<Option<Role>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Role>(&format!(
        "SELECT {} FROM roles WHERE role_id = $1 FOR UPDATE",
        ROLE_COLUMNS
    ))
    .bind(role_id)
    .fetch_optional(executor)
    .await
}

pub async fn list_roles<'e, E>(executor: E, active_only: bool) -> Result<Vec<Role>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Role>(&format!(
        "SELECT {} FROM roles WHERE ($1 = FALSE OR is_active) ORDER BY role_name",
        ROLE_COLUMNS
    ))
    .bind(active_only)
    .fetch_all(executor)
    .await
}

/// A role other than `exclude` that already uses the name or code.
pub async fn find_name_or_code_clash<'e, E>(
    executor: E,
    role_name: &str,
    role_code: &str,
    exclude: Option<Uuid>,
) -> Result<Option<Role>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Role>(&format!(
        r#"
        SELECT {}
        FROM roles
        WHERE (LOWER(role_name) = LOWER($1) OR role_code = $2)
          AND ($3::uuid IS NULL OR role_id <> $3)
        LIMIT 1
        "#,
        ROLE_COLUMNS
    ))
    .bind(role_name)
    .bind(role_code)
    .bind(exclude)
    .fetch_optional(executor)
    .await
}

pub async fn update_role<'e, E>(executor: E, role: &Role) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE roles
        SET role_name = $2, role_code = $3, description = $4, permissions = $5,
            is_active = $6, updated_utc = $7
        WHERE role_id = $1
        "#,
    )
    .bind(role.role_id)
    .bind(&role.role_name)
    .bind(&role.role_code)
    .bind(&role.description)
    .bind(&role.permissions)
    .bind(role.is_active)
    .bind(role.updated_utc)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn count_active_assignments<'e, E>(executor: E, role_id: Uuid) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM staff_role_assignments WHERE role_id = $1 AND is_active",
    )
    .bind(role_id)
    .fetch_one(executor)
    .await
}

/// Drop the historical (inactive) assignment rows so the role row can go.
pub async fn delete_inactive_assignments<'e, E>(executor: E, role_id: Uuid) -> Result<u64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "DELETE FROM staff_role_assignments WHERE role_id = $1 AND NOT is_active",
    )
    .bind(role_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_role<'e, E>(executor: E, role_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM roles WHERE role_id = $1")
        .bind(role_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
