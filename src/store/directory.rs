//! Users, roles, departments and refresh tokens.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::MySqlPool;

use crate::{
    error::AppError,
    model::{
        department::{Department, DepartmentPayload},
        role::Role,
        user::{NewUser, UserChanges, UserProfile, UserProfileRow, UserRecord},
    },
};

const SELECT_PROFILE: &str = r#"
    SELECT u.id, u.username, u.full_name, u.department_id, d.name AS department_name,
           u.is_active, u.created_at
    FROM users u
    LEFT JOIN departments d ON d.id = u.department_id
"#;

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[derive(Clone)]
pub struct Directory {
    pool: MySqlPool,
}

impl Directory {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    // ---------- users ----------

    pub async fn find_credentials(&self, username: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, password_hash, full_name, department_id, is_active
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn find_credentials_by_id(&self, user_id: u64) -> Result<Option<UserRecord>, AppError> {
        Ok(sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, password_hash, full_name, department_id, is_active
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn roles_of(&self, user_id: u64) -> Result<Vec<Role>, AppError> {
        let ids = sqlx::query_scalar::<_, u8>("SELECT role_id FROM user_roles WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(Role::from_ids(ids))
    }

    pub async fn profile(&self, user_id: u64) -> Result<Option<UserProfile>, AppError> {
        let sql = format!("{SELECT_PROFILE} WHERE u.id = ?");
        let Some(row) = sqlx::query_as::<_, UserProfileRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let roles = self.roles_of(row.id).await?;
        Ok(Some(UserProfile::from_row(row, roles)))
    }

    pub async fn profile_by_username(&self, username: &str) -> Result<Option<UserProfile>, AppError> {
        let sql = format!("{SELECT_PROFILE} WHERE u.username = ?");
        let Some(row) = sqlx::query_as::<_, UserProfileRow>(&sql)
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let roles = self.roles_of(row.id).await?;
        Ok(Some(UserProfile::from_row(row, roles)))
    }

    /// Users with their roles, optionally limited to one department.
    pub async fn list_profiles(&self, department_id: Option<u64>) -> Result<Vec<UserProfile>, AppError> {
        let rows = match department_id {
            Some(department_id) => {
                let sql = format!("{SELECT_PROFILE} WHERE u.department_id = ? ORDER BY u.full_name");
                sqlx::query_as::<_, UserProfileRow>(&sql)
                    .bind(department_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("{SELECT_PROFILE} ORDER BY u.full_name");
                sqlx::query_as::<_, UserProfileRow>(&sql).fetch_all(&self.pool).await?
            }
        };

        let pairs = sqlx::query_as::<_, (u64, u8)>("SELECT user_id, role_id FROM user_roles")
            .fetch_all(&self.pool)
            .await?;
        let mut by_user: HashMap<u64, Vec<u8>> = HashMap::new();
        for (user_id, role_id) in pairs {
            by_user.entry(user_id).or_default().push(role_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let roles = Role::from_ids(by_user.remove(&row.id).unwrap_or_default());
                UserProfile::from_row(row, roles)
            })
            .collect())
    }

    /// Applies an admin edit. Deactivating a user also revokes their
    /// refresh tokens, so no new access token can be minted.
    pub async fn update_user(&self, user_id: u64, changes: UserChanges) -> Result<UserProfile, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, u64>("SELECT id FROM users WHERE id = ? FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("User not found"))?;

        sqlx::query(
            r#"
            UPDATE users
            SET full_name = COALESCE(?, full_name),
                department_id = COALESCE(?, department_id),
                is_active = COALESCE(?, is_active)
            WHERE id = ?
            "#,
        )
        .bind(changes.full_name.as_deref())
        .bind(changes.department_id)
        .bind(changes.is_active)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::BadRequest("Department does not exist".into())
            } else {
                tracing::error!(error = %e, user_id, "Failed to update user");
                e.into()
            }
        })?;

        if changes.is_active == Some(false) {
            sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ? AND revoked = FALSE")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(user_id, active = ?changes.is_active, "User updated");

        self.profile(user_id).await?.ok_or(AppError::NotFound("User not found"))
    }

    pub async fn user_department(&self, user_id: u64) -> Result<Option<u64>, AppError> {
        Ok(sqlx::query_scalar::<_, u64>("SELECT department_id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool, AppError> {
        let found = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(found > 0)
    }

    /// Creates the user with the default employee role.
    pub async fn insert_user(&self, user: &NewUser) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, full_name, department_id)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.department_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Username already exists".into())
            } else if is_foreign_key_violation(&e) {
                AppError::BadRequest("Department does not exist".into())
            } else {
                e.into()
            }
        })?;

        let user_id = result.last_insert_id();

        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(Role::Employee.id())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user_id)
    }

    pub async fn touch_last_login(&self, user_id: u64) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// `(active, inactive)` user counts.
    pub async fn user_counts(&self) -> Result<(u64, u64), AppError> {
        let (active, inactive) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                CAST(COALESCE(SUM(is_active = TRUE), 0) AS SIGNED),
                CAST(COALESCE(SUM(is_active = FALSE), 0) AS SIGNED)
            FROM users
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok((active.max(0) as u64, inactive.max(0) as u64))
    }

    // ---------- roles ----------

    async fn ensure_user(&self, user_id: u64) -> Result<(), AppError> {
        self.user_department(user_id)
            .await?
            .map(|_| ())
            .ok_or(AppError::NotFound("User not found"))
    }

    pub async fn assign_role(&self, user_id: u64, role: Role) -> Result<Role, AppError> {
        self.ensure_user(user_id).await?;

        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(role.id())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("User already has this role".into())
                } else {
                    e.into()
                }
            })?;

        tracing::info!(user_id, role = %role, "Role assigned");
        Ok(role)
    }

    pub async fn remove_role(&self, user_id: u64, role: Role) -> Result<Role, AppError> {
        self.ensure_user(user_id).await?;

        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role_id = ?")
            .bind(user_id)
            .bind(role.id())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BadRequest("User does not have this role".into()));
        }

        tracing::info!(user_id, role = %role, "Role removed");
        Ok(role)
    }

    // ---------- departments ----------

    pub async fn departments(&self) -> Result<Vec<Department>, AppError> {
        Ok(
            sqlx::query_as::<_, Department>("SELECT id, name, manager_id FROM departments ORDER BY name")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn department(&self, id: u64) -> Result<Option<Department>, AppError> {
        Ok(
            sqlx::query_as::<_, Department>("SELECT id, name, manager_id FROM departments WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn department_count(&self) -> Result<u64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM departments")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    fn department_write_error(e: sqlx::Error) -> AppError {
        if is_unique_violation(&e) {
            AppError::Conflict("Department name already exists".into())
        } else if is_foreign_key_violation(&e) {
            AppError::BadRequest("Manager does not exist".into())
        } else {
            e.into()
        }
    }

    pub async fn create_department(&self, payload: DepartmentPayload) -> Result<Department, AppError> {
        let payload = payload.validate()?;

        let result = sqlx::query("INSERT INTO departments (name, manager_id) VALUES (?, ?)")
            .bind(&payload.name)
            .bind(payload.manager_id)
            .execute(&self.pool)
            .await
            .map_err(Self::department_write_error)?;

        Ok(Department {
            id: result.last_insert_id(),
            name: payload.name,
            manager_id: payload.manager_id,
        })
    }

    pub async fn update_department(&self, id: u64, payload: DepartmentPayload) -> Result<Department, AppError> {
        let payload = payload.validate()?;
        self.department(id)
            .await?
            .ok_or(AppError::NotFound("Department not found"))?;

        sqlx::query("UPDATE departments SET name = ?, manager_id = ? WHERE id = ?")
            .bind(&payload.name)
            .bind(payload.manager_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Self::department_write_error)?;

        Ok(Department {
            id,
            name: payload.name,
            manager_id: payload.manager_id,
        })
    }

    pub async fn delete_department(&self, id: u64) -> Result<(), AppError> {
        self.department(id)
            .await?
            .ok_or(AppError::NotFound("Department not found"))?;

        let members = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE department_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if members > 0 {
            return Err(AppError::Conflict(format!(
                "Department still has {members} user(s) assigned"
            )));
        }

        sqlx::query("DELETE FROM departments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::Conflict("Department is still referenced".into())
                } else {
                    e.into()
                }
            })?;

        tracing::info!(department_id = id, "Department deleted");
        Ok(())
    }

    // ---------- refresh tokens ----------

    pub async fn store_refresh_token(&self, user_id: u64, jti: &str, expires_at: usize) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, jti, expires_at)
            VALUES (?, ?, FROM_UNIXTIME(?))
            "#,
        )
        .bind(user_id)
        .bind(jti)
        .bind(expires_at as i64)
        .execute(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = %e, user_id, "Failed to store refresh token"))?;
        Ok(())
    }

    /// Marks the token revoked; `true` if it was still active.
    pub async fn revoke_refresh_token(&self, jti: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE jti = ?
            AND revoked = FALSE
            AND expires_at > ?
            "#,
        )
        .bind(jti)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
