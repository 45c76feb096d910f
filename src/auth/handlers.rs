use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

use crate::{
    api::is_duplicate,
    auth::{
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    model::{employee::EmployeeStatus, role::Role, user::User},
    models::{Claims, LoginReqDto, RegisterReq, TokenType},
};

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    access_token: String,
    refresh_token: String,
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Employee accounts may only hold a session while verified; staff users
/// without an employee record are unaffected.
fn may_sign_in(role_id: u8, employee_status: Option<&str>) -> bool {
    role_id != Role::Employee.id() || employee_status == Some(EmployeeStatus::Verified.as_ref())
}

/// Issues a fresh access/refresh pair and records the refresh token.
async fn issue_tokens(
    subject: &TokenSubject,
    pool: &MySqlPool,
    config: &Config,
) -> Result<LoginResponse, HttpResponse> {
    let access_token = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)
        .map_err(|e| {
            error!(error = %e, "Failed to sign access token");
            HttpResponse::InternalServerError().finish()
        })?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl).map_err(
            |e| {
                error!(error = %e, "Failed to sign refresh token");
                HttpResponse::InternalServerError().finish()
            },
        )?;

    debug!(
        user_id = subject.user_id,
        jti = %refresh_claims.jti,
        "Storing refresh token"
    );

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to store refresh token");
        HttpResponse::InternalServerError().finish()
    })?;

    Ok(LoginResponse {
        access_token,
        refresh_token,
    })
}

/// Self-service registration. The employee starts `Not Verified` until an
/// admin approves the account.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Registered, awaiting verification"),
        (status = 400, description = "Missing fields"),
        (status = 409, description = "Username, email or phone already taken")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(pool, user), fields(username = %user.username))]
pub async fn register(user: web::Json<RegisterReq>, pool: web::Data<MySqlPool>) -> impl Responder {
    let username = user.username.trim().to_lowercase();
    let name = user.name.trim();
    let email = user.email.trim().to_lowercase();
    let designation = user.designation.trim();

    if username.is_empty() || user.password.is_empty() || name.is_empty() || email.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "error": "Username, password, name and email must not be empty"
        }));
    }

    let hashed = match hash_password(&user.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "Failed to hash password");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let result: Result<(), sqlx::Error> = async {
        let mut tx = pool.begin().await?;

        let employee_id = sqlx::query(
            r#"
            INSERT INTO employees (name, email, phone, designation, status)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(&email)
        .bind(user.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()))
        .bind(designation)
        .bind(EmployeeStatus::NotVerified.as_ref())
        .execute(&mut *tx)
        .await?
        .last_insert_id();

        sqlx::query(
            r#"
            INSERT INTO users (username, password, role_id, employee_id)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&username)
        .bind(&hashed)
        .bind(Role::Employee.id())
        .bind(employee_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }
    .await;

    match result {
        Ok(()) => {
            info!("Employee registered");
            HttpResponse::Created().json(json!({
                "message": "Registered successfully, awaiting verification"
            }))
        }
        Err(e) if is_duplicate(&e) => HttpResponse::Conflict().json(json!({
            "error": "Username, email or phone already exists"
        })),
        Err(e) => {
            error!(error = %e, "Failed to register employee");
            HttpResponse::InternalServerError().json(json!({
                "error": "Failed to register user"
            }))
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account not verified or disabled")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return HttpResponse::BadRequest().body("Username or password required");
    }

    let username = user.username.trim().to_lowercase();

    let db_user = match sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.username, u.password, u.role_id, u.employee_id,
               e.status AS employee_status
        FROM users u
        LEFT JOIN employees e ON e.id = u.employee_id
        WHERE u.username = ?
        "#,
    )
    .bind(&username)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    if !may_sign_in(db_user.role_id, db_user.employee_status.as_deref()) {
        info!(status = ?db_user.employee_status, "Login refused: employee not verified");
        return HttpResponse::Forbidden().json(json!({
            "error": "Account is not verified"
        }));
    }

    let subject = TokenSubject {
        user_id: db_user.id,
        username: db_user.username,
        role: db_user.role_id,
        employee_id: db_user.employee_id,
    };

    let tokens = match issue_tokens(&subject, pool.get_ref(), config.get_ref()).await {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(subject.user_id)
        .execute(pool.get_ref())
        .await
    {
        // not fatal for the login itself
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");

    HttpResponse::Ok().json(tokens)
}

fn refresh_claims(req: &HttpRequest, config: &Config) -> Option<Claims> {
    let claims = verify_token(bearer(req)?, &config.jwt_secret).ok()?;
    (claims.token_type == TokenType::Refresh).then_some(claims)
}

/// Rotates a refresh token: the presented one is revoked and a new pair is
/// issued.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, body = LoginResponse),
        (status = 401, description = "Missing, expired or revoked refresh token"),
        (status = 403, description = "Account no longer verified")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[instrument(name = "auth_refresh", skip(req, pool, config))]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(claims) = refresh_claims(&req, &config) else {
        return HttpResponse::Unauthorized().finish();
    };

    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = 1
        WHERE jti = ?
        AND revoked = 0
        AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await;

    match revoked {
        Ok(r) if r.rows_affected() == 1 => {}
        Ok(_) => return HttpResponse::Unauthorized().finish(),
        Err(e) => {
            error!(error = %e, "Failed to revoke refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    }

    // the account may have been disabled since the token was issued
    let account = sqlx::query_as::<_, (u8, Option<String>)>(
        r#"
        SELECT u.role_id, e.status
        FROM users u
        LEFT JOIN employees e ON e.id = u.employee_id
        WHERE u.id = ?
        "#,
    )
    .bind(claims.user_id)
    .fetch_optional(pool.get_ref())
    .await;

    match account {
        Ok(Some((role_id, status))) if may_sign_in(role_id, status.as_deref()) => {}
        Ok(Some((_, status))) => {
            info!(
                user_id = claims.user_id,
                status = ?status,
                "Refresh refused: employee not verified"
            );
            return HttpResponse::Forbidden().json(json!({
                "error": "Account is not verified"
            }));
        }
        Ok(None) => return HttpResponse::Unauthorized().finish(),
        Err(e) => {
            error!(error = %e, "Failed to load account for refresh");
            return HttpResponse::InternalServerError().finish();
        }
    }

    match issue_tokens(&TokenSubject::from(&claims), pool.get_ref(), config.get_ref()).await {
        Ok(tokens) => HttpResponse::Ok().json(tokens),
        Err(resp) => resp,
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked (or nothing to revoke)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(claims) = refresh_claims(&req, &config) else {
        return HttpResponse::NoContent().finish();
    };

    // idempotent; success even if the token never existed
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_verified_employees_keep_a_session() {
        let employee = Role::Employee.id();
        assert!(may_sign_in(employee, Some("Verified")));
        assert!(!may_sign_in(employee, Some("Disabled")));
        assert!(!may_sign_in(employee, Some("Not Verified")));
        assert!(!may_sign_in(employee, None));

        assert!(may_sign_in(Role::Admin.id(), None));
        assert!(may_sign_in(Role::Hr.id(), None));
    }
}
