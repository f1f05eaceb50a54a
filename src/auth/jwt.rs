use crate::{
    auth::auth::AuthUser,
    models::{Claims, TokenType},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

fn claims_for(subject: &AuthUser, token_type: TokenType, ttl: usize) -> Claims {
    Claims {
        user_id: subject.user_id,
        sub: subject.username.clone(),
        department_id: subject.department_id,
        roles: subject.roles.iter().map(|r| r.id()).collect(),
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    }
}

fn sign(claims: &Claims, secret: &str) -> Result<String, Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn generate_access_token(subject: &AuthUser, secret: &str, ttl: usize) -> Result<String, Error> {
    sign(&claims_for(subject, TokenType::Access, ttl), secret)
}

/// Returns the claims too, so the caller can persist the `jti`.
pub fn generate_refresh_token(
    subject: &AuthUser,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = claims_for(subject, TokenType::Refresh, ttl);
    let token = sign(&claims, secret)?;
    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    const SECRET: &str = "test-secret";

    fn subject() -> AuthUser {
        AuthUser {
            user_id: 7,
            username: "an.nguyen".into(),
            department_id: 2,
            roles: vec![Role::DepartmentLeader],
        }
    }

    #[test]
    fn access_token_carries_identity_and_roles() {
        let token = generate_access_token(&subject(), SECRET, 900).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();

        assert_eq!(claims.token_type, TokenType::Access);
        let caller = AuthUser::from(claims);
        assert_eq!(caller.user_id, 7);
        assert_eq!(caller.department_id, 2);
        assert_eq!(caller.roles, vec![Role::DepartmentLeader]);
    }

    #[test]
    fn refresh_tokens_get_unique_ids() {
        let (_, a) = generate_refresh_token(&subject(), SECRET, 60).unwrap();
        let (_, b) = generate_refresh_token(&subject(), SECRET, 60).unwrap();
        assert_eq!(a.token_type, TokenType::Refresh);
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        let token = generate_access_token(&subject(), SECRET, 900).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());

        let mut claims = claims_for(&subject(), TokenType::Access, 0);
        claims.exp = now() - 3600;
        let expired = sign(&claims, SECRET).unwrap();
        assert!(verify_token(&expired, SECRET).is_err());
    }
}
