use actix_web::web;
use argon2::{self, Config as ArgonConfig};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::info;
use rand::Rng;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{AuthResponse, Claims, Profile, SignInInput, SignUpInput, User};
use crate::repository::Repository;

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("invalid email or password".into())
}

/// Issues and checks HS256 bearer tokens.
#[derive(Clone)]
pub struct Tokens {
    secret: String,
    lifetime: chrono::Duration,
}

impl Tokens {
    pub fn new(secret: impl Into<String>, lifetime: chrono::Duration) -> Self {
        Tokens {
            secret: secret.into(),
            lifetime,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            iat: now.timestamp() as usize,
            exp: (now + self.lifetime).timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized("Invalid token".into()))
    }
}

async fn hash_password(password: String) -> Result<String, AppError> {
    let salt: [u8; 16] = rand::thread_rng().gen();
    let hash = web::block(move || {
        argon2::hash_encoded(password.as_bytes(), &salt, &ArgonConfig::default())
    })
    .await??;
    Ok(hash)
}

/// A stored hash that fails to parse counts as a mismatch.
async fn verify_password(hash: String, password: String) -> Result<bool, AppError> {
    let outcome = web::block(move || argon2::verify_encoded(&hash, password.as_bytes())).await?;
    Ok(outcome.unwrap_or(false))
}

pub async fn register(
    repo: &dyn Repository,
    tokens: &Tokens,
    input: SignUpInput,
) -> Result<AuthResponse, AppError> {
    let email = input.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("email", "must be a valid email address"));
    }
    if input.password.is_empty() {
        return Err(AppError::validation("password", "must not be empty"));
    }
    if repo.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("email already registered".into()));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        full_name: input.full_name.trim().to_string(),
        password_hash: hash_password(input.password).await?,
    };
    repo.insert_user(&user).await?;
    info!("Registered user {}", user.id);

    Ok(AuthResponse {
        token: tokens.issue(&user)?,
    })
}

pub async fn login(
    repo: &dyn Repository,
    tokens: &Tokens,
    input: SignInInput,
) -> Result<AuthResponse, AppError> {
    let email = input.email.trim().to_lowercase();
    let user = repo
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid_credentials)?;

    let valid = verify_password(user.password_hash.clone(), input.password).await?;
    if !valid {
        return Err(invalid_credentials());
    }

    info!("Issued token for user {}", user.id);
    Ok(AuthResponse {
        token: tokens.issue(&user)?,
    })
}

pub async fn profile(repo: &dyn Repository, user_id: &str) -> Result<Profile, AppError> {
    repo.find_user(user_id)
        .await?
        .map(Profile::from)
        .ok_or_else(|| AppError::NotFound("user not found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRepository;

    fn tokens() -> Tokens {
        Tokens::new("test-secret", chrono::Duration::minutes(5))
    }

    fn sign_up(email: &str, password: &str) -> SignUpInput {
        SignUpInput {
            email: email.into(),
            password: password.into(),
            full_name: " Ada Lovelace ".into(),
        }
    }

    #[actix_web::test]
    async fn register_then_login() {
        let repo = MemoryRepository::new();
        let tokens = tokens();

        let registered = register(&repo, &tokens, sign_up(" Ada@Example.com ", "hunter2"))
            .await
            .unwrap();
        let claims = tokens.verify(&registered.token).unwrap();

        let user = profile(&repo, &claims.sub).await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.full_name, "Ada Lovelace");

        let logged_in = login(
            &repo,
            &tokens,
            SignInInput {
                email: "ADA@example.com".into(),
                password: "hunter2".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(tokens.verify(&logged_in.token).unwrap().sub, claims.sub);
    }

    #[actix_web::test]
    async fn password_is_stored_hashed() {
        let repo = MemoryRepository::new();
        register(&repo, &tokens(), sign_up("ada@example.com", "hunter2"))
            .await
            .unwrap();

        let user = repo.find_user_by_email("ada@example.com").await.unwrap().unwrap();
        assert_ne!(user.password_hash, "hunter2");
        assert!(argon2::verify_encoded(&user.password_hash, b"hunter2").unwrap());
    }

    #[actix_web::test]
    async fn duplicate_email_conflicts() {
        let repo = MemoryRepository::new();
        register(&repo, &tokens(), sign_up("ada@example.com", "a")).await.unwrap();
        let err = register(&repo, &tokens(), sign_up("ADA@example.com", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn bad_registration_input_is_rejected() {
        let repo = MemoryRepository::new();
        let err = register(&repo, &tokens(), sign_up("not-an-email", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { field: "email", .. }));

        let err = register(&repo, &tokens(), sign_up("ada@example.com", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { field: "password", .. }));
    }

    #[actix_web::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let repo = MemoryRepository::new();
        register(&repo, &tokens(), sign_up("ada@example.com", "hunter2"))
            .await
            .unwrap();

        for (email, password) in [("ada@example.com", "wrong"), ("bob@example.com", "hunter2")] {
            let err = login(
                &repo,
                &tokens(),
                SignInInput {
                    email: email.into(),
                    password: password.into(),
                },
            )
            .await
            .unwrap_err();
            assert_eq!(err.to_string(), "invalid email or password");
        }
    }

    #[actix_web::test]
    async fn corrupt_stored_hash_is_a_mismatch() {
        let repo = MemoryRepository::new();
        repo.insert_user(&User {
            id: "u1".into(),
            email: "ada@example.com".into(),
            full_name: String::new(),
            password_hash: "not-an-argon2-hash".into(),
        })
        .await
        .unwrap();

        assert!(!verify_password("not-an-argon2-hash".into(), "pw".into())
            .await
            .unwrap());
        let err = login(
            &repo,
            &tokens(),
            SignInInput {
                email: "ada@example.com".into(),
                password: "pw".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn tampered_and_foreign_tokens_are_rejected() {
        let user = User {
            id: "u1".into(),
            email: "u1@example.com".into(),
            full_name: String::new(),
            password_hash: String::new(),
        };
        let token = tokens().issue(&user).unwrap();

        let other = Tokens::new("another-secret", chrono::Duration::minutes(5));
        assert!(matches!(other.verify(&token), Err(AppError::Unauthorized(_))));
        assert!(tokens().verify("not.a.token").is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let user = User {
            id: "u1".into(),
            email: "u1@example.com".into(),
            full_name: String::new(),
            password_hash: String::new(),
        };
        // well past the validator's default leeway
        let stale = Tokens::new("test-secret", chrono::Duration::minutes(-10));
        let token = stale.issue(&user).unwrap();
        assert!(tokens().verify(&token).is_err());
    }
}
