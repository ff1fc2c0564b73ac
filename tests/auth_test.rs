//! Token verification without a JWKS endpoint: tokens are minted locally
//! with an HS256 secret and checked through `decode_claims`.
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, encode};
use uuid::Uuid;

use gigmarket_backend::auth::jwt::{Claims, UserMetadata, decode_claims};

const TEST_SECRET: &str = "test-secret-at-least-256-bits-long-for-hs256-xxxxxxx";

fn sign(claims: &Claims, secret: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encode test JWT")
}

fn verify(token: &str, secret: &str) -> Result<Claims, String> {
    decode_claims(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        Algorithm::HS256,
    )
}

fn claims_for(sub: &str, email: &str, full_name: &str) -> Claims {
    let now = Utc::now().timestamp() as usize;
    Claims {
        sub: sub.to_string(),
        exp: now + 3600,
        iat: Some(now),
        iss: Some("https://example.supabase.co/auth/v1".to_string()),
        email: Some(email.to_string()),
        role: Some("authenticated".to_string()),
        user_metadata: Some(UserMetadata {
            full_name: Some(full_name.to_string()),
            name: None,
            avatar_url: Some("https://example.com/avatar.png".to_string()),
            picture: None,
            email: Some(email.to_string()),
            email_verified: Some(true),
        }),
    }
}

#[test]
fn valid_token_decodes() {
    let user_id = Uuid::new_v4();
    let token = sign(
        &claims_for(&user_id.to_string(), "alice@example.com", "Alice Smith"),
        TEST_SECRET,
    );

    let claims = verify(&token, TEST_SECRET).expect("token should be valid");

    assert_eq!(claims.user_id().unwrap(), user_id);
    assert_eq!(claims.user_email().unwrap(), "alice@example.com");
    assert_eq!(claims.display_name().unwrap(), "Alice Smith");
    assert_eq!(
        claims.avatar_url().unwrap(),
        "https://example.com/avatar.png"
    );
}

#[test]
fn expired_token_is_rejected() {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        // well past the default 60s leeway
        exp: now - 300,
        iat: Some(now - 3600),
        iss: None,
        email: Some("expired@example.com".to_string()),
        role: None,
        user_metadata: None,
    };

    let err = verify(&sign(&claims, TEST_SECRET), TEST_SECRET).unwrap_err();
    assert!(err.contains("ExpiredSignature"));
}

#[test]
fn wrong_secret_is_rejected() {
    let token = sign(
        &claims_for(&Uuid::new_v4().to_string(), "bob@example.com", "Bob Jones"),
        TEST_SECRET,
    );

    let err = verify(&token, "completely-wrong-secret-xxxxxxxxxxxxxxxxxxx").unwrap_err();
    assert!(err.contains("InvalidSignature"));
}

#[test]
fn garbage_token_is_rejected() {
    assert!(verify("not.a.valid.jwt", TEST_SECRET).is_err());
}

#[test]
fn non_uuid_subject_is_reported() {
    let token = sign(&claims_for("service-account", "svc@example.com", "Svc"), TEST_SECRET);
    let claims = verify(&token, TEST_SECRET).unwrap();
    assert!(claims.user_id().is_err());
}

#[test]
fn claims_helpers_fall_back_without_metadata() {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        exp: now + 3600,
        iat: Some(now),
        iss: None,
        email: Some("bare@example.com".to_string()),
        role: None,
        user_metadata: None,
    };

    assert_eq!(claims.user_email().unwrap(), "bare@example.com");
    assert!(claims.display_name().is_none());
    assert!(claims.avatar_url().is_none());
}
