use axum::{extract::State, response::Json, Extension};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Collection;
use validator::Validate;

use crate::database::is_duplicate_key;
use crate::errors::{AppError, Result};
use crate::models::user::{AuthResponse, Claims, CreateUser, LoginUser, User, UserResponse};
use crate::state::AppState;

const TOKEN_TTL_SECS: i64 = 86400;

fn create_token(user: &User, jwt_secret: &str) -> Result<String> {
    let claims = Claims {
        sub: user.id.map(|id| id.to_hex()).unwrap_or_default(),
        email: user.email.clone(),
        role: user.role,
        exp: (Utc::now().timestamp() + TOKEN_TTL_SECS) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_ref()),
    )
    .map_err(|_| AppError::AuthError)
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CreateUser>,
) -> Result<Json<AuthResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let collection: Collection<User> = state.db.collection("users");

    let email = payload.email.to_lowercase();

    let password_hash =
        hash(&payload.password, DEFAULT_COST).map_err(|_| AppError::validation("Invalid password"))?;

    let mut user = User {
        id: None,
        email,
        password_hash,
        first_name: payload.first_name,
        last_name: payload.last_name,
        phone: payload.phone,
        role: Default::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let insert_result = collection.insert_one(&user).await.map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::DuplicateKey
        } else {
            AppError::MongoDB(e)
        }
    })?;

    user.id = insert_result.inserted_id.as_object_id();

    let token = create_token(&user, &state.jwt_secret)?;

    Ok(Json(AuthResponse {
        user: UserResponse::from(&user),
        token,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginUser>,
) -> Result<Json<AuthResponse>> {
    let collection: Collection<User> = state.db.collection("users");

    let filter = doc! { "email": payload.email.to_lowercase() };
    let user = collection
        .find_one(filter)
        .await?
        .ok_or(AppError::AuthError)?;

    let valid = verify(&payload.password, &user.password_hash).map_err(|_| AppError::AuthError)?;
    if !valid {
        return Err(AppError::AuthError);
    }

    let token = create_token(&user, &state.jwt_secret)?;

    Ok(Json(AuthResponse {
        user: UserResponse::from(&user),
        token,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserResponse>> {
    let collection: Collection<User> = state.db.collection("users");

    let user_id = ObjectId::parse_str(&claims.sub)?;
    let user = collection
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or(AppError::NotFound("User"))?;

    Ok(Json(UserResponse::from(&user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    #[test]
    fn token_round_trips_claims() {
        let user = User {
            id: Some(ObjectId::new()),
            email: "buyer@example.com".to_string(),
            password_hash: "x".to_string(),
            first_name: "Amina".to_string(),
            last_name: "Odhiambo".to_string(),
            phone: "254708374149".to_string(),
            role: crate::models::user::UserRole::Customer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let token = create_token(&user, "test-secret").unwrap();
        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();

        assert_eq!(decoded.claims.sub, user.id.unwrap().to_hex());
        assert_eq!(decoded.claims.email, "buyer@example.com");
        assert!(!decoded.claims.is_admin());
    }

    #[test]
    fn token_rejects_wrong_secret() {
        let user = User {
            id: Some(ObjectId::new()),
            email: "buyer@example.com".to_string(),
            password_hash: "x".to_string(),
            first_name: "Amina".to_string(),
            last_name: "Odhiambo".to_string(),
            phone: "254708374149".to_string(),
            role: crate::models::user::UserRole::Customer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let token = create_token(&user, "test-secret").unwrap();
        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other-secret"),
            &Validation::new(Algorithm::HS256),
        );

        assert!(result.is_err());
    }
}
