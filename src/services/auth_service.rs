use axum::http;
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use tracing::info;

/// User proven by a validated token, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

// Get the auth token from a request
pub fn get_auth_token<B>(req: &http::Request<B>) -> Result<String, String> {
    // 1. Try to get token from Authorization header
    if let Some(auth_header) = req.headers().get(http::header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| "Invalid Authorization header".to_string())?;
        Ok(auth_str.strip_prefix("Bearer ").unwrap_or(auth_str).to_string())
    }
    // 2. Try to get token from cookies
    else {
        let cookie_header = req
            .headers()
            .get(http::header::COOKIE)
            .ok_or_else(|| "Missing Authorization header or Cookie".to_string())?
            .to_str()
            .map_err(|_| "Invalid Cookie header".to_string())?;

        cookie::Cookie::split_parse(cookie_header)
            .flatten()
            .find(|c| c.name() == "auth_token")
            .map(|c| c.value().to_string())
            .ok_or_else(|| "auth_token cookie not found".to_string())
    }
}

// Resolve the user a token was issued to
pub fn authenticate(token: &str, secret: &str) -> Result<AuthUser, String> {
    let token_data = validate_jwt(token, secret).map_err(|e| format!("JWT validation failed: {}", e))?;
    let uid = token_data
        .claims
        .get("sub")
        .and_then(|v| v.as_str())
        .filter(|uid| !uid.is_empty())
        .ok_or_else(|| "Can't extract a UID from the JWT token".to_string())?;

    info!("JWT token validated successfully for user: {}", uid);
    Ok(AuthUser(uid.to_string()))
}

// Validate a JWT token and return the token data
pub fn validate_jwt(token: &str, secret: &str) -> Result<TokenData<serde_json::Value>, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<serde_json::Value>(token, &decoding_key, &validation)
}
