//! JWT Token 处理
//!
//! 提供 JWT Token 的生成和验证功能

use bookstore_shared::config::AuthConfig;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::UserRole;

/// JWT 配置
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// 签名密钥
    pub secret: String,
    /// Token 过期时间（秒）
    pub expires_in_secs: i64,
    /// Token 签发者
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        AuthConfig::default().into()
    }
}

impl From<AuthConfig> for JwtConfig {
    fn from(config: AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret,
            expires_in_secs: config.jwt_expires_secs,
            issuer: config.jwt_issuer,
        }
    }
}

/// JWT Claims（Token 载荷）
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// 用户 ID（UUID 字符串）
    pub sub: String,
    pub email: String,
    pub role: UserRole,
    /// 签发时间
    pub iat: i64,
    /// 过期时间
    pub exp: i64,
    /// 签发者
    pub iss: String,
}

impl Claims {
    /// 解析用户 ID
    pub fn user_id(&self) -> Result<Uuid, ApiError> {
        Uuid::parse_str(&self.sub).map_err(|_| ApiError::Unauthorized("无效的用户 ID".to_string()))
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// JWT 管理器
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 生成 JWT Token，返回 (token, 过期时间戳)
    pub fn generate_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: UserRole,
    ) -> Result<(String, i64), ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.expires_in_secs);

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("JWT 生成失败: {}", e)))?;

        Ok((token, exp.timestamp()))
    }

    /// 验证并解析 JWT Token
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::Unauthorized("Token 已过期".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    ApiError::Unauthorized("无效的 Token".to_string())
                }
                _ => ApiError::Unauthorized(format!("Token 验证失败: {}", e)),
            },
        )?;

        Ok(token_data.claims)
    }

    /// 基于现有 Claims 签发新 Token（延长过期时间）
    pub fn refresh_token(&self, claims: &Claims) -> Result<(String, i64), ApiError> {
        self.generate_token(claims.user_id()?, &claims.email, claims.role)
    }

    pub fn expires_in_secs(&self) -> i64 {
        self.config.expires_in_secs
    }
}
