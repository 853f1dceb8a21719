//! Authentication and authorization utilities
//!
//! # Modules
//!
//! - [`password`]: Argon2id password hashing and strength rules
//! - [`jwt`]: Access/refresh token generation and validation
//! - [`invite_code`]: Team invite code generation and normalization
//! - [`middleware`]: Bearer token parsing into an [`middleware::AuthContext`]
//! - [`authorization`]: Team membership, role and task access predicates
//!
//! # Example
//!
//! ```
//! use taskflow_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
//! use taskflow_shared::auth::password::{hash_password, verify_password};
//! use uuid::Uuid;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hash = hash_password("correct horse 1")?;
//! assert!(verify_password("correct horse 1", &hash)?);
//!
//! let user_id = Uuid::new_v4();
//! let token = create_token(&Claims::new(user_id, TokenType::Access), "secret")?;
//! assert_eq!(validate_access_token(&token, "secret")?.sub, user_id);
//! # Ok(())
//! # }
//! ```

pub mod authorization;
pub mod invite_code;
pub mod jwt;
pub mod middleware;
pub mod password;
