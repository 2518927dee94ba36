// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session tokens, password hashing and the bearer-token extractor.
//!
//! ## Auth Flow
//!
//! 1. Register/login/federated login issue an HS256 session token
//! 2. Clients send `Authorization: Bearer <token>`
//! 3. The `Auth` extractor:
//!    - Verifies signature (HS256 only), issuer and expiry
//!    - Extracts `sub` → `AuthenticatedUser::user_id`
//!
//! ## Security
//!
//! - Tokens are stateless and cannot be revoked before `exp`
//! - Any algorithm other than HS256 is rejected
//! - Verification failures are reported to callers as one generic error

pub mod claims;
pub mod error;
pub mod extractor;
pub mod password;
pub mod token;

pub use claims::{AuthenticatedUser, SessionClaims};
pub use error::AuthError;
pub use extractor::Auth;
pub use token::{TokenError, TokenService};
