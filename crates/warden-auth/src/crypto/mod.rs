//! Cryptographic primitives: PKCE, secret hashing and token signing.

pub mod jwt;
pub mod pkce;
pub mod secret;

pub use jwt::{AccessTokenClaims, JwtError, JwtService, Jwk, Jwks, SigningAlgorithm, SigningKeyPair};
pub use pkce::{PkceChallenge, PkceChallengeMethod, PkceError, PkceVerifier, verify_pkce};
pub use secret::{
    burn_secret_verification, generate_opaque_token, hash_client_secret, hash_token,
    verify_client_secret,
};
