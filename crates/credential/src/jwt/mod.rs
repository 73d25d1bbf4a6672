//! Token issuance for outbound requests

mod claims;
mod issuer;
mod rotation;
mod signer;

pub use claims::{ClaimSource, Claims, Organization, UserIdentity};
pub use issuer::{AUTHORIZATION_SCHEME, JwtIssuer, JwtIssuerBuilder, SignedToken};
pub use rotation::{KeyNames, KeySlot, SigningKey, SigningKeys};
pub use signer::{Hs256Signer, ISSUER, TokenClaims, TokenSigner, token_expiry};
