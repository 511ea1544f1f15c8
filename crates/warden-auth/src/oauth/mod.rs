//! OAuth 2.0 protocol layer: authorization requests, client authentication,
//! session hand-off and token endpoint wire types.

pub mod authorize;
pub mod client_auth;
pub mod service;
pub mod session;
pub mod token;

pub use authorize::{AuthorizationErrorResponse, AuthorizationRequest, AuthorizationResponse};
pub use client_auth::{
    AuthenticatedClient, ClientCredentials, TokenEndpointAuthMethod, authenticate_client,
    parse_basic_auth,
};
pub use service::{
    AuthorizationConfig, AuthorizationService, AuthorizeOutcome, PendingAuthorization,
};
pub use session::{
    HeaderSessionResolver, NoSessionResolver, RequestContext, SessionResolver, UserSession,
};
pub use token::{TokenError, TokenRequest, TokenResponse};
