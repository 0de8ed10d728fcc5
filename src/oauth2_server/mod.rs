// ABOUTME: OAuth 2.1 authorization server with opaque tokens and pluggable storage
// ABOUTME: Provides RFC 7591 client registration, PKCE-only authorization codes and refresh re-pairing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// RFC 7591 dynamic client registration
pub mod client_registration;
/// Random credentials, PKCE and expiry helpers
pub mod crypto;
/// Discovery metadata documents
pub mod discovery;
/// Authorization and token endpoint state machines
pub mod endpoints;
/// Entities, wire types and `OAuth2Error`
pub mod models;
/// Typed entity stores
pub mod stores;

pub use client_registration::ClientRegistrationManager;
pub use discovery::DiscoveryProvider;
pub use endpoints::{AuthorizeError, OAuth2AuthorizationServer};
pub use models::{
    AuthorizeRequest, ClientRegistrationRequest, ClientRegistrationResponse, OAuth2AccessToken,
    OAuth2AuthCode, OAuth2Client, OAuth2Error, OAuth2RefreshToken, TokenRequest, TokenResponse,
};
pub use stores::{ClientStore, CodeStore, TokenStore};
