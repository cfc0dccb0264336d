//! Office 365 / Azure AD login strategy
//!
//! Delegates user sign-in to Azure Active Directory with the OAuth2
//! authorization code flow, then loads the user's profile from Microsoft
//! Graph `/me`. Session handling and routing stay with the host application,
//! which drives [`Strategy::authenticate`] once to get the redirect and once
//! more with the provider's callback query.

pub mod api;
pub mod auth;
pub mod error;

pub use auth::office365::STRATEGY_NAME;
pub use auth::{
    AuthRequest, AuthenticateOptions, OAuth2Options, OAuth2Strategy, Office365Options,
    Office365Strategy, Outcome, Profile, ProviderHooks, Strategy, TokenParams, Verdict, Verify,
};
pub use error::{Error, Result};
