//! Clients for the external services this backend talks to over HTTP.

pub mod supabase_auth;
pub mod telegram;
