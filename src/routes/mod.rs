/// Router Module Index
///
/// Splits routing by access requirement so the session-gated surface stays easy
/// to audit.

/// Routes accessible to everyone (read paths and sign-in flows).
pub mod public;

/// Comment mutations. Every handler goes through `guard`.
pub mod authenticated;
