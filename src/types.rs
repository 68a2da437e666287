//! Shared primitive identifiers.

/// Button identity.
///
/// Committed identities are store-assigned and strictly positive. Provisional
/// identities minted by the staging buffer are strictly negative, so the two
/// namespaces can never collide. `0` means "unset".
pub type ButtonId = i64;

/// Owning screen identifier (the parent scope for button uniqueness).
pub type ScreenId = u64;
