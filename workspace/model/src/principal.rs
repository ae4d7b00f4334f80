//! Authentication identity of a stored account.

/// Role granted to every registered user.
pub const ROLE_USER: &str = "ROLE_USUARIO";

/// What the authentication layer needs to know about a logged-in account.
pub trait Principal {
    /// Login name of the account.
    fn username(&self) -> &str;

    /// Roles granted to the account.
    fn roles(&self) -> &'static [&'static str];

    /// Drops any plaintext secret held in memory after authentication.
    fn erase_credentials(&mut self);

    /// Two principals are the same account when their login names match,
    /// whatever their other fields say.
    fn is_same_principal<P: Principal + ?Sized>(&self, other: &P) -> bool {
        self.username() == other.username()
    }
}
