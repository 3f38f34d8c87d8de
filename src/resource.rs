use url::Url;

use crate::error::FetchError;

/// Just a wrapper around a URL template and credentials
///
/// The URL may contain placeholders, replaced for every person it is used for:
/// * `%EMAIL%`: their whole email address
/// * `%NAME%`: the part of their address before the `@`
/// * `%SERVER%`: the part of their address after the `@`
#[derive(Clone, Debug)]
pub struct Resource {
    url: String,
    username: String,
    password: String,
}

impl Resource {
    pub fn new<S: ToString, T: ToString, U: ToString>(url: S, username: T, password: U) -> Self {
        Self {
            url: url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn url_template(&self) -> &str { &self.url }
    pub fn username(&self) -> &String { &self.username }
    pub fn password(&self) -> &String { &self.password }

    pub fn has_credentials(&self) -> bool {
        self.username.is_empty() == false
    }

    /// The URL of the free/busy file of `email`
    pub fn url_for(&self, email: &str) -> Result<Url, FetchError> {
        let email = email.trim();
        let (name, server) = match email.find('@') {
            Some(at) => (&email[..at], &email[at + 1..]),
            None => (email, ""),
        };
        let expanded = self.url
            .replace("%EMAIL%", email)
            .replace("%NAME%", name)
            .replace("%SERVER%", server);
        Url::parse(&expanded).map_err(|_| FetchError::InvalidUrl(expanded))
    }
}
