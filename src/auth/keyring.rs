use keyring::Entry;
use tracing::debug;

use crate::{auth::AuthProvider, errors::AppError};

const TOKEN_USER: &str = "github-token";

pub struct KeyringAuth {
    entry: Entry,
}

impl KeyringAuth {
    pub fn new(service: &str) -> Result<Self, AppError> {
        let entry = Entry::new(service, TOKEN_USER)?;
        Ok(Self { entry })
    }
}

impl AuthProvider for KeyringAuth {
    fn get_token(&self) -> Result<String, AppError> {
        let token = self.entry.get_password()?;
        debug!("loaded token from keyring");
        Ok(token)
    }

    fn set_token(&self, token: &str) -> Result<(), AppError> {
        self.entry.set_password(token.trim())?;
        debug!("stored token in keyring");
        Ok(())
    }
}
