use thiserror::Error;

use crate::catalog::CatalogError;
use crate::notify::NotifyError;
use crate::stores::StoreError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// A user-safe message for the conversation boundary. Internal detail
    /// stays in logs; the buyer only ever sees one of these.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Store(_) => {
                "⚠️ The shop is temporarily unavailable. Please try again in a moment."
            }
            Self::Notify(_) => {
                "⚠️ We could not hand your order over for processing. Nothing was charged, please try confirming again."
            }
            Self::Catalog(_) | Self::Configuration(_) => "⚠️ An unexpected error occurred.",
        }
    }
}
