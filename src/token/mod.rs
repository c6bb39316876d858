mod manager;
mod recipe;
mod types;

pub use manager::{TokenManager, TokenSettings};
pub use recipe::{CredentialRecipe, LoginRecipe, LoginSettings, NoRecipe, StaticRecipe};
pub use types::{AuthError, Credential, Token};
