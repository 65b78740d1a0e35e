//! # accounts-auth
//!
//! Users and everything needed to sign them up, in and back in:
//!
//! - **Users and activations** (`user`, `activation`)
//! - **Storage** behind the [`UserStore`] trait, with a SQLite implementation (`store`)
//! - **Password hashing** with Argon2id and legacy bcrypt, plus validators (`hashers`)
//! - **Password reset tokens** that need no server-side state (`tokens`)
//! - **Credential checks** by username, email or either (`backends`)
//! - **Account forms** with their validation rules (`forms`)
//!
//! Hashing runs on `tokio::task::spawn_blocking`; store calls run on the
//! database's blocking pool. All traits are `Send + Sync`.

pub mod activation;
pub mod backends;
pub mod forms;
pub mod hashers;
pub mod store;
pub mod tokens;
pub mod user;

pub use activation::{generate_code, Activation};
pub use backends::{authenticate, AuthOutcome, LoginLookup};
pub use forms::{
    ChangeEmailForm, ChangeProfileForm, PasswordChangeForm, PasswordResetForm,
    RemindUsernameForm, ResendActivationCodeForm, SetPasswordForm, SignInForm, SignUpForm,
};
pub use hashers::{
    check_password, is_password_usable, make_password, make_unusable_password, validate_password,
    PasswordHasher, UserAttributes,
};
pub use store::{is_email_conflict, SqliteUserStore, UserStore, UNIQUE_EMAIL};
pub use tokens::{decode_uid, encode_uid, PasswordResetTokenGenerator};
pub use user::{NewUser, User};
