//! Digest identifiers. Both serialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Length of a [`ShortId`].
pub const SHORT_ID_LEN: usize = 12;

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(hex: impl Into<String>) -> Self {
                Self(hex.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

hex_id!(
    /// 64-character hex blake3 digest of a script's dependency blocks.
    /// Names the cache entry directory.
    Fingerprint
);

hex_id!(
    /// Display prefix of a [`Fingerprint`].
    ShortId
);

impl Fingerprint {
    pub fn short_id(&self) -> ShortId {
        let end = self.0.len().min(SHORT_ID_LEN);
        ShortId(self.0[..end].to_owned())
    }
}
