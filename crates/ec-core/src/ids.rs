use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// The first id handed out by a fresh counter.
            pub const FIRST: Self = Self(NonZeroU32::MIN);

            /// Wrap a raw 1-based value. Returns `None` for 0.
            pub fn new(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }

            pub fn get(self) -> u32 {
                self.0.get()
            }

            /// The id following this one, saturating at `u32::MAX`.
            pub fn next(self) -> Self {
                Self(self.0.saturating_add(1))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.get())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.get())
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> u32 {
                id.get()
            }
        }

        impl TryFrom<u32> for $name {
            type Error = CoreError;

            fn try_from(raw: u32) -> Result<Self, Self::Error> {
                Self::new(raw).ok_or(CoreError::InvalidId {
                    what: $what,
                    value: u64::from(raw),
                })
            }
        }
    };
}

define_id!(
    /// Ephemeral identity of a comparison column for the lifetime of one
    /// module screen. Never persisted.
    SessionId,
    "session"
);

define_id!(
    /// Key of a record in the `savedCases` collection.
    CaseId,
    "case"
);

define_id!(
    /// Key of a record in the `savedBatches` collection.
    BatchId,
    "batch"
);

define_id!(
    /// Key of a record in the `settings` collection.
    SettingsId,
    "settings"
);

/// Parse a comma separated id list such as `"3,7,12"`.
///
/// Empty segments are skipped; anything else that is not a positive
/// integer is an error.
pub fn parse_id_list<I>(raw: &str) -> Result<Vec<I>, CoreError>
where
    I: TryFrom<u32, Error = CoreError>,
{
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let value: u32 = s.parse().map_err(|_| CoreError::InvalidArg {
                what: format!("'{}' is not an id", s),
            })?;
            I::try_from(value)
        })
        .collect()
}
