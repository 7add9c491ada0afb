// src/ids.rs

//! Typed identifiers
//!
//! Every table key gets its own newtype so a line item id can never be
//! passed where a prestation id is expected. All of them are stored as
//! SQLite INTEGERs.

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }

            /// Database keys are always positive
            pub fn is_valid(self) -> bool {
                self.0 > 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

id_type!(
    /// A billable clinical/service unit
    PrestationId
);
id_type!(
    /// A catalog bundle
    PackageId
);
id_type!(
    /// One billable row on a ticket
    LineItemId
);
id_type!(
    /// An ancillary item attached to a line item
    DependencyItemId
);
id_type!(
    /// A patient-visit ticket (fiche)
    TicketId
);
id_type!(
    /// The staff member on whose behalf an operation runs
    ActorId
);
