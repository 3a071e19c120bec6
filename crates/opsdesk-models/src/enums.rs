//! Closed value sets stored as Postgres enum types.
//!
//! Payloads carry these as plain strings so a bad value becomes a field error
//! alongside every other failing rule instead of rejecting the whole body.

/// Defines a lowercase string enum mapped to a Postgres enum type.
macro_rules! define_pg_enum {
    (
        $(#[$meta:meta])*
        $name:ident as $pg_type:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            serde::Serialize,
            serde::Deserialize,
            sqlx::Type,
            utoipa::ToSchema,
        )]
        #[sqlx(type_name = $pg_type, rename_all = "lowercase")]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.as_str() == value)
            }

            /// Field rule: `value` must be one of the members.
            pub fn check_member(value: &str) -> Result<(), validator::ValidationError> {
                match Self::parse(value) {
                    Some(_) => Ok(()),
                    None => {
                        let mut err = validator::ValidationError::new("in");
                        err.add_param("values".into(), &Self::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>());
                        Err(err)
                    }
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s).ok_or_else(|| format!("unknown {}: {}", $pg_type, s))
            }
        }
    };
}

pub(crate) use define_pg_enum;
