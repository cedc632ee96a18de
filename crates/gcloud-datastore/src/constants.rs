//! Enumerations mirrored from the Datastore REST v1 API.
//!
//! Each enum parses only the exact wire strings the API defines. Unknown
//! values are rejected with [`ErrorKind::InvalidEnum`](crate::ErrorKind::InvalidEnum).

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $wire:literal,
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// The wire string for this value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $wire, )+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::Error;

            fn from_str(s: &str) -> crate::error::Result<Self> {
                match s {
                    $( $wire => Ok($name::$variant), )+
                    other => Err(crate::error::Error::new(
                        crate::error::ErrorKind::InvalidEnum {
                            type_name: stringify!($name),
                            value: other.to_string(),
                        },
                    )),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$name> for serde_json::Value {
            fn from(value: $name) -> Self {
                serde_json::Value::String(value.as_str().to_string())
            }
        }
    };
}

wire_enum! {
    /// The fields returned for each entity in a result batch.
    pub enum ResultType {
        /// Unspecified. This value is never used.
        #[default]
        Unspecified => "RESULT_TYPE_UNSPECIFIED",
        /// The key and properties.
        Full => "FULL",
        /// A projected subset of properties.
        Projection => "PROJECTION",
        /// Only the key.
        KeyOnly => "KEY_ONLY",
    }
}

wire_enum! {
    /// The state of a query after the current batch.
    pub enum MoreResultsType {
        /// Unspecified. This value is never used.
        #[default]
        Unspecified => "MORE_RESULTS_TYPE_UNSPECIFIED",
        /// There may be additional batches to fetch from this query.
        NotFinished => "NOT_FINISHED",
        /// The query is finished, but there may be more results after the limit.
        MoreResultsAfterLimit => "MORE_RESULTS_AFTER_LIMIT",
        /// The query is finished, but there may be more results after the end cursor.
        MoreResultsAfterCursor => "MORE_RESULTS_AFTER_CURSOR",
        /// The query is finished, and there are no more results.
        NoMoreResults => "NO_MORE_RESULTS",
    }
}

wire_enum! {
    /// Sort direction of a property order.
    pub enum Direction {
        Unspecified => "DIRECTION_UNSPECIFIED",
        #[default]
        Ascending => "ASCENDING",
        Descending => "DESCENDING",
    }
}

wire_enum! {
    /// Operator combining the children of a composite filter.
    pub enum CompositeFilterOperator {
        Unspecified => "OPERATOR_UNSPECIFIED",
        #[default]
        And => "AND",
        Or => "OR",
    }
}

wire_enum! {
    /// Comparison applied by a property filter.
    pub enum PropertyFilterOperator {
        Unspecified => "OPERATOR_UNSPECIFIED",
        LessThan => "LESS_THAN",
        LessThanOrEqual => "LESS_THAN_OR_EQUAL",
        GreaterThan => "GREATER_THAN",
        GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
        #[default]
        Equal => "EQUAL",
        NotEqual => "NOT_EQUAL",
        In => "IN",
        NotIn => "NOT_IN",
        /// Limits results to descendants of the key given as the filter value.
        HasAncestor => "HAS_ANCESTOR",
    }
}
