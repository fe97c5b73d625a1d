//! Row identifiers.
//!
//! Every table keys on a `SERIAL` column. Each gets its own newtype so an
//! `OrderId` can never be bound where a `ProductId` is expected.

macro_rules! row_ids {
    ($($(#[$doc:meta])* $name:ident;)+) => {$(
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(transparent)]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type), sqlx(transparent))]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    )+};
}

row_ids! {
    /// A registered account, customer or seller.
    UserId;
    ApiTokenId;
    /// A request to become an artist or store.
    ApplicationId;
    CategoryId;
    ProductId;
    OrderId;
    OrderItemId;
    /// A user wallet or the single platform wallet.
    WalletId;
    /// One ledger row.
    TransactionId;
    NotificationId;
    /// A user's shopping cart.
    CartId;
    CartItemId;
    ReviewId;
    /// One entry in the admin activity log.
    ActivityId;
}
