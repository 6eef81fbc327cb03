//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod custom_product_link;
pub mod design_event;
pub mod design_like;
pub mod design_reaction;
pub mod favorite;
pub mod payment_transaction;
pub mod shared_design;
pub mod system_state;
pub mod user_entitlement;

// Re-export specific types to avoid conflicts
pub use custom_product_link::{
    Column as CustomProductLinkColumn, Entity as CustomProductLink,
    Model as CustomProductLinkModel,
};
pub use design_event::{Column as DesignEventColumn, Entity as DesignEvent, Model as DesignEventModel};
pub use design_like::{Column as DesignLikeColumn, Entity as DesignLike, Model as DesignLikeModel};
pub use design_reaction::{
    Column as DesignReactionColumn, Entity as DesignReaction, Model as DesignReactionModel,
};
pub use favorite::{Column as FavoriteColumn, Entity as Favorite, Model as FavoriteModel};
pub use payment_transaction::{
    Column as PaymentTransactionColumn, Entity as PaymentTransaction,
    Model as PaymentTransactionModel,
};
pub use shared_design::{
    Column as SharedDesignColumn, Entity as SharedDesign, Model as SharedDesignModel,
};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
pub use user_entitlement::{
    Column as UserEntitlementColumn, Entity as UserEntitlement, Model as UserEntitlementModel,
};
