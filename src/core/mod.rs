//! Core business logic - framework-agnostic ledger, social and studio operations.

/// Credit ledger and payment crediting
pub mod entitlement;
/// Append-only design history and the studio projection
pub mod events;
/// Community feed, likes and reactions
pub mod feed;
/// Subscription tiers
pub mod plan;
/// User-saved purchase links
pub mod product_links;
/// Monthly plan allotments
pub mod renewal;
/// Favorites
pub mod social;
/// Paid feature flows
pub mod studio;
