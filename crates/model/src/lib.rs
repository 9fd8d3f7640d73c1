//! Resource records for the tracker data layer.
//!
//! Every record the server owns (runs, donations, bids, events, donation groups
//! and prizes) is projected client-side as a [`Resource`]. This crate defines
//! those projections together with the pieces the cache needs to keep them
//! consistent:
//! * identity: [`ResourceId`], [`ResourceKind`], [`ResourceKey`]
//! * ordering: a total-order [`Comparator`] per kind
//! * canonical query arguments: [`QueryArgs`]
//! * query predicates: [`predicate::matches_args`]

pub mod args;
pub mod bid;
pub mod donation;
pub mod event;
pub mod hms;
pub mod id;
pub mod order;
pub mod predicate;
pub mod prize;
pub mod resource;
pub mod run;

pub use args::{ArgsError, QueryArgs};
pub use bid::{Bid, BidState, ChainStep};
pub use donation::{CommentState, Donation, DonationBid, DonationGroup, ReadState, TransactionState};
pub use event::Event;
pub use id::{ResourceId, ResourceKey, ResourceKind};
pub use order::{Comparator, compare};
pub use prize::{Prize, PrizeState};
pub use resource::Resource;
pub use run::Run;
