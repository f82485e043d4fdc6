//! Domain types shared by cart, shipping and checkout.
pub mod aggregates;
pub mod events;
pub mod value_objects;
