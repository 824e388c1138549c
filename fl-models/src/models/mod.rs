//! Entity model definitions.

pub mod food_record;
