pub mod advice;
pub mod conversation;
pub mod product;
pub mod selection;
