pub mod sizes;
pub mod slots;
