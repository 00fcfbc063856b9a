pub mod clearing;
pub mod floors;
pub mod targeting;
