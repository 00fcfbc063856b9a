pub mod nobidreasons;
pub mod openrtb;
pub mod response_state;

/// Declares a flat list of named spec codes with descriptions, plus a
/// `describe` lookup. Used for no-bid reason vocabularies and similar
/// wire-level code tables.
#[macro_export]
macro_rules! spec_list {
    ($( $(#[$meta:meta])* $name:ident = $val:expr => $desc:expr ),+ $(,)?) => {
        $(
            $(#[$meta])*
            pub const $name: u32 = $val;
        )+

        pub fn describe(code: u32) -> Option<&'static str> {
            match code {
                $( $val => Some($desc), )+
                _ => None,
            }
        }
    };
}
