#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]

pub mod core;
pub mod path;
pub mod render;
pub mod util;

pub use crate::core::Site;
pub use path::{AbsPath, RelPath};
pub use render::{RenderContext, RenderError};

pub type Result<T> = eyre::Result<T>;

pub const USER_LOG: &str = "lattice_user";

#[cfg(test)]
pub(crate) mod test {

    macro_rules! abs {
        ($path:literal) => {{
            &crate::AbsPath::new($path).unwrap()
        }};
        ($path:expr) => {{
            &crate::AbsPath::new($path).unwrap()
        }};
    }

    macro_rules! rel {
        ($path:literal) => {{
            &crate::RelPath::new($path).unwrap()
        }};
        ($path:expr) => {{
            &crate::RelPath::new($path).unwrap()
        }};
    }

    pub(crate) use abs;
    pub(crate) use rel;
}
