pub mod error {
    pub use fsutil::error::*;
}

pub mod home;
pub mod lock;
pub mod problem;
pub mod testcase;

pub use home::*;
pub use lock::*;
pub use problem::*;
pub use testcase::*;
