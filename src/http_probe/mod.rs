pub mod probe;
pub mod result;
pub mod tls;

pub mod prelude {
    pub use super::probe::run_check;
    pub use super::result::CheckResult;
}
