pub mod completions;
pub mod convert;
pub mod inspect;
pub mod run;
