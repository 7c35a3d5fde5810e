mod billing;
mod cancellation;
mod common;
