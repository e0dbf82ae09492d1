pub mod config_cmd;
pub mod onboard;
pub mod pricing;
pub mod run;
