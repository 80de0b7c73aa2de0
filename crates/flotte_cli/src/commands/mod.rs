pub mod audit;
pub mod init_config;
pub mod run;
