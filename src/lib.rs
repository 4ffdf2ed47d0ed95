// PDF text extraction service: upload -> engine chain -> session store -> download
pub mod config;
pub mod error;
pub mod extract;
pub mod server;
pub mod session;
