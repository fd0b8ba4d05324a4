pub mod bootstrap;
pub mod config;
pub mod home;
pub mod orchestrator;
pub mod scheduler;
pub mod source;
pub mod supervisor;
pub mod terminal;

#[cfg(test)]
pub(crate) mod test_support;
