//! senbatsu voting bot library
//!
//! A LINE webhook responder that runs a daily two-group candidate vote:
//! a user sends "vote", picks one candidate from group A, then one from
//! group B, once per day while the voting window is open. Admins can
//! inspect the tally and clear their own daily-vote lock.

pub mod config;
pub mod engine;
pub mod line;
pub mod logging;
pub mod server;
pub mod store;
