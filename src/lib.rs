// ABOUTME: Library crate for git-pq exposing the patch-queue lifecycle engine

pub mod config;
pub mod git;
pub mod models;
pub mod patch;
pub mod paths;
pub mod pq;
