//! End-to-end workflow tests for ptero-backup
//!
//! Each test scripts the panel through the mock transport and drives a full
//! run through `BackupManager::run`.

mod hooks;
mod rotation;
mod run;
