pub mod notifier;
pub mod shutdown;
