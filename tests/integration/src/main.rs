mod helpers;

mod connection;
mod store;
mod watcher;
