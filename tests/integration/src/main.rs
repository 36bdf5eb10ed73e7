mod helpers;

mod failover;
mod pool;
