mod pg_cluster;
mod pg_upgrade;

pub use pg_cluster::*;
pub use pg_upgrade::*;
