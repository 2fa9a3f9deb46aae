pub mod cfpq;
pub mod regular;

pub use cfpq::{cfpq, hellings_closure, matrix_closure, tensor_closure, Algorithm};
pub use regular::{bfs_reachable, bfs_reachable_per_source, regular_query};
