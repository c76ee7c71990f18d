pub mod lifecycle;
pub mod traits;

pub use lifecycle::{LifecycleManager, LifecycleState};
pub use traits::{Disposable, Service};
